//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Desk Lamp
//!     price: "24.99"
//!     category: lighting
//!     stock_quantity: 12
//!     description: Warm white, dimmable
//! ```
//!
//! Every entry goes through the same validation as the create-product API,
//! and the whole file is validated before anything is written.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{error, info};

use bazaar_server::db::PgStore;
use bazaar_server::models::{NewProduct, ProductFilter};
use bazaar_server::services::{CatalogService, ProductInput};

use super::{CommandError, connect};

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<SeedProduct>,
}

/// One product entry. Numbers may be written bare or quoted.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub price: serde_yaml::Value,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock_quantity: Option<serde_yaml::Value>,
}

fn scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Null => None,
        other => serde_yaml::to_string(other).ok().map(|s| s.trim().to_string()),
    }
}

impl From<SeedProduct> for ProductInput {
    fn from(entry: SeedProduct) -> Self {
        Self {
            name: Some(entry.name),
            description: entry.description,
            price: scalar(&entry.price),
            category: entry.category,
            stock_quantity: entry.stock_quantity.as_ref().and_then(scalar),
            image_url: entry.image_url,
        }
    }
}

/// Parse and validate a seed file.
///
/// # Errors
///
/// Returns `CommandError::SeedFormat` for malformed YAML, or
/// `CommandError::Invalid` listing every invalid entry.
pub fn parse(content: &str) -> Result<Vec<NewProduct>, CommandError> {
    let file: SeedFile = serde_yaml::from_str(content)?;

    let mut products = Vec::with_capacity(file.products.len());
    let mut errors = Vec::new();
    for (index, entry) in file.products.into_iter().enumerate() {
        let name = entry.name.clone();
        match ProductInput::from(entry).validate() {
            Ok(product) => products.push(product),
            Err(e) => errors.push(format!("#{} ({name}): {e}", index + 1)),
        }
    }

    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CommandError::Invalid(format!(
            "{} invalid product entries",
            errors.len()
        )));
    }
    Ok(products)
}

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, or if
/// database operations fail.
pub async fn products(file_path: &str, skip_existing: bool) -> Result<(), CommandError> {
    info!(path = %file_path, "Loading products from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|source| CommandError::Read {
            path: file_path.to_string(),
            source,
        })?;
    let products = parse(&content)?;
    info!(products = products.len(), "Seed file validated");

    let store = PgStore::new(connect().await?);
    let catalog = CatalogService::new(&store);

    let existing: HashSet<String> = if skip_existing {
        catalog
            .list(&ProductFilter {
                category: None,
                active_only: false,
            })
            .await
            .map_err(|e| CommandError::Invalid(e.to_string()))?
            .into_iter()
            .map(|p| p.name)
            .collect()
    } else {
        HashSet::new()
    };

    let mut inserted = 0_usize;
    let mut skipped = 0_usize;
    for product in &products {
        if existing.contains(&product.name) {
            skipped += 1;
            continue;
        }
        catalog
            .create(product)
            .await
            .map_err(|e| CommandError::Invalid(format!("{}: {e}", product.name)))?;
        inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (already exist): {skipped}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::Price;

    use super::*;

    #[test]
    fn test_parse_accepts_bare_and_quoted_numbers() {
        let products = parse(
            r#"
products:
  - name: Desk Lamp
    price: 24.99
    stock_quantity: 12
    category: lighting
  - name: Mug
    price: "8.50"
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        let lamp = products.first().unwrap();
        assert_eq!(lamp.price, Price::from_cents(2499));
        assert_eq!(lamp.stock_quantity, 12);
        assert_eq!(lamp.category.as_deref(), Some("lighting"));

        let mug = products.get(1).unwrap();
        assert_eq!(mug.price, Price::from_cents(850));
        assert_eq!(mug.stock_quantity, 0);
    }

    #[test]
    fn test_parse_rejects_invalid_entries() {
        let err = parse(
            r#"
products:
  - name: Free Lunch
    price: 0
  - name: Fine
    price: 1.00
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Invalid(msg) if msg.starts_with("1 invalid")));
    }

    #[test]
    fn test_parse_rejects_malformed_yaml() {
        assert!(matches!(
            parse("products: [name: Lamp"),
            Err(CommandError::SeedFormat(_))
        ));
    }
}
