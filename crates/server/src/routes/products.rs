//! Catalog route handlers.
//!
//! Product creation accepts either a JSON body or a multipart form with an
//! optional `image` file part.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bazaar_core::ProductId;

use super::parse_id;
use crate::db::Store;
use crate::error::{AppError, JsonBody, Result};
use crate::middleware::RequireAuth;
use crate::models::{Product, ProductFilter};
use crate::services::{PaymentBridge, ProductInput};
use crate::state::AppState;

/// Slack above the image cap for the other form fields.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router<S: Store, P: PaymentBridge>(max_image_bytes: usize) -> Router<AppState<S, P>> {
    Router::new()
        .route(
            "/products",
            get(index::<S, P>)
                .post(create::<S, P>)
                .layer(DefaultBodyLimit::max(max_image_bytes + FORM_OVERHEAD_BYTES)),
        )
        .route("/products/{id}", get(show::<S, P>))
        .route("/products/{id}/deactivate", post(deactivate::<S, P>))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub active_only: Option<String>,
}

impl TryFrom<ListQuery> for ProductFilter {
    type Error = AppError;

    fn try_from(query: ListQuery) -> Result<Self> {
        let active_only = match query.active_only.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(_) => {
                return Err(AppError::BadRequest(
                    "active_only must be true or false".to_string(),
                ));
            }
        };
        Ok(Self {
            category: query.category.filter(|c| !c.trim().is_empty()),
            active_only,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub product: Product,
}

/// List products, newest first.
pub async fn index<S: Store, P: PaymentBridge>(
    State(state): State<AppState<S, P>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ProductsResponse>> {
    let filter = ProductFilter::try_from(query)?;
    let products = state.catalog().list(&filter).await?;
    Ok(Json(ProductsResponse { products }))
}

/// One product, active or not.
pub async fn show<S: Store, P: PaymentBridge>(
    State(state): State<AppState<S, P>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>> {
    let id: ProductId = parse_id(&id, "product id")?;
    let product = state.catalog().get(id).await?;
    Ok(Json(ProductResponse { product }))
}

/// Withdraw a product from sale.
pub async fn deactivate<S: Store, P: PaymentBridge>(
    RequireAuth(_account): RequireAuth,
    State(state): State<AppState<S, P>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>> {
    let id: ProductId = parse_id(&id, "product id")?;
    let product = state.catalog().deactivate(id).await?;
    Ok(Json(ProductResponse { product }))
}

/// Create a product from JSON or a multipart form.
pub async fn create<S: Store, P: PaymentBridge>(
    RequireAuth(_account): RequireAuth,
    State(state): State<AppState<S, P>>,
    request: Request,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let (input, image) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        read_form(multipart).await?
    } else {
        let JsonBody(body) = JsonBody::<Value>::from_request(request, &state).await?;
        (json_input(&body)?, None)
    };

    let mut product = input.validate()?;
    if let Some(image) = image {
        product.image_url = Some(state.images().save(&image.file_name, &image.bytes).await?);
    }

    let product = state.catalog().create(&product).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse { product })))
}

struct UploadedImage {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_form(mut multipart: Multipart) -> Result<(ProductInput, Option<UploadedImage>)> {
    let bad_form = |e: axum::extract::multipart::MultipartError| AppError::BadRequest(e.body_text());

    let mut input = ProductInput::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_form)?;
            // Browsers send an empty part when no file was chosen
            if !file_name.is_empty() || !bytes.is_empty() {
                image = Some(UploadedImage {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = Some(field.text().await.map_err(bad_form)?);
        match name.as_str() {
            "name" => input.name = value,
            "description" => input.description = value,
            "price" => input.price = value,
            "category" => input.category = value,
            "stock_quantity" => input.stock_quantity = value,
            "image_url" => input.image_url = value,
            _ => {}
        }
    }

    Ok((input, image))
}

fn json_input(body: &Value) -> Result<ProductInput> {
    let object = body
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Expected a JSON object".to_string()))?;
    let field = |key: &str| match object.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    Ok(ProductInput {
        name: field("name"),
        description: field("description"),
        price: field("price"),
        category: field("category"),
        stock_quantity: field("stock_quantity"),
        image_url: field("image_url"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_list_query_defaults_to_active_only() {
        let filter = ProductFilter::try_from(ListQuery {
            category: None,
            active_only: None,
        })
        .unwrap();
        assert!(filter.active_only);
        assert_eq!(filter.category, None);
    }

    #[test]
    fn test_list_query_parses_flags() {
        let filter = ProductFilter::try_from(ListQuery {
            category: Some("lighting".to_string()),
            active_only: Some("False".to_string()),
        })
        .unwrap();
        assert!(!filter.active_only);
        assert_eq!(filter.category.as_deref(), Some("lighting"));

        assert!(
            ProductFilter::try_from(ListQuery {
                category: None,
                active_only: Some("maybe".to_string()),
            })
            .is_err()
        );
    }

    #[test]
    fn test_json_input_stringifies_numbers() {
        let input = json_input(&json!({
            "name": "Lamp",
            "price": 10.5,
            "stock_quantity": 3,
            "category": null
        }))
        .unwrap();

        assert_eq!(input.name.as_deref(), Some("Lamp"));
        assert_eq!(input.price.as_deref(), Some("10.5"));
        assert_eq!(input.stock_quantity.as_deref(), Some("3"));
        assert_eq!(input.category, None);
    }

    #[test]
    fn test_json_input_requires_object() {
        assert!(json_input(&json!(["Lamp"])).is_err());
    }
}
