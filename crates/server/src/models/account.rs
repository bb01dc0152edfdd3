//! Account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{AccountId, Email};

/// A registered shopper.
///
/// The credential hash lives only in the repository layer and is never part
/// of this type, so an `Account` can be serialized into any response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Unique account ID.
    pub id: AccountId,
    /// Normalized email address.
    pub email: Email,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}
