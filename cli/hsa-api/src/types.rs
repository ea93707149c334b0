//! Wire types of the upstream API.
//!
//! Records are defined by the upstream service. Only the fields we display
//! are typed (and all of them are optional), everything else is kept as is
//! in `extra` so that detail views can show it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type RecordId = u64;

/// A record identified by an integer id, unique within a result set.
pub trait Record {
    fn id(&self) -> RecordId;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: RecordId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub image: Option<String>,
    pub company: Option<Company>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Up to two uppercase initials, "U" if the user has no name.
    pub fn initials(&self) -> String {
        let initials = self
            .full_name()
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase();
        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }
}

impl Record for User {
    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: RecordId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    pub stock: Option<i64>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Product {
    fn id(&self) -> RecordId {
        self.id
    }
}

/// Paginated list payload: `{ users: [...], total, skip, limit }`.
///
/// A missing or `null` list counts as empty,
/// a missing total falls back to the number of records received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsersPayload {
    pub users: Option<Vec<User>>,
    pub total: Option<u64>,
}

/// Paginated list payload: `{ products: [...], total, skip, limit }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductsPayload {
    pub products: Option<Vec<Product>>,
    pub total: Option<u64>,
}

impl UsersPayload {
    pub fn into_parts(self) -> (Vec<User>, u64) {
        coalesce(self.users, self.total)
    }
}

impl ProductsPayload {
    pub fn into_parts(self) -> (Vec<Product>, u64) {
        coalesce(self.products, self.total)
    }
}

fn coalesce<T>(records: Option<Vec<T>>, total: Option<u64>) -> (Vec<T>, u64) {
    let records = records.unwrap_or_default();
    let total = total.unwrap_or(records.len() as u64);
    (records, total)
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response of `POST /auth/login`.
///
/// Older deployments return the bearer token as `token`,
/// current ones as `accessToken`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub id: Option<RecordId>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub token: Option<String>,
    pub access_token: Option<String>,
}

impl LoginResponse {
    /// The issued bearer token, `token` winning over `accessToken`.
    pub fn bearer_token(&self) -> Option<&str> {
        [self.token.as_deref(), self.access_token.as_deref()]
            .into_iter()
            .flatten()
            .find(|token| !token.is_empty())
    }
}
