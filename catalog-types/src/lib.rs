#![deny(clippy::unwrap_used)]

use derive_more::Display;
use serde::{Deserialize, Serialize};

pub mod category;
pub mod field;
pub mod product;
pub mod rate;

pub use category::Category;
pub use field::{FieldKind, ProductField};
pub use product::{Product, ProductPatch};
pub use rate::ConversionRate;

/// Role carried by the session token. Only admins may import or mutate prices.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[display("admin")]
    Admin,
    #[display("seller")]
    Seller,
}

impl Role {
    pub fn try_from<S: AsRef<str>>(s: S) -> Option<Self> {
        match s.as_ref().trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "seller" => Some(Self::Seller),
            _ => None,
        }
    }
}

/// Common `{ success, message }` part of every backend response.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProductsBody {
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CategoriesBody {
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Empty {}
