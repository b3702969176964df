use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_number_from_string;
use typesafe_repository::macros::Id;
use typesafe_repository::{GetIdentity, Identity, RefIdentity};

/// Product as returned by `GET /products`. The final price is never part of it:
/// it is derived from the current category on every read.
#[derive(Id, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[Id(ref_id, get_id)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub admin_price: Decimal,
    /// Seller price before category margin, shipping and conversion.
    #[serde(default)]
    pub base_price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_number_from_string")]
    pub stock: i64,
    #[serde(default)]
    pub published: bool,
}

/// Partial update body for `PATCH /products/:id`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl ProductPatch {
    pub fn admin_price(price: Decimal) -> Self {
        Self {
            admin_price: Some(price),
            ..Default::default()
        }
    }

    pub fn stock(stock: i64) -> Self {
        Self {
            stock: Some(stock),
            ..Default::default()
        }
    }

    pub fn published(published: bool) -> Self {
        Self {
            published: Some(published),
            ..Default::default()
        }
    }
}
