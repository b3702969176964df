use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use typesafe_repository::macros::Id;
use typesafe_repository::{GetIdentity, Identity, RefIdentity};

pub const DEFAULT_MARGIN: Decimal = dec!(20);
pub const DEFAULT_SHIPPING_FEE: Decimal = Decimal::ZERO;

/// Server-owned category. Read-only here: margin and shipping fee drive every
/// derived price of the products assigned to it.
#[derive(Id, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[Id(ref_id, get_id)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_margin: Option<Decimal>,
    #[serde(default)]
    pub shipping_fee: Option<Decimal>,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl Category {
    pub fn new<S: Into<String>>(name: S, margin: Decimal, shipping_fee: Decimal) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase(),
            name,
            default_margin: Some(margin),
            shipping_fee: Some(shipping_fee),
            is_active: true,
        }
    }

    pub fn margin(&self) -> Decimal {
        self.default_margin.unwrap_or(DEFAULT_MARGIN)
    }

    pub fn shipping_fee(&self) -> Decimal {
        self.shipping_fee.unwrap_or(DEFAULT_SHIPPING_FEE)
    }
}

pub fn find_by_name<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    categories.iter().find(|c| c.name == name)
}
