use derive_more::{Deref, Display};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Multiplier from the seller currency into the customer-facing currency.
///
/// Passed explicitly into the pricing functions that need it; the process-wide
/// current value is owned by the rate service.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Deref, Display)]
#[serde(transparent)]
pub struct ConversionRate(pub Decimal);

impl ConversionRate {
    /// Used when neither the backend nor the local cache has a value.
    pub const DEFAULT: ConversionRate = ConversionRate(dec!(400));

    /// Non-positive rates are meaningless and fall back to the default.
    pub fn new(rate: Decimal) -> Self {
        if rate > Decimal::ZERO {
            Self(rate)
        } else {
            log::warn!("Ignoring non-positive conversion rate {rate}");
            Self::DEFAULT
        }
    }

    /// Saturates at `Decimal::MAX`/`Decimal::MIN` instead of overflowing.
    pub fn convert(&self, amount: Decimal) -> Decimal {
        amount.saturating_mul(self.0)
    }
}

impl Default for ConversionRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}
