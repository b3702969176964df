//! Raw cell -> submission value, per canonical field.
//!
//! Coercion is total: every field gets a string, malformed input degrades to
//! the field's empty value instead of failing the row.

use crate::mapping::HeaderMapping;
use crate::upload::RawRow;
use catalog_types::{FieldKind, ProductField};
use lazy_regex::regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Longest leading decimal literal, the way a lenient float parser reads it.
fn parse_leading_decimal(s: &str) -> Option<Decimal> {
    let m = regex!(r"^[+-]?(\d+\.?\d*|\.\d+)").find(s)?;
    let literal = m.as_str().trim_end_matches('.');
    Decimal::from_str(literal).ok()
}

fn parse_digits(s: &str) -> Option<u64> {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn numeric_chars(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

pub fn coerce_currency(raw: &str) -> String {
    match parse_leading_decimal(&numeric_chars(raw)) {
        Some(v) if v > Decimal::ZERO => v.normalize().to_string(),
        _ => String::new(),
    }
}

pub fn coerce_count(raw: &str) -> String {
    parse_digits(raw).unwrap_or(0).to_string()
}

pub fn coerce_flag(raw: &str) -> String {
    let raw = raw.trim().to_lowercase();
    matches!(raw.as_str(), "true" | "1" | "yes").to_string()
}

pub fn coerce_measurement(raw: &str) -> String {
    match parse_leading_decimal(&numeric_chars(raw)) {
        Some(v) if v >= Decimal::ZERO => v.normalize().to_string(),
        _ => "0".to_string(),
    }
}

/// Coerce a raw cell for `field`. `None` means no source column or no cell.
pub fn coerce(field: ProductField, raw: Option<&str>) -> String {
    let raw = raw.unwrap_or_default();
    match field.kind() {
        FieldKind::Currency => coerce_currency(raw),
        FieldKind::Stock | FieldKind::SmallInteger => coerce_count(raw),
        FieldKind::Flag => coerce_flag(raw),
        FieldKind::Measurement => coerce_measurement(raw),
        FieldKind::Text => raw.trim().to_string(),
    }
}

/// Row keyed by canonical field, always holding every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProcessedRow(BTreeMap<ProductField, String>);

impl ProcessedRow {
    pub fn from_raw(row: &RawRow, mapping: &HeaderMapping) -> Self {
        let values = ProductField::ALL
            .into_iter()
            .map(|field| {
                let cell = mapping.column_of(field).and_then(|idx| row.get(idx));
                (field, coerce(field, cell))
            })
            .collect();
        Self(values)
    }

    pub fn get(&self, field: ProductField) -> &str {
        self.0.get(&field).map(String::as_str).unwrap_or_default()
    }

    pub fn set<S: Into<String>>(&mut self, field: ProductField, value: S) {
        self.0.insert(field, value.into());
    }

    pub fn regular_price(&self) -> Decimal {
        Decimal::from_str(self.get(ProductField::RegularPrice)).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProductField, &String)> {
        self.0.iter()
    }
}
