//! Bulk price, stock and visibility changes over a selection of products.
//!
//! Changes are previewed first and only sent on [`commit`]. Commits go out one
//! product at a time; a failed item is recorded and the rest still run. Items
//! already applied are never rolled back.

use crate::api::AdminApi;
use crate::pricing::compute_admin_price_from_base;
use catalog_types::category::find_by_name;
use catalog_types::{Category, ConversionRate, Product, ProductPatch};
use derive_more::Display;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use std::str::FromStr;
use typesafe_repository::IdentityOf;

const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PriceMode {
    #[display("percentage")]
    Percentage,
    #[display("fixed")]
    Fixed,
}

impl FromStr for PriceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percentage" | "percent" | "%" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(anyhow::anyhow!("Unknown price mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StockMode {
    #[display("set")]
    Set,
    #[display("increase")]
    Increase,
    #[display("decrease")]
    Decrease,
}

impl FromStr for StockMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "set" => Ok(Self::Set),
            "increase" => Ok(Self::Increase),
            "decrease" => Ok(Self::Decrease),
            other => Err(anyhow::anyhow!("Unknown stock mode: {other}")),
        }
    }
}

/// Price change applied as: base adjustment, then profit margin, then tax,
/// then shipping. The result never goes below zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceAdjustment {
    pub mode: PriceMode,
    pub value: Decimal,
    pub profit_margin: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
}

impl PriceAdjustment {
    pub fn new(mode: PriceMode, value: Decimal) -> Self {
        Self {
            mode,
            value,
            profit_margin: Decimal::ZERO,
            tax: Decimal::ZERO,
            shipping: Decimal::ZERO,
        }
    }

    /// Out-of-range intermediate values saturate rather than overflow.
    pub fn apply(&self, current: Decimal) -> Decimal {
        let factor = |percent: Decimal| Decimal::ONE.saturating_add(percent / HUNDRED);
        let base = match self.mode {
            PriceMode::Percentage => current.saturating_mul(factor(self.value)),
            PriceMode::Fixed => current.saturating_add(self.value),
        };
        let price = base
            .saturating_mul(factor(self.profit_margin))
            .saturating_add(self.tax)
            .saturating_add(self.shipping);
        price.max(Decimal::ZERO).round_dp(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub mode: StockMode,
    pub amount: i64,
}

impl StockAdjustment {
    pub fn apply(&self, current: i64) -> i64 {
        let stock = match self.mode {
            StockMode::Set => self.amount,
            StockMode::Increase => current.saturating_add(self.amount),
            StockMode::Decrease => current.saturating_sub(self.amount),
        };
        stock.max(0)
    }
}

/// Explicitly chosen products. Independent of what is currently listed.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: BTreeSet<IdentityOf<Product>>,
}

impl Selection {
    pub fn select(&mut self, id: IdentityOf<Product>) {
        self.ids.insert(id);
    }

    /// Returns whether the product is selected afterwards.
    pub fn toggle(&mut self, id: IdentityOf<Product>) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// "Select all" covers only the products on the visible page.
    pub fn select_page<'a>(&mut self, page: impl IntoIterator<Item = &'a Product>) {
        self.ids.extend(page.into_iter().map(|p| p.id.clone()));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected products out of `products`, in catalog order.
    pub fn filter<'a>(&'a self, products: &'a [Product]) -> impl Iterator<Item = &'a Product> {
        products.iter().filter(|p| self.contains(&p.id))
    }

    /// Selected ids that are present in `products`.
    pub fn count_in(&self, products: &[Product]) -> usize {
        self.filter(products).count()
    }
}

/// A value that can be written back with a single-field patch.
pub trait PatchValue: Copy + std::fmt::Display {
    fn patch(self) -> ProductPatch;
}

impl PatchValue for Decimal {
    fn patch(self) -> ProductPatch {
        ProductPatch::admin_price(self)
    }
}

impl PatchValue for i64 {
    fn patch(self) -> ProductPatch {
        ProductPatch::stock(self)
    }
}

/// Visibility change, carrying a recomputed admin price when publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publication {
    pub published: bool,
    pub admin_price: Option<Decimal>,
}

impl std::fmt::Display for Publication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.published { "published" } else { "unpublished" };
        match self.admin_price {
            Some(price) => write!(f, "{state} at {price}"),
            None => write!(f, "{state}"),
        }
    }
}

impl PatchValue for Publication {
    fn patch(self) -> ProductPatch {
        ProductPatch {
            admin_price: self.admin_price,
            ..ProductPatch::published(self.published)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange<T> {
    pub id: IdentityOf<Product>,
    pub name: String,
    pub current: T,
    pub new: T,
}

/// Previewed changes waiting for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkPlan<T> {
    pub changes: Vec<PendingChange<T>>,
}

impl<T> BulkPlan<T> {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn preview<T, F, G>(products: &[Product], selection: &Selection, current: F, new: G) -> BulkPlan<T>
where
    F: Fn(&Product) -> T,
    G: Fn(&Product) -> T,
{
    let changes = selection
        .filter(products)
        .map(|p| PendingChange {
            id: p.id.clone(),
            name: p.name.clone(),
            current: current(p),
            new: new(p),
        })
        .collect();
    BulkPlan { changes }
}

pub fn preview_prices(
    products: &[Product],
    selection: &Selection,
    adjustment: &PriceAdjustment,
) -> BulkPlan<Decimal> {
    preview(products, selection, |p| p.admin_price, |p| {
        adjustment.apply(p.admin_price)
    })
}

pub fn preview_stock(
    products: &[Product],
    selection: &Selection,
    adjustment: &StockAdjustment,
) -> BulkPlan<i64> {
    preview(products, selection, |p| p.stock, |p| adjustment.apply(p.stock))
}

/// Publishing prices each product from its seller base price through its
/// category and the conversion rate. Products without a base price or with an
/// unknown category keep their admin price. Unpublishing never touches prices.
pub fn preview_publish(
    products: &[Product],
    selection: &Selection,
    publish: bool,
    categories: &[Category],
    rate: ConversionRate,
) -> BulkPlan<Publication> {
    let current = |p: &Product| Publication {
        published: p.published,
        admin_price: Some(p.admin_price),
    };
    let new = |p: &Product| Publication {
        published: publish,
        admin_price: publish
            .then(|| p.base_price.zip(find_by_name(categories, &p.category)))
            .flatten()
            .map(|(base, category)| {
                compute_admin_price_from_base(base, category, rate).round_dp(2)
            }),
    };
    preview(products, selection, current, new)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub success_count: usize,
    pub error_count: usize,
    /// Product id and the error it failed with.
    pub failures: Vec<(IdentityOf<Product>, String)>,
}

impl BulkOutcome {
    fn record<E: std::fmt::Display>(&mut self, id: &str, result: Result<(), E>) {
        match result {
            Ok(()) => self.success_count += 1,
            Err(err) => {
                log::warn!("Update of product {id} failed: {err}");
                self.error_count += 1;
                self.failures.push((id.to_string(), err.to_string()));
            }
        }
    }
}

/// Send every change of a confirmed plan, one request at a time.
pub async fn commit<T: PatchValue>(api: &dyn AdminApi, plan: &BulkPlan<T>) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    for change in &plan.changes {
        let result = api.update_product(&change.id, &change.new.patch()).await;
        outcome.record(&change.id, result);
    }
    log::info!(
        "Bulk update finished: {} succeeded, {} failed",
        outcome.success_count,
        outcome.error_count
    );
    outcome
}

pub async fn delete_selected(
    api: &dyn AdminApi,
    products: &[Product],
    selection: &Selection,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    for product in selection.filter(products) {
        let result = api.delete_product(&product.id).await;
        outcome.record(&product.id, result);
    }
    log::info!(
        "Bulk delete finished: {} deleted, {} failed",
        outcome.success_count,
        outcome.error_count
    );
    outcome
}
