//! Derived prices.
//!
//! The final price is a view over the product's *current* category: it is
//! recomputed on every read and never stored. Nothing in here fails; missing
//! data falls back to the fixed markup or the category defaults, and results
//! too large for a `Decimal` saturate.

use catalog_types::category::find_by_name;
use catalog_types::{Category, ConversionRate, Product};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Markup applied when the category cannot be resolved.
pub const FALLBACK_MARKUP: Decimal = dec!(1.5);

const HUNDRED: Decimal = dec!(100);

fn with_margin(price: Decimal, category: &Category) -> Decimal {
    price
        .saturating_mul(Decimal::ONE.saturating_add(category.margin() / HUNDRED))
        .saturating_add(category.shipping_fee())
}

/// Admin price plus category margin and shipping fee, in the seller currency.
pub fn compute_final_price(
    admin_price: Decimal,
    category_name: &str,
    categories: &[Category],
) -> Decimal {
    if admin_price.is_zero() || category_name.is_empty() || categories.is_empty() {
        return admin_price.saturating_mul(FALLBACK_MARKUP);
    }
    match find_by_name(categories, category_name) {
        Some(category) => with_margin(admin_price, category),
        None => admin_price.saturating_mul(FALLBACK_MARKUP),
    }
}

/// Seller base price converted into the customer-facing currency. Used when
/// publishing in bulk; not interchangeable with [`compute_final_price`].
pub fn compute_admin_price_from_base(
    base_price: Decimal,
    category: &Category,
    rate: ConversionRate,
) -> Decimal {
    rate.convert(with_margin(base_price, category))
}

/// Final price shown to customers in the converted currency, rounded to cents.
pub fn display_price(final_price: Decimal, rate: ConversionRate) -> Decimal {
    rate.convert(final_price).round_dp(2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedProduct {
    pub product: Product,
    pub final_price: Decimal,
}

/// One pass over the catalog. Pure: same inputs always give the same output.
pub fn recalculate(products: &[Product], categories: &[Category]) -> Vec<PricedProduct> {
    products
        .iter()
        .map(|p| PricedProduct {
            final_price: compute_final_price(p.admin_price, &p.category, categories),
            product: p.clone(),
        })
        .collect()
}

/// Loaded products together with their derived prices.
///
/// Derived prices are replaced as a whole under `&mut self`, so a reader never
/// sees values from two different category snapshots.
#[derive(Debug, Default)]
pub struct PricedCatalog {
    products: Vec<Product>,
    categories: Vec<Category>,
    priced: Vec<PricedProduct>,
}

impl PricedCatalog {
    pub fn new(products: Vec<Product>, categories: Vec<Category>) -> Self {
        let priced = recalculate(&products, &categories);
        Self {
            products,
            categories,
            priced,
        }
    }

    pub fn set_products(&mut self, products: Vec<Product>) {
        self.priced = recalculate(&products, &self.categories);
        self.products = products;
    }

    /// Install a new category snapshot. Prices are recomputed only when the
    /// category count changed and products are loaded; returns whether they were.
    pub fn set_categories(&mut self, categories: Vec<Category>) -> bool {
        let changed = categories.len() != self.categories.len();
        self.categories = categories;
        if !changed || self.products.is_empty() {
            return false;
        }
        self.priced = recalculate(&self.products, &self.categories);
        log::debug!("Recalculated {} prices", self.priced.len());
        true
    }

    /// Unconditional recomputation, e.g. after a manual refresh.
    pub fn refresh(&mut self) {
        self.priced = recalculate(&self.products, &self.categories);
    }

    pub fn priced(&self) -> &[PricedProduct] {
        &self.priced
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn final_price_of(&self, id: &str) -> Option<Decimal> {
        self.priced
            .iter()
            .find(|p| p.product.id == id)
            .map(|p| p.final_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, category: &str, price: Decimal) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            sku: id.to_uppercase(),
            category: category.to_string(),
            brand: "Acme".to_string(),
            admin_price: price,
            base_price: None,
            stock: 1,
            published: false,
        }
    }

    #[test]
    fn applies_margin_and_shipping() {
        let categories = vec![Category::new("Toys", dec!(20), dec!(5))];
        let price = compute_final_price(dec!(100), "Toys", &categories);
        assert_eq!(dec!(125.00), price.round_dp(2));
    }

    #[test]
    fn formula_holds_for_fractional_inputs() {
        let categories = vec![Category::new("Garden", dec!(12.5), dec!(3.99))];
        for admin in [dec!(0.01), dec!(19.99), dec!(250), dec!(1234.56)] {
            let expected = admin * (Decimal::ONE + dec!(12.5) / dec!(100)) + dec!(3.99);
            assert_eq!(
                expected.round_dp(2),
                compute_final_price(admin, "Garden", &categories).round_dp(2)
            );
        }
    }

    #[test]
    fn unresolved_category_uses_fallback_markup() {
        assert_eq!(dec!(150), compute_final_price(dec!(100), "Unknown", &[]));
        let categories = vec![Category::new("Toys", dec!(20), dec!(5))];
        assert_eq!(dec!(150), compute_final_price(dec!(100), "", &categories));
        assert_eq!(dec!(150), compute_final_price(dec!(100), "Books", &categories));
        assert_eq!(Decimal::ZERO, compute_final_price(Decimal::ZERO, "Toys", &categories));
    }

    #[test]
    fn unset_margin_and_fee_use_defaults() {
        let mut category = Category::new("Toys", dec!(0), dec!(0));
        category.default_margin = None;
        category.shipping_fee = None;
        assert_eq!(dec!(120), compute_final_price(dec!(100), "Toys", &[category]));
    }

    #[test]
    fn converts_base_price() {
        let category = Category::new("Toys", dec!(20), dec!(5));
        assert_eq!(
            dec!(50000),
            compute_admin_price_from_base(dec!(100), &category, ConversionRate::DEFAULT)
        );
        assert_eq!(
            dec!(1250),
            compute_admin_price_from_base(dec!(100), &category, ConversionRate(dec!(10)))
        );
    }

    #[test]
    fn recalculation_is_idempotent() {
        let categories = vec![
            Category::new("Toys", dec!(20), dec!(5)),
            Category::new("Books", dec!(7.5), dec!(2)),
        ];
        let products = vec![
            product("a", "Toys", dec!(10)),
            product("b", "Books", dec!(33.33)),
            product("c", "Gone", dec!(4)),
        ];
        let first = recalculate(&products, &categories);
        let second = recalculate(&products, &categories);
        assert_eq!(first, second);
        assert_eq!(dec!(6), first[2].final_price);
    }

    #[test]
    fn category_change_reprices_loaded_products() {
        let products = vec![product("a", "Toys", dec!(100))];
        let mut catalog = PricedCatalog::new(products, vec![]);
        assert_eq!(Some(dec!(150)), catalog.final_price_of("a"));

        assert!(catalog.set_categories(vec![Category::new("Toys", dec!(20), dec!(5))]));
        assert_eq!(Some(dec!(125)), catalog.final_price_of("a"));
    }

    #[test]
    fn same_category_count_does_not_reprice() {
        let products = vec![product("a", "Toys", dec!(100))];
        let mut catalog =
            PricedCatalog::new(products, vec![Category::new("Toys", dec!(20), dec!(5))]);
        assert!(!catalog.set_categories(vec![Category::new("Toys", dec!(50), dec!(0))]));
        assert_eq!(Some(dec!(125)), catalog.final_price_of("a"));
        catalog.refresh();
        assert_eq!(Some(dec!(150)), catalog.final_price_of("a"));
    }

    #[test]
    fn empty_catalog_is_not_repriced() {
        let mut catalog = PricedCatalog::default();
        assert!(!catalog.set_categories(vec![Category::new("Toys", dec!(20), dec!(5))]));
        assert!(catalog.priced().is_empty());
    }

    #[test]
    fn huge_prices_saturate_instead_of_panicking() {
        let huge = Decimal::MAX / dec!(1.2);
        assert_eq!(Decimal::MAX, compute_final_price(huge, "Unknown", &[]));
        let categories = vec![Category::new("Toys", dec!(50), dec!(5))];
        assert_eq!(Decimal::MAX, compute_final_price(huge, "Toys", &categories));
        assert_eq!(
            Decimal::MAX,
            compute_admin_price_from_base(huge, &categories[0], ConversionRate::DEFAULT)
        );
        assert_eq!(Decimal::MAX, display_price(huge, ConversionRate::DEFAULT));
    }

    #[test]
    fn display_price_rounds_to_cents() {
        assert_eq!(dec!(41.13), display_price(dec!(0.102825), ConversionRate::DEFAULT));
    }
}
