use crate::pricing::{compute_final_price, display_price};
use catalog_types::{Category, ConversionRate, Product, ProductField};

const BOM: &str = "\u{feff}";
pub const FINAL_PRICE_HEADER: &str = "Final price";

/// Columns written by [`write_catalog_csv`]. All but the last are canonical
/// names, so an exported file maps back exactly on import.
pub const EXPORT_FIELDS: [ProductField; 7] = [
    ProductField::Name,
    ProductField::Sku,
    ProductField::Categories,
    ProductField::RegularPrice,
    ProductField::Brand,
    ProductField::Stock,
    ProductField::Published,
];

/// Catalog as a BOM-prefixed UTF-8 CSV with CRLF line endings. Final prices
/// are derived at write time and shown in the converted currency.
pub fn write_catalog_csv(
    products: &[Product],
    categories: &[Category],
    rate: ConversionRate,
) -> Result<Vec<u8>, anyhow::Error> {
    let mut buf = BOM.as_bytes().to_vec();
    {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(&mut buf);
        let header = EXPORT_FIELDS
            .iter()
            .map(ToString::to_string)
            .chain(std::iter::once(FINAL_PRICE_HEADER.to_string()));
        writer.write_record(header)?;
        for p in products {
            let final_price = compute_final_price(p.admin_price, &p.category, categories);
            writer.write_record([
                p.name.clone(),
                p.sku.clone(),
                p.category.clone(),
                p.admin_price.normalize().to_string(),
                p.brand.clone(),
                p.stock.to_string(),
                p.published.to_string(),
                display_price(final_price, rate).to_string(),
            ])?;
        }
        writer.flush()?;
    }
    Ok(buf)
}
