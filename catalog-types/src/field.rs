use derive_more::Display;
use serde::{Deserialize, Serialize};

/// How a raw cell is normalized before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Currency,
    Stock,
    Flag,
    Measurement,
    SmallInteger,
    Text,
}

/// Product attribute understood by the catalog, independent of uploaded column naming.
///
/// Declaration order is significant: it is the order used for substring matching,
/// suggestion tie-breaking and serialization of processed rows.
#[derive(
    Serialize, Deserialize, Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum ProductField {
    #[serde(rename = "Name")]
    #[display("Name")]
    Name,
    #[serde(rename = "SKU")]
    #[display("SKU")]
    Sku,
    #[serde(rename = "Categories")]
    #[display("Categories")]
    Categories,
    #[serde(rename = "Regular price")]
    #[display("Regular price")]
    RegularPrice,
    #[serde(rename = "Brand")]
    #[display("Brand")]
    Brand,
    #[serde(rename = "Description")]
    #[display("Description")]
    Description,
    #[serde(rename = "Short description")]
    #[display("Short description")]
    ShortDescription,
    #[serde(rename = "Images")]
    #[display("Images")]
    Images,
    #[serde(rename = "All image urls")]
    #[display("All image urls")]
    AllImageUrls,
    #[serde(rename = "Stock")]
    #[display("Stock")]
    Stock,
    #[serde(rename = "Sale price")]
    #[display("Sale price")]
    SalePrice,
    #[serde(rename = "Published")]
    #[display("Published")]
    Published,
    #[serde(rename = "Is featured?")]
    #[display("Is featured?")]
    IsFeatured,
    #[serde(rename = "Visibility in catalog")]
    #[display("Visibility in catalog")]
    CatalogVisibility,
    #[serde(rename = "Date sale price starts")]
    #[display("Date sale price starts")]
    SaleStarts,
    #[serde(rename = "Date sale price ends")]
    #[display("Date sale price ends")]
    SaleEnds,
    #[serde(rename = "Tax status")]
    #[display("Tax status")]
    TaxStatus,
    #[serde(rename = "Tax class")]
    #[display("Tax class")]
    TaxClass,
    #[serde(rename = "In stock?")]
    #[display("In stock?")]
    InStock,
    #[serde(rename = "Backorders allowed?")]
    #[display("Backorders allowed?")]
    BackordersAllowed,
    #[serde(rename = "Low stock amount")]
    #[display("Low stock amount")]
    LowStockAmount,
    #[serde(rename = "Sold individually?")]
    #[display("Sold individually?")]
    SoldIndividually,
    #[serde(rename = "Weight (kg)")]
    #[display("Weight (kg)")]
    Weight,
    #[serde(rename = "Length (cm)")]
    #[display("Length (cm)")]
    Length,
    #[serde(rename = "Width (cm)")]
    #[display("Width (cm)")]
    Width,
    #[serde(rename = "Height (cm)")]
    #[display("Height (cm)")]
    Height,
    #[serde(rename = "Allow customer reviews?")]
    #[display("Allow customer reviews?")]
    AllowReviews,
    #[serde(rename = "Purchase note")]
    #[display("Purchase note")]
    PurchaseNote,
    #[serde(rename = "Tags")]
    #[display("Tags")]
    Tags,
    #[serde(rename = "Shipping class")]
    #[display("Shipping class")]
    ShippingClass,
    #[serde(rename = "Download limit")]
    #[display("Download limit")]
    DownloadLimit,
    #[serde(rename = "Download expiry days")]
    #[display("Download expiry days")]
    DownloadExpiry,
    #[serde(rename = "Parent")]
    #[display("Parent")]
    Parent,
    #[serde(rename = "Grouped products")]
    #[display("Grouped products")]
    GroupedProducts,
    #[serde(rename = "Upsells")]
    #[display("Upsells")]
    Upsells,
    #[serde(rename = "Cross-sells")]
    #[display("Cross-sells")]
    CrossSells,
    #[serde(rename = "External URL")]
    #[display("External URL")]
    ExternalUrl,
    #[serde(rename = "Button text")]
    #[display("Button text")]
    ButtonText,
    #[serde(rename = "Position")]
    #[display("Position")]
    Position,
    #[serde(rename = "GTIN, UPC, EAN, or ISBN")]
    #[display("GTIN, UPC, EAN, or ISBN")]
    Gtin,
    #[serde(rename = "Type")]
    #[display("Type")]
    Type,
    #[serde(rename = "ID")]
    #[display("ID")]
    Id,
}

impl ProductField {
    pub const ALL: [ProductField; 42] = [
        Self::Name,
        Self::Sku,
        Self::Categories,
        Self::RegularPrice,
        Self::Brand,
        Self::Description,
        Self::ShortDescription,
        Self::Images,
        Self::AllImageUrls,
        Self::Stock,
        Self::SalePrice,
        Self::Published,
        Self::IsFeatured,
        Self::CatalogVisibility,
        Self::SaleStarts,
        Self::SaleEnds,
        Self::TaxStatus,
        Self::TaxClass,
        Self::InStock,
        Self::BackordersAllowed,
        Self::LowStockAmount,
        Self::SoldIndividually,
        Self::Weight,
        Self::Length,
        Self::Width,
        Self::Height,
        Self::AllowReviews,
        Self::PurchaseNote,
        Self::Tags,
        Self::ShippingClass,
        Self::DownloadLimit,
        Self::DownloadExpiry,
        Self::Parent,
        Self::GroupedProducts,
        Self::Upsells,
        Self::CrossSells,
        Self::ExternalUrl,
        Self::ButtonText,
        Self::Position,
        Self::Gtin,
        Self::Type,
        Self::Id,
    ];

    /// Fields an import cannot proceed without.
    pub const REQUIRED: [ProductField; 5] = [
        Self::Name,
        Self::Sku,
        Self::Categories,
        Self::RegularPrice,
        Self::Brand,
    ];

    /// Required fields that come from a CSV column. `Categories` is supplied by
    /// the batch category instead.
    pub const REQUIRED_COLUMNS: [ProductField; 4] =
        [Self::Name, Self::Sku, Self::RegularPrice, Self::Brand];

    pub fn kind(&self) -> FieldKind {
        use ProductField::*;
        match self {
            RegularPrice | SalePrice => FieldKind::Currency,
            Stock => FieldKind::Stock,
            Published | InStock | IsFeatured | SoldIndividually | BackordersAllowed
            | AllowReviews => FieldKind::Flag,
            Weight | Length | Width | Height => FieldKind::Measurement,
            LowStockAmount | DownloadLimit | DownloadExpiry | Position => FieldKind::SmallInteger,
            _ => FieldKind::Text,
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }

    pub fn from_name<S: AsRef<str>>(name: S) -> Option<Self> {
        let name = name.as_ref().trim();
        Self::ALL
            .into_iter()
            .find(|f| f.to_string().eq_ignore_ascii_case(name))
    }
}
