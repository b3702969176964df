//! Uploaded column name -> canonical product field.
//!
//! Matching runs per header, first match wins: exact name, substring either way
//! (in `ProductField::ALL` order), then the synonym table. Anything else stays
//! unmapped but is kept so the preview can still show the column.

use catalog_types::ProductField;
use itertools::Itertools;
use lazy_regex::regex;
use std::collections::HashMap;

/// Hand-maintained aliases for headers that share no text with a canonical name.
/// Keys are lowercase and trimmed. Synonyms are consulted after the substring
/// stage, so an alias containing a canonical name never reaches this table.
pub static SYNONYMS: &[(&str, ProductField)] = &[
    ("title", ProductField::Name),
    ("product title", ProductField::Name),
    ("product_name", ProductField::Name),
    ("item", ProductField::Name),
    ("item title", ProductField::Name),
    ("code", ProductField::Sku),
    ("product code", ProductField::Sku),
    ("item code", ProductField::Sku),
    ("article", ProductField::Sku),
    ("part number", ProductField::Sku),
    ("part_no", ProductField::Sku),
    ("model number", ProductField::Sku),
    ("mpn", ProductField::Sku),
    ("category", ProductField::Categories),
    ("product category", ProductField::Categories),
    ("department", ProductField::Categories),
    ("collection", ProductField::Categories),
    ("section", ProductField::Categories),
    ("cost", ProductField::RegularPrice),
    ("mrp", ProductField::RegularPrice),
    ("rrp", ProductField::RegularPrice),
    ("unit cost", ProductField::RegularPrice),
    ("msrp", ProductField::RegularPrice),
    ("srp", ProductField::RegularPrice),
    ("retail", ProductField::RegularPrice),
    ("manufacturer", ProductField::Brand),
    ("make", ProductField::Brand),
    ("vendor", ProductField::Brand),
    ("maker", ProductField::Brand),
    ("label", ProductField::Brand),
    ("producer", ProductField::Brand),
    ("supplier", ProductField::Brand),
    ("details", ProductField::Description),
    ("body", ProductField::Description),
    ("body html", ProductField::Description),
    ("summary", ProductField::ShortDescription),
    ("excerpt", ProductField::ShortDescription),
    ("blurb", ProductField::ShortDescription),
    ("overview", ProductField::ShortDescription),
    ("picture", ProductField::Images),
    ("photo", ProductField::Images),
    ("thumbnail", ProductField::Images),
    ("main image", ProductField::Images),
    ("img", ProductField::Images),
    ("image link", ProductField::Images),
    ("gallery", ProductField::AllImageUrls),
    ("pictures", ProductField::AllImageUrls),
    ("photos", ProductField::AllImageUrls),
    ("qty", ProductField::Stock),
    ("quantity", ProductField::Stock),
    ("inventory", ProductField::Stock),
    ("on hand", ProductField::Stock),
    ("available", ProductField::Stock),
    ("units", ProductField::Stock),
    ("discount price", ProductField::SalePrice),
    ("special price", ProductField::SalePrice),
    ("offer price", ProductField::SalePrice),
    ("promo", ProductField::SalePrice),
    ("active", ProductField::Published),
    ("enabled", ProductField::Published),
    ("visible", ProductField::Published),
    ("live", ProductField::Published),
    ("keywords", ProductField::Tags),
    ("barcode", ProductField::Gtin),
    ("mass", ProductField::Weight),
    ("link", ProductField::ExternalUrl),
    ("product url", ProductField::ExternalUrl),
    ("sort order", ProductField::Position),
    ("menu order", ProductField::Position),
    ("variant of", ProductField::Parent),
];

pub const EXACT_SCORE: u8 = 100;
pub const SUBSTRING_SCORE: u8 = 80;
pub const MAX_OVERLAP_SCORE: u8 = 60;
const SUGGESTION_THRESHOLD: u8 = 10;
const SUGGESTION_COUNT: usize = 3;

/// Strength of an automatic match, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Exact,
    Substring,
    Synonym,
}

fn normalize(header: &str) -> String {
    header.trim().to_lowercase()
}

fn canonical(field: ProductField) -> String {
    field.to_string().to_lowercase()
}

/// Match a single header. Empty headers never match.
pub fn match_header(header: &str) -> Option<(ProductField, MatchKind)> {
    let header = normalize(header);
    if header.is_empty() {
        return None;
    }
    if let Some(f) = ProductField::ALL
        .into_iter()
        .find(|f| canonical(*f) == header)
    {
        return Some((f, MatchKind::Exact));
    }
    if let Some(f) = ProductField::ALL.into_iter().find(|f| {
        let name = canonical(*f);
        name.contains(&header) || header.contains(&name)
    }) {
        return Some((f, MatchKind::Substring));
    }
    SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == header)
        .map(|(_, f)| (*f, MatchKind::Synonym))
}

/// Column-ordered association of uploaded headers to canonical fields.
///
/// A field is held by at most one column; assigning it to a column releases it
/// from whichever column held it before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMapping {
    columns: Vec<(String, Option<ProductField>)>,
}

impl HeaderMapping {
    /// Automatic best-effort mapping. When several headers land on the same field
    /// the strongest match keeps it (earliest column on ties) and the rest stay unmapped.
    pub fn detect<S: AsRef<str>>(headers: &[S]) -> Self {
        let matches: Vec<_> = headers
            .iter()
            .map(|h| match_header(h.as_ref()))
            .collect();
        let mut winners: HashMap<ProductField, (MatchKind, usize)> = HashMap::new();
        for (idx, (field, kind)) in matches
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.map(|m| (i, m)))
        {
            winners
                .entry(field)
                .and_modify(|best| {
                    if kind < best.0 {
                        *best = (kind, idx);
                    }
                })
                .or_insert((kind, idx));
        }
        let columns = headers
            .iter()
            .zip(matches)
            .enumerate()
            .map(|(idx, (h, m))| {
                let field = m
                    .map(|(f, _)| f)
                    .filter(|f| winners.get(f).is_some_and(|(_, i)| *i == idx));
                (h.as_ref().to_string(), field)
            })
            .collect();
        Self { columns }
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(h, _)| h.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Field assigned to the column at `idx`.
    pub fn field_at(&self, idx: usize) -> Option<ProductField> {
        self.columns.get(idx).and_then(|(_, f)| *f)
    }

    /// Field assigned to the first column named `header`.
    pub fn field_of(&self, header: &str) -> Option<ProductField> {
        self.columns
            .iter()
            .find(|(h, _)| h == header)
            .and_then(|(_, f)| *f)
    }

    /// Column index holding `field`.
    pub fn column_of(&self, field: ProductField) -> Option<usize> {
        self.columns.iter().position(|(_, f)| *f == Some(field))
    }

    pub fn contains(&self, field: ProductField) -> bool {
        self.column_of(field).is_some()
    }

    /// Manual adjustment. `None` unmaps the column. Returns `false` if no column
    /// has that header.
    pub fn assign(&mut self, header: &str, field: Option<ProductField>) -> bool {
        let Some(idx) = self.columns.iter().position(|(h, _)| h == header) else {
            return false;
        };
        if let Some(field) = field {
            for (_, f) in self.columns.iter_mut() {
                if *f == Some(field) {
                    *f = None;
                }
            }
        }
        self.columns[idx].1 = field;
        true
    }

    pub fn mapped(&self) -> impl Iterator<Item = (usize, ProductField)> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, (_, f))| f.map(|f| (i, f)))
    }

    pub fn unmapped(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, f)| f.is_none())
            .map(|(h, _)| h.as_str())
    }

    /// Column-mappable required fields missing from this mapping.
    pub fn missing_required(&self) -> Vec<ProductField> {
        ProductField::REQUIRED_COLUMNS
            .into_iter()
            .filter(|f| !self.contains(*f))
            .collect()
    }
}

fn tokens(s: &str) -> Vec<String> {
    regex!(r"[\s_-]+")
        .split(&s.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Similarity of an uploaded header to a canonical field on a 0..=100 scale.
pub fn score(header: &str, field: ProductField) -> u8 {
    let header = normalize(header);
    if header.is_empty() {
        return 0;
    }
    let name = canonical(field);
    if header == name {
        return EXACT_SCORE;
    }
    if name.contains(&header) || header.contains(&name) {
        return SUBSTRING_SCORE;
    }
    let header_tokens = tokens(&header);
    let field_tokens = tokens(&name);
    let total = header_tokens.len().max(field_tokens.len());
    if total == 0 {
        return 0;
    }
    let common = header_tokens
        .iter()
        .filter(|t| field_tokens.contains(t))
        .count();
    (common * MAX_OVERLAP_SCORE as usize / total) as u8
}

/// Up to three best candidate fields for a header, best first.
pub fn suggest(header: &str) -> Vec<(ProductField, u8)> {
    ProductField::ALL
        .into_iter()
        .map(|f| (f, score(header, f)))
        .filter(|(_, s)| *s > SUGGESTION_THRESHOLD)
        .sorted_by(|(_, a), (_, b)| b.cmp(a))
        .take(SUGGESTION_COUNT)
        .collect()
}
