//! CSV import: parse -> map -> coerce -> validate -> submit.

use crate::api::{AdminApi, ApiError};
use crate::coerce::ProcessedRow;
use crate::mapping::{suggest, HeaderMapping};
use crate::upload::{parse_csv, ParsedFile, RawRow};
use catalog_types::{Category, ProductField, Role};
use derive_more::{Display, Error};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ImportState {
    #[display("idle")]
    Idle,
    #[display("file loaded")]
    FileLoaded,
    #[display("mapped")]
    Mapped,
    #[display("validating")]
    Validating,
    #[display("submitting")]
    Submitting,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_rows: usize,
    pub success_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
}

/// Why a batch could not be submitted or was refused, as the user should read it.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SubmitFailure {
    #[display("You are not logged in or your session has expired. Please log in again.")]
    NotLoggedIn,
    #[display("Your account is not allowed to import products. An admin account is required.")]
    WrongRole,
    #[error(ignore)]
    #[display("The server rejected the products: {_0}")]
    Validation(String),
    #[error(ignore)]
    #[display("Import failed: {_0}")]
    Other(String),
}

impl SubmitFailure {
    /// The backend only reports causes as text, so they are told apart by wording.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        if has(&["not authorized as", "role", "forbidden", "403", "admin access"]) {
            Self::WrongRole
        } else if has(&[
            "token",
            "not authorized",
            "unauthorized",
            "401",
            "log in",
            "login",
            "session",
        ]) {
            Self::NotLoggedIn
        } else if has(&["validation", "required", "invalid", "duplicate"]) {
            Self::Validation(message.to_string())
        } else {
            Self::Other(message.to_string())
        }
    }
}

impl From<&ApiError> for SubmitFailure {
    fn from(err: &ApiError) -> Self {
        Self::classify(&err.message())
    }
}

/// Client-side view of the signed-in user, checked before any batch call.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub token: Option<String>,
    pub role: Option<Role>,
}

impl Credentials {
    pub fn preflight(&self) -> Result<(), SubmitFailure> {
        if self.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(SubmitFailure::NotLoggedIn);
        }
        match self.role {
            Some(Role::Admin) | None => Ok(()),
            Some(_) => Err(SubmitFailure::WrongRole),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList(pub Vec<ProductField>);

impl std::fmt::Display for FieldList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join(", "))
    }
}

#[derive(Debug, Display, Error)]
pub enum ImportError {
    #[display("The file has no header row or no data rows")]
    EmptyFile,
    #[error(ignore)]
    #[display("Unable to read the file: {_0}")]
    Unparsable(String),
    #[display("No row has a name, SKU, brand and a positive price")]
    NoValidRows,
    #[error(ignore)]
    #[display("Required fields are not mapped: {_0}")]
    MissingMapping(FieldList),
    #[display("Select a category for this import")]
    MissingCategory,
    #[error(ignore)]
    #[display("Category {_0} does not exist or is not active")]
    UnknownCategory(String),
    #[error(ignore)]
    #[display("Cannot {action} while the import is {state}")]
    InvalidState {
        action: &'static str,
        state: ImportState,
    },
    #[error(ignore)]
    #[display("{_0}")]
    Unauthorized(SubmitFailure),
    #[error(ignore)]
    #[display("{reason}")]
    Rejected {
        reason: SubmitFailure,
        summary: ImportSummary,
    },
}

/// Binds a batch to one active category chosen by name.
#[derive(Debug, Clone, Default)]
pub struct CategoryResolver {
    categories: Vec<Category>,
}

impl CategoryResolver {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub async fn load(api: &dyn AdminApi) -> Result<Self, ApiError> {
        Ok(Self::new(api.active_categories().await?))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .filter(|c| c.is_active)
            .map(|c| c.name.as_str())
    }

    pub fn resolve(&self, name: &str) -> Result<Category, ImportError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ImportError::MissingCategory);
        }
        self.categories
            .iter()
            .find(|c| c.is_active && c.name == name)
            .cloned()
            .ok_or_else(|| ImportError::UnknownCategory(name.to_string()))
    }
}

/// Row survives the pre-submit filter.
pub fn is_submittable(row: &ProcessedRow) -> bool {
    let required_text = [
        ProductField::Sku,
        ProductField::Name,
        ProductField::Categories,
        ProductField::Brand,
    ];
    required_text.iter().all(|f| !row.get(*f).is_empty()) && row.regular_price() > Decimal::ZERO
}

/// One import from upload to result. Owns the uploaded rows and the user's
/// mapping and category choice.
#[derive(Debug)]
pub struct ImportSession {
    state: ImportState,
    file: ParsedFile,
    mapping: HeaderMapping,
    category: Option<Category>,
    summary: Option<ImportSummary>,
}

impl Default for ImportSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportSession {
    pub fn new() -> Self {
        Self {
            state: ImportState::Idle,
            file: ParsedFile::default(),
            mapping: HeaderMapping::default(),
            category: None,
            summary: None,
        }
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn mapping(&self) -> &HeaderMapping {
        &self.mapping
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.file.rows
    }

    pub fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    pub fn summary(&self) -> Option<ImportSummary> {
        self.summary
    }

    /// Back to idle, dropping the file, mapping, category and last result.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Load a new file. The mapping is recomputed from scratch, so manual
    /// adjustments made for a previous file are discarded.
    pub fn load(&mut self, data: &[u8]) -> Result<&HeaderMapping, ImportError> {
        self.reset();
        let file = match parse_csv(data) {
            Ok(file) => file,
            Err(err) => {
                log::warn!("Rejected upload: {err:#}");
                return Err(ImportError::Unparsable(format!("{err:#}")));
            }
        };
        if !file.is_loadable() {
            return Err(ImportError::EmptyFile);
        }
        self.file = file;
        self.state = ImportState::FileLoaded;
        self.mapping = HeaderMapping::detect(&self.file.headers);
        self.state = ImportState::Mapped;
        log::info!(
            "Loaded {} rows, {} of {} columns mapped",
            self.file.rows.len(),
            self.mapping.mapped().count(),
            self.mapping.len()
        );
        Ok(&self.mapping)
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), ImportError> {
        match self.state {
            ImportState::FileLoaded | ImportState::Mapped | ImportState::Failed => Ok(()),
            state => Err(ImportError::InvalidState { action, state }),
        }
    }

    pub fn assign(&mut self, header: &str, field: Option<ProductField>) -> Result<bool, ImportError> {
        self.ensure_editable("change the mapping")?;
        Ok(self.mapping.assign(header, field))
    }

    /// Ranked alternatives for a header, for the mapping editor.
    pub fn suggestions(&self, header: &str) -> Vec<(ProductField, u8)> {
        suggest(header)
    }

    pub fn edit_cell(&mut self, row: usize, column: usize, value: &str) -> Result<bool, ImportError> {
        self.ensure_editable("edit cells")?;
        Ok(match self.file.rows.get_mut(row) {
            Some(r) => {
                r.set(column, value);
                true
            }
            None => false,
        })
    }

    pub fn select_category(&mut self, category: Category) -> Result<(), ImportError> {
        self.ensure_editable("select a category")?;
        self.category = Some(category);
        Ok(())
    }

    /// Coerced rows as they would be submitted, before filtering.
    pub fn processed_rows(&self) -> Vec<ProcessedRow> {
        let category = self.category.as_ref().map(|c| c.name.as_str());
        self.file
            .rows
            .iter()
            .map(|raw| {
                let mut row = ProcessedRow::from_raw(raw, &self.mapping);
                row.set(ProductField::Categories, category.unwrap_or_default());
                row.set(ProductField::Published, "false");
                row
            })
            .collect()
    }

    /// Everything that must hold before a network call is made.
    pub fn validate(&self) -> Result<(), ImportError> {
        let missing = self.mapping.missing_required();
        if !missing.is_empty() {
            return Err(ImportError::MissingMapping(FieldList(missing)));
        }
        if self.category.is_none() {
            return Err(ImportError::MissingCategory);
        }
        Ok(())
    }

    /// Validate, filter and submit the batch in one call.
    ///
    /// Imported products are always created unpublished. The batch is
    /// all-or-nothing from here: either every surviving row is accepted or
    /// every row counts as an error.
    pub async fn submit(
        &mut self,
        api: &dyn AdminApi,
        credentials: &Credentials,
    ) -> Result<ImportSummary, ImportError> {
        match self.state {
            ImportState::Mapped | ImportState::Failed => (),
            state => {
                return Err(ImportError::InvalidState {
                    action: "submit",
                    state,
                })
            }
        }
        self.state = ImportState::Validating;
        if let Err(err) = self.validate() {
            self.state = ImportState::Mapped;
            return Err(err);
        }
        if let Err(reason) = credentials.preflight() {
            self.state = ImportState::Mapped;
            return Err(ImportError::Unauthorized(reason));
        }

        let total_rows = self.file.rows.len();
        let rows: Vec<_> = self
            .processed_rows()
            .into_iter()
            .filter(is_submittable)
            .collect();
        if rows.is_empty() {
            log::warn!("None of {total_rows} rows can be imported");
            self.reset();
            return Err(ImportError::NoValidRows);
        }

        self.state = ImportState::Submitting;
        match api.bulk_create_products(&rows).await {
            Ok(message) => {
                let summary = ImportSummary {
                    total_rows,
                    success_count: rows.len(),
                    skipped_count: total_rows - rows.len(),
                    error_count: 0,
                };
                log::info!("Import completed: {message} ({summary:?})");
                self.state = ImportState::Completed;
                self.summary = Some(summary);
                Ok(summary)
            }
            Err(err) => {
                let summary = ImportSummary {
                    total_rows,
                    success_count: 0,
                    skipped_count: 0,
                    error_count: total_rows,
                };
                log::error!("Import of {total_rows} rows failed: {err}");
                self.state = ImportState::Failed;
                self.summary = Some(summary);
                Err(ImportError::Rejected {
                    reason: SubmitFailure::from(&err),
                    summary,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_types::{Product, ProductPatch};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Records every batch; optionally fails them with the given message.
    #[derive(Default)]
    struct FakeApi {
        batches: Mutex<Vec<Vec<ProcessedRow>>>,
        fail_with: Option<String>,
        categories: Vec<Category>,
    }

    #[async_trait::async_trait]
    impl AdminApi for FakeApi {
        async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
            Ok(vec![])
        }
        async fn active_categories(&self) -> Result<Vec<Category>, ApiError> {
            Ok(self.categories.clone())
        }
        async fn bulk_create_products(&self, products: &[ProcessedRow]) -> Result<String, ApiError> {
            self.batches.lock().unwrap().push(products.to_vec());
            match &self.fail_with {
                Some(message) => Err(ApiError::Status {
                    status: 401,
                    message: message.clone(),
                }),
                None => Ok("ok".to_string()),
            }
        }
        async fn update_product(&self, _: &str, _: &ProductPatch) -> Result<(), ApiError> {
            Ok(())
        }
        async fn delete_product(&self, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
        async fn export_products_csv(&self) -> Result<Vec<u8>, ApiError> {
            Ok(vec![])
        }
    }

    fn admin() -> Credentials {
        Credentials {
            token: Some("token".to_string()),
            role: Some(Role::Admin),
        }
    }

    fn toys() -> Category {
        Category::new("Toys", dec!(20), dec!(5))
    }

    fn ten_rows_three_unpriced() -> String {
        let mut csv = String::from("Name,SKU,Regular price,Brand,Published\n");
        for i in 0..10 {
            let price = if i % 3 == 0 && i < 9 { "0" } else { "12.50" };
            csv.push_str(&format!("Item {i},SKU-{i},{price},Acme,yes\n"));
        }
        csv
    }

    #[actix_rt::test]
    async fn missing_mapping_blocks_submission() {
        let api = FakeApi::default();
        let mut session = ImportSession::new();
        session.load(b"Title,Code\nMug,M-1\n").unwrap();
        let err = session.submit(&api, &admin()).await.unwrap_err();
        assert!(matches!(err, ImportError::MissingMapping(_)));
        assert!(api.batches.lock().unwrap().is_empty());
        assert_eq!(ImportState::Mapped, session.state());
    }

    #[actix_rt::test]
    async fn missing_category_blocks_submission() {
        let api = FakeApi::default();
        let mut session = ImportSession::new();
        session.load(ten_rows_three_unpriced().as_bytes()).unwrap();
        let err = session.submit(&api, &admin()).await.unwrap_err();
        assert!(matches!(err, ImportError::MissingCategory));
        assert!(api.batches.lock().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn filters_unpriced_rows_and_reports_skipped() {
        let api = FakeApi::default();
        let mut session = ImportSession::new();
        session.load(ten_rows_three_unpriced().as_bytes()).unwrap();
        session.select_category(toys()).unwrap();
        let summary = session.submit(&api, &admin()).await.unwrap();
        assert_eq!(
            ImportSummary {
                total_rows: 10,
                success_count: 7,
                skipped_count: 3,
                error_count: 0,
            },
            summary
        );
        let batches = api.batches.lock().unwrap();
        assert_eq!(1, batches.len());
        assert_eq!(7, batches[0].len());
        assert!(batches[0]
            .iter()
            .all(|r| r.get(ProductField::Published) == "false"
                && r.get(ProductField::Categories) == "Toys"));
        assert_eq!(ImportState::Completed, session.state());
    }

    #[actix_rt::test]
    async fn priced_rows_missing_identity_fields_are_skipped() {
        let api = FakeApi::default();
        let mut session = ImportSession::new();
        let csv = "Name,SKU,Regular price,Brand\n\
                   Mug,M-1,10,Acme\n\
                   Cup,,10,Acme\n\
                   ,M-3,10,Acme\n\
                   Bowl,M-4,10,\n\
                   Plate,M-5,10,Acme\n";
        session.load(csv.as_bytes()).unwrap();
        session.select_category(toys()).unwrap();
        let summary = session.submit(&api, &admin()).await.unwrap();
        assert_eq!(5, summary.total_rows);
        assert_eq!(2, summary.success_count);
        assert_eq!(3, summary.skipped_count);
        let batches = api.batches.lock().unwrap();
        let skus: Vec<_> = batches[0].iter().map(|r| r.get(ProductField::Sku)).collect();
        assert_eq!(vec!["M-1", "M-5"], skus);
    }

    #[actix_rt::test]
    async fn failed_batch_counts_every_row_as_error() {
        let api = FakeApi {
            fail_with: Some("Not authorized as an admin".to_string()),
            ..Default::default()
        };
        let mut session = ImportSession::new();
        session.load(ten_rows_three_unpriced().as_bytes()).unwrap();
        session.select_category(toys()).unwrap();
        match session.submit(&api, &admin()).await.unwrap_err() {
            ImportError::Rejected { reason, summary } => {
                assert_eq!(SubmitFailure::WrongRole, reason);
                assert_eq!(10, summary.error_count);
                assert_eq!(0, summary.success_count);
            }
            err => panic!("unexpected error {err}"),
        }
        assert_eq!(ImportState::Failed, session.state());
    }

    #[actix_rt::test]
    async fn preflight_blocks_missing_token_and_wrong_role() {
        let api = FakeApi::default();
        let mut session = ImportSession::new();
        session.load(ten_rows_three_unpriced().as_bytes()).unwrap();
        session.select_category(toys()).unwrap();

        let err = session.submit(&api, &Credentials::default()).await.unwrap_err();
        assert!(matches!(err, ImportError::Unauthorized(SubmitFailure::NotLoggedIn)));

        let seller = Credentials {
            token: Some("t".to_string()),
            role: Some(Role::Seller),
        };
        let err = session.submit(&api, &seller).await.unwrap_err();
        assert!(matches!(err, ImportError::Unauthorized(SubmitFailure::WrongRole)));
        assert!(api.batches.lock().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn no_valid_rows_resets_to_idle() {
        let api = FakeApi::default();
        let mut session = ImportSession::new();
        session
            .load(b"Name,SKU,Regular price,Brand\nMug,M-1,free,Acme\n")
            .unwrap();
        session.select_category(toys()).unwrap();
        let err = session.submit(&api, &admin()).await.unwrap_err();
        assert!(matches!(err, ImportError::NoValidRows));
        assert_eq!(ImportState::Idle, session.state());
        assert!(api.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_or_broken_file_resets_to_idle() {
        let mut session = ImportSession::new();
        assert!(matches!(session.load(b"Name,SKU\n"), Err(ImportError::EmptyFile)));
        assert_eq!(ImportState::Idle, session.state());
        assert!(matches!(session.load(b"Name\n,\n"), Err(ImportError::EmptyFile)));
    }

    #[test]
    fn new_file_replaces_manual_mapping() {
        let mut session = ImportSession::new();
        session.load(b"Title,Notes\nMug,x\n").unwrap();
        session.assign("Notes", Some(ProductField::Brand)).unwrap();
        assert!(session.mapping().contains(ProductField::Brand));
        session.load(b"Title,Notes\nMug,x\n").unwrap();
        assert!(!session.mapping().contains(ProductField::Brand));
    }

    #[test]
    fn preview_edits_feed_processed_rows() {
        let mut session = ImportSession::new();
        session
            .load(b"Name,SKU,Regular price,Brand\nMug,M-1,0,Acme\n")
            .unwrap();
        assert!(session.edit_cell(0, 2, "4.99").unwrap());
        assert!(!session.edit_cell(5, 0, "x").unwrap());
        assert_eq!("4.99", session.processed_rows()[0].get(ProductField::RegularPrice));
    }

    #[test]
    fn resolves_only_active_categories() {
        let mut hidden = Category::new("Hidden", dec!(10), dec!(0));
        hidden.is_active = false;
        let resolver = CategoryResolver::new(vec![toys(), hidden]);
        assert_eq!("Toys", resolver.resolve(" Toys ").unwrap().name);
        assert!(matches!(resolver.resolve(""), Err(ImportError::MissingCategory)));
        assert!(matches!(
            resolver.resolve("Hidden"),
            Err(ImportError::UnknownCategory(_))
        ));
        assert_eq!(vec!["Toys"], resolver.names().collect::<Vec<_>>());
    }

    #[test]
    fn classifies_failure_messages() {
        assert_eq!(
            SubmitFailure::NotLoggedIn,
            SubmitFailure::classify("Not authorized, token failed")
        );
        assert_eq!(
            SubmitFailure::NotLoggedIn,
            SubmitFailure::classify("jwt expired: invalid token")
        );
        assert_eq!(
            SubmitFailure::WrongRole,
            SubmitFailure::classify("User role seller is not authorized to access this route")
        );
        assert!(matches!(
            SubmitFailure::classify("Validation failed: price is required"),
            SubmitFailure::Validation(_)
        ));
        assert!(matches!(
            SubmitFailure::classify("Internal error"),
            SubmitFailure::Other(_)
        ));
    }
}
