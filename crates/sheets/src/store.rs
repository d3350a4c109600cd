use std::collections::BTreeMap;
use thiserror::Error;

/// A resolved remote spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: String,
    pub title: String,
}

impl DocumentRef {
    pub fn url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}/edit", self.id)
    }
}

/// Current shape of one named sheet inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub sheet_id: i64,
    /// Rows currently holding values, header included.
    pub row_count: u32,
    /// First-row cells, the header signature used to detect misaligned
    /// appends.
    pub header: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Clear existing data rows (header preserved) before writing.
    Overwrite,
    /// Write below whatever rows exist.
    Append,
}

/// Declarative formatting state for one sheet; applying it twice yields the
/// same visible result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRules {
    pub columns: usize,
    pub data_rows: u32,
    pub currency_column: Option<usize>,
    pub date_column: Option<usize>,
}

/// How the caller names the target document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Exact id; a miss is a hard failure.
    ById(String),
    /// Exact-title search; zero matches means create, several is ambiguous.
    ByName(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Ambiguous document name '{0}': {1} matches")]
    AmbiguousName(String, usize),
}

/// The remote tabular store, reduced to the five operations the sync
/// coordinator needs. Transport details live behind this seam.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn locate(&self, locator: &Locator) -> Result<Option<DocumentRef>, StoreError>;

    async fn create(&self, title: &str) -> Result<DocumentRef, StoreError>;

    async fn list_sheets(
        &self,
        doc: &DocumentRef,
    ) -> Result<BTreeMap<String, SheetInfo>, StoreError>;

    /// Write rows under `header`, creating the sheet (with the header row)
    /// when it does not exist yet. Returns the number of data rows written.
    async fn write_rows(
        &self,
        doc: &DocumentRef,
        sheet: &str,
        header: &[String],
        rows: &[Vec<String>],
        mode: WriteMode,
    ) -> Result<u32, StoreError>;

    async fn apply_formatting(
        &self,
        doc: &DocumentRef,
        sheet: &str,
        rules: &FormatRules,
    ) -> Result<(), StoreError>;
}
