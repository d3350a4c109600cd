use std::fmt;
use thiserror::Error;

use tidybank_core::{CanonicalRecord, Resolution, ResolutionRequest, Resolver, View};

use crate::render::{self, SourceStyle, HEADER_ROWS};
use crate::store::{DocumentRef, FormatRules, Locator, RemoteStore, StoreError, WriteMode};

/// Where in the per-view state machine a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Reconcile,
    Write,
    Format,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStep::Reconcile => write!(f, "reconcile"),
            SyncStep::Write => write!(f, "write"),
            SyncStep::Format => write!(f, "format"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Target document could not be resolved or created; the whole sync
    /// step aborts, though local snapshots are unaffected.
    #[error("Document resolution failed: {0}")]
    DocumentResolution(#[from] StoreError),
}

/// Per-view result; a failed view never hides the others.
#[derive(Debug)]
pub struct ViewOutcome {
    pub view: String,
    pub rows_written: u32,
    pub error: Option<(SyncStep, String)>,
}

impl ViewOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
pub struct SyncReport {
    pub document: DocumentRef,
    pub url: String,
    pub outcomes: Vec<ViewOutcome>,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Target document; `None` always creates a fresh one.
    pub target: Option<Locator>,
    /// Title used when a document must be created.
    pub default_title: String,
    /// `None` defers to the resolution channel when a sheet already holds
    /// data.
    pub overwrite: Option<bool>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            target: None,
            default_title: "Banking Transactions".to_string(),
            overwrite: Some(true),
        }
    }
}

/// Reconciles locally derived views against the remote document.
///
/// Each view runs the reconcile → write → format sequence independently;
/// a failure is recorded against that view and the remaining views proceed.
pub struct SyncCoordinator<'a, S: RemoteStore> {
    store: &'a S,
    options: SyncOptions,
}

impl<'a, S: RemoteStore> SyncCoordinator<'a, S> {
    pub fn new(store: &'a S, options: SyncOptions) -> Self {
        Self { store, options }
    }

    pub async fn sync(
        &self,
        views: &[View],
        records: &[CanonicalRecord],
        resolver: &mut dyn Resolver,
    ) -> Result<SyncReport, SyncError> {
        let document = self.acquire_document().await?;
        tracing::info!(id = %document.id, title = %document.title, "syncing to spreadsheet");

        let mut outcomes = Vec::with_capacity(views.len());
        for view in views {
            let name = view.kind.sheet_name().to_string();
            match self.sync_view(&document, view, records, resolver).await {
                Ok(rows_written) => outcomes.push(ViewOutcome {
                    view: name,
                    rows_written,
                    error: None,
                }),
                Err((step, cause)) => {
                    tracing::warn!(view = %name, %step, %cause, "view sync failed");
                    outcomes.push(ViewOutcome {
                        view: name,
                        rows_written: 0,
                        error: Some((step, cause)),
                    });
                }
            }
        }

        Ok(SyncReport {
            url: document.url(),
            document,
            outcomes,
        })
    }

    async fn acquire_document(&self) -> Result<DocumentRef, SyncError> {
        match &self.options.target {
            Some(locator) => match self.store.locate(locator).await? {
                Some(doc) => Ok(doc),
                // Exact-name search came up empty; create under that name.
                None => {
                    let title = match locator {
                        Locator::ByName(name) => name.as_str(),
                        Locator::ById(_) => &self.options.default_title,
                    };
                    Ok(self.store.create(title).await?)
                }
            },
            None => Ok(self.store.create(&self.options.default_title).await?),
        }
    }

    async fn sync_view(
        &self,
        doc: &DocumentRef,
        view: &View,
        records: &[CanonicalRecord],
        resolver: &mut dyn Resolver,
    ) -> Result<u32, (SyncStep, String)> {
        let name = view.kind.sheet_name();
        let (header, rows) = render::render_view(view, records, SourceStyle::Formula);

        let sheets = self
            .store
            .list_sheets(doc)
            .await
            .map_err(|e| (SyncStep::Reconcile, e.to_string()))?;

        let mode = match sheets.get(name) {
            None => WriteMode::Overwrite,
            Some(info) if info.row_count <= HEADER_ROWS => WriteMode::Overwrite,
            Some(info) => {
                let header_mismatch = !info.header.is_empty() && info.header != header;
                let decided = match self.options.overwrite {
                    Some(true) => WriteMode::Overwrite,
                    Some(false) => WriteMode::Append,
                    None => {
                        let request = ResolutionRequest::WritePolicy {
                            sheet: name.to_string(),
                            existing_rows: info.row_count - HEADER_ROWS,
                        };
                        match resolver.resolve(&request) {
                            Resolution::Overwrite => WriteMode::Overwrite,
                            Resolution::Append => WriteMode::Append,
                            _ => {
                                return Err((
                                    SyncStep::Reconcile,
                                    "write policy left unresolved".to_string(),
                                ))
                            }
                        }
                    }
                };
                if decided == WriteMode::Append && header_mismatch {
                    return Err((
                        SyncStep::Reconcile,
                        format!(
                            "existing header {:?} does not match {:?}; appending would misalign",
                            info.header, header
                        ),
                    ));
                }
                decided
            }
        };

        let written = self
            .store
            .write_rows(doc, name, &header, &rows, mode)
            .await
            .map_err(|e| (SyncStep::Write, e.to_string()))?;

        let rules = FormatRules {
            columns: header.len(),
            data_rows: rows.len() as u32,
            date_column: Some(0),
            currency_column: Some(1),
        };
        self.store
            .apply_formatting(doc, name, &rules)
            .await
            .map_err(|e| (SyncStep::Format, e.to_string()))?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SheetInfo;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use tidybank_core::{project_views, ScriptedResolver};

    #[derive(Debug, Default)]
    struct FakeSheet {
        header: Vec<String>,
        data: Vec<Vec<String>>,
        formats: Vec<FormatRules>,
    }

    #[derive(Debug, Default)]
    struct FakeState {
        documents: Vec<DocumentRef>,
        sheets: BTreeMap<String, FakeSheet>,
        fail_write_on: Option<String>,
        fail_format_on: Option<String>,
    }

    /// In-memory store: one document namespace, scriptable failures.
    #[derive(Debug, Default)]
    struct FakeStore {
        state: RefCell<FakeState>,
    }

    impl FakeStore {
        fn with_document(title: &str) -> Self {
            let store = FakeStore::default();
            store.state.borrow_mut().documents.push(DocumentRef {
                id: "doc-1".into(),
                title: title.into(),
            });
            store
        }
    }

    impl RemoteStore for FakeStore {
        async fn locate(&self, locator: &Locator) -> Result<Option<DocumentRef>, StoreError> {
            let state = self.state.borrow();
            match locator {
                Locator::ById(id) => state
                    .documents
                    .iter()
                    .find(|d| &d.id == id)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| StoreError::NotFound(id.clone())),
                Locator::ByName(name) => {
                    let matches: Vec<_> = state
                        .documents
                        .iter()
                        .filter(|d| &d.title == name)
                        .cloned()
                        .collect();
                    match matches.len() {
                        0 => Ok(None),
                        1 => Ok(Some(matches.into_iter().next().unwrap())),
                        n => Err(StoreError::AmbiguousName(name.clone(), n)),
                    }
                }
            }
        }

        async fn create(&self, title: &str) -> Result<DocumentRef, StoreError> {
            let doc = DocumentRef {
                id: format!("doc-{}", self.state.borrow().documents.len() + 1),
                title: title.to_string(),
            };
            self.state.borrow_mut().documents.push(doc.clone());
            Ok(doc)
        }

        async fn list_sheets(
            &self,
            _doc: &DocumentRef,
        ) -> Result<BTreeMap<String, SheetInfo>, StoreError> {
            let state = self.state.borrow();
            Ok(state
                .sheets
                .iter()
                .map(|(name, sheet)| {
                    let header_rows = u32::from(!sheet.header.is_empty());
                    (
                        name.clone(),
                        SheetInfo {
                            sheet_id: 1,
                            row_count: sheet.data.len() as u32 + header_rows,
                            header: sheet.header.clone(),
                        },
                    )
                })
                .collect())
        }

        async fn write_rows(
            &self,
            _doc: &DocumentRef,
            sheet: &str,
            header: &[String],
            rows: &[Vec<String>],
            mode: WriteMode,
        ) -> Result<u32, StoreError> {
            let mut state = self.state.borrow_mut();
            if state.fail_write_on.as_deref() == Some(sheet) {
                return Err(StoreError::Api {
                    status: 500,
                    message: "injected write failure".into(),
                });
            }
            let entry = state.sheets.entry(sheet.to_string()).or_default();
            match mode {
                WriteMode::Overwrite => {
                    entry.header = header.to_vec();
                    entry.data = rows.to_vec();
                }
                WriteMode::Append => {
                    if entry.header.is_empty() {
                        entry.header = header.to_vec();
                    }
                    entry.data.extend(rows.iter().cloned());
                }
            }
            Ok(rows.len() as u32)
        }

        async fn apply_formatting(
            &self,
            _doc: &DocumentRef,
            sheet: &str,
            rules: &FormatRules,
        ) -> Result<(), StoreError> {
            let mut state = self.state.borrow_mut();
            if state.fail_format_on.as_deref() == Some(sheet) {
                return Err(StoreError::Api {
                    status: 500,
                    message: "injected format failure".into(),
                });
            }
            let entry = state.sheets.entry(sheet.to_string()).or_default();
            entry.formats.push(rules.clone());
            Ok(())
        }
    }

    fn records() -> Vec<CanonicalRecord> {
        vec![
            CanonicalRecord {
                master_row: 1,
                date: NaiveDate::from_ymd_opt(2024, 3, 1),
                amount: Decimal::new(-450, 2),
                details: "COFFEE SHOP".into(),
                category: "Expense".into(),
            },
            CanonicalRecord {
                master_row: 2,
                date: NaiveDate::from_ymd_opt(2024, 3, 2),
                amount: Decimal::new(250000, 2),
                details: "PAYROLL DEPOSIT".into(),
                category: "Income".into(),
            },
            CanonicalRecord {
                master_row: 3,
                date: NaiveDate::from_ymd_opt(2024, 3, 3),
                amount: Decimal::new(-1999, 2),
                details: "EBAY PURCHASE".into(),
                category: "eBay".into(),
            },
        ]
    }

    fn standard_views() -> (Vec<CanonicalRecord>, Vec<View>) {
        let records = records();
        let views = project_views(&records, &["eBay".to_string()]);
        (records, views)
    }

    #[tokio::test]
    async fn creates_document_and_writes_every_view() {
        let store = FakeStore::default();
        let (records, views) = standard_views();
        let coordinator = SyncCoordinator::new(&store, SyncOptions::default());
        let report = coordinator
            .sync(&views, &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap();

        assert_eq!(report.document.title, "Banking Transactions");
        assert!(report.outcomes.iter().all(ViewOutcome::succeeded));
        let counts: Vec<(String, u32)> = report
            .outcomes
            .iter()
            .map(|o| (o.view.clone(), o.rows_written))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("Master".to_string(), 3),
                ("Incoming".to_string(), 1),
                ("Outgoing".to_string(), 2),
                ("eBay".to_string(), 1),
            ]
        );

        let state = store.state.borrow();
        let master = &state.sheets["Master"];
        assert_eq!(master.header, vec!["Date", "Amount", "Details", "Category"]);
        let ebay = &state.sheets["eBay"];
        assert_eq!(ebay.data[0].last().map(String::as_str), Some("=Master!A4"));
    }

    #[tokio::test]
    async fn one_failing_view_does_not_stop_the_others() {
        let store = FakeStore::default();
        store.state.borrow_mut().fail_write_on = Some("Incoming".into());
        let (records, views) = standard_views();
        let coordinator = SyncCoordinator::new(&store, SyncOptions::default());
        let report = coordinator
            .sync(&views, &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap();

        let incoming = report.outcomes.iter().find(|o| o.view == "Incoming").unwrap();
        let (step, cause) = incoming.error.as_ref().unwrap();
        assert_eq!(*step, SyncStep::Write);
        assert!(cause.contains("injected write failure"));

        for name in ["Master", "Outgoing", "eBay"] {
            assert!(report.outcomes.iter().find(|o| o.view == name).unwrap().succeeded());
        }
    }

    #[tokio::test]
    async fn overwrite_replaces_existing_data_rows() {
        let store = FakeStore::with_document("Banking Transactions");
        {
            let mut state = store.state.borrow_mut();
            let sheet = state.sheets.entry("Master".into()).or_default();
            sheet.header = vec!["Date", "Amount", "Details", "Category"]
                .into_iter()
                .map(String::from)
                .collect();
            sheet.data = vec![vec!["old".into(), "1".into(), "x".into(), "y".into()]];
        }
        let (records, views) = standard_views();
        let options = SyncOptions {
            target: Some(Locator::ByName("Banking Transactions".into())),
            overwrite: Some(true),
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::new(&store, options);
        coordinator
            .sync(&views[..1], &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap();

        let state = store.state.borrow();
        assert_eq!(state.sheets["Master"].data.len(), 3);
        assert_eq!(state.sheets["Master"].data[0][2], "COFFEE SHOP");
    }

    #[tokio::test]
    async fn append_extends_below_existing_rows() {
        let store = FakeStore::with_document("Banking Transactions");
        let (records, views) = standard_views();
        let options = SyncOptions {
            target: Some(Locator::ByName("Banking Transactions".into())),
            overwrite: Some(false),
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::new(&store, options.clone());
        coordinator
            .sync(&views[..1], &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap();
        // Second run appends below the first.
        let coordinator = SyncCoordinator::new(&store, options);
        coordinator
            .sync(&views[..1], &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap();

        let state = store.state.borrow();
        assert_eq!(state.sheets["Master"].data.len(), 6);
    }

    #[tokio::test]
    async fn undecided_policy_goes_through_the_resolver() {
        let store = FakeStore::with_document("Banking Transactions");
        {
            let mut state = store.state.borrow_mut();
            let sheet = state.sheets.entry("Master".into()).or_default();
            sheet.header = vec!["Date", "Amount", "Details", "Category"]
                .into_iter()
                .map(String::from)
                .collect();
            sheet.data = vec![vec!["2024-01-01".into(), "1".into(), "x".into(), "y".into()]];
        }
        let (records, views) = standard_views();
        let options = SyncOptions {
            target: Some(Locator::ByName("Banking Transactions".into())),
            overwrite: None,
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::new(&store, options);
        let mut resolver = ScriptedResolver::new([Resolution::Overwrite]);
        let report = coordinator.sync(&views[..1], &records, &mut resolver).await.unwrap();

        assert!(report.outcomes[0].succeeded());
        assert_eq!(store.state.borrow().sheets["Master"].data.len(), 3);
    }

    #[tokio::test]
    async fn append_onto_mismatched_header_fails_that_view() {
        let store = FakeStore::with_document("Banking Transactions");
        {
            let mut state = store.state.borrow_mut();
            let sheet = state.sheets.entry("Master".into()).or_default();
            sheet.header = vec!["Completely".into(), "Different".into()];
            sheet.data = vec![vec!["a".into(), "b".into()]];
        }
        let (records, views) = standard_views();
        let options = SyncOptions {
            target: Some(Locator::ByName("Banking Transactions".into())),
            overwrite: Some(false),
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::new(&store, options);
        let report = coordinator
            .sync(&views[..1], &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap();

        let (step, _) = report.outcomes[0].error.as_ref().unwrap();
        assert_eq!(*step, SyncStep::Reconcile);
    }

    #[tokio::test]
    async fn ambiguous_name_aborts_the_whole_sync_step() {
        let store = FakeStore::with_document("Books");
        store.state.borrow_mut().documents.push(DocumentRef {
            id: "doc-2".into(),
            title: "Books".into(),
        });
        let (records, views) = standard_views();
        let options = SyncOptions {
            target: Some(Locator::ByName("Books".into())),
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::new(&store, options);
        let err = coordinator
            .sync(&views, &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::DocumentResolution(StoreError::AmbiguousName(_, 2))
        ));
    }

    #[tokio::test]
    async fn missing_id_is_a_hard_failure() {
        let store = FakeStore::default();
        let (records, views) = standard_views();
        let options = SyncOptions {
            target: Some(Locator::ById("nope".into())),
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::new(&store, options);
        let err = coordinator
            .sync(&views, &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::DocumentResolution(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn formatting_twice_leaves_identical_state() {
        let store = FakeStore::default();
        let (records, views) = standard_views();
        let coordinator = SyncCoordinator::new(&store, SyncOptions::default());
        coordinator
            .sync(&views[..1], &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap();
        coordinator
            .sync(&views[..1], &records, &mut ScriptedResolver::unattended())
            .await
            .unwrap();

        let state = store.state.borrow();
        let formats = &state.sheets["Master"].formats;
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[0], formats[1]);
    }
}
