pub mod client;
pub mod render;
pub mod snapshot;
pub mod store;
pub mod sync;

pub use client::SheetsClient;
pub use snapshot::write_view_csv;
pub use store::{
    DocumentRef, FormatRules, Locator, RemoteStore, SheetInfo, StoreError, WriteMode,
};
pub use sync::{SyncCoordinator, SyncError, SyncOptions, SyncReport, SyncStep, ViewOutcome};
