pub mod record;
pub mod resolve;
pub mod summary;
pub mod view;

pub use record::{CanonicalRecord, ColumnRole, ColumnRoleMap, RawRow, RoleMapError};
pub use resolve::{Resolution, ResolutionRequest, Resolver, RoleCandidate, ScriptedResolver};
pub use summary::{RejectedRow, RunSummary};
pub use view::{project_views, View, ViewKind};
