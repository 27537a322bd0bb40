//! Zone subsystem: the data model, the two stores, and the coordinator
//! that keeps them consistent.

pub mod cache;
pub mod remote;
pub mod store;
pub mod sync;
pub mod types;

pub use cache::{shared, SharedCache, ZoneCache};
pub use remote::RemoteStore;
pub use store::ZoneStore;
pub use sync::{RefreshSummary, SyncCoordinator, SyncOutcome, SyncState};
pub use types::{CoverageZone, Forwarded, StoreError, Subsidiary, ZoneDraft, FORWARDED_HEADERS};
