use crate::geocode::NominatimGeocoder;
use crate::resolve::ResolutionEngine;
use crate::zones::{RemoteStore, SyncCoordinator};
use crate::zones::cache::SharedCache;
use std::sync::Mutex;

pub struct AppState {
    /// Membership queries run against the shared cache.
    pub engine: ResolutionEngine<NominatimGeocoder, SharedCache>,
    /// All writes go through the coordinator (remote commit first).
    pub coordinator: Mutex<SyncCoordinator<RemoteStore>>,
    /// Read proxies for subsidiary/zone listings hit the remote directly.
    pub remote: RemoteStore,
}
