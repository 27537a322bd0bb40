//! Synchronization coordinator: the only write path for zone data.
//!
//! Every mutation follows the same shape: validate locally (fail fast, no
//! partial remote state), commit against the authoritative store, then
//! update the local cache best-effort. There is no distributed
//! transaction: the remote call is the commit point, and a cache failure
//! after it is a degraded success, not a rollback.
//!
//! Per-request state machine:
//! `Pending → RemoteApplied → CacheApplied` (success),
//! `Pending → RemoteFailed` (terminal, surfaced as `Err`),
//! `Pending → RemoteApplied → CacheFailed` (success + warning).

use super::cache::SharedCache;
use super::store::ZoneStore;
use super::types::{CoverageZone, Forwarded, StoreError, ZoneDraft};
use crate::config::Config;
use crate::streets::StreetRange;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Pending,
    RemoteApplied,
    CacheApplied,
    RemoteFailed,
    CacheFailed,
}

/// Result of a mutation that reached the authoritative store.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome<T> {
    pub value: T,
    pub state: SyncState,
    /// Set when the cache step failed: the remote commit stands, a later
    /// refresh will repair the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RefreshSummary {
    pub subsidiaries: usize,
    pub zones: usize,
}

pub struct SyncCoordinator<R: ZoneStore> {
    remote: R,
    cache: SharedCache,
    max_polygon_points: usize,
    max_zones_per_subsidiary: usize,
}

impl<R: ZoneStore> SyncCoordinator<R> {
    pub fn new(remote: R, cache: SharedCache, cfg: &Config) -> Self {
        Self {
            remote,
            cache,
            max_polygon_points: cfg.max_polygon_points,
            max_zones_per_subsidiary: cfg.max_zones_per_subsidiary,
        }
    }

    /// Create a zone. Validation and service limits are checked before the
    /// first network call.
    pub fn create_zone(
        &mut self,
        draft: &ZoneDraft,
        fwd: &Forwarded,
    ) -> Result<SyncOutcome<CoverageZone>, StoreError> {
        let polygon = draft.validate()?;
        if polygon.vertex_count() > self.max_polygon_points {
            return Err(StoreError::Validation(format!(
                "polygon has {} vertices, limit is {}",
                polygon.vertex_count(),
                self.max_polygon_points
            )));
        }
        if self.max_zones_per_subsidiary > 0 {
            let active = self
                .remote
                .list_zones(draft.subsidiary_id, fwd)?
                .iter()
                .filter(|z| z.active)
                .count();
            if active >= self.max_zones_per_subsidiary {
                return Err(StoreError::Validation(format!(
                    "subsidiary {} already has {} active zones, limit is {}",
                    draft.subsidiary_id, active, self.max_zones_per_subsidiary
                )));
            }
        }

        let zone = self.remote.create_zone(draft, fwd)?;
        let (state, warning) = self.cache_step(|cache| cache.upsert_zone(&zone));
        Ok(SyncOutcome { value: zone, state, warning })
    }

    /// Delete a zone by (subsidiary, name). A `NotFound` from the remote
    /// store propagates untouched and the cache is left alone.
    pub fn delete_zone(
        &mut self,
        subsidiary_id: i64,
        name: &str,
        fwd: &Forwarded,
    ) -> Result<SyncOutcome<()>, StoreError> {
        self.remote.delete_zone(subsidiary_id, name, fwd)?;
        let (state, warning) =
            self.cache_step(|cache| cache.remove_zone(subsidiary_id, name).map(|_| ()));
        Ok(SyncOutcome { value: (), state, warning })
    }

    /// Full replace of a zone's street ranges. Partial patches are not
    /// supported; callers resend the complete set.
    pub fn replace_street_ranges(
        &mut self,
        zone_id: i64,
        ranges: &[StreetRange],
        fwd: &Forwarded,
    ) -> Result<SyncOutcome<()>, StoreError> {
        for range in ranges {
            if !range.is_valid() {
                return Err(StoreError::Validation(format!("invalid street range '{}'", range)));
            }
        }
        self.remote.replace_street_ranges(zone_id, ranges, fwd)?;
        let (state, warning) = self.cache_step(|cache| cache.set_street_ranges(zone_id, ranges));
        Ok(SyncOutcome { value: (), state, warning })
    }

    /// Pull one subsidiary's zones from the authoritative store into the
    /// cache. Read failures surface as errors here; refreshing is the one
    /// operation whose whole point is the cache write.
    pub fn refresh(&mut self, subsidiary_id: i64, fwd: &Forwarded) -> Result<usize, StoreError> {
        let zones = self.remote.list_zones(subsidiary_id, fwd)?;
        self.cache
            .lock()
            .unwrap()
            .replace_zones_for(subsidiary_id, &zones)?;
        Ok(zones.len())
    }

    /// Refresh the subsidiary directory and every subsidiary's zones.
    pub fn refresh_all(&mut self, fwd: &Forwarded) -> Result<RefreshSummary, StoreError> {
        let subsidiaries = self.remote.list_subsidiaries(fwd)?;
        self.cache
            .lock()
            .unwrap()
            .replace_subsidiaries(subsidiaries.clone())?;
        let mut zones = 0;
        for subsidiary in &subsidiaries {
            zones += self.refresh(subsidiary.id, fwd)?;
        }
        Ok(RefreshSummary { subsidiaries: subsidiaries.len(), zones })
    }

    /// Run the best-effort cache step after a successful remote commit.
    fn cache_step<F>(&self, op: F) -> (SyncState, Option<String>)
    where
        F: FnOnce(&mut super::cache::ZoneCache) -> Result<(), StoreError>,
    {
        match op(&mut self.cache.lock().unwrap()) {
            Ok(()) => (SyncState::CacheApplied, None),
            Err(e) => {
                eprintln!(
                    "[{}] cache update failed after remote commit: {}",
                    Utc::now().format("%H:%M:%S"),
                    e
                );
                (SyncState::CacheFailed, Some(e.to_string()))
            }
        }
    }
}
