//! The zone store contract.
//!
//! Two implementations exist: the authoritative remote store
//! ([`super::remote::RemoteStore`]) and the local file cache
//! ([`super::cache::ZoneCache`]). The remote store is the source of truth;
//! the cache exists to answer membership queries without a network
//! round-trip and may lag behind. Write decisions are never based on cache
//! content.

use super::types::{CoverageZone, Forwarded, StoreError, Subsidiary, ZoneDraft};
use crate::streets::StreetRange;

pub trait ZoneStore {
    /// The subsidiary directory. Remote-sourced; the cache serves the copy
    /// captured at the last refresh.
    fn list_subsidiaries(&self, fwd: &Forwarded) -> Result<Vec<Subsidiary>, StoreError>;

    /// All zones of one subsidiary. An empty list is a valid answer, not
    /// an error.
    fn list_zones(&self, subsidiary_id: i64, fwd: &Forwarded) -> Result<Vec<CoverageZone>, StoreError>;

    /// Create a zone, returning it with its assigned id. Fails with
    /// `Validation` on malformed input and `Conflict` when an active zone
    /// with the same (subsidiary, name) already exists.
    fn create_zone(&mut self, draft: &ZoneDraft, fwd: &Forwarded) -> Result<CoverageZone, StoreError>;

    /// Delete by (subsidiary id, zone name). Fails with `NotFound` when no
    /// active zone matches.
    fn delete_zone(&mut self, subsidiary_id: i64, name: &str, fwd: &Forwarded) -> Result<(), StoreError>;

    /// Idempotent full replace of a zone's street ranges.
    fn replace_street_ranges(
        &mut self,
        zone_id: i64,
        ranges: &[StreetRange],
        fwd: &Forwarded,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory store fake for coordinator and engine tests.

    use super::*;

    pub struct MemoryStore {
        pub subsidiaries: Vec<Subsidiary>,
        pub zones: Vec<CoverageZone>,
        pub next_id: i64,
        /// Mutating calls received, for no-remote-call assertions.
        pub create_calls: usize,
        pub delete_calls: usize,
        pub replace_calls: usize,
        /// When set, every call fails with this error.
        pub fail_with: Option<StoreError>,
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self {
                subsidiaries: vec![],
                zones: vec![],
                next_id: 1,
                create_calls: 0,
                delete_calls: 0,
                replace_calls: 0,
                fail_with: None,
            }
        }
    }

    impl MemoryStore {
        pub fn new(subsidiaries: Vec<Subsidiary>, zones: Vec<CoverageZone>) -> Self {
            let next_id = zones.iter().map(|z| z.id).max().unwrap_or(0) + 1;
            Self { subsidiaries, zones, next_id, ..Default::default() }
        }

        fn check_failure(&self) -> Result<(), StoreError> {
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    impl ZoneStore for MemoryStore {
        fn list_subsidiaries(&self, _fwd: &Forwarded) -> Result<Vec<Subsidiary>, StoreError> {
            self.check_failure()?;
            Ok(self.subsidiaries.clone())
        }

        fn list_zones(&self, subsidiary_id: i64, _fwd: &Forwarded) -> Result<Vec<CoverageZone>, StoreError> {
            self.check_failure()?;
            Ok(self
                .zones
                .iter()
                .filter(|z| z.subsidiary_id == subsidiary_id)
                .cloned()
                .collect())
        }

        fn create_zone(&mut self, draft: &ZoneDraft, _fwd: &Forwarded) -> Result<CoverageZone, StoreError> {
            self.create_calls += 1;
            self.check_failure()?;
            draft.validate()?;
            if self
                .zones
                .iter()
                .any(|z| z.subsidiary_id == draft.subsidiary_id && z.name == draft.name && z.active)
            {
                return Err(StoreError::Conflict {
                    subsidiary_id: draft.subsidiary_id,
                    name: draft.name.clone(),
                });
            }
            let id = self.next_id;
            self.next_id += 1;
            let zone = draft.clone().into_zone(id, None)?;
            self.zones.push(zone.clone());
            Ok(zone)
        }

        fn delete_zone(&mut self, subsidiary_id: i64, name: &str, _fwd: &Forwarded) -> Result<(), StoreError> {
            self.delete_calls += 1;
            self.check_failure()?;
            let before = self.zones.len();
            self.zones
                .retain(|z| !(z.subsidiary_id == subsidiary_id && z.name == name && z.active));
            if self.zones.len() == before {
                return Err(StoreError::NotFound(format!(
                    "no active zone '{}' for subsidiary {}",
                    name, subsidiary_id
                )));
            }
            Ok(())
        }

        fn replace_street_ranges(
            &mut self,
            zone_id: i64,
            ranges: &[StreetRange],
            _fwd: &Forwarded,
        ) -> Result<(), StoreError> {
            self.replace_calls += 1;
            self.check_failure()?;
            match self.zones.iter_mut().find(|z| z.id == zone_id) {
                Some(zone) => {
                    zone.streets = ranges.to_vec();
                    Ok(())
                }
                None => Err(StoreError::NotFound(format!("no zone with id {}", zone_id))),
            }
        }
    }
}
