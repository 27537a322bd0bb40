//! File-based zone cache, the local mirror of the authoritative store.
//!
//! Layout on disk (`~/.zonda/zones.json` by default): the subsidiary
//! directory captured at the last refresh, one record per zone with its
//! polygon as an ordered vertex list, and one record per street range
//! pointing at its owning zone by id. An unreadable or corrupt file is
//! treated as an empty cache; the next refresh rebuilds it.

use super::store::ZoneStore;
use super::types::{CoverageZone, Forwarded, StoreError, Subsidiary, ZoneDraft};
use crate::geometry::Polygon;
use crate::streets::StreetRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Serialize, Deserialize, Clone)]
struct ZoneRecord {
    id: i64,
    subsidiary_id: i64,
    name: String,
    polygon: Polygon,
    active: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// One street range row, referencing its owning zone.
#[derive(Serialize, Deserialize, Clone)]
struct StreetRecord {
    zone_id: i64,
    #[serde(flatten)]
    range: StreetRange,
}

#[derive(Serialize, Deserialize, Clone, Default)]
struct CacheFile {
    #[serde(default)]
    subsidiaries: Vec<Subsidiary>,
    #[serde(default)]
    zones: Vec<ZoneRecord>,
    #[serde(default)]
    streets: Vec<StreetRecord>,
}

/// The local zone cache.
pub struct ZoneCache {
    path: PathBuf,
    file: CacheFile,
}

/// Cache handle shared between the resolution engine and the coordinator.
pub type SharedCache = Arc<Mutex<ZoneCache>>;

pub fn shared(cache: ZoneCache) -> SharedCache {
    Arc::new(Mutex::new(cache))
}

impl ZoneCache {
    /// Load the cache from a specific path. Missing or unparseable files
    /// start empty.
    pub fn load_from(path: PathBuf) -> Self {
        let file = Self::read_file(&path).unwrap_or_default();
        Self { path, file }
    }

    fn read_file(path: &PathBuf) -> Option<CacheFile> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::CacheWrite(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&self.file)
            .map_err(|e| StoreError::CacheWrite(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| StoreError::CacheWrite(e.to_string()))
    }

    fn assemble(&self, record: &ZoneRecord) -> CoverageZone {
        CoverageZone {
            id: record.id,
            subsidiary_id: record.subsidiary_id,
            name: record.name.clone(),
            polygon: record.polygon.clone(),
            active: record.active,
            created_at: record.created_at,
            streets: self
                .file
                .streets
                .iter()
                .filter(|s| s.zone_id == record.id)
                .map(|s| s.range.clone())
                .collect(),
        }
    }

    fn insert(&mut self, zone: &CoverageZone) {
        self.file.zones.push(ZoneRecord {
            id: zone.id,
            subsidiary_id: zone.subsidiary_id,
            name: zone.name.clone(),
            polygon: zone.polygon.clone(),
            active: zone.active,
            created_at: zone.created_at,
        });
        self.file
            .streets
            .extend(zone.streets.iter().map(|range| StreetRecord {
                zone_id: zone.id,
                range: range.clone(),
            }));
    }

    fn drop_zone_rows(&mut self, id: i64) {
        self.file.zones.retain(|z| z.id != id);
        self.file.streets.retain(|s| s.zone_id != id);
    }

    // ─── Coordinator-side maintenance ───────────────────────────

    /// Insert or replace one zone (keyed by id; a lingering record with the
    /// same active (subsidiary, name) is dropped too, so a re-created zone
    /// does not leave a ghost behind).
    pub fn upsert_zone(&mut self, zone: &CoverageZone) -> Result<(), StoreError> {
        self.drop_zone_rows(zone.id);
        let ghost: Vec<i64> = self
            .file
            .zones
            .iter()
            .filter(|z| z.subsidiary_id == zone.subsidiary_id && z.name == zone.name && z.active)
            .map(|z| z.id)
            .collect();
        for id in ghost {
            self.drop_zone_rows(id);
        }
        self.insert(zone);
        self.persist()
    }

    /// Remove a zone by (subsidiary, name) if present. A miss is not an
    /// error; the cache may simply not have seen the zone yet.
    pub fn remove_zone(&mut self, subsidiary_id: i64, name: &str) -> Result<bool, StoreError> {
        let ids: Vec<i64> = self
            .file
            .zones
            .iter()
            .filter(|z| z.subsidiary_id == subsidiary_id && z.name == name)
            .map(|z| z.id)
            .collect();
        if ids.is_empty() {
            return Ok(false);
        }
        for id in ids {
            self.drop_zone_rows(id);
        }
        self.persist()?;
        Ok(true)
    }

    /// Replace the street ranges of a cached zone. A zone the cache does
    /// not hold is left for the next refresh.
    pub fn set_street_ranges(&mut self, zone_id: i64, ranges: &[StreetRange]) -> Result<(), StoreError> {
        if !self.file.zones.iter().any(|z| z.id == zone_id) {
            return Ok(());
        }
        self.file.streets.retain(|s| s.zone_id != zone_id);
        self.file.streets.extend(ranges.iter().map(|range| StreetRecord {
            zone_id,
            range: range.clone(),
        }));
        self.persist()
    }

    /// Swap in a freshly fetched subsidiary directory.
    pub fn replace_subsidiaries(&mut self, subsidiaries: Vec<Subsidiary>) -> Result<(), StoreError> {
        self.file.subsidiaries = subsidiaries;
        self.persist()
    }

    /// Swap in the full zone set of one subsidiary.
    pub fn replace_zones_for(
        &mut self,
        subsidiary_id: i64,
        zones: &[CoverageZone],
    ) -> Result<(), StoreError> {
        let stale: Vec<i64> = self
            .file
            .zones
            .iter()
            .filter(|z| z.subsidiary_id == subsidiary_id)
            .map(|z| z.id)
            .collect();
        for id in stale {
            self.drop_zone_rows(id);
        }
        for zone in zones {
            self.insert(zone);
        }
        self.persist()
    }

    pub fn zone_count(&self) -> usize {
        self.file.zones.len()
    }

    pub fn subsidiary_count(&self) -> usize {
        self.file.subsidiaries.len()
    }
}

impl ZoneStore for ZoneCache {
    fn list_subsidiaries(&self, _fwd: &Forwarded) -> Result<Vec<Subsidiary>, StoreError> {
        Ok(self.file.subsidiaries.clone())
    }

    fn list_zones(&self, subsidiary_id: i64, _fwd: &Forwarded) -> Result<Vec<CoverageZone>, StoreError> {
        Ok(self
            .file
            .zones
            .iter()
            .filter(|z| z.subsidiary_id == subsidiary_id)
            .map(|z| self.assemble(z))
            .collect())
    }

    fn create_zone(&mut self, draft: &ZoneDraft, _fwd: &Forwarded) -> Result<CoverageZone, StoreError> {
        draft.validate()?;
        if self
            .file
            .zones
            .iter()
            .any(|z| z.subsidiary_id == draft.subsidiary_id && z.name == draft.name && z.active)
        {
            return Err(StoreError::Conflict {
                subsidiary_id: draft.subsidiary_id,
                name: draft.name.clone(),
            });
        }
        // Provisional id; overwritten by the authoritative id on the next
        // refresh when the cache is used standalone.
        let id = self.file.zones.iter().map(|z| z.id).max().unwrap_or(0) + 1;
        let zone = draft.clone().into_zone(id, None)?;
        self.insert(&zone);
        self.persist()?;
        Ok(zone)
    }

    fn delete_zone(&mut self, subsidiary_id: i64, name: &str, _fwd: &Forwarded) -> Result<(), StoreError> {
        let ids: Vec<i64> = self
            .file
            .zones
            .iter()
            .filter(|z| z.subsidiary_id == subsidiary_id && z.name == name && z.active)
            .map(|z| z.id)
            .collect();
        if ids.is_empty() {
            return Err(StoreError::NotFound(format!(
                "no active zone '{}' for subsidiary {}",
                name, subsidiary_id
            )));
        }
        for id in ids {
            self.drop_zone_rows(id);
        }
        self.persist()
    }

    fn replace_street_ranges(
        &mut self,
        zone_id: i64,
        ranges: &[StreetRange],
        _fwd: &Forwarded,
    ) -> Result<(), StoreError> {
        if !self.file.zones.iter().any(|z| z.id == zone_id) {
            return Err(StoreError::NotFound(format!("no zone with id {}", zone_id)));
        }
        self.set_street_ranges(zone_id, ranges)
    }
}

impl ZoneStore for SharedCache {
    fn list_subsidiaries(&self, fwd: &Forwarded) -> Result<Vec<Subsidiary>, StoreError> {
        self.lock().unwrap().list_subsidiaries(fwd)
    }

    fn list_zones(&self, subsidiary_id: i64, fwd: &Forwarded) -> Result<Vec<CoverageZone>, StoreError> {
        self.lock().unwrap().list_zones(subsidiary_id, fwd)
    }

    fn create_zone(&mut self, draft: &ZoneDraft, fwd: &Forwarded) -> Result<CoverageZone, StoreError> {
        self.lock().unwrap().create_zone(draft, fwd)
    }

    fn delete_zone(&mut self, subsidiary_id: i64, name: &str, fwd: &Forwarded) -> Result<(), StoreError> {
        self.lock().unwrap().delete_zone(subsidiary_id, name, fwd)
    }

    fn replace_street_ranges(
        &mut self,
        zone_id: i64,
        ranges: &[StreetRange],
        fwd: &Forwarded,
    ) -> Result<(), StoreError> {
        self.lock().unwrap().replace_street_ranges(zone_id, ranges, fwd)
    }
}
