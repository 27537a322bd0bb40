//! Core types for the zone subsystem.

use crate::geometry::{GeometryError, Point, Polygon};
use crate::streets::StreetRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named delivery-coverage polygon owned by a subsidiary.
///
/// The id is assigned by the authoritative store. Geometry and street
/// ranges are only ever replaced wholesale; there are no partial edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageZone {
    pub id: i64,
    pub subsidiary_id: i64,
    pub name: String,
    pub polygon: Polygon,
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub streets: Vec<StreetRange>,
}

/// Creation payload: a zone before the authoritative store assigns its id.
///
/// The vertex list is raw on purpose: validation happens in
/// [`ZoneDraft::validate`] so that malformed input fails before any
/// network call, not inside a half-applied mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDraft {
    pub subsidiary_id: i64,
    pub name: String,
    pub points: Vec<Point>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub streets: Vec<StreetRange>,
}

fn default_true() -> bool {
    true
}

impl ZoneDraft {
    /// Check required fields and build the polygon. Both store variants run
    /// this before accepting a create, and the synchronization coordinator
    /// runs it again before its first remote call.
    pub fn validate(&self) -> Result<Polygon, StoreError> {
        if self.subsidiary_id <= 0 {
            return Err(StoreError::Validation("subsidiary id is required".into()));
        }
        if self.name.trim().is_empty() {
            return Err(StoreError::Validation("zone name is required".into()));
        }
        for range in &self.streets {
            if !range.is_valid() {
                return Err(StoreError::Validation(format!("invalid street range '{}'", range)));
            }
        }
        Ok(Polygon::new(self.points.clone())?)
    }

    /// Promote to a full zone once the authoritative store assigned an id.
    pub fn into_zone(self, id: i64, created_at: Option<DateTime<Utc>>) -> Result<CoverageZone, StoreError> {
        let polygon = self.validate()?;
        Ok(CoverageZone {
            id,
            subsidiary_id: self.subsidiary_id,
            name: self.name,
            polygon,
            active: self.active,
            created_at,
            streets: self.streets,
        })
    }
}

/// A retail subsidiary. Read-only from this engine's perspective; the
/// authoritative store owns the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsidiary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub coordinate: Option<Point>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub partner_id: Option<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

// ─── Errors ─────────────────────────────────────────────────────

/// Zone store errors, shared by both store variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Malformed polygon or fields. Caller's fault, never retried.
    Validation(String),
    /// No matching zone (or subsidiary) exists.
    NotFound(String),
    /// An active zone with this (subsidiary, name) already exists.
    Conflict { subsidiary_id: i64, name: String },
    /// Network failure, timeout, or non-2xx from the authoritative store.
    Remote(String),
    /// The authoritative store answered with something unparseable.
    InvalidResponse(String),
    /// Local cache write failure. The coordinator downgrades this to a
    /// warning after a successful remote commit.
    CacheWrite(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Conflict { subsidiary_id, name } => write!(
                f,
                "Zone '{}' already exists for subsidiary {}",
                name, subsidiary_id
            ),
            Self::Remote(msg) => write!(f, "Remote store error: {}", msg),
            Self::InvalidResponse(msg) => write!(f, "Invalid remote response: {}", msg),
            Self::CacheWrite(msg) => write!(f, "Cache write failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<GeometryError> for StoreError {
    fn from(e: GeometryError) -> Self {
        StoreError::Validation(e.to_string())
    }
}

// ─── Forwarded headers ──────────────────────────────────────────

/// Header names forwarded verbatim to the authoritative API. Anything not
/// on this list is dropped at the boundary.
pub const FORWARDED_HEADERS: &[&str] = &["x-ratelimit-info"];

/// The allow-listed headers of one inbound request, ready to be replayed
/// on outbound authoritative-API calls. The local cache ignores these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forwarded {
    headers: Vec<(String, String)>,
}

impl Forwarded {
    /// No headers to forward (CLI calls, internal refreshes).
    pub fn none() -> Self {
        Self::default()
    }

    /// Pick the allow-listed headers out of an inbound request.
    pub fn collect<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let headers = FORWARDED_HEADERS
            .iter()
            .filter_map(|name| lookup(name).map(|value| (name.to_string(), value)))
            .collect();
        Self { headers }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn pt(lon: f64, lat: f64) -> Point {
        Point::new(lon, lat).unwrap()
    }

    fn draft() -> ZoneDraft {
        ZoneDraft {
            subsidiary_id: 1,
            name: "Centro".into(),
            points: vec![
                pt(-58.3816, -34.6037),
                pt(-58.3750, -34.6000),
                pt(-58.3750, -34.5950),
                pt(-58.3850, -34.5950),
            ],
            active: true,
            streets: vec![],
        }
    }

    #[test]
    fn test_draft_validates() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_draft_rejects_two_point_polygon() {
        let mut d = draft();
        d.points.truncate(2);
        assert!(matches!(d.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_draft_rejects_blank_name() {
        let mut d = draft();
        d.name = "  ".into();
        assert!(matches!(d.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_draft_rejects_inverted_street_range() {
        let mut d = draft();
        d.streets = vec![crate::streets::StreetRange::new("Av. Corrientes", 2000, 100)];
        assert!(matches!(d.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_draft_into_zone() {
        let zone = draft().into_zone(42, None).unwrap();
        assert_eq!(zone.id, 42);
        assert_eq!(zone.subsidiary_id, 1);
        assert!(zone.active);
        assert_eq!(zone.polygon.vertex_count(), 4);
    }

    #[test]
    fn test_forwarded_allow_list() {
        let fwd = Forwarded::collect(|name| match name {
            "x-ratelimit-info" => Some("remaining=10".to_string()),
            _ => None,
        });
        assert_eq!(fwd.iter().collect::<Vec<_>>(), vec![("x-ratelimit-info", "remaining=10")]);

        // Headers off the allow-list are never picked up, whatever the
        // lookup would answer for them.
        let fwd = Forwarded::collect(|name| {
            assert!(FORWARDED_HEADERS.contains(&name));
            None
        });
        assert!(fwd.is_empty());
    }

    #[test]
    fn test_draft_deserialization_defaults() {
        let json = r#"{
            "subsidiary_id": 3,
            "name": "Norte",
            "points": [
                {"lon": -58.38, "lat": -34.60},
                {"lon": -58.37, "lat": -34.60},
                {"lon": -58.37, "lat": -34.59}
            ]
        }"#;
        let d: ZoneDraft = serde_json::from_str(json).unwrap();
        assert!(d.active);
        assert!(d.streets.is_empty());
    }
}
