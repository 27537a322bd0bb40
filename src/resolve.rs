//! Resolution engine — answers "who delivers to this address?".
//!
//! Pipeline: geocode → candidate zones by polygon containment →
//! street-range refinement → deterministically ordered result. The engine
//! only reads; whichever store it is wired to (usually the cache) is the
//! explicit choice of the caller.

use crate::geocode::{GeocodeError, GeocodedAddress, Geocoder};
use crate::geometry::Point;
use crate::streets::{refine, Refinement};
use crate::zones::{Forwarded, StoreError, ZoneStore};
use serde::Serialize;
use std::fmt;

/// One zone covering the resolved coordinate.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneMatch {
    pub zone_id: i64,
    pub name: String,
    pub subsidiary_id: i64,
    pub subsidiary_name: String,
    /// True when a street range positively matched; false for a bare
    /// polygon hit (no ranges, or no house number to refine with).
    pub refined: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionResult {
    /// Canonical address string from the geocoder.
    pub address: String,
    pub coordinate: Point,
    /// Covering zones, ordered by subsidiary id then zone name (never by
    /// discovery order), so results are reproducible across cache states.
    pub zones: Vec<ZoneMatch>,
    pub covered: bool,
}

#[derive(Debug)]
pub enum ResolveError {
    Geocode(GeocodeError),
    Store(StoreError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geocode(e) => write!(f, "{}", e),
            Self::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<GeocodeError> for ResolveError {
    fn from(e: GeocodeError) -> Self {
        Self::Geocode(e)
    }
}

impl From<StoreError> for ResolveError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

pub struct ResolutionEngine<G: Geocoder, S: ZoneStore> {
    geocoder: G,
    store: S,
}

impl<G: Geocoder, S: ZoneStore> ResolutionEngine<G, S> {
    pub fn new(geocoder: G, store: S) -> Self {
        Self { geocoder, store }
    }

    /// Geocode without resolving coverage.
    pub fn geocode(&self, address_text: &str) -> Result<GeocodedAddress, GeocodeError> {
        self.geocoder.geocode(address_text)
    }

    /// Resolve an address against all subsidiaries, or one when `scope` is
    /// given.
    pub fn resolve(
        &self,
        address_text: &str,
        scope: Option<i64>,
        fwd: &Forwarded,
    ) -> Result<ResolutionResult, ResolveError> {
        let geocoded = self.geocoder.geocode(address_text)?;
        self.resolve_point(&geocoded, scope, fwd)
    }

    /// Containment + refinement for an already-geocoded address.
    pub fn resolve_point(
        &self,
        geocoded: &GeocodedAddress,
        scope: Option<i64>,
        fwd: &Forwarded,
    ) -> Result<ResolutionResult, ResolveError> {
        let subsidiaries = self.store.list_subsidiaries(fwd)?;
        let targets: Vec<(i64, String)> = match scope {
            Some(id) => {
                let name = subsidiaries
                    .iter()
                    .find(|s| s.id == id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                vec![(id, name)]
            }
            None => subsidiaries
                .iter()
                .filter(|s| s.active)
                .map(|s| (s.id, s.name.clone()))
                .collect(),
        };

        let address_parts = geocoded.street_and_number();
        let mut zones = Vec::new();
        for (subsidiary_id, subsidiary_name) in targets {
            for zone in self.store.list_zones(subsidiary_id, fwd)? {
                if !zone.active || !zone.polygon.contains(geocoded.point) {
                    continue;
                }
                let refined = match refine(&zone.streets, address_parts) {
                    Refinement::Covers { refined } => refined,
                    Refinement::Unrefined => false,
                    Refinement::RefinedOut => continue,
                };
                zones.push(ZoneMatch {
                    zone_id: zone.id,
                    name: zone.name,
                    subsidiary_id,
                    subsidiary_name: subsidiary_name.clone(),
                    refined,
                });
            }
        }

        zones.sort_by(|a, b| {
            (a.subsidiary_id, &a.name, a.zone_id).cmp(&(b.subsidiary_id, &b.name, b.zone_id))
        });

        Ok(ResolutionResult {
            address: geocoded.display_name.clone(),
            coordinate: geocoded.point,
            covered: !zones.is_empty(),
            zones,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::streets::StreetRange;
    use crate::zones::store::testing::MemoryStore;
    use crate::zones::types::{CoverageZone, Subsidiary};

    fn pt(lon: f64, lat: f64) -> Point {
        Point::new(lon, lat).unwrap()
    }

    struct StubGeocoder(GeocodedAddress);

    impl Geocoder for StubGeocoder {
        fn geocode(&self, _text: &str) -> Result<GeocodedAddress, GeocodeError> {
            Ok(self.0.clone())
        }
    }

    struct FailingGeocoder(fn(String) -> GeocodeError);

    impl Geocoder for FailingGeocoder {
        fn geocode(&self, text: &str) -> Result<GeocodedAddress, GeocodeError> {
            Err((self.0)(text.to_string()))
        }
    }

    fn geocoded_at(lon: f64, lat: f64, street: Option<&str>, number: Option<u32>) -> GeocodedAddress {
        GeocodedAddress {
            point: pt(lon, lat),
            display_name: "Av. Corrientes 500, CABA, Argentina".into(),
            street: street.map(String::from),
            house_number: number,
        }
    }

    fn subsidiary(id: i64, name: &str) -> Subsidiary {
        Subsidiary {
            id,
            name: name.into(),
            address: String::new(),
            coordinate: None,
            city: None,
            phones: vec![],
            partner_id: None,
            active: true,
        }
    }

    fn centro_polygon() -> Polygon {
        Polygon::new(vec![
            pt(-58.3816, -34.6037),
            pt(-58.3750, -34.6000),
            pt(-58.3750, -34.5950),
            pt(-58.3850, -34.5950),
        ])
        .unwrap()
    }

    fn centro_zone(streets: Vec<StreetRange>) -> CoverageZone {
        CoverageZone {
            id: 7,
            subsidiary_id: 1,
            name: "Centro".into(),
            polygon: centro_polygon(),
            active: true,
            created_at: None,
            streets,
        }
    }

    fn store_with(zones: Vec<CoverageZone>) -> MemoryStore {
        MemoryStore::new(vec![subsidiary(1, "Sucursal Centro")], zones)
    }

    #[test]
    fn test_covered_without_street_ranges() {
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, None, None)),
            store_with(vec![centro_zone(vec![])]),
        );

        let result = engine.resolve("Av. Corrientes 500", None, &Forwarded::none()).unwrap();
        assert!(result.covered);
        assert_eq!(result.zones.len(), 1);
        assert_eq!(result.zones[0].name, "Centro");
        assert_eq!(result.zones[0].subsidiary_id, 1);
        assert_eq!(result.zones[0].subsidiary_name, "Sucursal Centro");
        assert!(!result.zones[0].refined);
    }

    #[test]
    fn test_outside_polygon_is_not_covered() {
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.4200, -34.5980, None, None)),
            store_with(vec![centro_zone(vec![])]),
        );

        let result = engine.resolve("far away", None, &Forwarded::none()).unwrap();
        assert!(!result.covered);
        assert!(result.zones.is_empty());
    }

    #[test]
    fn test_street_range_refines_out() {
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, Some("Av. Corrientes"), Some(5000))),
            store_with(vec![centro_zone(vec![StreetRange::new("Av. Corrientes", 100, 2000)])]),
        );

        let result = engine
            .resolve("Av. Corrientes 5000", None, &Forwarded::none())
            .unwrap();
        assert!(!result.covered);
        assert!(result.zones.is_empty());
    }

    #[test]
    fn test_street_range_positive_match() {
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, Some("Av. Corrientes"), Some(500))),
            store_with(vec![centro_zone(vec![StreetRange::new("Av. Corrientes", 100, 2000)])]),
        );

        let result = engine
            .resolve("Av. Corrientes 500", None, &Forwarded::none())
            .unwrap();
        assert!(result.covered);
        assert_eq!(result.zones.len(), 1);
        assert!(result.zones[0].refined);
    }

    #[test]
    fn test_missing_house_number_is_conservative() {
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, Some("Av. Corrientes"), None)),
            store_with(vec![centro_zone(vec![StreetRange::new("Av. Corrientes", 100, 2000)])]),
        );

        let result = engine.resolve("Av. Corrientes", None, &Forwarded::none()).unwrap();
        assert!(result.covered);
        assert!(!result.zones[0].refined);
    }

    #[test]
    fn test_inactive_zone_skipped() {
        let mut zone = centro_zone(vec![]);
        zone.active = false;
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, None, None)),
            store_with(vec![zone]),
        );

        let result = engine.resolve("anywhere", None, &Forwarded::none()).unwrap();
        assert!(!result.covered);
    }

    #[test]
    fn test_inactive_subsidiary_skipped_when_unscoped() {
        let mut sub = subsidiary(1, "Sucursal Centro");
        sub.active = false;
        let store = MemoryStore::new(vec![sub], vec![centro_zone(vec![])]);
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, None, None)),
            store,
        );

        let result = engine.resolve("anywhere", None, &Forwarded::none()).unwrap();
        assert!(!result.covered);
    }

    #[test]
    fn test_scoped_query_restricts_subsidiary() {
        let mut other = centro_zone(vec![]);
        other.id = 8;
        other.subsidiary_id = 2;
        other.name = "Centro Oeste".into();
        let store = MemoryStore::new(
            vec![subsidiary(1, "Sucursal Centro"), subsidiary(2, "Sucursal Oeste")],
            vec![centro_zone(vec![]), other],
        );
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, None, None)),
            store,
        );

        let result = engine.resolve("anywhere", Some(2), &Forwarded::none()).unwrap();
        assert_eq!(result.zones.len(), 1);
        assert_eq!(result.zones[0].subsidiary_id, 2);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        // Inserted deliberately out of order: the result must come back
        // sorted by subsidiary id, then zone name.
        let mk = |id: i64, subsidiary_id: i64, name: &str| {
            let mut z = centro_zone(vec![]);
            z.id = id;
            z.subsidiary_id = subsidiary_id;
            z.name = name.into();
            z
        };
        let store = MemoryStore::new(
            vec![subsidiary(1, "Sucursal Centro"), subsidiary(2, "Sucursal Oeste")],
            vec![mk(30, 2, "Beta"), mk(10, 1, "Zeta"), mk(20, 1, "Alfa")],
        );
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, None, None)),
            store,
        );

        let result = engine.resolve("anywhere", None, &Forwarded::none()).unwrap();
        let order: Vec<(i64, &str)> = result
            .zones
            .iter()
            .map(|z| (z.subsidiary_id, z.name.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "Alfa"), (1, "Zeta"), (2, "Beta")]);
    }

    #[test]
    fn test_geocode_not_found_propagates() {
        let engine = ResolutionEngine::new(
            FailingGeocoder(GeocodeError::NotFound),
            store_with(vec![]),
        );

        let err = engine.resolve("nowhere 123", None, &Forwarded::none()).unwrap_err();
        assert!(matches!(err, ResolveError::Geocode(GeocodeError::NotFound(_))));
    }

    #[test]
    fn test_provider_error_propagates_distinctly() {
        let engine = ResolutionEngine::new(
            FailingGeocoder(GeocodeError::Provider),
            store_with(vec![]),
        );

        let err = engine.resolve("anywhere", None, &Forwarded::none()).unwrap_err();
        assert!(matches!(err, ResolveError::Geocode(GeocodeError::Provider(_))));
    }

    #[test]
    fn test_store_error_propagates() {
        let store = MemoryStore {
            fail_with: Some(StoreError::Remote("boom".into())),
            ..Default::default()
        };
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3800, -34.5980, None, None)),
            store,
        );

        let err = engine.resolve("anywhere", None, &Forwarded::none()).unwrap_err();
        assert!(matches!(err, ResolveError::Store(StoreError::Remote(_))));
    }

    #[test]
    fn test_boundary_point_is_covered() {
        // Geocoded exactly onto the zone's eastern edge.
        let engine = ResolutionEngine::new(
            StubGeocoder(geocoded_at(-58.3750, -34.5975, None, None)),
            store_with(vec![centro_zone(vec![])]),
        );

        let result = engine.resolve("on the line", None, &Forwarded::none()).unwrap();
        assert!(result.covered);
    }
}
