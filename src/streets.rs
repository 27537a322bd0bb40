//! Per-street house-number refinements.
//!
//! A zone's polygon is coarse: the shape a dispatcher draws on a map. When a
//! zone carries street ranges, only addresses whose street and house number
//! fall inside one of the ranges are actually served. Street names compare
//! case-insensitively after accent stripping, so "Av. Córdoba" and
//! "AV. CORDOBA" are the same street.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A covered house-number interval on a named street, scoped to one zone.
///
/// Wire names follow the authoritative API (`nombreCalle`, `alturaDesde`,
/// `alturaHasta`). The full set for a zone is always replaced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetRange {
    #[serde(rename = "nombreCalle")]
    pub street: String,
    #[serde(rename = "alturaDesde")]
    pub number_from: u32,
    #[serde(rename = "alturaHasta")]
    pub number_to: u32,
}

impl StreetRange {
    pub fn new(street: impl Into<String>, number_from: u32, number_to: u32) -> Self {
        Self { street: street.into(), number_from, number_to }
    }

    /// True when the interval is well-formed and the street is named.
    pub fn is_valid(&self) -> bool {
        !self.street.trim().is_empty() && self.number_from <= self.number_to
    }

    /// Does (street, number) fall inside this range?
    pub fn matches(&self, street: &str, number: u32) -> bool {
        normalize_street_name(&self.street) == normalize_street_name(street)
            && (self.number_from..=self.number_to).contains(&number)
    }
}

impl fmt::Display for StreetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{}", self.street, self.number_from, self.number_to)
    }
}

/// Verdict for one candidate zone that already passed polygon containment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refinement {
    /// Zone covers the address. `refined` is true when a street range
    /// positively matched, false when the zone has no ranges at all.
    Covers { refined: bool },
    /// The zone has ranges and none matched: polygon-only hit, excluded.
    RefinedOut,
    /// The zone has ranges but no house number could be parsed from the
    /// address. Conservatively still covering, flagged unrefined.
    Unrefined,
}

/// Apply a zone's street ranges to an optional (street, number) pair.
pub fn refine(ranges: &[StreetRange], address: Option<(&str, u32)>) -> Refinement {
    if ranges.is_empty() {
        return Refinement::Covers { refined: false };
    }
    match address {
        Some((street, number)) => {
            if ranges.iter().any(|r| r.matches(street, number)) {
                Refinement::Covers { refined: true }
            } else {
                Refinement::RefinedOut
            }
        }
        None => Refinement::Unrefined,
    }
}

/// Lowercase, strip common diacritics, collapse whitespace.
pub fn normalize_street_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['á', 'à', 'â', 'ã'], "a")
        .replace(['é', 'è', 'ê'], "e")
        .replace(['í', 'ì', 'î'], "i")
        .replace(['ó', 'ò', 'ô', 'õ'], "o")
        .replace(['ú', 'ù', 'û', 'ü'], "u")
        .replace('ñ', "n")
        .replace('ç', "c")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_street_name("Av. Córdoba"), "av. cordoba");
        assert_eq!(normalize_street_name("AV.  SANTA   FE "), "av. santa fe");
        assert_eq!(normalize_street_name("Ñuñoa"), "nunoa");
    }

    #[test]
    fn test_range_matches() {
        let r = StreetRange::new("Av. Corrientes", 100, 2000);
        assert!(r.matches("av. corrientes", 100));
        assert!(r.matches("AV. CORRIENTES", 2000));
        assert!(r.matches("Av. Corrientes", 1234));
        assert!(!r.matches("Av. Corrientes", 99));
        assert!(!r.matches("Av. Corrientes", 2001));
        assert!(!r.matches("Av. Callao", 500));
    }

    #[test]
    fn test_range_accent_insensitive() {
        let r = StreetRange::new("Av. Córdoba", 200, 2500);
        assert!(r.matches("Av. Cordoba", 300));
    }

    #[test]
    fn test_range_validity() {
        assert!(StreetRange::new("Av. Monroe", 100, 2000).is_valid());
        assert!(!StreetRange::new("Av. Monroe", 2000, 100).is_valid());
        assert!(!StreetRange::new("   ", 100, 200).is_valid());
    }

    #[test]
    fn test_refine_no_ranges() {
        assert_eq!(refine(&[], Some(("Av. Corrientes", 500))), Refinement::Covers { refined: false });
        assert_eq!(refine(&[], None), Refinement::Covers { refined: false });
    }

    #[test]
    fn test_refine_positive_match() {
        let ranges = vec![
            StreetRange::new("Av. Corrientes", 100, 2000),
            StreetRange::new("Av. Callao", 100, 1500),
        ];
        assert_eq!(
            refine(&ranges, Some(("Av. Corrientes", 500))),
            Refinement::Covers { refined: true }
        );
    }

    #[test]
    fn test_refine_out() {
        let ranges = vec![StreetRange::new("Av. Corrientes", 100, 2000)];
        assert_eq!(refine(&ranges, Some(("Av. Corrientes", 5000))), Refinement::RefinedOut);
        assert_eq!(refine(&ranges, Some(("Av. Callao", 500))), Refinement::RefinedOut);
    }

    #[test]
    fn test_refine_no_number_is_conservative() {
        let ranges = vec![StreetRange::new("Av. Corrientes", 100, 2000)];
        assert_eq!(refine(&ranges, None), Refinement::Unrefined);
    }

    #[test]
    fn test_wire_names() {
        let r = StreetRange::new("Av. Cabildo", 1000, 3000);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("nombreCalle"));
        assert!(json.contains("alturaDesde"));
        assert!(json.contains("alturaHasta"));
        let back: StreetRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
