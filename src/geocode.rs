//! Address geocoding via a Nominatim-compatible provider.
//!
//! The engine trusts whatever coordinate the provider returns; accuracy is
//! the provider's problem. What matters here is the error split: an address
//! the provider does not know (`NotFound`) is final, while a provider-side
//! failure (`Provider`) is transient and worth retrying.

use crate::config::Config;
use crate::geometry::Point;
use serde::Deserialize;
use std::fmt;

/// A geocoded address: coordinate, canonical display string, and the
/// (street, house number) decomposition when one could be extracted.
#[derive(Debug, Clone)]
pub struct GeocodedAddress {
    pub point: Point,
    pub display_name: String,
    pub street: Option<String>,
    pub house_number: Option<u32>,
}

impl GeocodedAddress {
    /// The decomposition as the refinement step wants it.
    pub fn street_and_number(&self) -> Option<(&str, u32)> {
        match (&self.street, self.house_number) {
            (Some(street), Some(number)) => Some((street.as_str(), number)),
            _ => None,
        }
    }
}

/// Geocoding errors. `NotFound` is terminal; `Provider` may be retried.
#[derive(Debug)]
pub enum GeocodeError {
    NotFound(String),
    Provider(String),
    InvalidResponse(String),
}

impl fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(q) => write!(f, "Address not found: '{}'", q),
            Self::Provider(msg) => write!(f, "Geocoder error: {}", msg),
            Self::InvalidResponse(msg) => write!(f, "Invalid geocoder response: {}", msg),
        }
    }
}

impl std::error::Error for GeocodeError {}

/// The geocoding collaborator contract.
pub trait Geocoder {
    fn geocode(&self, text: &str) -> Result<GeocodedAddress, GeocodeError>;
}

// ─── Nominatim provider ─────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Deserialize, Debug)]
struct NominatimAddress {
    #[serde(default)]
    road: Option<String>,
    #[serde(default)]
    house_number: Option<String>,
}

pub struct NominatimGeocoder {
    agent: ureq::Agent,
    base_url: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(cfg: &Config) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(cfg.geocoder_timeout).build(),
            base_url: cfg.geocoder_base_url.trim_end_matches('/').to_string(),
            user_agent: cfg.geocoder_user_agent.clone(),
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, text: &str) -> Result<GeocodedAddress, GeocodeError> {
        let url = format!(
            "{}/search?q={}&format=json&limit=1&addressdetails=1",
            self.base_url,
            urlencode(text),
        );

        let response = self
            .agent
            .get(&url)
            .set("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| GeocodeError::Provider(e.to_string()))?;

        let results: Vec<NominatimResult> = response
            .into_json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        let top = results
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(text.to_string()))?;

        let lat: f64 = top
            .lat
            .parse()
            .map_err(|_| GeocodeError::InvalidResponse(format!("bad latitude '{}'", top.lat)))?;
        let lon: f64 = top
            .lon
            .parse()
            .map_err(|_| GeocodeError::InvalidResponse(format!("bad longitude '{}'", top.lon)))?;
        let point = Point::new(lon, lat)
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        // Prefer the provider's decomposition; fall back to parsing the
        // query text ("Av. Corrientes 1234, CABA" style).
        let (mut street, mut house_number) = match top.address {
            Some(addr) => (addr.road, addr.house_number.as_deref().and_then(parse_house_number)),
            None => (None, None),
        };
        if street.is_none() || house_number.is_none() {
            let (parsed_street, parsed_number) = decompose_query(text);
            if street.is_none() {
                street = parsed_street;
            }
            if house_number.is_none() {
                house_number = parsed_number;
            }
        }

        Ok(GeocodedAddress {
            point,
            display_name: top.display_name,
            street,
            house_number,
        })
    }
}

/// Extract (street, house number) from free-form address text.
///
/// Takes the segment before the first comma and splits a trailing integer
/// token off as the house number: "Av. Corrientes 1234, CABA" →
/// ("Av. Corrientes", 1234). Returns None components when the shape
/// doesn't fit.
pub fn decompose_query(text: &str) -> (Option<String>, Option<u32>) {
    let first_segment = text.split(',').next().unwrap_or("").trim();
    if first_segment.is_empty() {
        return (None, None);
    }

    let mut tokens: Vec<&str> = first_segment.split_whitespace().collect();
    let number = tokens.last().and_then(|t| parse_house_number(t));
    if number.is_some() {
        tokens.pop();
    }
    let street = if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    };
    (street, number)
}

/// Parse a house number token, tolerating suffixes like "1234-1236" or
/// "1234bis" by taking the leading digits.
fn parse_house_number(token: &str) -> Option<u32> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

// ─── URL encoding (minimal, no extra dep) ───────────────────────

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '&' => "%26".to_string(),
            '=' => "%3D".to_string(),
            '+' => "%2B".to_string(),
            ',' => "%2C".to_string(),
            _ if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '~' => {
                c.to_string()
            }
            _ => {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{:02X}", b))
                    .collect()
            }
        })
        .collect()
}
