//! Client for the authoritative subsidiary/zone API.
//!
//! The remote store is the source of truth for every write decision. It
//! speaks the partner's wire format: Spanish field names, polygon vertices
//! as `[lat, lon]` pair arrays (sometimes JSON-encoded into a string), and
//! a save endpoint that upserts a zone wholesale by (subsidiary, name).
//! This module owns the translation into the engine's canonical types;
//! internal axis order is (lon, lat) from here on in.

use super::store::ZoneStore;
use super::types::{CoverageZone, Forwarded, StoreError, Subsidiary, ZoneDraft};
use crate::config::Config;
use crate::geometry::{Point, Polygon};
use crate::streets::StreetRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SUBSIDIARY_LIST_ENDPOINT: &str = "/internalapi/SubsidiaryList/1";
const ZONE_LIST_ENDPOINT: &str = "/internalapi/GetZonasCobertura";
const SAVE_ZONE_ENDPOINT: &str = "/internalapi/GuardarZonaCobertura";
const DELETE_ZONE_ENDPOINT: &str = "/internalapi/EliminarZonaCobertura";

#[derive(Clone)]
pub struct RemoteStore {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl RemoteStore {
    pub fn new(cfg: &Config) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(cfg.remote_timeout).build(),
            base_url: cfg.remote_base_url.trim_end_matches('/').to_string(),
            token: cfg.remote_token.clone(),
        }
    }

    fn request(&self, method: &str, endpoint: &str, fwd: &Forwarded) -> ureq::Request {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut req = self
            .agent
            .request(method, &url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/json");
        for (name, value) in fwd.iter() {
            req = req.set(name, value);
        }
        req
    }

    fn fetch_zone(&self, zone_id: i64, fwd: &Forwarded) -> Result<CoverageZone, StoreError> {
        // The remote API addresses zones by (subsidiary, name) only, so an
        // id lookup sweeps the subsidiary listings.
        for subsidiary in self.list_subsidiaries(fwd)? {
            if let Some(zone) = self
                .list_zones(subsidiary.id, fwd)?
                .into_iter()
                .find(|z| z.id == zone_id)
            {
                return Ok(zone);
            }
        }
        Err(StoreError::NotFound(format!("no zone with id {}", zone_id)))
    }
}

impl ZoneStore for RemoteStore {
    fn list_subsidiaries(&self, fwd: &Forwarded) -> Result<Vec<Subsidiary>, StoreError> {
        let response = self
            .request("GET", SUBSIDIARY_LIST_ENDPOINT, fwd)
            .call()
            .map_err(http_error)?;
        let wire: Vec<WireSubsidiary> = response
            .into_json()
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        Ok(wire.into_iter().map(Subsidiary::from).collect())
    }

    fn list_zones(&self, subsidiary_id: i64, fwd: &Forwarded) -> Result<Vec<CoverageZone>, StoreError> {
        let endpoint = format!("{}/{}", ZONE_LIST_ENDPOINT, subsidiary_id);
        let response = self.request("GET", &endpoint, fwd).call().map_err(http_error)?;
        let wire: WireZoneList = response
            .into_json()
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        wire.zones
            .into_iter()
            .map(|z| z.into_zone(subsidiary_id))
            .collect()
    }

    fn create_zone(&mut self, draft: &ZoneDraft, fwd: &Forwarded) -> Result<CoverageZone, StoreError> {
        let polygon = draft.validate()?;
        let payload = WireZonePayload::from_parts(
            draft.subsidiary_id,
            &draft.name,
            &polygon,
            draft.active,
            &draft.streets,
        );

        let response = self
            .request("POST", SAVE_ZONE_ENDPOINT, fwd)
            .set("Content-Type", "application/json")
            .send_json(&payload)
            .map_err(|e| match e {
                ureq::Error::Status(409, _) => StoreError::Conflict {
                    subsidiary_id: draft.subsidiary_id,
                    name: draft.name.clone(),
                },
                other => http_error(other),
            })?;

        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        let id = body
            .get("zonaId")
            .or_else(|| body.get("id"))
            .and_then(|v| v.as_i64())
            .ok_or_else(|| StoreError::InvalidResponse("save response carries no zone id".into()))?;
        let created_at = body
            .get("fechaCreacion")
            .and_then(|v| v.as_str())
            .and_then(parse_created_at);

        draft.clone().into_zone(id, created_at)
    }

    fn delete_zone(&mut self, subsidiary_id: i64, name: &str, fwd: &Forwarded) -> Result<(), StoreError> {
        let endpoint = format!(
            "{}/{}/{}",
            DELETE_ZONE_ENDPOINT,
            subsidiary_id,
            urlencode_path(name)
        );
        self.request("DELETE", &endpoint, fwd)
            .call()
            .map(|_| ())
            .map_err(|e| match e {
                ureq::Error::Status(404, _) => StoreError::NotFound(format!(
                    "no active zone '{}' for subsidiary {}",
                    name, subsidiary_id
                )),
                other => http_error(other),
            })
    }

    fn replace_street_ranges(
        &mut self,
        zone_id: i64,
        ranges: &[StreetRange],
        fwd: &Forwarded,
    ) -> Result<(), StoreError> {
        for range in ranges {
            if !range.is_valid() {
                return Err(StoreError::Validation(format!("invalid street range '{}'", range)));
            }
        }
        // No ranged-update endpoint exists upstream; the save endpoint
        // upserts the zone wholesale, so re-save it with the new set.
        let zone = self.fetch_zone(zone_id, fwd)?;
        let payload = WireZonePayload::from_parts(
            zone.subsidiary_id,
            &zone.name,
            &zone.polygon,
            zone.active,
            ranges,
        );
        self.request("POST", SAVE_ZONE_ENDPOINT, fwd)
            .set("Content-Type", "application/json")
            .send_json(&payload)
            .map(|_| ())
            .map_err(http_error)
    }
}

fn http_error(e: ureq::Error) -> StoreError {
    match e {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            match code {
                400 => StoreError::Validation(body),
                404 => StoreError::NotFound(body),
                _ => StoreError::Remote(format!("HTTP {}: {}", code, body)),
            }
        }
        ureq::Error::Transport(t) => StoreError::Remote(t.to_string()),
    }
}

/// Percent-encode a path segment (zone names carry spaces and accents).
fn urlencode_path(s: &str) -> String {
    s.chars()
        .map(|c| match c {
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

fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

// ─── Wire format ────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct WireSubsidiary {
    #[serde(rename = "sucursalId")]
    id: i64,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(rename = "direccion", default)]
    address: String,
    #[serde(rename = "latitud", default)]
    lat: Option<f64>,
    #[serde(rename = "longitud", default)]
    lon: Option<f64>,
    #[serde(rename = "ciudad", default)]
    city: Option<String>,
    #[serde(rename = "telefonos", default)]
    phones: Option<WirePhones>,
    #[serde(rename = "pedidosYaClienteID", default)]
    partner_id: Option<i64>,
    #[serde(rename = "activa", default = "default_true")]
    active: bool,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum WirePhones {
    Text(String),
    List(Vec<String>),
}

fn default_true() -> bool {
    true
}

impl From<WireSubsidiary> for Subsidiary {
    fn from(w: WireSubsidiary) -> Self {
        let coordinate = match (w.lon, w.lat) {
            (Some(lon), Some(lat)) => Point::new(lon, lat).ok(),
            _ => None,
        };
        let phones = match w.phones {
            Some(WirePhones::Text(s)) => s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            Some(WirePhones::List(list)) => list,
            None => vec![],
        };
        Subsidiary {
            id: w.id,
            name: w.name,
            address: w.address,
            coordinate,
            city: w.city,
            phones,
            partner_id: w.partner_id,
            active: w.active,
        }
    }
}

#[derive(Deserialize, Debug)]
struct WireZoneList {
    #[serde(rename = "zonasCobertura", default)]
    zones: Vec<WireZone>,
}

#[derive(Deserialize, Debug)]
struct WireZone {
    #[serde(rename = "zonaId")]
    id: i64,
    #[serde(rename = "nombreZona")]
    name: String,
    #[serde(rename = "poligonoCoordenadas")]
    coords: WireCoords,
    #[serde(rename = "fechaCreacion", default)]
    created_at: Option<String>,
    #[serde(rename = "activa", default = "default_true")]
    active: bool,
    #[serde(rename = "calles", default)]
    streets: Vec<StreetRange>,
}

/// Polygon vertices on the wire: `[lat, lon]` pair arrays, which some
/// upstream call sites double-encode into a JSON string.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum WireCoords {
    Pairs(Vec<[f64; 2]>),
    Encoded(String),
}

impl WireZone {
    fn into_zone(self, subsidiary_id: i64) -> Result<CoverageZone, StoreError> {
        let polygon = decode_polygon(&self.coords).map_err(|e| {
            StoreError::InvalidResponse(format!("zone '{}': {}", self.name, e))
        })?;
        let created_at = self.created_at.as_deref().and_then(parse_created_at);
        Ok(CoverageZone {
            id: self.id,
            subsidiary_id,
            name: self.name,
            polygon,
            active: self.active,
            created_at,
            streets: self.streets,
        })
    }
}

fn decode_polygon(coords: &WireCoords) -> Result<Polygon, StoreError> {
    let pairs: Vec<[f64; 2]> = match coords {
        WireCoords::Pairs(pairs) => pairs.clone(),
        WireCoords::Encoded(s) => serde_json::from_str(s)
            .map_err(|e| StoreError::InvalidResponse(format!("bad coordinate string: {}", e)))?,
    };
    let points = pairs
        .iter()
        .map(|[lat, lon]| Point::new(*lon, *lat))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(points)?)
}

fn encode_polygon(polygon: &Polygon) -> Vec<[f64; 2]> {
    polygon.points().iter().map(|p| [p.lat, p.lon]).collect()
}

#[derive(Serialize, Debug)]
struct WireZonePayload {
    #[serde(rename = "sucursalId")]
    subsidiary_id: i64,
    #[serde(rename = "nombreZona")]
    name: String,
    #[serde(rename = "poligonoCoordenadas")]
    coords: Vec<[f64; 2]>,
    #[serde(rename = "activa")]
    active: bool,
    #[serde(rename = "calles")]
    streets: Vec<StreetRange>,
}

impl WireZonePayload {
    fn from_parts(
        subsidiary_id: i64,
        name: &str,
        polygon: &Polygon,
        active: bool,
        streets: &[StreetRange],
    ) -> Self {
        Self {
            subsidiary_id,
            name: name.to_string(),
            coords: encode_polygon(polygon),
            active,
            streets: streets.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_polygon_pairs() {
        // Wire order is [lat, lon]; canonical order is (lon, lat).
        let coords = WireCoords::Pairs(vec![
            [-34.6037, -58.3816],
            [-34.6000, -58.3750],
            [-34.5950, -58.3750],
            [-34.5950, -58.3850],
        ]);
        let polygon = decode_polygon(&coords).unwrap();
        let first = polygon.points()[0];
        assert!((first.lon - -58.3816).abs() < 1e-9);
        assert!((first.lat - -34.6037).abs() < 1e-9);
    }

    #[test]
    fn test_decode_polygon_json_string() {
        let coords = WireCoords::Encoded(
            "[[-34.6037,-58.3816],[-34.6,-58.375],[-34.595,-58.375],[-34.595,-58.385]]".into(),
        );
        let polygon = decode_polygon(&coords).unwrap();
        assert_eq!(polygon.vertex_count(), 4);
    }

    #[test]
    fn test_decode_polygon_rejects_garbage_string() {
        let coords = WireCoords::Encoded("not json".into());
        assert!(matches!(
            decode_polygon(&coords),
            Err(StoreError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_decode_degenerate_polygon_rejected() {
        let coords = WireCoords::Pairs(vec![[-34.6, -58.38], [-34.6, -58.37]]);
        assert!(matches!(decode_polygon(&coords), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_encode_polygon_wire_order() {
        let polygon = Polygon::new(vec![
            Point::new(-58.3816, -34.6037).unwrap(),
            Point::new(-58.3750, -34.6000).unwrap(),
            Point::new(-58.3850, -34.5950).unwrap(),
        ])
        .unwrap();
        let pairs = encode_polygon(&polygon);
        assert_eq!(pairs[0], [-34.6037, -58.3816]);
    }

    #[test]
    fn test_wire_zone_list_decodes() {
        let json = r#"{
            "zonasCobertura": [{
                "zonaId": 7,
                "nombreZona": "Centro",
                "poligonoCoordenadas": [[-34.6037,-58.3816],[-34.6,-58.375],[-34.595,-58.375],[-34.595,-58.385]],
                "fechaCreacion": "2026-03-01T12:00:00Z",
                "activa": true,
                "calles": [{"nombreCalle": "Av. Corrientes", "alturaDesde": 100, "alturaHasta": 2000}]
            }]
        }"#;
        let wire: WireZoneList = serde_json::from_str(json).unwrap();
        let zone = wire.zones.into_iter().next().unwrap().into_zone(1).unwrap();
        assert_eq!(zone.id, 7);
        assert_eq!(zone.subsidiary_id, 1);
        assert_eq!(zone.streets.len(), 1);
        assert!(zone.created_at.is_some());
    }

    #[test]
    fn test_wire_zone_list_empty_body() {
        let wire: WireZoneList = serde_json::from_str("{}").unwrap();
        assert!(wire.zones.is_empty());
    }

    #[test]
    fn test_wire_subsidiary_decodes() {
        let json = r#"{
            "sucursalId": 3,
            "nombre": "Sucursal Palermo",
            "direccion": "Av. Santa Fe 4567, CABA",
            "latitud": -34.5889,
            "longitud": -58.3974,
            "ciudad": "CABA",
            "telefonos": "11-4000-0000, 11-4000-0001",
            "pedidosYaClienteID": 77
        }"#;
        let sub = Subsidiary::from(serde_json::from_str::<WireSubsidiary>(json).unwrap());
        assert_eq!(sub.id, 3);
        assert_eq!(sub.phones.len(), 2);
        assert_eq!(sub.partner_id, Some(77));
        let coord = sub.coordinate.unwrap();
        assert!((coord.lon - -58.3974).abs() < 1e-9);
        assert!(sub.active);
    }

    #[test]
    fn test_save_payload_shape() {
        let polygon = Polygon::new(vec![
            Point::new(-58.3816, -34.6037).unwrap(),
            Point::new(-58.3750, -34.6000).unwrap(),
            Point::new(-58.3850, -34.5950).unwrap(),
        ])
        .unwrap();
        let payload = WireZonePayload::from_parts(
            1,
            "Centro",
            &polygon,
            true,
            &[StreetRange::new("Av. Callao", 100, 1500)],
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["sucursalId"], 1);
        assert_eq!(json["nombreZona"], "Centro");
        assert_eq!(json["poligonoCoordenadas"][0][0], -34.6037);
        assert_eq!(json["calles"][0]["nombreCalle"], "Av. Callao");
    }

    #[test]
    fn test_urlencode_path() {
        assert_eq!(urlencode_path("Centro Norte"), "Centro%20Norte");
        assert_eq!(urlencode_path("Nuñez"), "Nu%C3%B1ez");
    }
}
