//! Runtime configuration, read from the environment with development defaults.
//!
//! Everything the engine needs to talk to the outside world lives here: the
//! authoritative API endpoint and credential, the geocoder endpoint, the
//! local cache path, and the service limits enforced at zone creation.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the authoritative subsidiary/zone API.
    pub remote_base_url: String,
    /// Bearer credential for the authoritative API.
    pub remote_token: String,
    /// Timeout for authoritative API calls.
    pub remote_timeout: Duration,
    /// Base URL of the Nominatim-compatible geocoder.
    pub geocoder_base_url: String,
    /// User-Agent sent to the geocoder (Nominatim requires one).
    pub geocoder_user_agent: String,
    /// Timeout for geocoder calls.
    pub geocoder_timeout: Duration,
    /// Path of the local zone cache file.
    pub cache_path: PathBuf,
    /// Maximum vertices per zone polygon.
    pub max_polygon_points: usize,
    /// Maximum active zones per subsidiary.
    pub max_zones_per_subsidiary: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_base_url: "http://localhost:5064".into(),
            remote_token: String::new(),
            remote_timeout: Duration::from_secs(30),
            geocoder_base_url: "https://nominatim.openstreetmap.org".into(),
            geocoder_user_agent: "Zonda/0.4 (coverage-zone-engine)".into(),
            geocoder_timeout: Duration::from_secs(10),
            cache_path: default_cache_path(),
            max_polygon_points: 100,
            max_zones_per_subsidiary: 10,
        }
    }
}

impl Config {
    /// Build a config from `ZONDA_*` environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            remote_base_url: env_string("ZONDA_API_BASE_URL", d.remote_base_url),
            remote_token: env_string("ZONDA_API_TOKEN", d.remote_token),
            remote_timeout: env_secs("ZONDA_API_TIMEOUT", d.remote_timeout),
            geocoder_base_url: env_string("ZONDA_GEOCODER_URL", d.geocoder_base_url),
            geocoder_user_agent: env_string("ZONDA_USER_AGENT", d.geocoder_user_agent),
            geocoder_timeout: env_secs("ZONDA_GEOCODER_TIMEOUT", d.geocoder_timeout),
            cache_path: env::var("ZONDA_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.cache_path),
            max_polygon_points: env_usize("ZONDA_MAX_POLYGON_POINTS", d.max_polygon_points),
            max_zones_per_subsidiary: env_usize(
                "ZONDA_MAX_ZONES_PER_SUBSIDIARY",
                d.max_zones_per_subsidiary,
            ),
        }
    }
}

fn default_cache_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".zonda")
        .join("zones.json")
}

fn env_string(key: &str, fallback: String) -> String {
    env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(fallback)
}

fn env_secs(key: &str, fallback: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn env_usize(key: &str, fallback: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(fallback)
}
