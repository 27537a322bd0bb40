use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use zonda::config::Config;
use zonda::geocode::{Geocoder, NominatimGeocoder};
use zonda::resolve::ResolutionEngine;
use zonda::streets::StreetRange;
use zonda::zones::{
    shared, Forwarded, RemoteStore, SyncCoordinator, ZoneCache, ZoneDraft, ZoneStore,
};

/// Zonda — delivery coverage zone engine
///
/// Resolves street addresses against subsidiary coverage polygons and keeps
/// the local zone cache synchronized with the authoritative store.
///
/// Examples:
///   zonda resolve "Av. Corrientes 1234, CABA"
///   zonda resolve "Av. Corrientes 1234" --subsidiary 1
///   zonda zones 1
///   zonda create zone.json
///   zonda delete --subsidiary 1 --name "Centro"
///   zonda sync
///   zonda serve --port 8080
#[derive(Parser)]
#[command(name = "zonda", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve an address against the coverage zones.
    Resolve {
        /// Free-text street address.
        address: String,
        /// Restrict the query to one subsidiary.
        #[arg(long)]
        subsidiary: Option<i64>,
        /// Query the authoritative store instead of the local cache.
        #[arg(long)]
        remote: bool,
    },
    /// Geocode an address without checking coverage.
    Geocode {
        address: String,
    },
    /// List subsidiaries from the authoritative store.
    Subsidiaries,
    /// List a subsidiary's zones.
    Zones {
        subsidiary_id: i64,
        /// Read the local cache instead of the authoritative store.
        #[arg(long)]
        cached: bool,
    },
    /// Create a zone from a JSON draft file.
    Create {
        /// JSON file: {subsidiary_id, name, points: [{lon, lat}, ...],
        /// streets: [{nombreCalle, alturaDesde, alturaHasta}, ...]}
        file: PathBuf,
    },
    /// Delete a zone by subsidiary and name.
    Delete {
        #[arg(long)]
        subsidiary: i64,
        #[arg(long)]
        name: String,
    },
    /// Replace a zone's street ranges from a JSON file.
    Streets {
        zone_id: i64,
        /// JSON array of {nombreCalle, alturaDesde, alturaHasta}.
        file: PathBuf,
    },
    /// Pull zones from the authoritative store into the local cache.
    Sync {
        /// Only this subsidiary; everything when omitted.
        subsidiary_id: Option<i64>,
    },
    /// Run the HTTP API server.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();
    let cfg = Config::from_env();

    match cli.command {
        Command::Resolve { address, subsidiary, remote } => {
            if remote {
                run_resolve(RemoteStore::new(&cfg), &cfg, &address, subsidiary);
            } else {
                let cache = shared(ZoneCache::load_from(cfg.cache_path.clone()));
                if cache.lock().unwrap().zone_count() == 0 {
                    eprintln!("  Note: local cache is empty; run 'zonda sync' first or pass --remote.");
                }
                run_resolve(cache, &cfg, &address, subsidiary);
            }
        }

        Command::Geocode { address } => {
            let geocoder = NominatimGeocoder::new(&cfg);
            let geocoded = geocoder.geocode(&address).unwrap_or_else(|e| bail(e));
            eprintln!("  {} -> {}", address, geocoded.display_name);
            print_json(&serde_json::json!({
                "address": geocoded.display_name,
                "coordinate": geocoded.point,
                "street": geocoded.street,
                "house_number": geocoded.house_number,
            }));
        }

        Command::Subsidiaries => {
            let remote = RemoteStore::new(&cfg);
            let list = remote
                .list_subsidiaries(&Forwarded::none())
                .unwrap_or_else(|e| bail(e));
            print_json(&list);
        }

        Command::Zones { subsidiary_id, cached } => {
            let zones = if cached {
                ZoneCache::load_from(cfg.cache_path.clone())
                    .list_zones(subsidiary_id, &Forwarded::none())
                    .unwrap_or_else(|e| bail(e))
            } else {
                RemoteStore::new(&cfg)
                    .list_zones(subsidiary_id, &Forwarded::none())
                    .unwrap_or_else(|e| bail(e))
            };
            print_json(&zones);
        }

        Command::Create { file } => {
            let draft: ZoneDraft = read_json(&file);
            let mut coordinator = make_coordinator(&cfg);
            let outcome = coordinator
                .create_zone(&draft, &Forwarded::none())
                .unwrap_or_else(|e| bail(e));
            if let Some(ref warning) = outcome.warning {
                eprintln!("  Warning: {}", warning);
            }
            eprintln!("  Zone '{}' created with id {}.", outcome.value.name, outcome.value.id);
            print_json(&outcome);
        }

        Command::Delete { subsidiary, name } => {
            let mut coordinator = make_coordinator(&cfg);
            let outcome = coordinator
                .delete_zone(subsidiary, &name, &Forwarded::none())
                .unwrap_or_else(|e| bail(e));
            if let Some(ref warning) = outcome.warning {
                eprintln!("  Warning: {}", warning);
            }
            eprintln!("  Zone '{}' deleted for subsidiary {}.", name, subsidiary);
        }

        Command::Streets { zone_id, file } => {
            let ranges: Vec<StreetRange> = read_json(&file);
            let mut coordinator = make_coordinator(&cfg);
            let outcome = coordinator
                .replace_street_ranges(zone_id, &ranges, &Forwarded::none())
                .unwrap_or_else(|e| bail(e));
            if let Some(ref warning) = outcome.warning {
                eprintln!("  Warning: {}", warning);
            }
            eprintln!("  Replaced {} street ranges on zone {}.", ranges.len(), zone_id);
        }

        Command::Sync { subsidiary_id } => {
            let mut coordinator = make_coordinator(&cfg);
            match subsidiary_id {
                Some(id) => {
                    let zones = coordinator
                        .refresh(id, &Forwarded::none())
                        .unwrap_or_else(|e| bail(e));
                    eprintln!("  Cached {} zones for subsidiary {}.", zones, id);
                }
                None => {
                    let summary = coordinator
                        .refresh_all(&Forwarded::none())
                        .unwrap_or_else(|e| bail(e));
                    eprintln!(
                        "  Cached {} zones across {} subsidiaries.",
                        summary.zones, summary.subsidiaries
                    );
                }
            }
        }

        Command::Serve { host, port } => {
            let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| bail(e));
            runtime.block_on(zonda::server::start(&cfg, &host, port));
        }
    }
}

fn run_resolve<S: ZoneStore>(store: S, cfg: &Config, address: &str, scope: Option<i64>) {
    let engine = ResolutionEngine::new(NominatimGeocoder::new(cfg), store);
    let result = engine
        .resolve(address, scope, &Forwarded::none())
        .unwrap_or_else(|e| bail(e));

    eprintln!("  {} -> {}", address, result.address);
    if result.covered {
        for zone in &result.zones {
            eprintln!(
                "  \u{2713} {} ({}){}",
                zone.name,
                zone.subsidiary_name,
                if zone.refined { " [street match]" } else { "" },
            );
        }
    } else {
        eprintln!("  \u{2717} No coverage.");
    }
    print_json(&result);
}

fn make_coordinator(cfg: &Config) -> SyncCoordinator<RemoteStore> {
    let cache = shared(ZoneCache::load_from(cfg.cache_path.clone()));
    SyncCoordinator::new(RemoteStore::new(cfg), cache, cfg)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> T {
    let data = fs::read_to_string(path).unwrap_or_else(|e| bail(format!("{}: {}", path.display(), e)));
    serde_json::from_str(&data).unwrap_or_else(|e| bail(format!("{}: {}", path.display(), e)))
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn bail(e: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1);
}
