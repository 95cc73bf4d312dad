//! tempokv - Snapshot Inspector
//!
//! This is the entry point for the `tempokv` command-line tool. It opens a
//! snapshot directory written by [`Store::persist`](tempokv::Store::persist)
//! and prints what the chosen snapshot pair contains.

use std::path::PathBuf;
use std::time::SystemTime;
use tempokv::snapshot;
use tempokv::{Entry, Tombstone};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Inspector configuration
struct Config {
    /// Directory holding the snapshot files
    dir: PathBuf,
    /// Snapshot sequence to open; the latest one if unset
    seq: Option<u64>,
    /// Print every key, not just the summary
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            seq: None,
            verbose: false,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--dir" | "-d" => {
                    if i + 1 < args.len() {
                        config.dir = PathBuf::from(&args[i + 1]);
                        i += 2;
                    } else {
                        eprintln!("Error: --dir requires a value");
                        std::process::exit(1);
                    }
                }
                "--seq" | "-s" => {
                    if i + 1 < args.len() {
                        config.seq = Some(args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid sequence number");
                            std::process::exit(1);
                        }));
                        i += 2;
                    } else {
                        eprintln!("Error: --seq requires a value");
                        std::process::exit(1);
                    }
                }
                "--verbose" => {
                    config.verbose = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("tempokv version {}", tempokv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }
}

fn print_help() {
    println!(
        r#"
tempokv - Snapshot Inspector

USAGE:
    tempokv [OPTIONS]

OPTIONS:
    -d, --dir <DIR>      Snapshot directory (default: .)
    -s, --seq <N>        Snapshot sequence to open (default: latest)
        --verbose        List every entry and tombstone
    -v, --version        Print version information
    -h, --help           Print this help message

EXAMPLES:
    tempokv --dir /var/lib/myapp             # Summarize the latest snapshot
    tempokv --dir /var/lib/myapp --seq 3     # Summarize persisted3 / expired3
    tempokv -d /var/lib/myapp --verbose      # List all keys
"#
    );
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // RUST_LOG wins over --verbose
    let level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let seq = match config.seq {
        Some(seq) => seq,
        None => match snapshot::latest_sequence(&config.dir)? {
            Some(seq) => seq,
            None => {
                warn!(dir = %config.dir.display(), "No snapshot found");
                return Ok(());
            }
        },
    };
    info!(dir = %config.dir.display(), seq = seq, "Opening snapshot");

    let entries = snapshot::read_entries(&config.dir, seq)?;
    let tombstones = match snapshot::read_tombstones(&config.dir, seq) {
        Ok(tombstones) => tombstones,
        Err(e) => {
            // An entries file without its tombstone partner is still worth showing.
            warn!(error = %e, "Could not read tombstone file");
            Default::default()
        }
    };

    let now = SystemTime::now();
    let expired = entries.values().filter(|e| e.is_expired_at(now)).count();
    let auto_cleaned = tombstones.values().filter(|t| t.auto_cleaned).count();

    println!("snapshot {} in {}", seq, config.dir.display());
    println!(
        "  entries:    {} ({} already expired)",
        entries.len(),
        expired
    );
    println!(
        "  tombstones: {} ({} auto-cleaned, {} deleted)",
        tombstones.len(),
        auto_cleaned,
        tombstones.len() - auto_cleaned
    );

    if config.verbose {
        let mut keys: Vec<_> = entries.keys().collect();
        keys.sort();
        for key in keys {
            print_entry(key, &entries[key], now);
        }

        let mut keys: Vec<_> = tombstones.keys().collect();
        keys.sort();
        for key in keys {
            print_tombstone(key, &tombstones[key]);
        }
    }

    debug!("Done");
    Ok(())
}

fn print_entry(key: &str, entry: &Entry, now: SystemTime) {
    let expiry = match entry.expires_at {
        None => "never".to_string(),
        Some(at) => match at.duration_since(now) {
            Ok(left) => format!("in {:.1}s", left.as_secs_f64()),
            Err(e) => format!("{:.1}s ago", e.duration().as_secs_f64()),
        },
    };
    println!(
        "  E {:<32} {:<6} {:<24} expires {}",
        key,
        entry.type_tag(),
        entry.value.to_string(),
        expiry
    );
}

fn print_tombstone(key: &str, tombstone: &Tombstone) {
    let how = if tombstone.auto_cleaned {
        "swept"
    } else {
        "deleted"
    };
    println!(
        "  T {:<32} {:<6} {:<24} {}{}",
        key,
        tombstone.type_tag(),
        tombstone.value.to_string(),
        how,
        if tombstone.was_expired {
            " (expired)"
        } else {
            ""
        }
    );
}
