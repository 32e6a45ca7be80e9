//! ttlkv - demonstration binary
//!
//! Builds a store, fills it with a few entries of different shapes, runs the
//! persister and the sweeper for a while, then stops both and prints what is
//! left.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use ttlkv::persistence::{dump, LogRecord, Persister, PersisterConfig};
use ttlkv::storage::{Store, Sweeper, SweeperConfig, NEVER_EXPIRES};

/// Demo configuration
struct Config {
    /// Directory holding the append log and dumps
    data_dir: PathBuf,
    /// Interval between sweeps
    sweep_interval: Duration,
    /// Interval between persistence cycles
    persist_interval: Duration,
    /// How long to let the background tasks run
    run_for: Duration,
    /// Write a debug dump before exiting
    dump: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sweep_interval: Duration::from_secs(3),
            persist_interval: Duration::from_secs(3),
            run_for: Duration::from_secs(9),
            dump: false,
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
                "--data-dir" | "-d" => {
                    config.data_dir = PathBuf::from(required_value(&args, i));
                    i += 2;
                }
                "--sweep-interval-ms" => {
                    config.sweep_interval = Duration::from_millis(parse_number(&args, i));
                    i += 2;
                }
                "--persist-interval-ms" => {
                    config.persist_interval = Duration::from_millis(parse_number(&args, i));
                    i += 2;
                }
                "--run-secs" => {
                    config.run_for = Duration::from_secs(parse_number(&args, i));
                    i += 2;
                }
                "--dump" => {
                    config.dump = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("ttlkv version {}", ttlkv::VERSION);
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

    fn log_path(&self) -> PathBuf {
        self.data_dir.join("current.log")
    }
}

fn required_value(args: &[String], i: usize) -> &str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("Error: {} requires a value", args[i]);
            std::process::exit(1);
        }
    }
}

fn parse_number(args: &[String], i: usize) -> u64 {
    required_value(args, i).parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid number for {}", args[i]);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
ttlkv - In-process TTL key-value store demo

USAGE:
    ttlkv [OPTIONS]

OPTIONS:
    -d, --data-dir <DIR>             Directory for the append log (default: data)
        --sweep-interval-ms <MS>     Interval between sweeps (default: 3000)
        --persist-interval-ms <MS>   Interval between persist cycles (default: 3000)
        --run-secs <SECS>            How long to run the background tasks (default: 9)
        --dump                       Write a timestamped debug dump before exiting
    -v, --version                    Print version information
    -h, --help                       Print this help message

LOGGING:
    Set RUST_LOG (e.g. RUST_LOG=ttlkv=debug) to change verbosity.
"#
    );
}

fn print_store(label: &str, store: &Store) {
    let mut entries = store.snapshot();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    println!("{} ({} entries)", label, entries.len());
    for (key, entry) in &entries {
        println!(
            "  {} persisted: {}",
            LogRecord::new(key, entry),
            entry.is_persisted()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(Store::new());
    info!("Store initialized");

    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    counts.insert("test".to_string(), 11);
    let list = vec![0i64, 0, 0, 1];

    match store.insert("stringkey", "stringvalue", Duration::from_secs(10)) {
        Ok(entry) => info!(value = %entry.value(), "Inserted stringkey"),
        Err(e) => warn!(error = %e, "Insert failed"),
    }
    match store.replace("stringkey", "stringasdvalue", Duration::from_secs(10)) {
        Ok(entry) => info!(value = %entry.value(), "Replaced stringkey"),
        Err(e) => warn!(error = %e, "Replace failed"),
    }
    store.insert("listkey", list, Duration::from_secs(5))?;
    store.insert("dictkey", counts, NEVER_EXPIRES)?;

    print_store("Store before running background tasks", &store);

    let persister = Persister::start(
        Arc::clone(&store),
        PersisterConfig::default()
            .with_interval(config.persist_interval)
            .with_log_path(config.log_path()),
    );
    let sweeper = Sweeper::start(
        Arc::clone(&store),
        SweeperConfig::default().with_interval(config.sweep_interval),
    );

    tokio::time::sleep(config.run_for).await;

    sweeper.stop().await?;
    if let Err(e) = persister.stop().await {
        error!(error = %e, "Persister reported a failure");
    }

    if config.dump {
        let path = dump(&store, &config.data_dir)?;
        info!(path = %path.display(), "Debug dump written");
    }

    print_store("Store after running background tasks", &store);
    info!(stats = ?store.stats(), "Done");

    Ok(())
}
