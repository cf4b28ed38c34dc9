use std::{fs, path::PathBuf, process, time::Duration};

use anyhow::Context;
use clap::Parser;
use geonear::{
    config::{
        DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_INDEX, DEFAULT_PORT, DEFAULT_TABLE, DEFAULT_USER,
    },
    demo::{self, Outcome, Report},
    Config, ConnectOpts, MemoryStore, Readiness, RethinkStore, Schema,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(about = "Geospatial nearest-neighbor walkthrough against RethinkDB")]
struct Args {
    #[clap(long, default_value = DEFAULT_HOST)]
    host: String,
    #[clap(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,
    #[clap(long, short, default_value = DEFAULT_USER)]
    user: String,
    #[clap(long, default_value = "")]
    password: String,
    #[clap(long, default_value_t = 20_000)]
    connect_timeout_ms: u64,
    #[clap(long, default_value = DEFAULT_DATABASE)]
    db: String,
    #[clap(long, short, default_value = DEFAULT_TABLE)]
    table: String,
    #[clap(long, short, default_value = DEFAULT_INDEX)]
    index: String,
    /// Run against an in-process store instead of a server.
    #[clap(long, action)]
    in_memory: bool,
    #[clap(long, default_value_t = 10_000)]
    ready_timeout_ms: u64,
    #[clap(long, default_value_t = 100)]
    poll_interval_ms: u64,
    /// Fixed pause after every step, on top of the readiness checks.
    #[clap(long, default_value_t = 0)]
    step_delay_ms: u64,
    /// Directory for one CSV file per query.
    #[clap(long)]
    csv_dir: Option<PathBuf>,
    /// Ignored when RUST_LOG is set.
    #[clap(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            schema: Schema::new(&self.db, &self.table, &self.index),
            connect: ConnectOpts {
                host: self.host.clone(),
                port: self.port,
                user: self.user.clone(),
                password: self.password.clone(),
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            },
            readiness: Readiness {
                timeout: Duration::from_millis(self.ready_timeout_ms),
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                step_delay: Duration::from_millis(self.step_delay_ms),
            },
            csv_dir: self.csv_dir.clone(),
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn summarize<T>(step: &str, outcome: &Outcome<Vec<T>>) {
    let rows = outcome.value().map_or(0, Vec::len);
    let errors = outcome.errors();
    if errors.is_empty() {
        info!(step, rows, "complete");
        return;
    }
    for err in errors {
        warn!(step, rows, error = %err, "step error");
    }
}

async fn run(args: Args) -> anyhow::Result<Report> {
    let config = args.config();
    if let Some(dir) = &config.csv_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }

    if args.in_memory {
        let store = MemoryStore::new();
        return Ok(demo::run(&store, &config).await?);
    }

    let store = RethinkStore::connect(&config.connect)
        .await
        .with_context(|| format!("cannot connect to {}", config.connect.address()))?;
    let report = demo::run(&store, &config).await;
    if let Err(err) = store.close().await {
        warn!(error = %err, "connection did not close cleanly");
    }
    Ok(report?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    match run(args).await {
        Ok(report) => {
            summarize("load", &report.loaded);
            summarize("with_distances", &report.with_distances);
            summarize("docs", &report.docs);
            summarize("by_name", &report.by_name);
        }
        Err(err) => {
            error!("{:#}", err);
            process::exit(1);
        }
    }
}
