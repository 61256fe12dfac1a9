use anyhow::Result;
use sqlx::postgres::PgPool;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{self, PgDestination};
use crate::ingest::{Ingester, LoadReport};
use crate::process::read_csv;

/// Read the CSV, then connect and load it in a single transaction.
///
/// Input errors surface before any connection is attempted. The pool is
/// closed on every path once connected.
pub async fn run(config: &Config) -> Result<LoadReport> {
    let start = Instant::now();
    let opts = config.load_options();

    info!("reading CSV: {}", config.csv.display());
    let csv = read_csv(&config.csv, &opts.read_options())?;

    let pool = connect_with_wait(config).await?;
    let result = async {
        let dest = PgDestination::begin(&pool).await?;
        let mut ingester = Ingester::new(dest, config.target(), opts);
        let report = ingester.ingest(&csv).await?;
        ingester.commit().await?;
        Ok::<_, anyhow::Error>(report)
    }
    .await;
    pool.close().await;

    if let Ok(report) = &result {
        info!(elapsed = ?start.elapsed(), "load finished: {:?}", report);
    }
    result
}

/// Connect, retrying `wait_retries` extra times while the server comes up.
async fn connect_with_wait(config: &Config) -> Result<PgPool> {
    let attempts = config.wait_retries + 1;
    let mut attempt = 1;
    loop {
        match db::connect(config.connect_options()?, config.connect_timeout()).await {
            Ok(pool) => {
                info!("database is reachable");
                return Ok(pool);
            }
            Err(e) if attempt < attempts => {
                warn!("database not ready yet ({}/{}): {:#}", attempt, attempts, e);
                sleep(config.wait_interval()).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
