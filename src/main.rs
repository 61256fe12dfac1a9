use anyhow::Result;
use housing_loader::{config::Config, pipeline};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configure ────────────────────────────────────────────────
    let config = Config::load();
    config.log_summary();

    // ─── 3) read, connect, load, commit ──────────────────────────────
    let report = pipeline::run(&config).await?;
    info!(
        inserted = report.inserted,
        existing = report.existing,
        malformed = report.malformed,
        "rows appended to {}",
        report.table
    );

    if config.summary_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
