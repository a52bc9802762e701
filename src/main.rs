use anyhow::Result;
use marketjson::{config::IndentedConfig, pipeline, workbook::XlsxWorkbook};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) convert ──────────────────────────────────────────────────
    let config = IndentedConfig::default();
    info!(workbook = %config.workbook.display(), out = %config.output_dir.display(), "indented pipeline");
    let source = XlsxWorkbook::new(&config.workbook);
    let summary = pipeline::run_indented(&config, &source)?;

    info!(files = summary.written.len(), "all done");
    Ok(())
}
