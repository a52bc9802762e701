// src/bin/columnar.rs

use anyhow::Result;
use marketjson::{config::ColumnarConfig, pipeline, taxonomy::Taxonomy, workbook::XlsxWorkbook};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // 1) init logging
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // 2) load taxonomy, then convert
    let taxonomy = Taxonomy::solar()?;
    let config = ColumnarConfig::default();
    info!(
        workbook = %config.workbook.display(),
        regions = taxonomy.regions.len(),
        segment_types = taxonomy.segments.len(),
        "columnar pipeline"
    );
    let summary = pipeline::run_columnar(&config, &XlsxWorkbook::new(&config.workbook), &taxonomy)?;

    info!(files = summary.written.len(), "all done");
    Ok(())
}
