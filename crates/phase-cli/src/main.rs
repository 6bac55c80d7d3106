//! Command-line runner for the market clustering pipeline
//!
//! ```bash
//! export ALPHA_VANTAGE_API_KEY=...
//! phase-pipeline --symbol INUV --interval 5min --clusters 5
//! phase-pipeline --config pipeline.json --provider openai --json
//! ```

mod render;

use anyhow::Context;
use clap::Parser;
use phase_llm::ProviderKind;
use phase_market::{MarketPipeline, PipelineConfig, PipelineConfigBuilder};
use phase_utils::{LogFormat, format_elapsed, init_tracing, init_tracing_with};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "phase-pipeline")]
#[command(about = "Cluster a symbol's intraday highs and forecast when each level trades", long_about = None)]
struct Args {
    /// JSON config file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ticker symbol
    #[arg(short, long)]
    symbol: Option<String>,

    /// Bar interval (1min, 5min, 15min, 30min, 60min)
    #[arg(short, long)]
    interval: Option<String>,

    /// Days of history to keep, counted back from the newest bar
    #[arg(long)]
    lookback_days: Option<u32>,

    /// Number of clusters
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Inference provider (ollama or openai)
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// Inference endpoint base URL
    #[arg(long)]
    inference_url: Option<String>,

    /// Maximum phases running at once
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Deadline for the whole run, in seconds
    #[arg(long)]
    run_deadline: Option<u64>,

    /// Print the full report as JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines (otherwise LOG_FORMAT decides)
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, config: PipelineConfig) -> anyhow::Result<PipelineConfig> {
        let mut builder = PipelineConfigBuilder::from_config(config);
        if let Some(symbol) = &self.symbol {
            builder = builder.symbol(symbol);
        }
        if let Some(interval) = &self.interval {
            builder = builder.interval(interval);
        }
        if let Some(days) = self.lookback_days {
            builder = builder.lookback_days(days);
        }
        if let Some(clusters) = self.clusters {
            builder = builder.clusters(clusters);
        }
        if let Some(provider) = self.provider {
            builder = builder.provider(provider);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(url) = &self.inference_url {
            builder = builder.inference_base_url(url);
        }
        if let Some(max) = self.max_concurrency {
            builder = builder.max_concurrency(max);
        }
        if let Some(secs) = self.run_deadline {
            builder = builder.run_deadline(Some(Duration::from_secs(secs)));
        }
        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.log_json {
        init_tracing_with(LogFormat::Json);
    } else {
        init_tracing();
    }

    let config = PipelineConfig::load(args.config.as_deref()).context("loading configuration")?;
    let config = args.apply(config).context("invalid configuration")?;
    info!(
        "Starting phase-pipeline for {} with {} clusters via {} ({})",
        config.market.symbol, config.clusters, config.inference.provider, config.inference.model
    );

    let pipeline = MarketPipeline::new(config).context("building pipeline")?;
    let report = pipeline.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render::status_table(&report));
        match render::cluster_table(&report) {
            Some(table) => println!("\n{table}"),
            None => warn!("No synthesis report; cluster summary unavailable"),
        }
        if let Some(profile) = render::profile_text(&report) {
            println!("\n{profile}");
        }
    }

    info!("Pipeline finished in {}", format_elapsed(report.elapsed));
    if !report.is_success() {
        anyhow::bail!("{} phase(s) failed", report.failed().len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "phase-pipeline",
            "--symbol",
            "MSFT",
            "-k",
            "3",
            "--provider",
            "openai",
            "--inference-url",
            "http://localhost:1234/v1",
            "--run-deadline",
            "120",
        ]);

        let base = PipelineConfig::builder()
            .symbol("INUV")
            .api_key("test-key")
            .build()
            .unwrap();
        let config = args.apply(base).unwrap();

        assert_eq!(config.market.symbol, "MSFT");
        assert_eq!(config.clusters, 3);
        assert_eq!(config.inference.provider, ProviderKind::OpenAi);
        assert_eq!(config.orchestration.run_deadline_secs, Some(120));
        assert_eq!(config.market.api_key.as_deref(), Some("test-key"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = Args::parse_from(["phase-pipeline", "--clusters", "0"]);
        let base = PipelineConfig::builder()
            .symbol("INUV")
            .api_key("test-key")
            .build()
            .unwrap();
        assert!(args.apply(base).is_err());
    }
}
