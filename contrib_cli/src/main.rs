use clap::Parser;
use contrib_cli::cli::{Cli, Commands};
use contrib_core::{AggregateConfig, FileSnapshotStore, ReconcileEngine};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    contrib_core::o11y::init_global_from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Gather { config, output } => {
            let mut cfg = AggregateConfig::from_path(&config).await?;
            if let Some(output) = output {
                cfg.output_file = Some(output);
            }
            cfg.validate()?;
            let Some(path) = cfg.output_file.clone() else {
                anyhow::bail!("outputFile is required");
            };

            let sources = contrib_integrations::sources_from_config(&cfg)?;
            let engine = ReconcileEngine::new(cfg, Arc::new(FileSnapshotStore::new(&path)))
                .with_sources(sources);
            tracing::info!(sources = ?engine.source_ids(), output = %path.display(), "gathering contributions");

            let outcome = engine.run().await?;
            let summary = serde_json::json!({
                "total": outcome.contributions.len(),
                "previous": outcome.previous_len,
                "written": outcome.written,
                "output": path,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Validate { config } => {
            AggregateConfig::from_path(&config).await?.validate()?;
            println!("ok");
        }
        Commands::Config { config } => {
            let cfg = AggregateConfig::from_path(&config).await?;
            let token_set = std::env::var("GITHUB_TOKEN").is_ok_and(|t| !t.trim().is_empty());
            let out = serde_json::json!({
                "config": cfg,
                "GITHUB_TOKEN": if token_set { "<set>" } else { "<unset>" },
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}
