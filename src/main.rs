use clap::Parser;
use uuid::Uuid;

use alertmagnet::cli::{Cli, Command, RunArgs};
use alertmagnet::config;
use alertmagnet::logging;
use alertmagnet::metrics::{MetricsSink, server};
use alertmagnet::pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config)?;

    let run_id = Uuid::new_v4().simple().to_string();

    // Bare `alertmagnet` with no subcommand defaults to `serve`.
    let command = cli.command.unwrap_or_else(|| Command::Serve(RunArgs::default()));

    match &command {
        Command::Run(args) => {
            args.apply(&mut app_config);
            logging::init(&app_config, &run_id)?;
            tracing::info!("alertmagnet starting single-cycle run");

            let run_dirs = pipeline::run_once(&app_config).await?;
            tracing::info!(runs = run_dirs.len(), "cycle complete");
        }
        Command::Serve(args) => {
            args.apply(&mut app_config);
            logging::init(&app_config, &run_id)?;
            tracing::info!(port = app_config.prometheus_port, "alertmagnet starting serve loop");

            let metrics = MetricsSink::new()?;
            let registry = metrics.registry();
            let port = app_config.prometheus_port;

            let server_handle = tokio::spawn(async move {
                if let Err(e) = server::serve(registry, port).await {
                    tracing::error!(error = %e, "metrics server exited");
                }
            });

            let loop_result = pipeline::serve_loop(app_config, &metrics).await;
            server_handle.abort();
            loop_result?;
        }
    }

    Ok(())
}
