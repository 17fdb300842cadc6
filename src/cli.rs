//! Command-line interface (§2.1): a thin clap layer over `AppConfig`.
//! `run` executes one query→compact→duration→correlate cycle and exits;
//! `serve` runs the outer daily loop alongside the metrics HTTP server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "alertmagnet", about = "Prometheus alert correlation pipeline")]
pub struct Cli {
    /// Path to the INI config file.
    #[arg(long, env = "ALERTMAGNET_CONFIG_FILE", default_value = "config.ini")]
    pub config: PathBuf,

    /// Defaults to `serve` when no subcommand is given.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one query -> compact -> duration -> correlate cycle and exit.
    Run(RunArgs),
    /// Run the outer daily loop and serve /metrics until interrupted.
    Serve(RunArgs),
}

#[derive(Debug, Default, Parser)]
pub struct RunArgs {
    /// API endpoint to query against; overrides `api_endpoint` in the config file.
    #[arg(short = 'a', long = "api-endpoint")]
    pub api_endpoint: Option<String>,

    /// Relative path to the client certificate used for the request.
    #[arg(short = 'c', long)]
    pub cert: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Storage path used to store query results.
    #[arg(short = 'p', long = "storage-path")]
    pub storage_path: Option<PathBuf>,

    /// Threshold in days to split queries across resolution tiers.
    #[arg(short = 'b', long)]
    pub threshold: Option<u64>,
}

impl RunArgs {
    /// Applies any CLI overrides on top of a loaded `AppConfig`.
    pub fn apply(&self, config: &mut crate::config::AppConfig) {
        if let Some(api_endpoint) = &self.api_endpoint {
            config.api_endpoint = api_endpoint.clone();
        }
        if let Some(cert) = &self.cert {
            config.cert = Some(cert.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout = std::time::Duration::from_secs(timeout);
        }
        if let Some(storage_path) = &self.storage_path {
            config.directory_path = storage_path.clone();
        }
        if let Some(threshold) = self.threshold {
            config.threshold_days = Some(threshold);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, LogLevel};
    use std::time::Duration;

    fn base_config() -> AppConfig {
        AppConfig {
            api_endpoint: "https://default/".to_string(),
            cert: None,
            timeout: Duration::from_secs(30),
            directory_path: PathBuf::from("data"),
            threshold_days: None,
            delay: Duration::from_millis(250),
            cores: 12,
            max_long_term_storage: "1y".to_string(),
            prometheus_port: 8123,
            naptime_seconds: 86_400,
            log_to_file: false,
            log_level: LogLevel::Info,
        }
    }

    #[test]
    fn overrides_only_apply_fields_that_were_set() {
        let mut config = base_config();
        let args = RunArgs {
            api_endpoint: Some("https://override/".to_string()),
            cert: None,
            timeout: None,
            storage_path: None,
            threshold: Some(14),
        };
        args.apply(&mut config);

        assert_eq!(config.api_endpoint, "https://override/");
        assert_eq!(config.threshold_days, Some(14));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn parses_run_subcommand_with_short_flags() {
        let cli = Cli::parse_from([
            "alertmagnet",
            "run",
            "-a",
            "https://prom.example/",
            "-b",
            "7",
        ]);
        match cli.command {
            Some(Command::Run(args)) => {
                assert_eq!(args.api_endpoint.as_deref(), Some("https://prom.example/"));
                assert_eq!(args.threshold, Some(7));
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn omitted_subcommand_parses_with_no_command() {
        let cli = Cli::parse_from(["alertmagnet"]);
        assert!(cli.command.is_none());
    }
}
