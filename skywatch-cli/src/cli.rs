use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, Select, Text};
use skywatch_core::{
    Config, ForecastAssembler, SensorKind,
    reader::{collect_readings, local_reader_from_config, online_reader_from_config},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::output::write_atomic;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "skywatch",
    version,
    about = "Observation-window forecasts from a local station and OpenWeather"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read both sources, score the next nights and write the forecast document.
    Generate {
        /// Output path; overrides `output` from the config file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the document without writing it to disk.
        #[arg(long)]
        stdout_only: bool,
    },

    /// Interactively set location, sensor and OpenWeather credentials.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command {
            Command::Generate {
                output,
                stdout_only,
            } => generate(&config_path, output, stdout_only).await,
            Command::Configure => configure(&config_path),
        }
    }
}

async fn generate(config_path: &Path, output: Option<PathBuf>, stdout_only: bool) -> Result<()> {
    let config = Config::load_from(config_path)?;
    debug!(path = %config_path.display(), "configuration loaded");

    let assembler = ForecastAssembler::new(config.location.clone(), config.scoring.clone())
        .context("Configuration rejected")?;

    let readings = collect_readings(
        local_reader_from_config(&config),
        online_reader_from_config(&config),
    )
    .await;

    let forecast = assembler.assemble(readings, Utc::now());
    let json =
        serde_json::to_string_pretty(&forecast).context("Failed to serialize forecast to JSON")?;

    if !stdout_only {
        let target = output.unwrap_or_else(|| config.output.clone());
        write_atomic(&target, &json)?;
        info!(
            path = %target.display(),
            location = %assembler.location().name,
            windows = forecast.windows.len(),
            "forecast written"
        );
    }

    println!("{json}");
    Ok(())
}

fn configure(config_path: &Path) -> Result<()> {
    let mut config = Config::load_from(config_path)?;

    config.location.name = Text::new("Location name:")
        .with_default(&config.location.name)
        .prompt()?;
    config.location.latitude = CustomType::<f64>::new("Latitude (degrees):")
        .with_default(config.location.latitude)
        .with_error_message("Please enter a number")
        .prompt()?;
    config.location.longitude = CustomType::<f64>::new("Longitude (degrees):")
        .with_default(config.location.longitude)
        .with_error_message("Please enter a number")
        .prompt()?;

    let kind = Select::new("Local sensor publishes via:", vec!["file", "http"]).prompt()?;
    match kind {
        "http" => {
            config.local.kind = SensorKind::Http;
            let url = Text::new("Sensor endpoint URL:")
                .with_default(config.local.url.as_deref().unwrap_or("http://localhost:8080/weather"))
                .prompt()?;
            config.local.url = Some(url);
        }
        _ => {
            config.local.kind = SensorKind::File;
            let default_path = config.local.path.display().to_string();
            let path = Text::new("Sensor file path:")
                .with_default(&default_path)
                .prompt()?;
            config.local.path = PathBuf::from(path);
        }
    }

    let key = Password::new("OpenWeather API key (leave empty to keep current):")
        .without_confirmation()
        .prompt()?;
    if !key.trim().is_empty() {
        config.set_api_key(key.trim().to_string());
    }

    let default_output = config.output.display().to_string();
    let output = Text::new("Forecast output path:")
        .with_default(&default_output)
        .prompt()?;
    config.output = PathBuf::from(output);

    config.save_to(config_path)?;
    println!("Configuration saved to {}", config_path.display());

    if !config.is_online_configured() {
        println!("No OpenWeather API key set; forecasts will have no windows.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_flags_parse() {
        let cli = Cli::try_parse_from([
            "skywatch",
            "-vv",
            "generate",
            "--output",
            "/tmp/forecast.json",
            "--stdout-only",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Generate {
                output,
                stdout_only,
            } => {
                assert_eq!(output, Some(PathBuf::from("/tmp/forecast.json")));
                assert!(stdout_only);
            }
            Command::Configure => panic!("expected generate"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["skywatch", "configure", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(cli.command, Command::Configure));
    }

    #[tokio::test]
    async fn generate_without_sources_still_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let output = dir.path().join("forecast.json");

        let mut config = Config::default();
        config.local.path = dir.path().join("missing.json");
        config.online.base_url = "http://127.0.0.1:9".to_string();
        config.online.timeout_secs = 1;
        config.save_to(&config_path).unwrap();

        generate(&config_path, Some(output.clone()), false).await.unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(doc["source_status"]["LOCAL"], "UNAVAILABLE");
        assert_eq!(doc["source_status"]["ONLINE"], "UNAVAILABLE");
        assert_eq!(doc["windows"], serde_json::json!([]));
    }
}
