use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use pkg_backup_lib::cli::{Action, Cli, PerformArgs};
use pkg_backup_lib::config::Config;

const EXIT_FAILED_TRIGGER: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    if let Err(e) = env_logger.try_init() {
        eprintln!("Initializing the logger failed: {e}");
    }

    let Some(config) = load_config(&cli.config) else {
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };
    if let Err(e) = config.validate() {
        log::error!("Invalid config {}: {e}", cli.config.display());
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }
    let paths = cli.paths(config.paths.clone());

    match &cli.action {
        Action::Check => {
            for model in &config.models {
                let description = model.description.as_deref().unwrap_or_default();
                println!("{}\t{description}", model.trigger);
            }
            log::info!("Config {} is valid", cli.config.display());
            ExitCode::SUCCESS
        }
        Action::Perform(PerformArgs { triggers }) => {
            let models = match config.select(triggers) {
                Ok(models) => models,
                Err(e) => {
                    log::error!("{e}");
                    return ExitCode::from(EXIT_CONFIG_ERROR);
                }
            };

            let mut failed = 0;
            for model in models {
                if let Err(e) = model.perform(&paths) {
                    log::error!(target: "model", "Backup '{}' resulted in a fatal error: {e}", model.trigger);
                    failed += 1;
                }
            }

            if failed > 0 {
                log::error!("{failed} backup(s) failed");
                ExitCode::from(EXIT_FAILED_TRIGGER)
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

/// Read the config, writing a default one if there is none yet.
fn load_config(path: &Path) -> Option<Config> {
    if std::fs::exists(path).is_ok_and(|exists| !exists) {
        log::debug!(
            "Writing default config to {} because it doesn't exist yet",
            path.display()
        );
        let default_config = Config::default();
        match toml::to_string_pretty(&default_config) {
            Ok(config_str) => {
                if let Err(e) = std::fs::write(path, config_str) {
                    log::warn!("Writing default config to {} failed {e}", path.display());
                }
            }
            Err(e) => log::warn!("Serializing the default config failed: {e}"),
        }
        return Some(default_config);
    }

    match Config::load(path) {
        Ok(config) => Some(config),
        Err(e) => {
            log::error!("{e}");
            None
        }
    }
}
