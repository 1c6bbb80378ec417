use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use crate::config::Paths;

const DEFAULT_CONFIG: &str = "/etc/pkg_backup/config.toml";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long, global = true)]
    pub verbose: Option<LevelFilter>,

    /// Config file describing the backup models.
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "PKG_BACKUP_CONFIG",
        default_value = DEFAULT_CONFIG
    )]
    pub config: PathBuf,

    /// Staging directory, overrides `paths.tmp_path` of the config.
    #[arg(long, global = true)]
    pub tmp_path: Option<PathBuf>,

    /// Directory of the retention histories, overrides `paths.data_path` of the config.
    #[arg(long, global = true)]
    pub data_path: Option<PathBuf>,

    #[command(subcommand)]
    pub action: Action,
}

impl Cli {
    /// Apply the path overrides to `paths`.
    pub fn paths(&self, mut paths: Paths) -> Paths {
        if let Some(tmp_path) = &self.tmp_path {
            paths.tmp_path = tmp_path.clone();
        }
        if let Some(data_path) = &self.data_path {
            paths.data_path = data_path.clone();
        }
        paths
    }
}

#[derive(Subcommand, Debug)]
pub enum Action {
    /// Perform the backups of the given triggers.
    Perform(PerformArgs),
    /// Validate the config file and list its triggers.
    Check,
}

#[derive(Args, Debug)]
pub struct PerformArgs {
    /// Triggers to perform in order, `*` matches any characters.
    #[arg(long, short = 't', required = true, value_delimiter = ',')]
    pub triggers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_perform() {
        let cli = Cli::try_parse_from([
            "pkg_backup",
            "-c",
            "/tmp/config.toml",
            "perform",
            "--triggers",
            "db-backup,home_*",
            "--tmp-path",
            "/scratch",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/tmp/config.toml"));
        let Action::Perform(args) = &cli.action else {
            panic!("expected perform action");
        };
        assert_eq!(args.triggers, vec!["db-backup", "home_*"]);

        let paths = cli.paths(Paths {
            tmp_path: "/var/tmp".into(),
            data_path: "/var/data".into(),
        });
        assert_eq!(paths.tmp_path, PathBuf::from("/scratch"));
        assert_eq!(paths.data_path, PathBuf::from("/var/data"));
    }

    #[test]
    fn config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["pkg_backup", "perform", "-c", "x.toml", "-t", "job"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(cli.action, Action::Perform(ref args) if args.triggers == ["job"]));
    }

    #[test]
    fn perform_needs_triggers() {
        assert!(Cli::try_parse_from(["pkg_backup", "perform"]).is_err());
        assert!(Cli::try_parse_from(["pkg_backup", "check"]).is_ok());
    }
}
