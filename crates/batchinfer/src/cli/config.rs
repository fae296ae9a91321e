//! `batchinfer config`: inspect or create the TOML config file.

use batchinfer_core::Config;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print where the config file is read from
    Path,

    /// Write a config file populated with the defaults
    Init {
        /// Replace a file that is already there
        #[arg(long)]
        force: bool,
    },
}

/// `location` is the global `--config` flag, if given.
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    location: Option<&Path>,
) -> anyhow::Result<()> {
    let file: PathBuf = location.map_or_else(Config::default_path, Path::to_path_buf);

    match args.command {
        ConfigCommand::Show => print!("{}", config.to_toml()?),
        ConfigCommand::Path => println!("{}", file.display()),
        ConfigCommand::Init { force } => {
            write_defaults(&file, force)?;
            tracing::debug!("Wrote default config to {}", file.display());
            println!("Wrote default configuration to {}", file.display());
        }
    }
    Ok(())
}

fn write_defaults(file: &Path, force: bool) -> anyhow::Result<()> {
    if file.exists() && !force {
        anyhow::bail!(
            "{} already exists. Pass --force to replace it.",
            file.display()
        );
    }
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let rendered = Config::default().to_toml()?;
    std::fs::write(file, rendered)?;
    Ok(())
}
