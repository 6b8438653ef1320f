//! `dot1x config` - configuration management.

use color_eyre::eyre::{eyre, Result};

use dot1x_daemon::DaemonConfig;

use crate::app::{ConfigAction, ConfigArgs, ConfigFormat};
use crate::commands::load_config;

/// Dispatches the config subcommands.
pub fn run(args: &ConfigArgs) -> Result<()> {
    match &args.action {
        ConfigAction::Init { output, force } => {
            let path = output.clone().unwrap_or_else(DaemonConfig::default_path);
            if path.exists() && !force {
                return Err(eyre!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            DaemonConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
            println!("Edit interface.name, interface.mac and radius.secret before starting.");
            Ok(())
        }
        ConfigAction::Validate { config } => {
            let loaded = load_config(config.clone())?;
            let role = if loaded.supplicant.is_some() {
                "supplicant"
            } else {
                "authenticator"
            };
            println!("Configuration OK ({role} role)");
            Ok(())
        }
        ConfigAction::Show { config, format } => {
            let loaded = load_config(config.clone())?;
            match format {
                ConfigFormat::Toml => println!("{}", toml::to_string_pretty(&loaded)?),
                ConfigFormat::Json => println!("{}", serde_json::to_string_pretty(&loaded)?),
            }
            Ok(())
        }
    }
}
