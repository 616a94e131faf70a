use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::io::Write;

use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# ol-sync configuration

# Overleaf server (OVERLEAF_SYNC_BASE_URL)
# base_url: http://localhost

# Docker containers used to resolve a project's root folder
# mongo_container: mongo
# container: sharelatex

# Parallel uploads for push
# concurrency: 4

# Cached login cookies (OVERLEAF_SYNC_SESSION_PATH)
# session_path: ~/.config/overleaf-sync/session.json

# Holds inbox/ and backups/ (OVERLEAF_SYNC_DATA_DIR)
# data_dir: ~/.config/overleaf-sync
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print_text(config),
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'ol-sync config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn print_text(config: &Config) {
    println!("Configuration");
    println!("=============\n");

    if let Some(path) = &config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not found)",
            Config::default_config_path().display()
        );
    }
    println!();

    let rows = [
        ("base_url", config.base_url.value.clone(), config.base_url.source),
        (
            "mongo_container",
            config.mongo_container.value.clone(),
            config.mongo_container.source,
        ),
        ("container", config.container.value.clone(), config.container.source),
        (
            "concurrency",
            config.concurrency.value.to_string(),
            config.concurrency.source,
        ),
        (
            "session_path",
            config.session_path.value.display().to_string(),
            config.session_path.source,
        ),
        (
            "data_dir",
            config.data_dir.value.display().to_string(),
            config.data_dir.source,
        ),
    ];
    for (i, (key, value, source)) in rows.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}: {}", key, value);
        println!("  source: {}", source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_template_parses() {
        let parsed: serde_yaml::Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(parsed.is_null());
    }
}
