use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use hookgate_config::{Config, ConfigManager};
use std::path::PathBuf;

mod commands;

fn build_cli() -> Command {
    Command::new("hookgate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Webhook ingestion gateway with exactly-once processing")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml (defaults to the platform config dir)")
                .global(true),
        )
        .subcommand(Command::new("serve").about("Run the HTTP server"))
        .subcommand(Command::new("migrate").about("Apply pending database migrations"))
        .subcommand(
            Command::new("purge")
                .about("Delete idempotency records past retention")
                .arg(
                    Arg::new("older-than-hours")
                        .long("older-than-hours")
                        .value_name("HOURS")
                        .help("Age threshold (defaults to storage.retention_hours)")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(Command::new("init-config").about("Write a commented default config file"))
        .subcommand(
            Command::new("check-config")
                .about("Validate the config file and HOOKGATE_* overrides")
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .help("Only report problems")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn config_manager(dir: Option<&String>) -> Result<ConfigManager> {
    let manager = match dir {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    };
    manager.context("Failed to resolve config directory")
}

fn init_logging(config: Option<&Config>) {
    let level = config
        .map(|c| c.server.log_level.to_string())
        .unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let manager = config_manager(matches.get_one::<String>("config-dir"))?;

    match matches.subcommand() {
        Some(("init-config", _)) => {
            init_logging(None);
            commands::init_config(&manager)
        }
        Some(("check-config", sub_matches)) => {
            init_logging(None);
            commands::check_config(&manager, sub_matches.get_flag("quiet"))
        }
        Some((name, sub_matches)) => {
            let config = manager
                .load_with_env_overrides()
                .with_context(|| format!("Invalid configuration in {}", manager.config_path().display()))?;
            init_logging(Some(&config));

            match name {
                "serve" => commands::serve(config).await,
                "migrate" => commands::migrate(&config).await,
                "purge" => {
                    let hours = sub_matches
                        .get_one::<u64>("older-than-hours")
                        .copied()
                        .unwrap_or(config.storage.retention_hours);
                    commands::purge(&config, hours).await
                }
                _ => {
                    build_cli().print_help()?;
                    Ok(())
                }
            }
        }
        None => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
