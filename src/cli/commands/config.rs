//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::WeaveResult;
use crate::ui;

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager) -> WeaveResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(&manager.load().await?)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> WeaveResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> WeaveResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail("Configuration initialized", &path.display().to_string());

    Ok(())
}
