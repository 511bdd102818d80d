//! Cache command - manage the class cache

use crate::cache::DiskCache;
use crate::cli::args::{CacheAction, CacheArgs};
use crate::config::{Config, ConfigManager};
use crate::error::WeaveResult;
use crate::ui;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> WeaveResult<()> {
    let cache = DiskCache::new(ConfigManager::cache_dir(config));

    match args.action {
        CacheAction::Info => show_info(&cache, config),
        CacheAction::Clear => clear(&cache),
    }
}

fn show_info(cache: &DiskCache, config: &Config) -> WeaveResult<()> {
    ui::section("Class cache");
    ui::key_value("enabled", &config.cache.enabled.to_string());
    ui::key_value(
        "preferred",
        config.cache.preferred.as_deref().unwrap_or("(not selected yet)"),
    );
    ui::key_value("directory", &cache.dir().display().to_string());
    ui::key_value("entries", &cache.entry_count()?.to_string());
    Ok(())
}

fn clear(cache: &DiskCache) -> WeaveResult<()> {
    let removed = cache.clear()?;
    if removed == 0 {
        ui::step_info("Cache is already empty");
    } else {
        ui::step_ok(&format!("Removed {} cache entries", removed));
    }
    Ok(())
}
