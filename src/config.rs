use anyhow::{Context, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;

use crate::services::filter::PAGE_SIZE_OPTIONS;

pub const DEFAULT_PORTAL_URL: &str = "https://etrace.cristalcloud.com";

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub max_file_size: usize,
    pub items_per_page: usize,
    pub portal_url: String,
    pub timezone: Tz,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_file_size: default_max_file_size(),
            items_per_page: 10,
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            timezone: chrono_tz::Europe::Paris,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup, falling back to defaults for
    /// missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(raw) = lookup("PLANNING_MAX_FILE_SIZE") {
            config.max_file_size = raw
                .trim()
                .parse()
                .with_context(|| format!("PLANNING_MAX_FILE_SIZE must be a byte count, got {:?}", raw))?;
        }

        if let Some(raw) = lookup("PLANNING_ITEMS_PER_PAGE") {
            let size: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("PLANNING_ITEMS_PER_PAGE must be a number, got {:?}", raw))?;
            if !PAGE_SIZE_OPTIONS.contains(&size) {
                anyhow::bail!(
                    "PLANNING_ITEMS_PER_PAGE must be one of {:?}, got {}",
                    PAGE_SIZE_OPTIONS,
                    size
                );
            }
            config.items_per_page = size;
        }

        if let Some(raw) = lookup("PLANNING_PORTAL_URL") {
            config.portal_url = raw.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup("PLANNING_TIMEZONE") {
            config.timezone = raw
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("PLANNING_TIMEZONE is not a valid IANA zone: {}", e))?;
        }

        Ok(config)
    }
}

pub fn load_config() -> Result<Config> {
    let config = Config::new()?;
    tracing::debug!(
        "Loaded configuration: max_file_size={}, items_per_page={}, timezone={}",
        config.max_file_size,
        config.items_per_page,
        config.timezone
    );
    Ok(config)
}
