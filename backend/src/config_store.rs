//! `.plateview` TOML persistence and environment overrides.

use std::path::PathBuf;
use std::sync::{LazyLock, RwLock};

use anyhow::Context;
use shared::{AppConfig, ServerSection, UserPreferences};

const DEFAULT_CONFIG_FILE_PATH: &str = ".plateview";
const CONFIG_PATH_ENV: &str = "PLATEVIEW_CONFIG";
const API_URL_ENV: &str = "PLATEVIEW_API_URL";
const IMAGE_URL_ENV: &str = "PLATEVIEW_IMAGE_URL";

const CONFIG_HEADER: &str = "# Plate Viewer Configuration\n\
                             # Server endpoints and display preferences\n\
                             \n";

/// Server section currently in effect, shared by all sessions.
static SERVER: LazyLock<RwLock<ServerSection>> = LazyLock::new(|| {
    let mut server = ServerSection::default();
    apply_env_overrides(&mut server, |key| std::env::var(key).ok());
    RwLock::new(server)
});

pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE_PATH))
}

pub fn apply_env_overrides(server: &mut ServerSection, env: impl Fn(&str) -> Option<String>) {
    if let Some(url) = env(API_URL_ENV).filter(|url| !url.trim().is_empty()) {
        server.api_base_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(url) = env(IMAGE_URL_ENV).filter(|url| !url.trim().is_empty()) {
        server.image_base_url = url.trim().trim_end_matches('/').to_string();
    }
}

pub fn current_server() -> ServerSection {
    match SERVER.read() {
        Ok(server) => server.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn remember_server(server: &ServerSection) {
    match SERVER.write() {
        Ok(mut current) => *current = server.clone(),
        Err(poisoned) => *poisoned.into_inner() = server.clone(),
    }
}

/// Config in effect for sessions: the stored file plus environment overrides.
pub async fn load_config() -> anyhow::Result<AppConfig> {
    let mut config = load_stored_config().await?;
    apply_env_overrides(&mut config.server, |key| std::env::var(key).ok());
    remember_server(&config.server);
    Ok(config)
}

/// Reads the config file, creating it with defaults when missing. A config
/// that needed fixes is written back.
async fn load_stored_config() -> anyhow::Result<AppConfig> {
    let path = config_path();
    let config = match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            let mut config = AppConfig::from_toml_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            let warnings = config.validate_and_fix();
            if !warnings.is_empty() {
                for warning in &warnings {
                    log::warn!("{warning}");
                }
                if let Err(error) = save_config(&config).await {
                    log::warn!("Config fixed in memory but not saved: {error:#}");
                }
            }
            config
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No config at {}, creating defaults", path.display());
            let config = AppConfig::default();
            save_config(&config)
                .await
                .context("Failed to create default config")?;
            config
        }
        Err(error) => {
            return Err(error).with_context(|| format!("Failed to read config {}", path.display()));
        }
    };
    Ok(config)
}

pub async fn save_config(config: &AppConfig) -> anyhow::Result<()> {
    let path = config_path();
    let toml_content = config.to_toml_string()?;
    tokio::fs::write(&path, format!("{CONFIG_HEADER}{toml_content}"))
        .await
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    Ok(())
}

/// Replaces only the preferences section of the stored config.
pub async fn save_preferences(preferences: UserPreferences) -> anyhow::Result<()> {
    let mut config = load_stored_config().await?;
    config.preferences = preferences.clamped();
    save_config(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_replace_urls() {
        let mut server = ServerSection::default();
        apply_env_overrides(&mut server, |key| match key {
            API_URL_ENV => Some(" http://imagedb:8000/ ".to_string()),
            IMAGE_URL_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(server.api_base_url, "http://imagedb:8000");
        assert_eq!(server.image_base_url, ServerSection::default().image_base_url);
    }

    #[test]
    fn header_precedes_parseable_toml() {
        let text = format!("{CONFIG_HEADER}{}", AppConfig::default().to_toml_string().unwrap());
        assert!(text.starts_with("# Plate Viewer Configuration"));
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), AppConfig::default());
    }
}
