use serde::{Deserialize, Serialize};

pub const MIN_BRIGHTNESS_PERCENT: u32 = 10;
pub const MAX_BRIGHTNESS_PERCENT: u32 = 400;
pub const MAX_ANIMATION_SPEED: u8 = 9;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub server: ServerSection,
    pub preferences: UserPreferences,
}

// AppSection carries the format version so older files can be migrated
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSection {
    pub version: String,
}

impl AppSection {
    pub const CURRENT_VERSION: &'static str = "1.1.0";

    pub fn needs_migration(&self) -> bool {
        self.version != Self::CURRENT_VERSION
    }

    pub fn get_migration_strategy(&self) -> MigrationStrategy {
        match self.version.as_str() {
            Self::CURRENT_VERSION => MigrationStrategy::None,
            "1.0.0" => MigrationStrategy::Upgrade("1.0.0 -> 1.1.0: add animation_speed".to_string()),
            _ => MigrationStrategy::Recreate,
        }
    }
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationStrategy {
    None,
    Upgrade(String),
    Recreate,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    /// Base URL of the plate API (`/api/plate`, `/api/list-plates`, ...).
    pub api_base_url: String,
    /// Base URL the browser prefixes to composite image paths.
    pub image_base_url: String,
    /// Size of the "Latest acquisitions" sidebar group.
    pub latest_count: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            image_base_url: "http://localhost:8000".to_string(),
            latest_count: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UserPreferences {
    pub brightness_percent: u32,
    pub show_hidden: bool,
    pub show_layout_overlay: bool,
    pub sort_alphabetically: bool,
    pub animation_speed: u8,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            brightness_percent: 100,
            show_hidden: false,
            show_layout_overlay: false,
            sort_alphabetically: false,
            animation_speed: 5,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Clamps out-of-range values in place, returning one warning per fix.
    pub fn validate_and_fix(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.app.needs_migration() {
            match self.app.get_migration_strategy() {
                MigrationStrategy::Upgrade(description) => {
                    warnings.push(format!("Migrated config: {description}"));
                }
                MigrationStrategy::Recreate => {
                    warnings.push(format!(
                        "Unknown config version '{}', using defaults",
                        self.app.version
                    ));
                    *self = Self {
                        server: self.server.clone(),
                        ..Self::default()
                    };
                }
                MigrationStrategy::None => {}
            }
            self.app.version = AppSection::CURRENT_VERSION.to_string();
        }

        let preferences = &mut self.preferences;
        let brightness = preferences
            .brightness_percent
            .clamp(MIN_BRIGHTNESS_PERCENT, MAX_BRIGHTNESS_PERCENT);
        if brightness != preferences.brightness_percent {
            warnings.push(format!(
                "Brightness {}% out of range, using {brightness}%",
                preferences.brightness_percent
            ));
            preferences.brightness_percent = brightness;
        }
        if preferences.animation_speed > MAX_ANIMATION_SPEED {
            warnings.push(format!(
                "Animation speed {} out of range, using {MAX_ANIMATION_SPEED}",
                preferences.animation_speed
            ));
            preferences.animation_speed = MAX_ANIMATION_SPEED;
        }

        if self.server.latest_count == 0 {
            warnings.push("latest_count must be at least 1, using 1".to_string());
            self.server.latest_count = 1;
        }
        for url in [&mut self.server.api_base_url, &mut self.server.image_base_url] {
            let trimmed = url.trim_end_matches('/');
            if trimmed.len() != url.len() {
                *url = trimmed.to_string();
            }
        }

        warnings
    }
}

impl UserPreferences {
    pub fn clamped(mut self) -> Self {
        self.brightness_percent = self
            .brightness_percent
            .clamp(MIN_BRIGHTNESS_PERCENT, MAX_BRIGHTNESS_PERCENT);
        self.animation_speed = self.animation_speed.min(MAX_ANIMATION_SPEED);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config = AppConfig::from_toml_str(
            "[app]\nversion = \"1.1.0\"\n\n[preferences]\nshow_hidden = true\n",
        )
        .unwrap();
        assert!(config.preferences.show_hidden);
        assert_eq!(config.preferences.brightness_percent, 100);
        assert_eq!(config.server.latest_count, 10);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut config = AppConfig::default();
        config.preferences.brightness_percent = 5000;
        config.preferences.animation_speed = 12;
        config.server.latest_count = 0;
        config.server.api_base_url = "http://imagedb/".to_string();

        let warnings = config.validate_and_fix();

        assert_eq!(warnings.len(), 3);
        assert_eq!(config.preferences.brightness_percent, MAX_BRIGHTNESS_PERCENT);
        assert_eq!(config.preferences.animation_speed, MAX_ANIMATION_SPEED);
        assert_eq!(config.server.latest_count, 1);
        assert_eq!(config.server.api_base_url, "http://imagedb");
    }

    #[test]
    fn older_version_is_upgraded_in_place() {
        let mut config = AppConfig::from_toml_str(
            "[app]\nversion = \"1.0.0\"\n\n[preferences]\nbrightness_percent = 150\n",
        )
        .unwrap();
        let warnings = config.validate_and_fix();
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.app.version, AppSection::CURRENT_VERSION);
        assert_eq!(config.preferences.brightness_percent, 150);
    }

    #[test]
    fn unknown_version_keeps_only_server_section() {
        let mut config = AppConfig::default();
        config.app.version = "0.1".to_string();
        config.server.latest_count = 3;
        config.preferences.show_hidden = true;

        config.validate_and_fix();

        assert_eq!(config.server.latest_count, 3);
        assert!(!config.preferences.show_hidden);
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let mut config = AppConfig::default();
        config.preferences.sort_alphabetically = true;
        let text = config.to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }
}
