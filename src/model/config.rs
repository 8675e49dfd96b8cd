use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub rpc: RpcConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
    pub log_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct RpcConfig {
    pub request_timeout_ms: u64,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user_path = directories::ProjectDirs::from("", "", "my-plugin")
            .map(|dirs| dirs.config_dir().join("config.toml"));
        Self::load_from(user_path.as_deref())
    }

    pub fn load_from(user_path: Option<&Path>) -> Result<Self> {
        let mut merged: toml::Value = toml::from_str(DEFAULTS)?;

        if let Some(path) = user_path.filter(|path| path.exists()) {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let user: toml::Value =
                toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
            merge(&mut merged, user);
        }

        let mut config: AppConfig = merged.try_into()?;

        config.general.log_dir = expand_home(&config.general.log_dir)?;

        Ok(config)
    }

    pub fn log_dir(&self) -> PathBuf {
        if !self.general.log_dir.is_empty() {
            return PathBuf::from(&self.general.log_dir);
        }

        directories::ProjectDirs::from("", "", "my-plugin")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("my-plugin"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc.request_timeout_ms)
    }
}

/// Deep-merge `overlay` into `base`: tables merge key by key, anything else replaces.
fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Expand a bare `~` or a leading `~/`. `~user` forms are left alone.
fn expand_home(path: &str) -> Result<String> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return Ok(path.to_string()),
    };

    let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(format!("{}{rest}", home.to_string_lossy()))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_without_user_file() {
        let config = AppConfig::load_from(None).unwrap();
        assert_eq!(config.general.log_level, "my_plugin=info");
        assert!(config.general.log_dir.is_empty());
        assert_eq!(config.request_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn missing_user_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.rpc.request_timeout_ms, 5000);
    }

    #[test]
    fn user_file_overrides_only_the_keys_it_sets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rpc]\nrequest_timeout_ms = 250").unwrap();

        let config = AppConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.general.log_level, "my_plugin=info");
    }

    #[test]
    fn explicit_log_dir_is_used_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nlog_dir = \"/var/log/my-plugin\"").unwrap();

        let config = AppConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.log_dir(), PathBuf::from("/var/log/my-plugin"));
    }

    #[test]
    fn home_prefix_is_expanded() {
        let home = dirs_home().unwrap().to_string_lossy().into_owned();

        assert_eq!(expand_home("~").unwrap(), home);
        assert_eq!(expand_home("~/logs").unwrap(), format!("{home}/logs"));
    }

    #[test]
    fn other_users_home_is_left_alone() {
        assert_eq!(expand_home("~bob/logs").unwrap(), "~bob/logs");
        assert_eq!(expand_home("/var/~/logs").unwrap(), "/var/~/logs");
    }

    #[test]
    fn log_dir_tilde_is_expanded_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nlog_dir = \"~/my-plugin-logs\"").unwrap();

        let config = AppConfig::load_from(Some(file.path())).unwrap();
        let home = dirs_home().unwrap();
        assert_eq!(config.log_dir(), PathBuf::from(format!("{}/my-plugin-logs", home.display())));
    }

    #[test]
    fn malformed_user_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rpc\nrequest_timeout_ms = ").unwrap();

        assert!(AppConfig::load_from(Some(file.path())).is_err());
    }

    #[test]
    fn wrong_value_type_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rpc]\nrequest_timeout_ms = \"soon\"").unwrap();

        assert!(AppConfig::load_from(Some(file.path())).is_err());
    }
}
