use crate::error::{PasteError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// プロキシURLを上書きする環境変数
pub const PROXY_ENV: &str = "SMART_PASTE_PROXY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub prefer_metric: bool,
    pub proxy_url: Option<String>,
    pub fetch_timeout_seconds: u64,
    /// 省略時は組み込みプリセット
    pub catalog_path: Option<PathBuf>,
    /// 省略時はキャッシュディレクトリの session.json
    pub session_path: Option<PathBuf>,
    pub fuzzy_min_overlap: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefer_metric: true,
            proxy_url: None,
            fetch_timeout_seconds: 20,
            catalog_path: None,
            session_path: None,
            fuzzy_min_overlap: 0.5,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PasteError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("smart-paste").join("config.json"))
    }

    /// エイリアスストアの保存先
    pub fn session_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.session_path {
            return Ok(path.clone());
        }
        let cache = dirs::cache_dir()
            .ok_or_else(|| PasteError::Config("キャッシュディレクトリが見つかりません".into()))?;
        Ok(cache.join("smart-paste").join("session.json"))
    }

    pub fn get_proxy_url(&self) -> Option<String> {
        // 環境変数を優先
        if let Ok(url) = std::env::var(PROXY_ENV) {
            if !url.trim().is_empty() {
                return Some(url);
            }
        }

        self.proxy_url.clone()
    }

    pub fn parse_options(&self) -> smart_paste_common::ParseOptions {
        smart_paste_common::ParseOptions {
            prefer_metric: self.prefer_metric,
            fuzzy_min_overlap: self.fuzzy_min_overlap,
            category: None,
        }
    }

    pub fn set_proxy_url(&mut self, url: String) -> Result<()> {
        self.proxy_url = Some(url).filter(|u| !u.trim().is_empty());
        self.save()
    }

    pub fn set_prefer_metric(&mut self, prefer_metric: bool) -> Result<()> {
        self.prefer_metric = prefer_metric;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.prefer_metric);
        assert_eq!(config.fetch_timeout_seconds, 20);
        assert_eq!(config.fuzzy_min_overlap, 0.5);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            prefer_metric: false,
            proxy_url: Some("https://proxy.example.com/fetch".into()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"prefer_metric": false}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.prefer_metric);
        assert_eq!(config.fetch_timeout_seconds, 20);
    }

    #[test]
    fn test_explicit_session_path() {
        let config = Config {
            session_path: Some(PathBuf::from("/tmp/aliases.json")),
            ..Config::default()
        };
        assert_eq!(config.session_path().unwrap(), PathBuf::from("/tmp/aliases.json"));
    }
}
