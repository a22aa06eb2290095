use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::algolia::ALGOLIA_API_BASE;
use crate::comments::CommentSort;
use crate::model::TimeRange;
use crate::store::DEFAULT_DEBOUNCE;

const DEFAULT_ENV_PREFIX: &str = "HN_BROWSE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub browse: BrowseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    ALGOLIA_API_BASE.to_string()
}

fn default_user_agent() -> String {
    format!("hn-browse/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowseConfig {
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub comment_sort: CommentSort,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            time_range: TimeRange::default(),
            comment_sort: CommentSort::default(),
        }
    }
}

fn default_debounce() -> Duration {
    DEFAULT_DEBOUNCE
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "hn_browse=info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Layers `other` over `base`. Values left at their defaults in `other` do not override.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    if !other.api.base_url.is_empty() && other.api.base_url != defaults.api.base_url {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.user_agent.is_empty() && other.api.user_agent != defaults.api.user_agent {
        base.api.user_agent = other.api.user_agent;
    }
    if other.api.timeout != defaults.api.timeout && !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    if other.browse.debounce != defaults.browse.debounce {
        base.browse.debounce = other.browse.debounce;
    }
    if other.browse.time_range != defaults.browse.time_range {
        base.browse.time_range = other.browse.time_range;
    }
    if other.browse.comment_sort != defaults.browse.comment_sort {
        base.browse.comment_sort = other.browse.comment_sort;
    }

    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }
    if !other.log.filter.is_empty() && other.log.filter != defaults.log.filter {
        base.log.filter = other.log.filter;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(Config::default());
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value)?;
    }

    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) -> Result<()> {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            cfg.api.timeout = humantime::parse_duration(&value)
                .with_context(|| format!("config: invalid api.timeout {value:?}"))?;
        }
        "browse.debounce" => {
            cfg.browse.debounce = humantime::parse_duration(&value)
                .with_context(|| format!("config: invalid browse.debounce {value:?}"))?;
        }
        "browse.time_range" => {
            cfg.browse.time_range = value.parse().context("config: browse.time_range")?;
        }
        "browse.comment_sort" => {
            cfg.browse.comment_sort = value.parse().context("config: browse.comment_sort")?;
        }
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "log.filter" => cfg.log.filter = value,
        _ => {}
    }
    Ok(())
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hn-browse").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated(dir: &Path, prefix: &str) -> LoadOptions {
        LoadOptions {
            config_file: Some(dir.join("config.yaml")),
            env_prefix: Some(prefix.into()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let dir = tempdir().unwrap();
        let cfg = load(isolated(dir.path(), "HN_BROWSE_TEST_DEFAULTS")).unwrap();
        assert_eq!(cfg.api.base_url, ALGOLIA_API_BASE);
        assert_eq!(cfg.api.timeout, Duration::from_secs(10));
        assert_eq!(cfg.browse.debounce, Duration::from_millis(300));
        assert_eq!(cfg.browse.time_range, TimeRange::FrontPage);
        assert_eq!(cfg.browse.comment_sort, CommentSort::MostReplies);
        assert!(cfg.log.file.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "api:\n  timeout: 3s\nbrowse:\n  debounce: 150ms\n  time_range: week\n  comment_sort: oldest-first\nlog:\n  filter: debug\n",
        )
        .unwrap();

        let cfg = load(isolated(dir.path(), "HN_BROWSE_TEST_FILE")).unwrap();
        assert_eq!(cfg.api.timeout, Duration::from_secs(3));
        assert_eq!(cfg.api.user_agent, default_user_agent());
        assert_eq!(cfg.browse.debounce, Duration::from_millis(150));
        assert_eq!(cfg.browse.time_range, TimeRange::Week);
        assert_eq!(cfg.browse.comment_sort, CommentSort::OldestFirst);
        assert_eq!(cfg.log.filter, "debug");
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "browse:\n  time_range: week\n").unwrap();
        env::set_var("HN_BROWSE_TEST_ENV_BROWSE__TIME_RANGE", "year");
        env::set_var("HN_BROWSE_TEST_ENV_API__BASE_URL", "http://localhost:9000/");

        let cfg = load(isolated(dir.path(), "HN_BROWSE_TEST_ENV")).unwrap();
        env::remove_var("HN_BROWSE_TEST_ENV_BROWSE__TIME_RANGE");
        env::remove_var("HN_BROWSE_TEST_ENV_API__BASE_URL");

        assert_eq!(cfg.browse.time_range, TimeRange::Year);
        assert_eq!(cfg.api.base_url, "http://localhost:9000/");
    }

    #[test]
    fn invalid_env_duration_is_an_error() {
        let dir = tempdir().unwrap();
        env::set_var("HN_BROWSE_TEST_BAD_BROWSE__DEBOUNCE", "soon");
        let result = load(isolated(dir.path(), "HN_BROWSE_TEST_BAD"));
        env::remove_var("HN_BROWSE_TEST_BAD_BROWSE__DEBOUNCE");
        assert!(result.is_err());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "browse: [not, a, map]\n").unwrap();
        let err = load(isolated(dir.path(), "HN_BROWSE_TEST_MALFORMED")).unwrap_err();
        assert!(format!("{err:#}").contains("config.yaml"));
    }
}
