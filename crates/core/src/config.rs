use crate::rule::{normalize_rules, Rule};
use anyhow::{Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_destination: PathBuf,
    pub preview_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_selected_rule_id: Option<String>,
    pub rules: Vec<Rule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let home = UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .unwrap_or_default();
        Self {
            default_destination: home.join("Unsorted"),
            preview_mode: true,
            last_selected_rule_id: None,
            rules: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "shiwake", "shiwake")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    save_config_to(config, &paths.config_path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "設定ファイルがないため既定の設定を作成します");
        let config = AppConfig::default();
        save_config_to(&config, path)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("設定ファイルを読めませんでした: {}", path.display()))?;

    let mut config = if is_json(path) {
        serde_json::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?
    } else {
        toml::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?
    };

    normalize_rules(&mut config.rules)
        .with_context(|| format!("ルール定義が不正です: {}", path.display()))?;
    Ok(config)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("設定ディレクトリを作成できませんでした: {}", parent.display())
        })?;
    }

    let body = if is_json(path) {
        serde_json::to_string_pretty(config).context("設定のシリアライズに失敗しました")?
    } else {
        toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?
    };
    fs::write(path, body)
        .with_context(|| format!("設定ファイルを書き込めませんでした: {}", path.display()))?;
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
