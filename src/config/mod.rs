use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "JournalTui";
const APP_NAME: &str = "journaltui";

pub const CONFIG_ENV: &str = "JOURNALTUI_CONFIG";
pub const DATA_ENV: &str = "JOURNALTUI_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_dir = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir,
            log_dir,
            state_dir,
        })
    }

    /// Lays every directory out under `root`; used by tests and `--data-dir`
    /// style sandboxes.
    pub fn rooted_at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let state_dir = root.join("state");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            data_dir: root.join("data"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(format!("{APP_NAME}.log"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timeline_count: usize,
    pub initial_page: usize,
    pub older_page: usize,
    pub tick_ms: u64,
    pub habits: Vec<String>,
    pub todos: Vec<String>,
    pub latency: LatencyConfig,
    pub failures: FailureConfig,
    pub display: DisplayConfig,
    pub templates: Vec<TemplateConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timeline_count: 10,
            initial_page: 20,
            older_page: 5,
            tick_ms: 100,
            habits: vec!["Read book".into(), "Exercise".into(), "Meditate".into()],
            todos: vec!["Water the plants".into(), "Reply to emails".into()],
            latency: LatencyConfig::default(),
            failures: FailureConfig::default(),
            display: DisplayConfig::default(),
            templates: vec![
                TemplateConfig {
                    name: "Daily review".into(),
                    body: "Went well:\nCould improve:\nTomorrow:".into(),
                },
                TemplateConfig {
                    name: "Gratitude".into(),
                    body: "Grateful for:".into(),
                },
            ],
        }
    }
}

impl AppConfig {
    fn post_load(&mut self) {
        if self.timeline_count == 0 {
            tracing::warn!("timeline_count of 0 in config, falling back to 1");
            self.timeline_count = 1;
        }
        if self.older_page == 0 {
            tracing::warn!("older_page of 0 in config, falling back to 5");
            self.older_page = 5;
        }
        if self.tick_ms == 0 {
            self.tick_ms = 100;
        }
        self.habits.retain(|item| !item.trim().is_empty());
        self.todos.retain(|item| !item.trim().is_empty());
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Simulated network latency for entry store calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Initial, refresh and older-page loads.
    pub load_ms: u64,
    /// Appends, entry saves and title saves.
    pub write_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            load_ms: 1000,
            write_ms: 500,
        }
    }
}

impl LatencyConfig {
    pub fn load_duration(&self) -> Duration {
        Duration::from_millis(self.load_ms)
    }

    pub fn write_duration(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureConfig {
    /// Fail every Nth store call (0 = never).
    pub every_nth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub timestamps: bool,
    pub edit_controls: bool,
    pub habits: bool,
    pub todos: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timestamps: true,
            edit_controls: true,
            habits: false,
            todos: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub name: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_load_writes_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted_at(temp.path()));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.timeline_count, 10);
        assert_eq!(cfg.latency.load_ms, 1000);

        let reloaded = loader.load()?;
        assert_eq!(reloaded.initial_page, cfg.initial_page);
        assert_eq!(reloaded.templates.len(), cfg.templates.len());
        Ok(())
    }

    #[test]
    fn partial_config_fills_defaults_and_sanitizes() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "timeline_count = 0\nhabits = [\"Stretch\", \"  \"]\n\n[latency]\nload_ms = 100\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.timeline_count, 1);
        assert_eq!(cfg.latency.load_ms, 100);
        assert_eq!(cfg.latency.write_ms, 500);
        assert_eq!(cfg.habits, vec!["Stretch".to_string()]);
        Ok(())
    }
}
