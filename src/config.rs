//! Configuration for pdfshelf.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PDFSHELF_HOME, PDFSHELF_PDFIUM_LIB)
//! 2. Config file (.pdfshelf/config.yaml)
//! 3. Defaults (~/.pdfshelf)
//!
//! Config file discovery:
//! - Searches current directory and parents for .pdfshelf/config.yaml
//! - Relative paths in the config file are relative to the .pdfshelf/ directory
//!
//! ```yaml
//! version: "1.0"
//! paths:
//!   home: ./
//!   pdfium_library: ../lib/libpdfium.so
//! storage:
//!   key: pdfshelf-library
//!   quota_bytes: 5242880
//! reader:
//!   min_zoom: 0.5
//!   max_zoom: 3.0
//!   zoom_step: 0.1
//!   theme: sepia
//! cover:
//!   scale: 0.5
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::reader::ReaderSettings;
use crate::core::DEFAULT_COVER_SCALE;
use crate::domain::ThemeMode;
use crate::library::DEFAULT_STORAGE_KEY;

pub const HOME_ENV: &str = "PDFSHELF_HOME";
pub const PDFIUM_LIB_ENV: &str = "PDFSHELF_PDFIUM_LIB";

const CONFIG_DIR: &str = ".pdfshelf";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub reader: Option<ReaderConfig>,
    #[serde(default)]
    pub cover: Option<CoverConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Library home (relative to .pdfshelf/)
    pub home: Option<String>,
    /// Pdfium shared library file (relative to .pdfshelf/)
    pub pdfium_library: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub key: Option<String>,
    pub quota_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    pub min_zoom: Option<f32>,
    pub max_zoom: Option<f32>,
    pub zoom_step: Option<f32>,
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoverConfig {
    pub scale: Option<f32>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Library home directory
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub storage: StorageSettings,
    pub reader: ReaderSettings,
    pub cover_scale: f32,
    /// Explicit Pdfium library; `None` searches the usual locations
    pub pdfium_library: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub key: String,
    /// `None` means unlimited
    pub quota_bytes: Option<usize>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            key: DEFAULT_STORAGE_KEY.to_string(),
            quota_bytes: None,
        }
    }
}

impl ResolvedConfig {
    /// Directory holding the storage slots
    pub fn store_dir(&self) -> PathBuf {
        self.home.join("store")
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn reader_settings(config: Option<&ReaderConfig>) -> Result<ReaderSettings> {
    let defaults = ReaderSettings::default();
    let Some(config) = config else {
        return Ok(defaults);
    };

    let settings = ReaderSettings {
        min_zoom: config.min_zoom.unwrap_or(defaults.min_zoom),
        max_zoom: config.max_zoom.unwrap_or(defaults.max_zoom),
        zoom_step: config.zoom_step.unwrap_or(defaults.zoom_step),
        initial_zoom: defaults.initial_zoom,
        theme: match config.theme.as_deref() {
            Some(theme) => theme.parse::<ThemeMode>()?,
            None => defaults.theme,
        },
    };

    if !(settings.min_zoom > 0.0 && settings.min_zoom <= settings.max_zoom) {
        anyhow::bail!(
            "Invalid zoom range: min_zoom {} must be positive and not above max_zoom {}",
            settings.min_zoom,
            settings.max_zoom
        );
    }
    if settings.zoom_step <= 0.0 {
        anyhow::bail!("Invalid zoom_step: {}", settings.zoom_step);
    }

    Ok(settings)
}

/// Load configuration, searching for a config file from `start`
fn load_config_from(start: Option<&Path>) -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = start.and_then(find_config_file);
    let env_home = std::env::var(HOME_ENV).ok().map(PathBuf::from);
    let env_pdfium = std::env::var(PDFIUM_LIB_ENV).ok().map(PathBuf::from);

    let (home, storage, reader, cover_scale, pdfium_library) = if let Some(ref config_path) =
        config_file
    {
        let config = load_config_file(config_path)?;

        // Relative paths are anchored at .pdfshelf/
        let config_dir = config_path.parent().unwrap_or(Path::new("."));

        let home = if let Some(env_home) = env_home {
            env_home
        } else if let Some(ref home_path) = config.paths.home {
            resolve_path(config_dir, home_path)
        } else {
            default_home
        };

        let pdfium_library = env_pdfium.or_else(|| {
            config
                .paths
                .pdfium_library
                .as_deref()
                .map(|p| resolve_path(config_dir, p))
        });

        let storage = StorageSettings {
            key: config
                .storage
                .as_ref()
                .and_then(|s| s.key.clone())
                .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
            quota_bytes: config.storage.as_ref().and_then(|s| s.quota_bytes),
        };

        let reader = reader_settings(config.reader.as_ref())
            .with_context(|| format!("Invalid reader settings in {}", config_path.display()))?;

        let cover_scale = config
            .cover
            .as_ref()
            .and_then(|c| c.scale)
            .unwrap_or(DEFAULT_COVER_SCALE);

        (home, storage, reader, cover_scale, pdfium_library)
    } else {
        // No config file - use env vars or defaults
        (
            env_home.unwrap_or(default_home),
            StorageSettings::default(),
            ReaderSettings::default(),
            DEFAULT_COVER_SCALE,
            env_pdfium,
        )
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        storage,
        reader,
        cover_scale,
        pdfium_library,
    })
}

fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().ok();
    load_config_from(cwd.as_deref())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(root: &Path, body: &str) -> PathBuf {
        let dir = root.join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_default_config_without_file() {
        if std::env::var(HOME_ENV).is_ok() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let config = load_config_from(Some(temp.path())).unwrap();

        let expected_home = dirs::home_dir().unwrap().join(".pdfshelf");
        assert_eq!(config.home, expected_home);
        assert_eq!(config.store_dir(), expected_home.join("store"));
        assert_eq!(config.storage, StorageSettings::default());
        assert_eq!(config.reader, ReaderSettings::default());
        assert_eq!(config.cover_scale, DEFAULT_COVER_SCALE);
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  home: ./
storage:
  key: my-books
  quota_bytes: 5242880
reader:
  max_zoom: 2.0
  theme: sepia
cover:
  scale: 0.25
"#,
        );

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("./".to_string()));
        assert_eq!(config.storage.unwrap().quota_bytes, Some(5_242_880));
        assert_eq!(config.reader.unwrap().theme.as_deref(), Some("sepia"));
    }

    #[test]
    fn test_config_discovered_from_subdirectory() {
        if std::env::var(HOME_ENV).is_ok() || std::env::var(PDFIUM_LIB_ENV).is_ok() {
            return;
        }
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  pdfium_library: /opt/pdfium/libpdfium.so
reader:
  min_zoom: 0.25
  theme: dark
"#,
        );
        let nested = temp.path().join("books").join("2024");
        std::fs::create_dir_all(&nested).unwrap();

        let config = load_config_from(Some(&nested)).unwrap();
        assert!(config.config_file.is_some());
        assert_eq!(config.reader.min_zoom, 0.25);
        assert_eq!(config.reader.max_zoom, 3.0);
        assert_eq!(config.reader.theme, ThemeMode::Dark);
        assert_eq!(
            config.pdfium_library,
            Some(PathBuf::from("/opt/pdfium/libpdfium.so"))
        );
    }

    #[test]
    fn test_invalid_reader_settings_rejected() {
        let bad_range = ReaderConfig {
            min_zoom: Some(2.0),
            max_zoom: Some(1.0),
            zoom_step: None,
            theme: None,
        };
        assert!(reader_settings(Some(&bad_range)).is_err());

        let bad_theme = ReaderConfig {
            min_zoom: None,
            max_zoom: None,
            zoom_step: None,
            theme: Some("neon".to_string()),
        };
        assert!(reader_settings(Some(&bad_theme)).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
