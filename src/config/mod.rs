use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "JoplinBridge";
const APP_NAME: &str = "joplin-bridge";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const CONFIG_ENV: &str = "JOPLIN_BRIDGE_CONFIG";
pub const DEFAULT_HOST: &str = "http://127.0.0.1:41184";
pub const DEFAULT_DEEP_LINK_SCHEME: &str = "joplin";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    /// Resolves paths from the platform directories. `config_file` wins over
    /// `JOPLIN_BRIDGE_CONFIG`.
    pub fn discover(config_file: Option<&Path>) -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        let requested = config_file
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()).map(PathBuf::from));
        Ok(Self {
            paths: match requested {
                Some(location) => paths.with_config_location(location),
                None => paths,
            },
        })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Loads the config file, writing one with defaults on first run.
    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        let file = &self.paths.config_file;
        match fs::read_to_string(file) {
            Ok(raw) => self.parse(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let cfg = self.parse("")?;
                let rendered = toml::to_string_pretty(&cfg).context("serializing default config")?;
                fs::write(file, rendered)
                    .with_context(|| format!("writing default config {}", file.display()))?;
                Ok(cfg)
            }
            Err(err) => Err(err).with_context(|| format!("reading config {}", file.display())),
        }
    }

    pub fn load(&self) -> Result<AppConfig> {
        let file = &self.paths.config_file;
        let raw = fs::read_to_string(file)
            .with_context(|| format!("reading config {}", file.display()))?;
        self.parse(&raw)
    }

    fn parse(&self, raw: &str) -> Result<AppConfig> {
        let mut cfg: AppConfig = toml::from_str(raw).context("parsing config toml")?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;
        let state_dir = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
        Ok(Self::rooted(dirs.config_dir(), state_dir))
    }

    /// Layout used by tests: `<root>/config` and `<root>/state`.
    pub fn under(root: &Path) -> Self {
        Self::rooted(&root.join("config"), &root.join("state"))
    }

    fn rooted(config_dir: &Path, state_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            config_file: config_dir.join(CONFIG_FILE_NAME),
            log_dir: state_dir.join("logs"),
        }
    }

    /// Points at a user-chosen config file, or at `config.toml` inside a
    /// user-chosen directory. Logs stay where they were.
    pub fn with_config_location(self, location: PathBuf) -> Self {
        let (config_dir, config_file) = if location.is_dir() {
            (location.clone(), location.join(CONFIG_FILE_NAME))
        } else {
            let dir = location
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            (dir, location)
        };
        Self {
            config_dir,
            config_file,
            ..self
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.log_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub joplin: JoplinOptions,
    pub logging: LoggingOptions,
    /// Problems fixed up while loading, reported once logging is installed.
    #[serde(skip)]
    pub notices: Vec<String>,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        if self.logging.file.as_os_str().is_empty() {
            self.logging.file = paths.log_dir.join("debug.log");
        }
        if self.joplin.deep_link_scheme.trim().is_empty() {
            self.notices
                .push("empty deep link scheme in config, falling back to joplin".to_owned());
            self.joplin.deep_link_scheme = DEFAULT_DEEP_LINK_SCHEME.to_owned();
        }
    }

    pub fn preferences(&self) -> Preferences {
        Preferences::new(&self.joplin.host, &self.joplin.token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoplinOptions {
    pub host: String,
    /// Web Clipper authorisation token; empty until the user pastes one in.
    pub token: String,
    pub deep_link_scheme: String,
}

impl Default for JoplinOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            token: String::new(),
            deep_link_scheme: DEFAULT_DEEP_LINK_SCHEME.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Write structured audit events to `file`.
    pub audit: bool,
    pub file: PathBuf,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            audit: true,
            file: PathBuf::new(),
        }
    }
}

/// Connection settings for one invocation. Never persisted by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    host: String,
    token: String,
}

impl Preferences {
    pub fn new(host: &str, token: &str) -> Self {
        let host = host.trim().trim_end_matches('/');
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        Self {
            host: host.to_owned(),
            token: token.trim().to_owned(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `None` when no token has been configured.
    pub fn token(&self) -> Option<&str> {
        if self.token.is_empty() {
            None
        } else {
            Some(&self.token)
        }
    }

    pub fn overlay(&self, overrides: &HostPreferences) -> Self {
        Self::new(
            overrides.joplin_host.as_deref().unwrap_or(&self.host),
            overrides.joplin_token.as_deref().unwrap_or(&self.token),
        )
    }
}

/// Preference values a launcher host may send along with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPreferences {
    pub joplin_host: Option<String>,
    pub joplin_token: Option<String>,
}
