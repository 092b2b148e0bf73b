//! Server settings (environment and flags) and the TOML deployment file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use bridge_core::model::{
    Activity, ActivityError, ActivityId, CourseError, CourseId, CourseOutline, ModuleId,
    ModuleOutline, SuccessThreshold,
};
use bridge_core::origin::{Origin, OriginError, OriginPolicy};

//
// ─── FLAGS & ENVIRONMENT ───────────────────────────────────────────────────────
//

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidPort { raw: String },
    HelpRequested,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidPort { raw } => write!(f, "invalid --port value: {raw}"),
            ArgsError::HelpRequested => write!(f, "help requested"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_port(raw: String) -> Result<u16, ArgsError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ArgsError::InvalidPort { raw })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerArgs {
    pub db_url: String,
    pub host: String,
    pub port: u16,
    pub config_path: Option<PathBuf>,
}

impl ServerArgs {
    /// Read `BRIDGE_*` variables, then let flags override them.
    ///
    /// # Errors
    ///
    /// Returns `ArgsError` for unknown flags or unusable values.
    pub fn parse(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("BRIDGE_DB_URL").unwrap_or_else(|| "sqlite://bridge.sqlite3".into());
        let mut host = env("BRIDGE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let mut port = match env("BRIDGE_PORT") {
            Some(raw) => parse_port(raw)?,
            None => 3000,
        };
        let mut config_path = env("BRIDGE_CONFIG")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--host" => host = require_value(&mut args, "--host")?,
                "--port" => port = parse_port(require_value(&mut args, "--port")?)?,
                "--config" => {
                    config_path = Some(PathBuf::from(require_value(&mut args, "--config")?));
                }
                "--help" | "-h" => return Err(ArgsError::HelpRequested),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            host,
            port,
            config_path,
        })
    }

    /// Parse the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns `ArgsError` for unknown flags or unusable values.
    pub fn from_process() -> Result<Self, ArgsError> {
        Self::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app --bin bridge-server -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://bridge.sqlite3)");
    eprintln!("  --host <addr>             Bind address (default: 0.0.0.0)");
    eprintln!("  --port <port>             Bind port (default: 3000)");
    eprintln!("  --config <path>           Deployment TOML (origins, thresholds, courses)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  BRIDGE_DB_URL, BRIDGE_HOST, BRIDGE_PORT, BRIDGE_CONFIG");
    eprintln!("  BRIDGE_GRADE_SINK_URL, BRIDGE_GRADE_SINK_TOKEN, RUST_LOG");
}

//
// ─── DEPLOYMENT FILE ───────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("origin {raw:?}: {source}")]
    Origin {
        raw: String,
        #[source]
        source: OriginError,
    },
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Course(#[from] CourseError),
}

fn default_success_threshold() -> f64 {
    SuccessThreshold::DEFAULT
}

/// The per-deployment file.
///
/// ```toml
/// default_success_threshold = 0.7
///
/// [origins]
/// "https://content.example.org" = true
/// "https://retired.example.org" = false
///
/// [[courses]]
/// id = 1
///
/// [[courses.modules]]
/// id = 10
///
/// [[courses.modules.activities]]
/// id = 100
/// success_threshold = 0.8
/// allowed_origins = ["https://content.example.org"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Origin -> trusted for embedding.
    #[serde(default)]
    pub origins: BTreeMap<String, bool>,

    #[serde(default = "default_success_threshold")]
    pub default_success_threshold: f64,

    #[serde(default)]
    pub courses: Vec<CourseSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourseSection {
    pub id: u64,
    #[serde(default)]
    pub modules: Vec<ModuleSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSection {
    pub id: u64,
    #[serde(default)]
    pub activities: Vec<ActivitySection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivitySection {
    pub id: u64,
    pub success_threshold: Option<f64>,
    /// Empty means "any origin the deployment trusts".
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            origins: BTreeMap::new(),
            default_success_threshold: default_success_threshold(),
            courses: Vec::new(),
        }
    }
}

fn parse_origin(raw: &str) -> Result<Origin, ConfigError> {
    Origin::parse(raw).map_err(|source| ConfigError::Origin {
        raw: raw.to_owned(),
        source,
    })
}

impl DeploymentConfig {
    /// Load config from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Origin` for an origin that cannot be normalized.
    pub fn origin_policy(&self) -> Result<OriginPolicy, ConfigError> {
        let entries = self
            .origins
            .iter()
            .map(|(raw, trusted)| -> Result<_, ConfigError> {
                Ok((parse_origin(raw)?, *trusted))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(OriginPolicy::from_entries(entries))
    }

    /// Build validated course outlines from the `[[courses]]` tables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid thresholds, origins or duplicate
    /// activities.
    pub fn course_outlines(&self) -> Result<Vec<CourseOutline>, ConfigError> {
        let default_threshold = SuccessThreshold::new(self.default_success_threshold)?;
        self.courses
            .iter()
            .map(|course| course.to_outline(default_threshold))
            .collect()
    }
}

impl CourseSection {
    fn to_outline(
        &self,
        default_threshold: SuccessThreshold,
    ) -> Result<CourseOutline, ConfigError> {
        let course_id = CourseId::new(self.id);
        let mut modules = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            let module_id = ModuleId::new(module.id);
            let activities = module
                .activities
                .iter()
                .map(|activity| activity.to_activity(module_id, course_id, default_threshold))
                .collect::<Result<Vec<_>, _>>()?;
            modules.push(ModuleOutline::new(module_id, activities));
        }
        Ok(CourseOutline::new(course_id, modules)?)
    }
}

impl ActivitySection {
    fn to_activity(
        &self,
        module_id: ModuleId,
        course_id: CourseId,
        default_threshold: SuccessThreshold,
    ) -> Result<Activity, ConfigError> {
        let threshold = match self.success_threshold {
            Some(raw) => SuccessThreshold::new(raw)?,
            None => default_threshold,
        };
        let origins = self
            .allowed_origins
            .iter()
            .map(String::as_str)
            .map(parse_origin)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Activity::new(
            ActivityId::new(self.id),
            module_id,
            course_id,
            threshold,
            origins,
        ))
    }
}
