use crate::apis::savant::DEFAULT_BASE_URL;
use crate::error::{EtlError, Result};
use crate::pipeline::processing::ColumnSpec;
use crate::registry::LedgerFiles;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "statcast.toml";
pub const CONFIG_ENV_VAR: &str = "STATCAST_CONFIG";
const SEASON_PLACEHOLDER: &str = "{season}";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub schedule: ScheduleConfig,
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub reference: ReferenceConfig,
    pub ledgers: LedgerConfig,
    #[serde(default)]
    pub columns: Option<ColumnsConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Inclusive `{ start, end }` range.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct InclusiveRange<T> {
    pub start: T,
    pub end: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub seasons: InclusiveRange<i32>,
    pub months: InclusiveRange<u32>,
    pub days: InclusiveRange<u32>,
}

impl ScheduleConfig {
    /// Every calendar date in the configured seasons, months and days, in
    /// order. Combinations that do not exist (04-31) are skipped.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        for season in self.seasons.start..=self.seasons.end {
            for month in self.months.start..=self.months.end {
                for day in self.days.start..=self.days.end {
                    if let Some(date) = NaiveDate::from_ymd_opt(season, month, day) {
                        dates.push(date);
                    }
                }
            }
        }
        dates
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Savant {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: u64,
    },
    CsvDir {
        dir: PathBuf,
    },
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceConfig {
    pub player_map: PathBuf,
    pub team_attributes: PathBuf,
}

/// Ledger path templates. Each must contain `{season}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub positions: String,
    pub batting_order: String,
    pub sprint_speed: String,
    #[serde(default)]
    pub feed_dir: Option<PathBuf>,
}

impl LedgerConfig {
    pub fn files_for(&self, season: i32) -> LedgerFiles {
        let resolve = |template: &str| PathBuf::from(template.replace(SEASON_PLACEHOLDER, &season.to_string()));
        LedgerFiles {
            positions: resolve(&self.positions),
            batting_order: resolve(&self.batting_order),
            sprint_speed: resolve(&self.sprint_speed),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnsConfig {
    pub order_path: PathBuf,
    pub names_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Config {
    /// Config file location: explicit argument, then `STATCAST_CONFIG`, then
    /// `statcast.toml` in the working directory.
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path)
            .map_err(|e| EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e)))?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.schedule;
        if s.seasons.start > s.seasons.end {
            return Err(EtlError::Config(format!(
                "season range {}..={} is inverted",
                s.seasons.start, s.seasons.end
            )));
        }
        check_range("month", s.months, 1, 12)?;
        check_range("day", s.days, 1, 31)?;

        for (name, template) in [
            ("positions", &self.ledgers.positions),
            ("batting_order", &self.ledgers.batting_order),
            ("sprint_speed", &self.ledgers.sprint_speed),
        ] {
            if !template.contains(SEASON_PLACEHOLDER) {
                return Err(EtlError::Config(format!(
                    "ledger template '{name}' must contain {SEASON_PLACEHOLDER}: {template}"
                )));
            }
        }

        if let SourceConfig::Savant { timeout_seconds: 0, .. } = self.source {
            return Err(EtlError::Config("source timeout_seconds must be positive".to_string()));
        }

        // Override files must exist and agree in length
        if self.columns.is_some() {
            self.column_spec()?;
        }
        Ok(())
    }

    /// The column specification: the configured files, or the built-in schema.
    pub fn column_spec(&self) -> Result<ColumnSpec> {
        match &self.columns {
            Some(c) => ColumnSpec::from_files(&c.order_path, &c.names_path),
            None => Ok(ColumnSpec::builtin()),
        }
    }
}

fn check_range(what: &str, range: InclusiveRange<u32>, min: u32, max: u32) -> Result<()> {
    if range.start > range.end {
        return Err(EtlError::Config(format!(
            "{what} range {}..={} is inverted",
            range.start, range.end
        )));
    }
    if range.start < min || range.end > max {
        return Err(EtlError::Config(format!(
            "{what} range {}..={} must lie within {min}..={max}",
            range.start, range.end
        )));
    }
    Ok(())
}
