// Runtime configuration, read from `kpi_report.toml` when present.
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::history::DEFAULT_CAPACITY;
use crate::period::PeriodId;

pub const DEFAULT_CONFIG_FILE: &str = "kpi_report.toml";

// Site lists used when the config file does not define any: the original
// network until November 2025 and the production sites from December 2025.
static DEFAULT_SITE_LISTS: Lazy<Vec<SiteList>> = Lazy::new(|| {
    let list = |from: (i32, u32), sites: &[&str]| SiteList {
        from: PeriodId::new(from.0, from.1).unwrap_or_else(|| PeriodId::of(chrono::NaiveDate::MIN)),
        sites: sites.iter().map(|s| s.to_string()).collect(),
    };
    vec![
        list(
            (2025, 10),
            &[
                "Aschaffenburg",
                "Renningen",
                "Hamburg",
                "Hannover",
                "Langenfeld",
                "Föhren",
                "Kassel",
                "Stockstadt",
                "Eutingen",
                "Berlin",
                "Melle",
                "Delmenhorst",
                "Güstrow",
            ],
        ),
        list(
            (2025, 12),
            &[
                "Delmenhorst",
                "Güstrow",
                "Döbeln",
                "Melle",
                "Langenfeld",
                "Kassel",
                "Berlin",
                "Aschaffenburg",
                "Renningen",
            ],
        ),
    ]
});

/// Sites seeded into every period starting at `from`, until a later list
/// takes over.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SiteList {
    pub from: PeriodId,
    pub sites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub history_capacity: usize,
    pub preview_rows: usize,
    pub site_lists: Vec<SiteList>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("monatsdaten"),
            log_level: "info".to_string(),
            history_capacity: DEFAULT_CAPACITY,
            preview_rows: 10,
            site_lists: DEFAULT_SITE_LISTS.clone(),
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Config> {
        let mut config: Config = toml::from_str(s)?;
        if config.site_lists.is_empty() {
            config.site_lists = DEFAULT_SITE_LISTS.clone();
        }
        config.site_lists.sort_by_key(|l| l.from);
        Ok(config)
    }

    /// Load `path`, or `kpi_report.toml` in the working directory. Without an
    /// explicit path a missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            debug!("no config file, using defaults");
            return Ok(Config::default());
        }
        let s = std::fs::read_to_string(&path)?;
        debug!(path = %path.display(), "loaded config");
        Config::from_toml(&s)
    }

    /// Sites for seeding `period`: the latest list starting at or before it,
    /// or the earliest list for periods before every entry.
    pub fn sites_for(&self, period: PeriodId) -> Vec<String> {
        self.site_lists
            .iter()
            .filter(|l| l.from <= period)
            .max_by_key(|l| l.from)
            .or_else(|| self.site_lists.iter().min_by_key(|l| l.from))
            .map(|l| l.sites.clone())
            .unwrap_or_default()
    }
}
