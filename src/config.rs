//! Pipeline configuration.
//!
//! One immutable [`PipelineConfig`] is built at start-up (defaults, then an
//! optional YAML file, then command-line overrides) and handed to the
//! pipeline by reference.

use std::{
    fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    thread,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::table::GridCell;

pub const SOURCE_DIR_NAME: &str = "downloaded_CMIP_data";
pub const OUTPUT_DIR_NAME: &str = "converted_climate_data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(default)]
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl Site {
    pub fn new(lat: f64, lon: f64) -> Self {
        Site {
            name: None,
            lat,
            lon,
        }
    }

    pub fn target(&self) -> GridCell {
        GridCell {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub work_dir: PathBuf,
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub source_id: String,
    pub variant_label: String,
    pub grid_label: String,
    pub frequency: String,
    pub start_year: i32,
    pub end_year: i32,
    /// Number of years in each downloaded source file.
    pub year_interval: i32,
    pub experiments: Vec<String>,
    pub sites: Vec<Site>,
    /// Worker pool size; defaults to the available parallelism.
    pub workers: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            work_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("CMIP_to_Model_Inputs"),
            source_dir: None,
            output_dir: None,
            source_id: "CESM2".to_string(),
            variant_label: "r10i1p1f1".to_string(),
            grid_label: "gn".to_string(),
            frequency: "day".to_string(),
            start_year: 2015,
            end_year: 2100,
            year_interval: 10,
            experiments: vec!["ssp245".to_string(), "ssp585".to_string()],
            sites: vec![Site::new(40.07, -88.21)],
            workers: None,
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config from {:?}", path.as_ref()))?;
        let config: PipelineConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path.as_ref()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_year > self.end_year {
            bail!(
                "start year {} is after end year {}",
                self.start_year,
                self.end_year
            );
        }
        if self.year_interval < 1 {
            bail!("year interval must be at least 1, got {}", self.year_interval);
        }
        if self.experiments.is_empty() {
            bail!("no experiments configured");
        }
        if self.sites.is_empty() {
            bail!("no sites configured");
        }
        if self.workers == Some(0) {
            bail!("worker count must be at least 1");
        }
        for (index, site) in self.sites.iter().enumerate() {
            if !(-90.0..=90.0).contains(&site.lat) {
                bail!("site {} latitude {} is out of range", index + 1, site.lat);
            }
            if !(-180.0..=360.0).contains(&site.lon) {
                bail!("site {} longitude {} is out of range", index + 1, site.lon);
            }
        }

        Ok(())
    }

    pub fn source_dir(&self) -> PathBuf {
        self.source_dir
            .clone()
            .unwrap_or_else(|| self.work_dir.join(SOURCE_DIR_NAME))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.work_dir.join(OUTPUT_DIR_NAME))
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    /// Worker pool size, never above the host CPU count.
    pub fn worker_count(&self) -> usize {
        let cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        match self.workers {
            Some(requested) if requested > cpus => {
                warn!(requested, cpus, "capping workers at the CPU count");
                cpus
            }
            Some(requested) => requested,
            None => cpus,
        }
    }
}

// -- Tests -------------------------------------------------------------------
