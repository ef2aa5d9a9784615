//! Source file naming and task enumeration.
//!
//! CMIP files are named
//! `{variable}_{frequency}_{source}_{experiment}_{variant}_{grid}_{start}-{end}.nc`
//! and each covers one interval of `year_interval` years.

use std::path::{Path, PathBuf};

use crate::{
    config::PipelineConfig,
    error::{PipelineError, PipelineResult},
    table::GridCell,
    variable::CmipVariable,
};

/// One block of years held in a single source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: i32,
    /// Last year the pipeline reads, clamped to the configured end year.
    pub end: i32,
    /// Last year the file name claims to cover.
    pub nominal_end: i32,
}

impl Interval {
    /// Date range in the file name. A final chunk that runs past the
    /// configured end year is named up to 1 January of the following year,
    /// the way CESM2 publishes its last file.
    pub fn file_suffix(&self, end_year: i32) -> String {
        if self.nominal_end <= end_year {
            format!("{}0101-{}1231", self.start, self.nominal_end)
        } else {
            format!("{}0101-{}0101", self.start, end_year + 1)
        }
    }
}

pub fn intervals(config: &PipelineConfig) -> Vec<Interval> {
    let step = config.year_interval.max(1);

    (config.start_year..=config.end_year)
        .step_by(step as usize)
        .map(|start| {
            let nominal_end = start + step - 1;
            Interval {
                start,
                end: nominal_end.min(config.end_year),
                nominal_end,
            }
        })
        .collect()
}

pub fn source_file_name(
    config: &PipelineConfig,
    variable: CmipVariable,
    experiment: &str,
    interval: &Interval,
) -> String {
    format!(
        "{}_{}_{}_{}_{}_{}_{}.nc",
        variable.source_name(),
        config.frequency,
        config.source_id,
        experiment,
        config.variant_label,
        config.grid_label,
        interval.file_suffix(config.end_year)
    )
}

/// Fails with [`PipelineError::MissingSourceFile`] when the file is absent.
pub fn locate(path: &Path) -> PipelineResult<&Path> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(PipelineError::MissingSourceFile {
            path: path.to_path_buf(),
        })
    }
}

/// Everything one worker needs to extract one source file for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub experiment_index: usize,
    pub experiment: String,
    pub site_index: usize,
    pub site: GridCell,
    pub variable: CmipVariable,
    pub start_year: i32,
    pub end_year: i32,
    pub path: PathBuf,
}

impl Task {
    pub fn describe(&self) -> String {
        format!(
            "{} site {} {} {}-{}",
            self.experiment,
            self.site_index + 1,
            self.variable,
            self.start_year,
            self.end_year
        )
    }
}

/// Cross product of experiments, sites, intervals and variables.
pub fn enumerate_tasks(config: &PipelineConfig) -> Vec<Task> {
    let source_dir = config.source_dir();
    let intervals = intervals(config);
    let mut tasks = Vec::new();

    for (experiment_index, experiment) in config.experiments.iter().enumerate() {
        for (site_index, site) in config.sites.iter().enumerate() {
            for interval in &intervals {
                for variable in CmipVariable::ALL {
                    let file_name = source_file_name(config, variable, experiment, interval);
                    tasks.push(Task {
                        experiment_index,
                        experiment: experiment.clone(),
                        site_index,
                        site: site.target(),
                        variable,
                        start_year: interval.start,
                        end_year: interval.end,
                        path: source_dir.join(file_name),
                    });
                }
            }
        }
    }

    tasks
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, fs};

    use tempfile::TempDir;

    use crate::config::Site;

    use super::*;

    fn config_fixture() -> PipelineConfig {
        PipelineConfig {
            work_dir: PathBuf::from("/work"),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn should_split_years_into_intervals() {
        let intervals = intervals(&config_fixture());

        assert_eq!(intervals.len(), 9);
        assert_eq!(
            intervals[0],
            Interval {
                start: 2015,
                end: 2024,
                nominal_end: 2024
            }
        );
        assert_eq!(
            intervals[8],
            Interval {
                start: 2095,
                end: 2100,
                nominal_end: 2104
            }
        );
    }

    #[test]
    fn should_make_source_file_names() {
        let config = config_fixture();
        let intervals = intervals(&config);

        assert_eq!(
            source_file_name(&config, CmipVariable::Hurs, "ssp245", &intervals[0]),
            "hurs_day_CESM2_ssp245_r10i1p1f1_gn_20150101-20241231.nc"
        );
        assert_eq!(
            source_file_name(&config, CmipVariable::Pr, "ssp585", &intervals[8]),
            "pr_day_CESM2_ssp585_r10i1p1f1_gn_20950101-21010101.nc"
        );
    }

    #[test]
    fn should_enumerate_one_task_per_key_block() {
        let mut config = config_fixture();
        config.sites.push(Site::new(41.0, -93.0));

        let tasks = enumerate_tasks(&config);
        assert_eq!(tasks.len(), 2 * 2 * 9 * 6);

        let blocks: HashSet<_> = tasks
            .iter()
            .map(|t| (t.experiment_index, t.site_index, t.start_year, t.variable))
            .collect();
        assert_eq!(blocks.len(), tasks.len());

        let last = tasks.last().unwrap();
        assert_eq!(last.experiment, "ssp585");
        assert_eq!(last.site.lon, -93.0);
        assert_eq!(last.end_year, 2100);
        assert!(last.path.starts_with("/work/downloaded_CMIP_data"));
    }

    #[test]
    fn should_fail_to_locate_missing_file() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("tasmax.nc");
        fs::write(&present, b"").unwrap();

        assert!(locate(&present).is_ok());
        let missing = dir.path().join("tasmin.nc");
        assert!(matches!(
            locate(&missing),
            Err(PipelineError::MissingSourceFile { path }) if path == missing
        ));
    }
}
