//! Renders the climate table into each model's input files.
//!
//! Output lands in `{output}/generated_{Model}_climate_data/{experiment}/site_{n}/`.

pub mod agroibis;
pub mod daycent;
pub mod ecosys;

use std::{
    fmt, fs, io,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use tracing::warn;

use crate::{
    config::Site,
    error::{PipelineError, PipelineResult},
    table::{ClimateTable, TableKey, YearSlice},
    variable::CmipVariable,
};

pub use agroibis::write_agroibis;
pub use daycent::{write_daycent, write_daycent_file, DaycentDay, Precision};
pub use ecosys::write_ecosys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Model {
    #[value(name = "agroibis")]
    AgroIbis,
    Daycent,
    Ecosys,
}

impl Model {
    pub const ALL: [Model; 3] = [Model::AgroIbis, Model::Daycent, Model::Ecosys];

    pub fn dir_name(self) -> &'static str {
        match self {
            Model::AgroIbis => "generated_AgroIBIS_climate_data",
            Model::Daycent => "generated_Daycent_climate_data",
            Model::Ecosys => "generated_Ecosys_climate_data",
        }
    }

    /// Renders every requested year of one (experiment, site) pair.
    pub fn write(
        self,
        table: &ClimateTable,
        request: &SiteRequest,
        output_dir: &Path,
    ) -> PipelineResult<SiteOutcome> {
        let root = output_dir.join(self.dir_name());
        match self {
            Model::AgroIbis => write_agroibis(table, request, &root),
            Model::Daycent => write_daycent(table, request, &root),
            Model::Ecosys => write_ecosys(table, request, &root),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Model::AgroIbis => "AgroIBIS",
            Model::Daycent => "DayCent",
            Model::Ecosys => "Ecosys",
        })
    }
}

/// One (experiment, site) pair to render.
#[derive(Debug, Clone)]
pub struct SiteRequest<'a> {
    pub experiment_index: usize,
    pub experiment: &'a str,
    pub site_index: usize,
    pub site: &'a Site,
    pub years: RangeInclusive<i32>,
}

impl SiteRequest<'_> {
    pub fn site_dir(&self, root: &Path) -> PathBuf {
        root.join(self.experiment)
            .join(format!("site_{}", self.site_index + 1))
    }

    /// The slice for `year`/`variable`, or [`PipelineError::MalformedOutputRequest`].
    pub fn slice<'t>(
        &self,
        table: &'t ClimateTable,
        year: i32,
        variable: CmipVariable,
    ) -> PipelineResult<&'t YearSlice> {
        let key = TableKey::new(self.experiment_index, self.site_index, year, variable);
        table
            .get(&key)
            .ok_or_else(|| PipelineError::MalformedOutputRequest {
                experiment: self.experiment.to_string(),
                site: self.site_index + 1,
                year,
                variable: variable.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
    Written,
    Partial,
    Failed,
}

impl fmt::Display for OutputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            OutputStatus::Written => "WRITTEN",
            OutputStatus::Partial => "PARTIAL",
            OutputStatus::Failed => "FAILED",
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SiteOutcome {
    pub written: Vec<PathBuf>,
    /// Requested cells with no data, as "year variable".
    pub missing: Vec<String>,
    /// Why the writer gave up on this pair, if it did.
    pub error: Option<String>,
}

impl SiteOutcome {
    pub fn failed(error: impl fmt::Display) -> Self {
        SiteOutcome {
            error: Some(error.to_string()),
            ..SiteOutcome::default()
        }
    }

    pub fn status(&self) -> OutputStatus {
        if self.error.is_some() {
            OutputStatus::Failed
        } else if self.missing.is_empty() {
            OutputStatus::Written
        } else {
            OutputStatus::Partial
        }
    }
}

/// Creates `path` and its parents; an existing directory is fine.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Runs `render` for every year of the request. Empty table cells are
/// collected into the outcome so one gap does not hide the others; any other
/// error aborts.
pub(crate) fn write_years<F>(request: &SiteRequest, mut render: F) -> PipelineResult<SiteOutcome>
where
    F: FnMut(i32) -> PipelineResult<Vec<PathBuf>>,
{
    let mut outcome = SiteOutcome::default();

    for year in request.years.clone() {
        match render(year) {
            Ok(paths) => outcome.written.extend(paths),
            Err(PipelineError::MalformedOutputRequest { year, variable, .. }) => {
                warn!(
                    experiment = request.experiment,
                    site = request.site_index + 1,
                    year,
                    variable = %variable,
                    "skipping output with an empty table cell"
                );
                outcome.missing.push(format!("{year} {variable}"));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(outcome)
}

/// Rounds to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// -- Tests -------------------------------------------------------------------
