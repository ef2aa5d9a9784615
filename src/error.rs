//! Error kinds raised while extracting sources and rendering model files.

use std::path::PathBuf;

use thiserror::Error;

use crate::table::TableKey;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source has to be (re-)downloaded before the task can run.
    #[error("source file `{}` does not exist", path.display())]
    MissingSourceFile { path: PathBuf },

    #[error("year {year} not found in `{}`", path.display())]
    YearNotFound { year: i32, path: PathBuf },

    #[error("year {year} has {found} usable days, expected {expected} contiguous days")]
    CalendarGap {
        year: i32,
        expected: usize,
        found: usize,
    },

    #[error("unsupported calendar `{0}`")]
    UnsupportedCalendar(String),

    #[error("invalid time axis: {0}")]
    InvalidTime(String),

    #[error("variable `{name}` missing from `{}`", path.display())]
    MissingVariable { name: String, path: PathBuf },

    #[error("source units `{found}` cannot be converted, expected `{expected}`")]
    UnexpectedUnits { found: String, expected: &'static str },

    #[error("bounding box selects no cells of `{}`", path.display())]
    EmptyRegion { path: PathBuf },

    #[error("variable `{name}` has unexpected dimensions {dims:?}")]
    UnexpectedShape { name: String, dims: Vec<String> },

    /// The task enumeration maps one-to-one onto table keys, so this is an invariant violation.
    #[error("table slot {0} assigned twice")]
    DuplicateAssignment(TableKey),

    #[error("no {variable} data for {year} ({experiment}, site {site})")]
    MalformedOutputRequest {
        experiment: String,
        site: usize,
        year: i32,
        variable: String,
    },

    #[error("longitude {0} lies outside the solar noon reference grid")]
    SiteOutsideReferenceGrid(f64),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
