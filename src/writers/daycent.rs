//! DayCent weather files: tab-delimited, one row per day.
//!
//! Columns: day, month, year, day of year, tmax (deg C), tmin (deg C),
//! precipitation (cm), solar radiation (Langley/day), relative humidity (%),
//! wind speed (mph).

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use csv::WriterBuilder;

use crate::{
    error::PipelineResult,
    table::ClimateTable,
    variable::CmipVariable,
};

use super::{ensure_dir, round_to, write_years, SiteOutcome, SiteRequest};

pub const FILE_PREFIX: &str = "DayCent_weather_";

const MM_TO_CM: f64 = 0.1;
const WM2_PER_LANGLEY_DAY: f64 = 0.484582;
const MS_TO_MPH: f64 = 2.23694;

/// One day of weather in source units: deg C, mm, W/m2, %, m/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaycentDay {
    pub date: NaiveDate,
    pub tmax: f64,
    pub tmin: f64,
    pub precip_mm: f64,
    pub srad_wm2: f64,
    pub rh_percent: f64,
    pub wind_ms: f64,
}

/// Decimal places of the written columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Temperature, precipitation and humidity to 2 places; radiation and
    /// wind to 4.
    Mixed,
    /// Every column to 4 places.
    Fine,
}

impl Precision {
    fn coarse_decimals(self) -> i32 {
        match self {
            Precision::Mixed => 2,
            Precision::Fine => 4,
        }
    }
}

/// Writes `days` to `path`, converting to DayCent units.
pub fn write_daycent_file(
    path: &Path,
    days: &[DaycentDay],
    precision: Precision,
) -> PipelineResult<()> {
    let coarse = precision.coarse_decimals();
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;

    for day in days {
        writer.serialize((
            day.date.day(),
            day.date.month(),
            day.date.year(),
            day.date.ordinal(),
            round_to(day.tmax, coarse),
            round_to(day.tmin, coarse),
            round_to(day.precip_mm * MM_TO_CM, coarse),
            round_to(day.srad_wm2 / WM2_PER_LANGLEY_DAY, 4),
            round_to(day.rh_percent, coarse),
            round_to(day.wind_ms * MS_TO_MPH, 4),
        ))?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes `DayCent_weather_{year}.txt` for every requested year.
pub fn write_daycent(
    table: &ClimateTable,
    request: &SiteRequest,
    root: &Path,
) -> PipelineResult<SiteOutcome> {
    let site_dir = request.site_dir(root);
    ensure_dir(&site_dir)?;

    write_years(request, |year| {
        let column = |variable| request.slice(table, year, variable);
        let tmax = column(CmipVariable::Tasmax)?;
        let tmin = column(CmipVariable::Tasmin)?;
        let pr = column(CmipVariable::Pr)?;
        let rsds = column(CmipVariable::Rsds)?;
        let hurs = column(CmipVariable::Hurs)?;
        let wind = column(CmipVariable::SfcWind)?;

        let days: Vec<DaycentDay> = tmax
            .days()
            .iter()
            .zip(tmin.values())
            .zip(pr.values())
            .zip(rsds.values())
            .zip(hurs.values())
            .zip(wind.values())
            .map(|(((((tmax, tmin), pr), rsds), hurs), wind)| DaycentDay {
                date: tmax.date,
                tmax: tmax.value,
                tmin,
                precip_mm: pr,
                srad_wm2: rsds,
                rh_percent: hurs,
                wind_ms: wind,
            })
            .collect();

        let path: PathBuf = site_dir.join(format!("{FILE_PREFIX}{year}.txt"));
        write_daycent_file(&path, &days, Precision::Mixed)?;

        Ok(vec![path])
    })
}

// -- Tests -------------------------------------------------------------------
