//! Ecosys weather files: `me{year}w.csv`, four header rows then one row per day.

use std::path::Path;

use chrono::Datelike;
use csv::WriterBuilder;

use crate::{
    error::{PipelineError, PipelineResult},
    table::ClimateTable,
    variable::CmipVariable,
};

use super::{ensure_dir, write_years, SiteOutcome, SiteRequest};

/// Western edge centre of the 0.125 degree solar noon reference grid.
const GRID_WEST: f64 = -124.938;
/// The grid stops before this centre.
const GRID_EAST: f64 = -67.062;
const GRID_STEP: f64 = 0.125;

/// Local solar noon offset (ZNOONG) for a site longitude.
///
/// The longitude is snapped to the centre of its reference grid cell; sites
/// west or east of the grid have no value.
pub fn solar_noon(lon: f64) -> PipelineResult<f64> {
    let lon_180 = if lon > 180.0 { lon - 360.0 } else { lon };
    let cells = ((GRID_EAST - GRID_WEST) / GRID_STEP).ceil() as i64;
    let edge = GRID_WEST - GRID_STEP / 2.0;

    let index = ((lon_180 - edge) / GRID_STEP).floor();
    if !index.is_finite() || index < 0.0 || index as i64 >= cells {
        return Err(PipelineError::SiteOutsideReferenceGrid(lon));
    }
    let centre = GRID_WEST + index * GRID_STEP;

    Ok(12.0 - centre / 15.0 + 1.0)
}

pub fn write_ecosys(
    table: &ClimateTable,
    request: &SiteRequest,
    root: &Path,
) -> PipelineResult<SiteOutcome> {
    let site_dir = request.site_dir(root);
    ensure_dir(&site_dir)?;
    let znoong = solar_noon(request.site.lon)?;

    write_years(request, |year| {
        let columns = CmipVariable::ALL
            .into_iter()
            .map(|variable| request.slice(table, year, variable))
            .collect::<PipelineResult<Vec<_>>>()?;

        let path = site_dir.join(format!("me{year}w.csv"));
        let mut writer = WriterBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_path(&path)?;

        writer.write_record(["DJ0206XDMNHWPR"])?;
        writer.write_record(["CCRSMW"])?;
        writer.serialize((10, 0, znoong))?;
        writer.serialize((7, 0.25, 0.3, 0.05, 0, 0, 0, 0, 0, 0, 0, 0))?;

        for (row, day) in columns[0].days().iter().enumerate() {
            let mut record = vec![year.to_string(), day.date.ordinal().to_string()];
            record.extend(columns.iter().map(|c| c.days()[row].value.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;

        Ok(vec![path])
    })
}

// -- Tests -------------------------------------------------------------------
