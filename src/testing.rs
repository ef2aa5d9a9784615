//! Synthetic CMIP and GridMet sources for tests.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;

use crate::{
    calendar,
    config::PipelineConfig,
    reading::locator::{source_file_name, Interval},
    variable::{CmipVariable, GridmetVariable},
};

pub const GRID_LATS: [f64; 4] = [39.5, 40.0, 40.5, 41.0];
pub const GRID_LONS: [f64; 4] = [270.0, 271.25, 272.5, 273.75];

/// Writes a no-leap source file holding `value` everywhere for `years`
/// years from `start_year`, named the way the locator expects it.
pub fn write_constant_source(
    config: &PipelineConfig,
    variable: CmipVariable,
    experiment: &str,
    start_year: i32,
    years: i32,
    value: f64,
) -> PathBuf {
    let interval = Interval {
        start: start_year,
        end: start_year + years - 1,
        nominal_end: start_year + years - 1,
    };
    let dir = config.source_dir();
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(source_file_name(config, variable, experiment, &interval));

    let nt = years as usize * 365;
    let mut file = netcdf::create(&path).unwrap();
    file.add_dimension("time", nt).unwrap();
    file.add_dimension("lat", GRID_LATS.len()).unwrap();
    file.add_dimension("lon", GRID_LONS.len()).unwrap();

    {
        let mut time = file.add_variable::<f64>("time", &["time"]).unwrap();
        time.put_attribute("units", format!("days since {start_year}-01-01 00:00:00"))
            .unwrap();
        time.put_attribute("calendar", "noleap").unwrap();
        let offsets: Vec<f64> = (0..nt).map(|i| i as f64 + 0.5).collect();
        time.put_values(&offsets, ..).unwrap();
    }
    {
        let mut lat = file.add_variable::<f64>("lat", &["lat"]).unwrap();
        lat.put_values(&GRID_LATS, ..).unwrap();
    }
    {
        let mut lon = file.add_variable::<f64>("lon", &["lon"]).unwrap();
        lon.put_values(&GRID_LONS, ..).unwrap();
    }
    {
        let mut var = file
            .add_variable::<f32>(variable.source_name(), &["time", "lat", "lon"])
            .unwrap();
        let data = vec![value as f32; nt * GRID_LATS.len() * GRID_LONS.len()];
        var.put_values(&data, ..).unwrap();
    }

    path
}

pub const GRIDMET_LATS: [f64; 3] = [40.5, 40.0, 39.5];
pub const GRIDMET_LONS: [f64; 3] = [-88.5, -88.0, -87.5];

/// Writes a one-year GridMet-style file (`day` axis in days since 1900,
/// standard calendar by omission) holding `value` everywhere.
pub fn write_gridmet_source(path: &Path, variable: GridmetVariable, year: i32, value: f64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
    let first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
    let start = (first - epoch).num_days();
    let nt = calendar::days_in_year(year);

    let mut file = netcdf::create(path).unwrap();
    file.add_dimension("day", nt).unwrap();
    file.add_dimension("lat", GRIDMET_LATS.len()).unwrap();
    file.add_dimension("lon", GRIDMET_LONS.len()).unwrap();

    {
        let mut day = file.add_variable::<f64>("day", &["day"]).unwrap();
        day.put_attribute("units", "days since 1900-01-01 00:00:00")
            .unwrap();
        let offsets: Vec<f64> = (0..nt).map(|i| (start + i as i64) as f64).collect();
        day.put_values(&offsets, ..).unwrap();
    }
    {
        let mut lat = file.add_variable::<f64>("lat", &["lat"]).unwrap();
        lat.put_values(&GRIDMET_LATS, ..).unwrap();
    }
    {
        let mut lon = file.add_variable::<f64>("lon", &["lon"]).unwrap();
        lon.put_values(&GRIDMET_LONS, ..).unwrap();
    }
    {
        let mut var = file
            .add_variable::<f32>(variable.netcdf_name(), &["day", "lat", "lon"])
            .unwrap();
        let data = vec![value as f32; nt * GRIDMET_LATS.len() * GRIDMET_LONS.len()];
        var.put_values(&data, ..).unwrap();
    }
}
