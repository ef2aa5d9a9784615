//! Site extraction: nearest-cell sampling, unit conversion and splitting a
//! multi-year series into calendar years.

use std::{collections::BTreeMap, path::Path};

use chrono::Datelike;

use crate::{
    calendar,
    error::{PipelineError, PipelineResult},
    table::{DailyValue, YearSlice},
    variable::{CmipVariable, Conversion},
};

use super::{
    locator::Task,
    grid::{read_site_series, SiteSeries},
};

/// Index of the coordinate closest to `target`. Ties go to the first one.
pub fn nearest_index(coords: &[f64], target: f64) -> Option<usize> {
    coords
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_finite())
        .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
        .map(|(i, _)| i)
}

/// Puts `target` in the longitude convention of the source grid: 0..360
/// when any source longitude is above 180, -180..180 otherwise.
pub fn normalize_longitude(target: f64, source_lons: &[f64]) -> f64 {
    let wraps = source_lons.iter().any(|&lon| lon > 180.0);
    if wraps && target < 0.0 {
        target + 360.0
    } else if !wraps && target > 180.0 {
        target - 360.0
    } else {
        target
    }
}

/// Applies `conversion` to every value of the series, once the series'
/// units are known to suit it.
pub fn convert(series: &SiteSeries, conversion: Conversion) -> PipelineResult<Vec<DailyValue>> {
    conversion.check_units(series.units.as_deref())?;

    Ok(series
        .dates
        .iter()
        .zip(&series.values)
        .map(|(&date, &value)| DailyValue::new(date, conversion.apply(value)))
        .collect())
}

/// Groups a converted series by calendar year and normalises each of the
/// requested years onto the Gregorian calendar.
pub fn split_years(
    days: Vec<DailyValue>,
    years: std::ops::RangeInclusive<i32>,
    path: &Path,
) -> PipelineResult<BTreeMap<i32, Vec<DailyValue>>> {
    let mut grouped: BTreeMap<i32, Vec<DailyValue>> = BTreeMap::new();
    for day in days {
        grouped.entry(day.date.year()).or_default().push(day);
    }

    let mut normalized = BTreeMap::new();
    for year in years {
        let days = grouped
            .remove(&year)
            .ok_or_else(|| PipelineError::YearNotFound {
                year,
                path: path.to_path_buf(),
            })?;
        normalized.insert(year, calendar::normalize_year(year, days)?);
    }

    Ok(normalized)
}

/// Builds the year slices of one variable from a series already read.
pub fn year_slices(
    series: &SiteSeries,
    variable: CmipVariable,
    years: std::ops::RangeInclusive<i32>,
    path: &Path,
) -> PipelineResult<Vec<YearSlice>> {
    let descriptor = variable.descriptor();
    let days = convert(series, descriptor.conversion)?;

    split_years(days, years, path)?
        .into_iter()
        .map(|(year, days)| YearSlice::new(year, variable, descriptor.unit, series.cell, days))
        .collect()
}

/// Runs one task: locate, read, convert, split and normalise.
pub fn extract_task(task: &Task) -> PipelineResult<Vec<YearSlice>> {
    let series = read_site_series(&task.path, task.variable.source_name(), task.site)?;

    year_slices(
        &series,
        task.variable,
        task.start_year..=task.end_year,
        &task.path,
    )
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use crate::{
        calendar::{TimeAxis, TimeCalendar},
        table::GridCell,
    };

    use super::*;

    fn noleap_series(first_year: i32, years: usize, value: impl Fn(usize) -> f64) -> SiteSeries {
        let axis = TimeAxis::new(
            &format!("days since {first_year}-01-01 00:00:00"),
            TimeCalendar::NoLeap,
        )
        .unwrap();
        let n = years * 365;

        SiteSeries {
            cell: GridCell {
                lat: 40.05,
                lon: 271.75,
            },
            dates: (0..n).map(|i| axis.decode(i as f64 + 0.5).unwrap()).collect(),
            values: (0..n).map(value).collect(),
            units: Some("K".to_string()),
        }
    }

    #[test]
    fn should_find_nearest_index() {
        let lats = [39.5, 40.0, 40.5, 41.0];
        assert_eq!(nearest_index(&lats, 40.07), Some(1));
        assert_eq!(nearest_index(&lats, 45.0), Some(3));
        assert_eq!(nearest_index(&lats, -10.0), Some(0));
        assert_eq!(nearest_index(&[], 1.0), None);

        // GridMet latitudes run north to south.
        let descending = [49.4, 45.0, 40.1, 25.1];
        assert_eq!(nearest_index(&descending, 40.07), Some(2));
    }

    #[test]
    fn should_normalize_longitude_for_0_360_grids() {
        let grid = [0.0, 90.0, 180.0, 270.0, 358.75];
        assert!((normalize_longitude(-88.21, &grid) - 271.79).abs() < 1e-9);
        assert_eq!(normalize_longitude(12.0, &grid), 12.0);

        let signed = [-124.7, -100.0, -67.1];
        assert_eq!(normalize_longitude(-88.21, &signed), -88.21);
        assert!((normalize_longitude(271.79, &signed) - -88.21).abs() < 1e-9);
        assert_eq!(normalize_longitude(180.0, &signed), 180.0);
    }

    #[test]
    fn should_pick_same_cell_in_either_convention() {
        let signed = [-89.0, -88.5, -88.0, -87.5];
        let target = normalize_longitude(271.79, &signed);

        assert_eq!(nearest_index(&signed, target), Some(2));
        assert_eq!(
            nearest_index(&signed, normalize_longitude(-88.21, &signed)),
            Some(2)
        );
    }

    #[test]
    fn should_split_decade_into_calendar_years() {
        let series = noleap_series(2015, 10, |_| 300.0);
        let path = PathBuf::from("tasmax.nc");

        let slices = year_slices(&series, CmipVariable::Tasmax, 2015..=2024, &path).unwrap();

        assert_eq!(slices.len(), 10);
        for slice in &slices {
            assert_eq!(slice.len(), calendar::days_in_year(slice.year()));
            assert_eq!(slice.unit(), "deg C");
            assert_eq!(slice.cell().lon, 271.75);
            assert!(slice.values().all(|v| (v - 26.85).abs() < 1e-9));
        }
        assert_eq!(slices[1].year(), 2016);
        assert_eq!(slices[1].len(), 366);
    }

    #[test]
    fn should_only_keep_requested_years() {
        let series = noleap_series(2095, 6, |i| i as f64);
        let path = PathBuf::from("pr.nc");

        let slices = year_slices(&series, CmipVariable::Rsds, 2096..=2097, &path).unwrap();

        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].year(), 2096);
        assert_eq!(slices[0].days()[0].value, 365.0);
        assert_eq!(
            slices[0].days()[59].date,
            NaiveDate::from_ymd_opt(2096, 2, 29).unwrap()
        );
    }

    #[test]
    fn should_report_missing_year() {
        let series = noleap_series(2015, 9, |_| 1.0);
        let path = PathBuf::from("hurs.nc");

        let result = year_slices(&series, CmipVariable::Hurs, 2015..=2024, &path);

        assert!(matches!(
            result,
            Err(PipelineError::YearNotFound { year: 2024, .. })
        ));
    }

    #[test]
    fn should_reject_temperature_not_in_kelvin() {
        let mut series = noleap_series(2015, 1, |_| 26.85);
        series.units = Some("degC".to_string());
        let path = PathBuf::from("tasmax.nc");

        let result = year_slices(&series, CmipVariable::Tasmax, 2015..=2015, &path);

        assert!(matches!(
            result,
            Err(PipelineError::UnexpectedUnits { expected: "K", .. })
        ));
    }

    #[test]
    fn should_clamp_humidity_during_extraction() {
        let series = noleap_series(2015, 1, |i| if i % 2 == 0 { 104.0 } else { 55.5 });
        let path = PathBuf::from("hurs.nc");

        let slices = year_slices(&series, CmipVariable::Hurs, 2015..=2015, &path).unwrap();

        assert_eq!(slices[0].days()[0].value, 100.0);
        assert_eq!(slices[0].days()[1].value, 55.5);
    }
}
