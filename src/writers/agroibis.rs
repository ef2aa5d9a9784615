//! AgroIBIS inputs: one `(time, lev, lat, lon)` NetCDF file per variable and
//! year. CMIP sites get a single cell; GridMet regions keep their window.

use std::path::Path;

use crate::{
    calendar,
    error::{PipelineError, PipelineResult},
    table::{ClimateTable, YearSlice},
    variable::CmipVariable,
};

use super::{ensure_dir, write_years, SiteOutcome, SiteRequest};

pub fn write_agroibis(
    table: &ClimateTable,
    request: &SiteRequest,
    root: &Path,
) -> PipelineResult<SiteOutcome> {
    let site_dir = request.site_dir(root);
    ensure_dir(&site_dir)?;

    write_years(request, |year| {
        // Look every variable up first so a gap leaves no half-written year.
        let slices = CmipVariable::ALL
            .into_iter()
            .map(|variable| request.slice(table, year, variable))
            .collect::<PipelineResult<Vec<_>>>()?;

        slices
            .into_iter()
            .map(|slice| {
                let path = site_dir.join(format!(
                    "{}_{year}.nc",
                    slice.variable().descriptor().agroibis
                ));
                write_slice(&path, slice)?;
                Ok(path)
            })
            .collect()
    })
}

/// One year of a variable on a lat/lon grid, values laid out `(time, lat, lon)`.
#[derive(Debug, Clone, Copy)]
pub struct GridYear<'a> {
    pub name: &'a str,
    pub unit: &'a str,
    pub year: i32,
    pub lats: &'a [f64],
    pub lons: &'a [f64],
    pub values: &'a [f64],
}

fn write_slice(path: &Path, slice: &YearSlice) -> PipelineResult<()> {
    let descriptor = slice.variable().descriptor();
    let cell = slice.cell();
    let values: Vec<f64> = slice.values().collect();

    write_grid_year(
        path,
        &GridYear {
            name: descriptor.agroibis,
            unit: descriptor.unit,
            year: slice.year(),
            lats: &[cell.lat],
            lons: &[cell.lon],
            values: &values,
        },
    )
}

/// Writes `grid` as a NetCDF-4 classic-model file with a single level and a
/// time axis of whole days from 1 January.
pub fn write_grid_year(path: &Path, grid: &GridYear) -> PipelineResult<()> {
    let nt = calendar::days_in_year(grid.year);
    let cells = grid.lats.len() * grid.lons.len();
    if cells == 0 || grid.values.len() != nt * cells {
        return Err(PipelineError::CalendarGap {
            year: grid.year,
            expected: nt,
            found: grid.values.len().checked_div(cells).unwrap_or(0),
        });
    }

    let mut file = netcdf::create_with(path, netcdf::Options::NETCDF4 | netcdf::Options::CLASSIC)?;
    file.add_dimension("time", nt)?;
    file.add_dimension("lev", 1)?;
    file.add_dimension("lat", grid.lats.len())?;
    file.add_dimension("lon", grid.lons.len())?;

    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", format!("days since {}-01-01", grid.year))?;
        time.put_attribute("calendar", "standard")?;
        let offsets: Vec<f64> = (0..nt).map(|i| i as f64).collect();
        time.put_values(&offsets, ..)?;
    }
    {
        let mut lev = file.add_variable::<f64>("lev", &["lev"])?;
        lev.put_values(&[1.0], ..)?;
    }
    {
        let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put_values(grid.lats, ..)?;
    }
    {
        let mut lon = file.add_variable::<f64>("lon", &["lon"])?;
        lon.put_attribute("units", "degrees_east")?;
        lon.put_values(grid.lons, ..)?;
    }
    {
        let mut var = file.add_variable::<f64>(grid.name, &["time", "lev", "lat", "lon"])?;
        var.put_attribute("units", grid.unit)?;
        var.put_values(grid.values, ..)?;
    }

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::{
        config::Site,
        reading::grid::string_attr,
        table::{constant_slice, TableKey},
        writers::OutputStatus,
    };

    use super::*;

    #[test]
    fn should_write_one_file_per_variable_and_year() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(40.07, -88.21);
        let request = SiteRequest {
            experiment_index: 0,
            experiment: "ssp585",
            site_index: 1,
            site: &site,
            years: 2020..=2020,
        };
        let mut table = ClimateTable::new();
        for variable in CmipVariable::ALL {
            table
                .insert(
                    TableKey::new(0, 1, 2020, variable),
                    constant_slice(2020, variable, 7.5),
                )
                .unwrap();
        }

        let outcome = write_agroibis(&table, &request, dir.path()).unwrap();

        assert_eq!(outcome.status(), OutputStatus::Written);
        assert_eq!(outcome.written.len(), 6);

        let path = dir.path().join("ssp585/site_2/relh_2020.nc");
        assert!(outcome.written.contains(&path));

        let file = netcdf::open(&path).unwrap();
        assert_eq!(file.dimension("time").unwrap().len(), 366);
        assert_eq!(file.dimension("lev").unwrap().len(), 1);

        let var = file.variable("relh").unwrap();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        assert_eq!(dims, ["time", "lev", "lat", "lon"]);
        assert_eq!(string_attr(&var, "units").as_deref(), Some("percent"));

        let values = var.get_values::<f64, _>(..).unwrap();
        assert_eq!(values.len(), 366);
        assert!(values.iter().all(|&v| v == 7.5));

        let lat = file.variable("lat").unwrap().get_values::<f64, _>(..).unwrap();
        assert_eq!(lat, [40.0]);
    }

    #[test]
    fn should_write_grid_in_source_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relh_2021.nc");
        let lats = [40.5, 40.0];
        let lons = [-88.5, -88.0, -87.5];
        let values: Vec<f64> = (0..365 * 6).map(|i| i as f64).collect();

        write_grid_year(
            &path,
            &GridYear {
                name: "relh",
                unit: "percent",
                year: 2021,
                lats: &lats,
                lons: &lons,
                values: &values,
            },
        )
        .unwrap();

        let file = netcdf::open(&path).unwrap();
        assert_eq!(file.dimension("lat").unwrap().len(), 2);
        assert_eq!(file.dimension("lon").unwrap().len(), 3);
        let var = file.variable("relh").unwrap();
        // Day 1, level 0, second latitude, first longitude.
        let value = var.get_values::<f64, _>([1..2, 0..1, 1..2, 0..1]).unwrap();
        assert_eq!(value, [9.0]);
        let lat = file.variable("lat").unwrap().get_values::<f64, _>(..).unwrap();
        assert_eq!(lat, lats);
    }

    #[test]
    fn should_reject_grid_of_wrong_length() {
        let dir = TempDir::new().unwrap();
        let grid = GridYear {
            name: "tmax",
            unit: "deg C",
            year: 2020,
            lats: &[40.0],
            lons: &[-88.0],
            values: &[1.0; 365],
        };

        assert!(matches!(
            write_grid_year(&dir.path().join("tmax_2020.nc"), &grid),
            Err(PipelineError::CalendarGap { expected: 366, found: 365, .. })
        ));
    }

    #[test]
    fn should_skip_year_with_any_missing_variable() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(40.07, -88.21);
        let request = SiteRequest {
            experiment_index: 0,
            experiment: "ssp245",
            site_index: 0,
            site: &site,
            years: 2015..=2015,
        };
        let mut table = ClimateTable::new();
        table
            .insert(
                TableKey::new(0, 0, 2015, CmipVariable::Pr),
                constant_slice(2015, CmipVariable::Pr, 1.0),
            )
            .unwrap();

        let outcome = write_agroibis(&table, &request, dir.path()).unwrap();

        assert_eq!(outcome.status(), OutputStatus::Partial);
        assert!(outcome.written.is_empty());
        assert!(!dir.path().join("ssp245/site_1/prec_2015.nc").exists());
    }
}
