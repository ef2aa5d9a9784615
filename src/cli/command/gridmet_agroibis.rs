//! GridMet to AgroIBIS: every variable of a year cropped to a bounding box
//! and written as a `(time, lev, lat, lon)` grid, plus the mean of the
//! daily maximum and minimum humidity.
//!
//! Like the DayCent variant this stops at the first error.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use tokio::task;
use tracing::info;

use crate::{
    calendar,
    download::download_if_absent,
    error::PipelineResult,
    reading::{read_region, BoundingBox, GridRegion},
    variable::{GridmetVariable, AVERAGE_HUMIDITY_DIR, HUMIDITY_NAME, HUMIDITY_UNIT},
    writers::{
        agroibis::{write_grid_year, GridYear},
        ensure_dir,
    },
};

use super::gridmet::source_path;

/// `{dir}/Output/{output_dir}/{name}_{year}.nc`
pub fn output_path(dir: &Path, output_dir: &str, name: &str, year: i32) -> PathBuf {
    dir.join("Output")
        .join(output_dir)
        .join(format!("{name}_{year}.nc"))
}

pub async fn gridmet_agroibis(
    start_year: i32,
    end_year: i32,
    bounds: BoundingBox,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    if start_year > end_year {
        bail!("start year {start_year} is after end year {end_year}");
    }
    if !bounds.is_valid() {
        bail!("invalid bounding box {:?}", bounds);
    }
    info!(?bounds, start_year, end_year, "starting GridMet AgroIBIS pipeline");

    let mut written = Vec::new();
    for year in start_year..=end_year {
        let mut high = None;
        let mut low = None;

        for variable in GridmetVariable::ALL {
            let source = source_path(dir, variable, year);
            download_if_absent(&variable.url(year), &source).await?;

            let (output_dir, name, _) = variable.agroibis();
            let output = output_path(dir, output_dir, name, year);
            let target = output.clone();
            let region =
                task::spawn_blocking(move || convert_year(&source, variable, year, bounds, &target))
                    .await??;
            match variable {
                GridmetVariable::Rmax => high = Some(region),
                GridmetVariable::Rmin => low = Some(region),
                _ => {}
            }
            println!("Finished: {year} {}", variable.label());
            written.push(output);
        }

        let (high, low) = high
            .zip(low)
            .ok_or_else(|| anyhow!("no relative humidity read for {year}"))?;
        let output = output_path(dir, AVERAGE_HUMIDITY_DIR, HUMIDITY_NAME, year);
        let target = output.clone();
        task::spawn_blocking(move || write_average_humidity(&high, &low, year, &target)).await??;
        println!("Finished: {year} Average Relative Humidity");
        info!(year, files = GridmetVariable::ALL.len() + 1, "wrote AgroIBIS grids");
        written.push(output);
    }

    Ok(written)
}

/// Crops, converts and writes one year of `variable`. The region is handed
/// back so the humidity mean can be built without rereading.
fn convert_year(
    source: &Path,
    variable: GridmetVariable,
    year: i32,
    bounds: BoundingBox,
    output: &Path,
) -> PipelineResult<GridRegion> {
    let mut region = read_region(source, variable.netcdf_name(), bounds)?;
    calendar::check_year_dates(year, &region.dates)?;

    let conversion = variable.conversion();
    conversion.check_units(region.units.as_deref())?;
    for value in region.values.iter_mut() {
        *value = conversion.apply(*value);
    }

    let (_, name, unit) = variable.agroibis();
    write_region(output, &region, name, unit, year)?;

    Ok(region)
}

fn write_average_humidity(
    high: &GridRegion,
    low: &GridRegion,
    year: i32,
    output: &Path,
) -> Result<()> {
    if high.lats != low.lats || high.lons != low.lons || high.values.len() != low.values.len() {
        bail!("maximum and minimum humidity grids for {year} differ");
    }

    let mean = GridRegion {
        values: high
            .values
            .iter()
            .zip(&low.values)
            .map(|(h, l)| (h + l) / 2.0)
            .collect(),
        ..high.clone()
    };
    write_region(output, &mean, HUMIDITY_NAME, HUMIDITY_UNIT, year)?;

    Ok(())
}

fn write_region(
    output: &Path,
    region: &GridRegion,
    name: &str,
    unit: &str,
    year: i32,
) -> PipelineResult<()> {
    if let Some(parent) = output.parent() {
        ensure_dir(parent)?;
    }

    write_grid_year(
        output,
        &GridYear {
            name,
            unit,
            year,
            lats: &region.lats,
            lons: &region.lons,
            values: &region.values,
        },
    )
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::testing::write_gridmet_source;

    use super::*;

    fn write_year(dir: &Path, year: i32) {
        for (variable, value) in [
            (GridmetVariable::Tmmn, 273.15),
            (GridmetVariable::Tmmx, 300.0),
            (GridmetVariable::Pr, 12.5),
            (GridmetVariable::Srad, 200.0),
            (GridmetVariable::Vs, 4.0),
            (GridmetVariable::Rmax, 90.0),
            (GridmetVariable::Rmin, 40.0),
        ] {
            write_gridmet_source(&source_path(dir, variable, year), variable, year, value);
        }
    }

    fn bounds_fixture() -> BoundingBox {
        BoundingBox {
            north: 40.6,
            south: 39.9,
            west: -88.6,
            east: -87.9,
        }
    }

    fn read_grid(path: &Path, name: &str) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let file = netcdf::open(path).unwrap();
        let values = |var: &str| {
            file.variable(var)
                .unwrap()
                .get_values::<f64, _>(..)
                .unwrap()
        };
        (values("lat"), values("lon"), values(name))
    }

    #[tokio::test]
    async fn should_write_cropped_grids_from_local_sources() {
        let dir = TempDir::new().unwrap();
        write_year(dir.path(), 2020);

        let written = gridmet_agroibis(2020, 2020, bounds_fixture(), dir.path())
            .await
            .unwrap();

        assert_eq!(written.len(), 8);
        let tmax = dir.path().join("Output/tmax/tmax_2020.nc");
        let high = dir.path().join("Output/high_relh/relh_2020.nc");
        let average = dir.path().join("Output/ave_relh/relh_2020.nc");
        assert!(written.contains(&tmax));
        assert!(written.contains(&high));
        assert_eq!(written.last(), Some(&average));

        let (lats, lons, values) = read_grid(&tmax, "tmax");
        assert_eq!(lats, [40.5, 40.0]);
        assert_eq!(lons, [-88.5, -88.0]);
        assert_eq!(values.len(), 366 * 4);
        assert!(values.iter().all(|v| (v - 26.85).abs() < 1e-9));

        let file = netcdf::open(&tmax).unwrap();
        let dims: Vec<String> = file
            .variable("tmax")
            .unwrap()
            .dimensions()
            .iter()
            .map(|d| d.name())
            .collect();
        assert_eq!(dims, ["time", "lev", "lat", "lon"]);

        let (_, _, values) = read_grid(&average, "relh");
        assert!(values.iter().all(|&v| v == 65.0));
        let (_, _, values) = read_grid(&dir.path().join("Output/prec/prec_2020.nc"), "prec");
        assert!(values.iter().all(|&v| v == 12.5));
    }

    #[tokio::test]
    async fn should_reject_box_outside_grid() {
        let dir = TempDir::new().unwrap();
        write_year(dir.path(), 2021);
        let bounds = BoundingBox {
            north: 30.0,
            south: 25.0,
            ..bounds_fixture()
        };

        assert!(gridmet_agroibis(2021, 2021, bounds, dir.path())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn should_reject_inverted_box() {
        let dir = TempDir::new().unwrap();
        let bounds = BoundingBox {
            west: -87.0,
            east: -89.0,
            ..bounds_fixture()
        };

        assert!(gridmet_agroibis(2020, 2020, bounds, dir.path())
            .await
            .is_err());
        assert!(gridmet_agroibis(2021, 2020, bounds_fixture(), dir.path())
            .await
            .is_err());
    }
}
