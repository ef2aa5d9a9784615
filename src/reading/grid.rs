//! Reads NetCDF grids: the series of the cell nearest a site, or every cell
//! inside a bounding box.

use std::{ops::Range, path::Path};

use chrono::NaiveDate;
use netcdf::AttributeValue;

use crate::{
    calendar::{TimeAxis, TimeCalendar},
    error::{PipelineError, PipelineResult},
    table::GridCell,
};

use super::{locator::locate, site};

const LAT_NAMES: [&str; 2] = ["lat", "latitude"];
const LON_NAMES: [&str; 2] = ["lon", "longitude"];

/// Raw values of one variable at one grid cell, before unit conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSeries {
    pub cell: GridCell,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub units: Option<String>,
}

/// Values of one variable over a lat/lon window, laid out `(time, lat, lon)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRegion {
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub units: Option<String>,
}

/// Inclusive latitude/longitude bounds in degrees; longitudes may be given
/// in either convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn is_valid(&self) -> bool {
        [self.north, self.south, self.west, self.east]
            .iter()
            .all(|v| v.is_finite())
            && self.south <= self.north
            && self.west <= self.east
    }
}

/// Index range of the coordinates inside `[low, high]`. The coordinates must
/// be monotonic, ascending or descending.
pub fn index_span(coords: &[f64], low: f64, high: f64) -> Option<Range<usize>> {
    let inside = |c: &f64| (low..=high).contains(c);
    let first = coords.iter().position(inside)?;
    let last = coords.iter().rposition(inside)?;

    Some(first..last + 1)
}

/// Opens `path` and samples `variable` at the cell nearest `target`.
///
/// The variable must be laid out `(time, lat, lon)` or `(time, lev, lat, lon)`;
/// the first level is read in the second case. Packed values are unpacked and
/// fill values become NaN.
pub fn read_site_series(
    path: &Path,
    variable: &str,
    target: GridCell,
) -> PipelineResult<SiteSeries> {
    let file = netcdf::open(locate(path)?)?;

    let lats = read_coordinate(&file, &LAT_NAMES, path)?;
    let lons = read_coordinate(&file, &LON_NAMES, path)?;
    let target_lon = site::normalize_longitude(target.lon, &lons);
    let (ilat, ilon) = match (
        site::nearest_index(&lats, target.lat),
        site::nearest_index(&lons, target_lon),
    ) {
        (Some(ilat), Some(ilon)) => (ilat, ilon),
        _ => {
            return Err(PipelineError::MissingVariable {
                name: "lat/lon coordinates".to_string(),
                path: path.to_path_buf(),
            })
        }
    };

    let (var, dims) = spatial_variable(&file, variable, path)?;
    let values = read_block(&var, &dims, ilat..ilat + 1, ilon..ilon + 1)?;
    let dates = read_dates(&file, &dims[0], path)?;
    check_time_steps(&dims[0], variable, dates.len(), values.len())?;

    Ok(SiteSeries {
        cell: GridCell {
            lat: lats[ilat],
            lon: lons[ilon],
        },
        dates,
        values,
        units: string_attr(&var, "units"),
    })
}

/// Opens `path` and reads `variable` over the cells inside `bounds`, keeping
/// the source's coordinate order.
pub fn read_region(path: &Path, variable: &str, bounds: BoundingBox) -> PipelineResult<GridRegion> {
    let file = netcdf::open(locate(path)?)?;

    let lats = read_coordinate(&file, &LAT_NAMES, path)?;
    let lons = read_coordinate(&file, &LON_NAMES, path)?;
    let west = site::normalize_longitude(bounds.west, &lons);
    let east = site::normalize_longitude(bounds.east, &lons);
    let (lat_span, lon_span) = match (
        index_span(&lats, bounds.south, bounds.north),
        index_span(&lons, west, east),
    ) {
        (Some(lat_span), Some(lon_span)) => (lat_span, lon_span),
        _ => {
            return Err(PipelineError::EmptyRegion {
                path: path.to_path_buf(),
            })
        }
    };

    let (var, dims) = spatial_variable(&file, variable, path)?;
    let values = read_block(&var, &dims, lat_span.clone(), lon_span.clone())?;
    let dates = read_dates(&file, &dims[0], path)?;
    let cells = lat_span.len() * lon_span.len();
    check_time_steps(&dims[0], variable, dates.len(), values.len() / cells)?;

    Ok(GridRegion {
        lats: lats[lat_span].to_vec(),
        lons: lons[lon_span].to_vec(),
        dates,
        values,
        units: string_attr(&var, "units"),
    })
}

/// Looks `name` up and checks it is laid out `(time, [lev,] lat, lon)`.
fn spatial_variable<'f>(
    file: &'f netcdf::File,
    name: &str,
    path: &Path,
) -> PipelineResult<(netcdf::Variable<'f>, Vec<String>)> {
    let var = file
        .variable(name)
        .ok_or_else(|| PipelineError::MissingVariable {
            name: name.to_string(),
            path: path.to_path_buf(),
        })?;

    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let spatial_ok = (dims.len() == 3 || dims.len() == 4)
        && LAT_NAMES.contains(&dims[dims.len() - 2].as_str())
        && LON_NAMES.contains(&dims[dims.len() - 1].as_str());
    if !spatial_ok {
        return Err(PipelineError::UnexpectedShape {
            name: name.to_string(),
            dims,
        });
    }

    Ok((var, dims))
}

/// Reads every time step of the lat/lon window, first level only, unpacked.
fn read_block(
    var: &netcdf::Variable,
    dims: &[String],
    lat: Range<usize>,
    lon: Range<usize>,
) -> PipelineResult<Vec<f64>> {
    let nt = var.dimensions().first().map(|d| d.len()).unwrap_or(0);
    let raw: Vec<f64> = if dims.len() == 4 {
        var.get_values::<f64, _>([0..nt, 0..1, lat, lon])?
    } else {
        var.get_values::<f64, _>([0..nt, lat, lon])?
    };

    Ok(unpack(var, raw))
}

fn check_time_steps(
    time_name: &str,
    variable: &str,
    dates: usize,
    steps: usize,
) -> PipelineResult<()> {
    if dates == steps {
        Ok(())
    } else {
        Err(PipelineError::InvalidTime(format!(
            "`{time_name}` has {dates} time steps but `{variable}` has {steps}"
        )))
    }
}

fn read_coordinate(file: &netcdf::File, names: &[&str], path: &Path) -> PipelineResult<Vec<f64>> {
    for &name in names {
        if let Some(var) = file.variable(name) {
            return Ok(var.get_values::<f64, _>(..)?);
        }
    }

    Err(PipelineError::MissingVariable {
        name: names.first().copied().unwrap_or("coordinate").to_string(),
        path: path.to_path_buf(),
    })
}

fn read_dates(file: &netcdf::File, time_name: &str, path: &Path) -> PipelineResult<Vec<NaiveDate>> {
    let var = file
        .variable(time_name)
        .ok_or_else(|| PipelineError::MissingVariable {
            name: time_name.to_string(),
            path: path.to_path_buf(),
        })?;

    let units = string_attr(&var, "units").ok_or_else(|| {
        PipelineError::InvalidTime(format!("`{time_name}` has no units attribute"))
    })?;
    // CF defaults to the standard calendar when the attribute is absent.
    let calendar = match string_attr(&var, "calendar") {
        Some(name) => TimeCalendar::from_attribute(&name)?,
        None => TimeCalendar::Gregorian,
    };
    let axis = TimeAxis::new(&units, calendar)?;

    var.get_values::<f64, _>(..)?
        .into_iter()
        .map(|offset| axis.decode(offset))
        .collect()
}

fn unpack(var: &netcdf::Variable, raw: Vec<f64>) -> Vec<f64> {
    let scale = f64_attr(var, "scale_factor").unwrap_or(1.0);
    let offset = f64_attr(var, "add_offset").unwrap_or(0.0);
    let fill = f64_attr(var, "_FillValue").or_else(|| f64_attr(var, "missing_value"));

    raw.into_iter()
        .map(|value| match fill {
            Some(fill) if value == fill => f64::NAN,
            _ => value * scale + offset,
        })
        .collect()
}

fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Double(d) => Some(d),
        AttributeValue::Float(f) => Some(f as f64),
        AttributeValue::Short(s) => Some(s as f64),
        AttributeValue::Ushort(s) => Some(s as f64),
        AttributeValue::Int(i) => Some(i as f64),
        AttributeValue::Uint(i) => Some(i as f64),
        AttributeValue::Schar(c) => Some(c as f64),
        AttributeValue::Uchar(c) => Some(c as f64),
        _ => None,
    }
}

pub(crate) fn string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

// -- Tests -------------------------------------------------------------------
