//! Per-variable descriptor tables.
//!
//! Every variable the pipelines handle is described once: its name in the
//! source files, the code the AgroIBIS model expects, the unit after
//! conversion and the conversion itself.

use std::fmt;

use crate::error::{PipelineError, PipelineResult};

/// Spellings of kelvin seen in CF `units` attributes.
const KELVIN_UNITS: [&str; 4] = ["K", "degK", "kelvin", "Kelvin"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    None,
    /// K to deg C.
    KelvinToCelsius,
    /// mm/s to mm/day.
    FluxToDailyTotal,
    /// Upper bound of 100%.
    ClampPercent,
}

impl Conversion {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Conversion::None => value,
            Conversion::KelvinToCelsius => value - 273.15,
            Conversion::FluxToDailyTotal => value * 86400.0,
            Conversion::ClampPercent => {
                if value > 100.0 {
                    100.0
                } else {
                    value
                }
            }
        }
    }

    /// Rejects source units the conversion would misread. Sources without a
    /// `units` attribute are taken at their word.
    pub fn check_units(self, units: Option<&str>) -> PipelineResult<()> {
        match (self, units) {
            (Conversion::KelvinToCelsius, Some(found))
                if !KELVIN_UNITS.contains(&found.trim()) =>
            {
                Err(PipelineError::UnexpectedUnits {
                    found: found.to_string(),
                    expected: "K",
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableDescriptor {
    pub source: &'static str,
    pub agroibis: &'static str,
    pub unit: &'static str,
    pub conversion: Conversion,
}

/// CMIP daily variables, in the column order of the Ecosys weather file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CmipVariable {
    Tasmax,
    Tasmin,
    Hurs,
    SfcWind,
    Pr,
    Rsds,
}

const CMIP_DESCRIPTORS: [VariableDescriptor; 6] = [
    VariableDescriptor {
        source: "tasmax",
        agroibis: "tmax",
        unit: "deg C",
        conversion: Conversion::KelvinToCelsius,
    },
    VariableDescriptor {
        source: "tasmin",
        agroibis: "tmmn",
        unit: "deg C",
        conversion: Conversion::KelvinToCelsius,
    },
    VariableDescriptor {
        source: "hurs",
        agroibis: "relh",
        unit: "percent",
        conversion: Conversion::ClampPercent,
    },
    VariableDescriptor {
        source: "sfcWind",
        agroibis: "vs",
        unit: "m/s",
        conversion: Conversion::None,
    },
    VariableDescriptor {
        source: "pr",
        agroibis: "prec",
        unit: "mm",
        conversion: Conversion::FluxToDailyTotal,
    },
    VariableDescriptor {
        source: "rsds",
        agroibis: "rads",
        unit: "W/m**2",
        conversion: Conversion::None,
    },
];

impl CmipVariable {
    pub const ALL: [CmipVariable; 6] = [
        CmipVariable::Tasmax,
        CmipVariable::Tasmin,
        CmipVariable::Hurs,
        CmipVariable::SfcWind,
        CmipVariable::Pr,
        CmipVariable::Rsds,
    ];

    pub fn descriptor(self) -> &'static VariableDescriptor {
        &CMIP_DESCRIPTORS[self as usize]
    }

    pub fn source_name(self) -> &'static str {
        self.descriptor().source
    }

    pub fn from_source_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.source_name() == name)
    }
}

impl fmt::Display for CmipVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_name())
    }
}

pub const HUMIDITY_NAME: &str = "relh";
pub const HUMIDITY_UNIT: &str = "percent";
/// AgroIBIS directory of the mean of daily maximum and minimum humidity.
pub const AVERAGE_HUMIDITY_DIR: &str = "ave_relh";

/// GridMet daily variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridmetVariable {
    Tmmn,
    Tmmx,
    Pr,
    Srad,
    Vs,
    Rmax,
    Rmin,
}

impl GridmetVariable {
    pub const ALL: [GridmetVariable; 7] = [
        GridmetVariable::Tmmn,
        GridmetVariable::Tmmx,
        GridmetVariable::Pr,
        GridmetVariable::Srad,
        GridmetVariable::Vs,
        GridmetVariable::Rmax,
        GridmetVariable::Rmin,
    ];

    /// Name used in GridMet file names and URLs.
    pub fn code(self) -> &'static str {
        match self {
            GridmetVariable::Tmmn => "tmmn",
            GridmetVariable::Tmmx => "tmmx",
            GridmetVariable::Pr => "pr",
            GridmetVariable::Srad => "srad",
            GridmetVariable::Vs => "vs",
            GridmetVariable::Rmax => "rmax",
            GridmetVariable::Rmin => "rmin",
        }
    }

    pub fn netcdf_name(self) -> &'static str {
        match self {
            GridmetVariable::Tmmn | GridmetVariable::Tmmx => "air_temperature",
            GridmetVariable::Pr => "precipitation_amount",
            GridmetVariable::Srad => "surface_downwelling_shortwave_flux_in_air",
            GridmetVariable::Vs => "wind_speed",
            GridmetVariable::Rmax | GridmetVariable::Rmin => "relative_humidity",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GridmetVariable::Tmmn => "Minimum Temperature",
            GridmetVariable::Tmmx => "Maximum Temperature",
            GridmetVariable::Pr => "Precipitation",
            GridmetVariable::Srad => "Solar Radiation",
            GridmetVariable::Vs => "Wind Speed",
            GridmetVariable::Rmax => "Maximum Relative Humidity",
            GridmetVariable::Rmin => "Minimum Relative Humidity",
        }
    }

    pub fn conversion(self) -> Conversion {
        match self {
            GridmetVariable::Tmmn | GridmetVariable::Tmmx => Conversion::KelvinToCelsius,
            _ => Conversion::None,
        }
    }

    /// AgroIBIS output directory, variable name and unit.
    pub fn agroibis(self) -> (&'static str, &'static str, &'static str) {
        match self {
            GridmetVariable::Tmmn => ("tmmn", "tmmn", "deg C"),
            GridmetVariable::Tmmx => ("tmax", "tmax", "deg C"),
            GridmetVariable::Pr => ("prec", "prec", "mm"),
            GridmetVariable::Srad => ("rads", "rads", "W/m**2"),
            GridmetVariable::Vs => ("wspd", "wspd", "m/s"),
            GridmetVariable::Rmax => ("high_relh", HUMIDITY_NAME, HUMIDITY_UNIT),
            GridmetVariable::Rmin => ("low_relh", HUMIDITY_NAME, HUMIDITY_UNIT),
        }
    }

    pub fn url(self, year: i32) -> String {
        format!(
            "http://www.northwestknowledge.net/metdata/data/{}_{}.nc",
            self.code(),
            year
        )
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_kelvin_to_celsius() {
        let conversion = CmipVariable::Tasmax.descriptor().conversion;

        assert_eq!(conversion.apply(273.15), 0.0);
        assert!((conversion.apply(300.0) - 26.85).abs() < 1e-9);
    }

    #[test]
    fn should_only_convert_kelvin_sources_to_celsius() {
        let conversion = Conversion::KelvinToCelsius;

        assert!(conversion.check_units(Some("K")).is_ok());
        assert!(conversion.check_units(None).is_ok());
        assert!(matches!(
            conversion.check_units(Some("degC")),
            Err(PipelineError::UnexpectedUnits { .. })
        ));
        assert!(Conversion::None.check_units(Some("m/s")).is_ok());
    }

    #[test]
    fn should_convert_precipitation_flux() {
        let conversion = CmipVariable::Pr.descriptor().conversion;
        assert!((conversion.apply(1.0e-5) - 0.864).abs() < 1e-12);
    }

    #[test]
    fn should_clamp_relative_humidity() {
        let conversion = CmipVariable::Hurs.descriptor().conversion;

        assert_eq!(conversion.apply(100.7), 100.0);
        assert_eq!(conversion.apply(250.0), 100.0);
        assert_eq!(conversion.apply(100.0), 100.0);
        assert_eq!(conversion.apply(63.25), 63.25);
    }

    #[test]
    fn should_keep_descriptor_order_aligned_with_enum() {
        let names: Vec<&str> = CmipVariable::ALL.iter().map(|v| v.source_name()).collect();
        assert_eq!(names, ["tasmax", "tasmin", "hurs", "sfcWind", "pr", "rsds"]);

        for variable in CmipVariable::ALL {
            assert_eq!(CmipVariable::from_source_name(variable.source_name()), Some(variable));
        }
        assert_eq!(CmipVariable::from_source_name("tas"), None);
    }

    #[test]
    fn should_map_agroibis_codes() {
        assert_eq!(CmipVariable::Tasmin.descriptor().agroibis, "tmmn");
        assert_eq!(CmipVariable::SfcWind.descriptor().agroibis, "vs");
        assert_eq!(CmipVariable::Rsds.descriptor().unit, "W/m**2");
    }

    #[test]
    fn should_map_gridmet_to_agroibis_outputs() {
        assert_eq!(GridmetVariable::Tmmx.agroibis(), ("tmax", "tmax", "deg C"));
        assert_eq!(GridmetVariable::Vs.agroibis(), ("wspd", "wspd", "m/s"));
        assert_eq!(GridmetVariable::Rmin.agroibis(), ("low_relh", "relh", "percent"));

        let dirs: std::collections::HashSet<&str> =
            GridmetVariable::ALL.iter().map(|v| v.agroibis().0).collect();
        assert_eq!(dirs.len(), GridmetVariable::ALL.len());
        assert!(!dirs.contains(AVERAGE_HUMIDITY_DIR));
    }

    #[test]
    fn should_make_gridmet_url() {
        assert_eq!(
            GridmetVariable::Rmin.url(2020),
            "http://www.northwestknowledge.net/metdata/data/rmin_2020.nc"
        );
    }
}
