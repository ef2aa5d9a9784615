//! The assembled climate table: one year of one variable per slot.

use std::{
    collections::BTreeMap,
    fmt,
    ops::RangeInclusive,
};

use chrono::NaiveDate;

use crate::{
    calendar,
    error::{PipelineError, PipelineResult},
    variable::CmipVariable,
};

/// A point on the source grid, in the source's longitude convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyValue {
    pub date: NaiveDate,
    pub value: f64,
}

impl DailyValue {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        DailyValue { date, value }
    }
}

/// One variable's daily series for one calendar year at one site.
///
/// Construction checks that the series covers every Gregorian day of the
/// year exactly once, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct YearSlice {
    year: i32,
    variable: CmipVariable,
    unit: String,
    cell: GridCell,
    days: Vec<DailyValue>,
}

impl YearSlice {
    pub fn new(
        year: i32,
        variable: CmipVariable,
        unit: impl Into<String>,
        cell: GridCell,
        days: Vec<DailyValue>,
    ) -> PipelineResult<Self> {
        calendar::check_contiguous(year, &days)?;

        Ok(YearSlice {
            year,
            variable,
            unit: unit.into(),
            cell,
            days,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn variable(&self) -> CmipVariable {
        self.variable
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn cell(&self) -> GridCell {
        self.cell
    }

    pub fn days(&self) -> &[DailyValue] {
        &self.days
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.days.iter().map(|d| d.value)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Index of a table slot: (experiment, site, year, variable).
///
/// Experiments and sites are positions in the pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableKey {
    pub experiment: usize,
    pub site: usize,
    pub year: i32,
    pub variable: CmipVariable,
}

impl TableKey {
    pub fn new(experiment: usize, site: usize, year: i32, variable: CmipVariable) -> Self {
        TableKey {
            experiment,
            site,
            year,
            variable,
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(experiment {}, site {}, {}, {})",
            self.experiment,
            self.site + 1,
            self.year,
            self.variable
        )
    }
}

/// Ordered by key, so two tables built from the same slices compare equal
/// whatever order the slices arrived in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimateTable {
    slots: BTreeMap<TableKey, YearSlice>,
}

impl ClimateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: TableKey, slice: YearSlice) -> PipelineResult<()> {
        if self.slots.contains_key(&key) {
            return Err(PipelineError::DuplicateAssignment(key));
        }
        self.slots.insert(key, slice);

        Ok(())
    }

    pub fn get(&self, key: &TableKey) -> Option<&YearSlice> {
        self.slots.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &YearSlice)> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Keys of the requested block that have no slice.
    pub fn missing(
        &self,
        experiments: usize,
        sites: usize,
        years: RangeInclusive<i32>,
    ) -> Vec<TableKey> {
        let mut missing = Vec::new();

        for experiment in 0..experiments {
            for site in 0..sites {
                for year in years.clone() {
                    for variable in CmipVariable::ALL {
                        let key = TableKey::new(experiment, site, year, variable);
                        if !self.slots.contains_key(&key) {
                            missing.push(key);
                        }
                    }
                }
            }
        }

        missing
    }
}

/// Builds a full year of a constant value, for tests across the crate.
#[cfg(test)]
pub fn constant_slice(year: i32, variable: CmipVariable, value: f64) -> YearSlice {
    let days = calendar::year_dates(year)
        .map(|date| DailyValue::new(date, value))
        .collect();
    let cell = GridCell {
        lat: 40.0,
        lon: 271.75,
    };

    YearSlice::new(year, variable, variable.descriptor().unit, cell, days)
        .expect("a full year is contiguous")
}

// -- Tests -------------------------------------------------------------------
