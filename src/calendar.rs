//! Time-axis decoding and leap-day normalisation.
//!
//! CMIP daily output uses a 365-day calendar that never contains 29 February.
//! The crop models expect Gregorian years, so leap years get a synthetic
//! 29 February: the mean of 28 February and 1 March. This is an
//! approximation, not measured data, and it can shift day-of-year sensitive
//! model behaviour (phenology triggers and the like) by a small amount.

use chrono::{Datelike, NaiveDate, TimeDelta};

use crate::{
    error::{PipelineError, PipelineResult},
    table::DailyValue,
};

const NOLEAP_MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
/// Offsets beyond this many days (about 270,000 years) cannot map to a date.
const MAX_OFFSET_DAYS: f64 = 1.0e8;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> usize {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Every Gregorian date of `year`, from 1 January.
pub fn year_dates(year: i32) -> impl Iterator<Item = NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .into_iter()
        .flat_map(|first| first.iter_days())
        .take_while(move |date| date.year() == year)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeCalendar {
    NoLeap,
    Gregorian,
}

impl TimeCalendar {
    /// Parses a CF `calendar` attribute.
    pub fn from_attribute(name: &str) -> PipelineResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "noleap" | "365_day" => Ok(TimeCalendar::NoLeap),
            "standard" | "gregorian" | "proleptic_gregorian" => Ok(TimeCalendar::Gregorian),
            other => Err(PipelineError::UnsupportedCalendar(other.to_string())),
        }
    }
}

/// A CF time axis counted in days from `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAxis {
    pub calendar: TimeCalendar,
    pub base: NaiveDate,
}

impl TimeAxis {
    pub fn new(units: &str, calendar: TimeCalendar) -> PipelineResult<Self> {
        let base = parse_time_units(units)?;
        if calendar == TimeCalendar::NoLeap && base.month() == 2 && base.day() == 29 {
            return Err(PipelineError::InvalidTime(format!(
                "reference date {base} does not exist in a 365-day calendar"
            )));
        }

        Ok(TimeAxis { calendar, base })
    }

    /// Maps an offset (fractional days are truncated toward the start of the
    /// day) to its calendar date. No-leap dates are always valid Gregorian
    /// dates because they never fall on 29 February.
    pub fn decode(&self, offset: f64) -> PipelineResult<NaiveDate> {
        if !offset.is_finite() || offset.abs() > MAX_OFFSET_DAYS {
            return Err(PipelineError::InvalidTime(format!(
                "time offset {offset} is out of range"
            )));
        }
        let days = offset.floor() as i64;

        match self.calendar {
            TimeCalendar::Gregorian => TimeDelta::try_days(days)
                .and_then(|delta| self.base.checked_add_signed(delta))
                .ok_or_else(|| {
                    PipelineError::InvalidTime(format!(
                        "date overflow adding {days} days to {}",
                        self.base
                    ))
                }),
            TimeCalendar::NoLeap => {
                let total = i64::from(noleap_day_of_year(self.base)).checked_add(days);
                total
                    .and_then(|total| {
                        let (month, day) = noleap_month_day(total.rem_euclid(365) as u32);
                        i64::from(self.base.year())
                            .checked_add(total.div_euclid(365))
                            .and_then(|year| i32::try_from(year).ok())
                            .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
                    })
                    .ok_or_else(|| {
                        PipelineError::InvalidTime(format!(
                            "offset {days} from {} is out of range",
                            self.base
                        ))
                    })
            }
        }
    }
}

/// Parses `days since YYYY-MM-DD[ hh:mm:ss]`.
pub fn parse_time_units(units: &str) -> PipelineResult<NaiveDate> {
    let parts: Vec<&str> = units.split_whitespace().collect();
    if parts.len() < 3 || parts[1] != "since" {
        return Err(PipelineError::InvalidTime(format!(
            "unexpected time units `{units}`"
        )));
    }
    if parts[0] != "days" && parts[0] != "day" {
        return Err(PipelineError::InvalidTime(format!(
            "time units must be days, found `{}`",
            parts[0]
        )));
    }

    // Dates like 1900-1-1 appear in the wild, so split on '-' rather than use a fixed format.
    let date = parts[2].split('T').next().unwrap_or(parts[2]);
    let fields: Vec<&str> = date.split('-').collect();
    let parsed = match fields.as_slice() {
        [y, m, d] => match (y.parse::<i32>(), m.parse::<u32>(), d.parse::<u32>()) {
            (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        },
        _ => None,
    };

    parsed.ok_or_else(|| PipelineError::InvalidTime(format!("unparseable reference date `{date}`")))
}

fn noleap_day_of_year(date: NaiveDate) -> u32 {
    let month = date.month() as usize;
    NOLEAP_MONTH_DAYS[..month - 1].iter().sum::<u32>() + date.day() - 1
}

// `day_of_year` is zero-based and below 365.
fn noleap_month_day(mut day_of_year: u32) -> (u32, u32) {
    for (index, &length) in NOLEAP_MONTH_DAYS.iter().enumerate() {
        if day_of_year < length {
            return (index as u32 + 1, day_of_year + 1);
        }
        day_of_year -= length;
    }

    (12, 31)
}

/// Brings one year of values onto the Gregorian calendar.
///
/// Leap years without a 29 February get one interpolated from 28 February and
/// 1 March. Years already carrying every Gregorian day (GridMet, for one)
/// are only checked.
pub fn normalize_year(year: i32, mut days: Vec<DailyValue>) -> PipelineResult<Vec<DailyValue>> {
    days.sort_by_key(|d| d.date);

    if let Some(feb_29) = NaiveDate::from_ymd_opt(year, 2, 29) {
        if days.binary_search_by_key(&feb_29, |d| d.date).is_err() {
            let value = interpolate_leap_day(year, &days)?;
            let position = days.partition_point(|d| d.date < feb_29);
            days.insert(position, DailyValue::new(feb_29, value));
        }
    }

    check_contiguous(year, &days)?;

    Ok(days)
}

fn interpolate_leap_day(year: i32, days: &[DailyValue]) -> PipelineResult<f64> {
    let value_on = |month, day| {
        NaiveDate::from_ymd_opt(year, month, day).and_then(|date| {
            days.binary_search_by_key(&date, |d| d.date)
                .ok()
                .map(|i| days[i].value)
        })
    };

    match (value_on(2, 28), value_on(3, 1)) {
        (Some(feb_28), Some(mar_01)) => Ok(0.5 * (feb_28 + mar_01)),
        _ => Err(PipelineError::CalendarGap {
            year,
            expected: days_in_year(year),
            found: days.len(),
        }),
    }
}

/// Checks that `days` holds every date of `year` once, in order.
pub fn check_contiguous(year: i32, days: &[DailyValue]) -> PipelineResult<()> {
    let dates: Vec<NaiveDate> = days.iter().map(|d| d.date).collect();
    check_year_dates(year, &dates)
}

/// Checks that `dates` are exactly the Gregorian dates of `year`.
pub fn check_year_dates(year: i32, dates: &[NaiveDate]) -> PipelineResult<()> {
    if dates.iter().copied().eq(year_dates(year)) {
        Ok(())
    } else {
        Err(PipelineError::CalendarGap {
            year,
            expected: days_in_year(year),
            found: dates.len(),
        })
    }
}

// -- Tests -------------------------------------------------------------------
