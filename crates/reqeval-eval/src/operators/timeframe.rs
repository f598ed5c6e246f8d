//! Day-based timeframe windows
//!
//! A window is `[today + numeric_value_min days, today + numeric_value_max
//! days]`, inclusive on both ends. Offsets are signed, so `-7..=0` covers the
//! last week including today.

use chrono::{Days, NaiveDate};
use reqeval_model::Requirement;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Inclusive date window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window of signed day offsets around `today`
    pub fn around(today: NaiveDate, min_days: i64, max_days: i64) -> Option<Self> {
        Some(Self::new(shift(today, min_days)?, shift(today, max_days)?))
    }

    /// Window configured on a requirement
    ///
    /// Requires both bounds. A unit is optional, but when present it has to
    /// be days.
    pub fn from_requirement(requirement: &Requirement, today: NaiveDate) -> Option<Self> {
        if requirement.unit.as_ref().is_some_and(|unit| !unit.is_days()) {
            return None;
        }
        Self::from_bounds(requirement, today)
    }

    /// Like `from_requirement`, but a missing unit also fails
    pub fn from_requirement_in_days(requirement: &Requirement, today: NaiveDate) -> Option<Self> {
        if !requirement.unit.as_ref().is_some_and(|unit| unit.is_days()) {
            return None;
        }
        Self::from_bounds(requirement, today)
    }

    fn from_bounds(requirement: &Requirement, today: NaiveDate) -> Option<Self> {
        let min = whole_days(requirement.numeric_value_min?)?;
        let max = whole_days(requirement.numeric_value_max?)?;
        Self::around(today, min, max)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn whole_days(value: Decimal) -> Option<i64> {
    value.trunc().to_i64()
}

fn shift(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}
