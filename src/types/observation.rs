//! Raw temperature readings as delivered by the upstream provider.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two daily temperature variables the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    /// Daily minimum temperature (GHCN-D `TMIN`).
    MinTemp,
    /// Daily maximum temperature (GHCN-D `TMAX`).
    MaxTemp,
}

impl Variable {
    pub const ALL: [Variable; 2] = [Variable::MinTemp, Variable::MaxTemp];

    /// The datatype identifier used by the CDO API.
    pub fn datatype_id(&self) -> &'static str {
        match self {
            Variable::MinTemp => "TMIN",
            Variable::MaxTemp => "TMAX",
        }
    }

    pub fn from_datatype_id(id: &str) -> Option<Self> {
        match id {
            "TMIN" => Some(Variable::MinTemp),
            "TMAX" => Some(Variable::MaxTemp),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datatype_id())
    }
}

/// One reading for one day. `tenths` is the value in tenths of a degree Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub variable: Variable,
    pub tenths: i32,
}

impl RawObservation {
    pub fn new(date: NaiveDate, variable: Variable, tenths: i32) -> Self {
        Self {
            date,
            variable,
            tenths,
        }
    }

    /// The reading in degrees Celsius.
    pub fn celsius(&self) -> f64 {
        f64::from(self.tenths) / 10.0
    }
}
