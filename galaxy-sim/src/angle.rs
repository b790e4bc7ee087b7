//! Angles normalized to radians at the configuration boundary.
//!
//! Scene descriptions write angles either as bare numbers (radians) or as
//! unit-suffixed strings such as `"30 degrees"` or `"0.1 rad"`. [`Angle`]
//! parses both and only ever stores radians.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// An angle in radians.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "AngleValue", into = "f64")]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub fn from_radians(radians: f64) -> Self {
        Angle(radians)
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Angle(degrees.to_radians())
    }

    pub fn from_arcminutes(arcmin: f64) -> Self {
        Angle::from_degrees(arcmin / 60.0)
    }

    pub fn from_arcseconds(arcsec: f64) -> Self {
        Angle::from_degrees(arcsec / 3600.0)
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    pub fn degrees(self) -> f64 {
        self.0.to_degrees()
    }

    /// Same direction folded into `[0, 2π)`.
    pub fn wrapped(self) -> Angle {
        Angle(self.0.rem_euclid(2.0 * PI))
    }

    pub fn sin_cos(self) -> (f64, f64) {
        self.0.sin_cos()
    }
}

impl From<Angle> for f64 {
    fn from(angle: Angle) -> f64 {
        angle.0
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} radians", self.0)
    }
}

impl FromStr for Angle {
    type Err = SimError;

    /// Parse `"<number> <unit>"` or a bare number (radians).
    ///
    /// Units: `radians`/`radian`/`rad`, `degrees`/`degree`/`deg`,
    /// `arcmin`/`arcminutes`, `arcsec`/`arcseconds`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let bad = || SimError::invalid("angle", format!("cannot parse `{s}`"));

        let value: f64 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        if !value.is_finite() {
            return Err(bad());
        }
        let unit = parts.next();
        if parts.next().is_some() {
            return Err(bad());
        }

        match unit.map(str::to_ascii_lowercase).as_deref() {
            None | Some("radians") | Some("radian") | Some("rad") => Ok(Angle::from_radians(value)),
            Some("degrees") | Some("degree") | Some("deg") => Ok(Angle::from_degrees(value)),
            Some("arcmin") | Some("arcminutes") | Some("arcminute") => {
                Ok(Angle::from_arcminutes(value))
            }
            Some("arcsec") | Some("arcseconds") | Some("arcsecond") => {
                Ok(Angle::from_arcseconds(value))
            }
            Some(other) => Err(SimError::invalid(
                "angle",
                format!("unknown angle unit `{other}`"),
            )),
        }
    }
}

/// Wire form of an angle: a number in radians or a unit-tagged string.
#[derive(Deserialize)]
#[serde(untagged)]
enum AngleValue {
    Radians(f64),
    Tagged(String),
}

impl TryFrom<AngleValue> for Angle {
    type Error = SimError;

    fn try_from(value: AngleValue) -> Result<Self, Self::Error> {
        match value {
            AngleValue::Radians(r) if r.is_finite() => Ok(Angle::from_radians(r)),
            AngleValue::Radians(r) => Err(SimError::invalid(
                "angle",
                format!("must be finite, got {r}"),
            )),
            AngleValue::Tagged(s) => s.parse(),
        }
    }
}
