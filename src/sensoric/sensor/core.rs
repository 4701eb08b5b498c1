// Sensoric - Record Raspberry Pi sensor readings in a database
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use serde::Serialize;
use std::error::Error;
use std::fmt::{self, Formatter};
use std::str::FromStr;

/// Temperature, in degrees celsius
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct TemperatureCelsius(f64);

impl TemperatureCelsius {
    pub fn to_fahrenheit(self) -> f64 {
        self.0 * 9.0 / 5.0 + 32.0
    }

    pub fn to_kelvin(self) -> f64 {
        self.0 + 273.15
    }
}

impl From<TemperatureCelsius> for f64 {
    fn from(v: TemperatureCelsius) -> Self {
        v.0
    }
}

impl From<f64> for TemperatureCelsius {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

impl fmt::Display for TemperatureCelsius {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}c", self.0)
    }
}

/// Barometric pressure, in hectopascals
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct PressureHectopascals(f64);

impl From<PressureHectopascals> for f64 {
    fn from(v: PressureHectopascals) -> Self {
        v.0
    }
}

impl From<f64> for PressureHectopascals {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

impl fmt::Display for PressureHectopascals {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}hPa", self.0)
    }
}

/// Fan speed, in revolutions per minute
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct FanSpeed(f64);

impl From<FanSpeed> for f64 {
    fn from(v: FanSpeed) -> Self {
        v.0
    }
}

impl From<f64> for FanSpeed {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}rpm", self.0)
    }
}

/// Unit the external sensor temperature is persisted in.
///
/// `Omit` persists degrees celsius but skips writing a unit record for it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TemperatureUnit {
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "K")]
    Kelvin,
    #[serde(rename = "NO")]
    Omit,
}

impl TemperatureUnit {
    /// Convert a celsius temperature into this unit.
    pub fn convert(&self, t: TemperatureCelsius) -> f64 {
        match self {
            TemperatureUnit::Celsius | TemperatureUnit::Omit => t.into(),
            TemperatureUnit::Fahrenheit => t.to_fahrenheit(),
            TemperatureUnit::Kelvin => t.to_kelvin(),
        }
    }

    /// Label stored in the units table, `None` when no unit record should be written.
    pub fn as_label(&self) -> Option<&'static str> {
        match self {
            TemperatureUnit::Celsius => Some("C"),
            TemperatureUnit::Fahrenheit => Some("F"),
            TemperatureUnit::Kelvin => Some("K"),
            TemperatureUnit::Omit => None,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label().unwrap_or("NO"))
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "C" => Ok(TemperatureUnit::Celsius),
            "F" => Ok(TemperatureUnit::Fahrenheit),
            "K" => Ok(TemperatureUnit::Kelvin),
            "NO" => Ok(TemperatureUnit::Omit),
            _ => Err(format!("unknown temperature unit '{}', expected one of C, F, K, NO", s)),
        }
    }
}

/// Potential kinds of errors that can be encountered reading a sensor
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum SensorErrorKind {
    Initialization,
    Gpio,
    Unavailable,
    Io,
    Parse,
}

impl SensorErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            SensorErrorKind::Initialization => "initialization",
            SensorErrorKind::Gpio => "gpio",
            SensorErrorKind::Unavailable => "unavailable",
            SensorErrorKind::Io => "io",
            SensorErrorKind::Parse => "parse",
        }
    }
}

/// Error initializing or reading one of the host, fan, or external sensors
#[derive(Debug)]
pub enum SensorError {
    KindMsg(SensorErrorKind, &'static str),
    KindMsgCause(SensorErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl SensorError {
    pub fn kind(&self) -> SensorErrorKind {
        match self {
            SensorError::KindMsg(kind, _) => *kind,
            SensorError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::KindMsg(_, msg) => f.write_str(msg),
            SensorError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for SensorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SensorError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{SensorError, SensorErrorKind, TemperatureCelsius, TemperatureUnit};
    use std::error::Error;
    use std::io;

    #[test]
    fn test_celsius_to_fahrenheit() {
        assert_eq!(32.0, TemperatureCelsius::from(0.0).to_fahrenheit());
        assert_eq!(212.0, TemperatureCelsius::from(100.0).to_fahrenheit());
        assert_eq!(-40.0, TemperatureCelsius::from(-40.0).to_fahrenheit());
    }

    #[test]
    fn test_celsius_to_kelvin() {
        assert_eq!(273.15, TemperatureCelsius::from(0.0).to_kelvin());
        assert_eq!(0.0, TemperatureCelsius::from(-273.15).to_kelvin());
    }

    #[test]
    fn test_unit_convert_omit_keeps_celsius() {
        let t = TemperatureCelsius::from(21.5);

        assert_eq!(21.5, TemperatureUnit::Omit.convert(t));
        assert_eq!(21.5, TemperatureUnit::Celsius.convert(t));
        assert!((TemperatureUnit::Fahrenheit.convert(t) - 70.7).abs() < 1e-9);
        assert!((TemperatureUnit::Kelvin.convert(t) - 294.65).abs() < 1e-9);
    }

    #[test]
    fn test_unit_labels() {
        assert_eq!(Some("C"), TemperatureUnit::Celsius.as_label());
        assert_eq!(Some("F"), TemperatureUnit::Fahrenheit.as_label());
        assert_eq!(Some("K"), TemperatureUnit::Kelvin.as_label());
        assert_eq!(None, TemperatureUnit::Omit.as_label());
        assert_eq!("NO", TemperatureUnit::Omit.to_string());
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!(Ok(TemperatureUnit::Celsius), "C".parse::<TemperatureUnit>());
        assert_eq!(Ok(TemperatureUnit::Fahrenheit), "f".parse::<TemperatureUnit>());
        assert_eq!(Ok(TemperatureUnit::Kelvin), "K".parse::<TemperatureUnit>());
        assert_eq!(Ok(TemperatureUnit::Omit), "NO".parse::<TemperatureUnit>());
        assert!("R".parse::<TemperatureUnit>().is_err());
    }

    #[test]
    fn test_sensor_error_source() {
        let cause = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = SensorError::KindMsgCause(SensorErrorKind::Io, "unable to read value", Box::new(cause));

        assert_eq!(SensorErrorKind::Io, err.kind());
        assert_eq!("unable to read value: no such file", err.to_string());
        assert!(err.source().is_some());
    }
}
