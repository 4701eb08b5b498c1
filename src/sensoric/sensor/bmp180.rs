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

use crate::sensor::core::{PressureHectopascals, SensorError, SensorErrorKind, TemperatureCelsius};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of Industrial I/O devices exposed by the kernel.
pub const DEFAULT_IIO_ROOT: &str = "/sys/bus/iio/devices";

/// Device name the kernel `bmp280` driver reports for a BMP180 sensor.
pub const DEFAULT_DEVICE_NAME: &str = "bmp180";

const TEMPERATURE_FILE: &str = "in_temp_input";
const PRESSURE_FILE: &str = "in_pressure_input";

/// Values exactly as they were read from the sensor, before unit conversion.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSample {
    /// Milli-degrees celsius
    pub temperature: String,
    /// Kilopascals
    pub pressure: String,
}

/// Temperature and pressure read from an external environmental sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentReading {
    pub temperature: TemperatureCelsius,
    pub pressure: PressureHectopascals,
    pub raw: RawSample,
}

/// Sensor that measures ambient temperature and barometric pressure.
pub trait EnvironmentSensor {
    fn read_temperature_pressure(&mut self) -> Result<EnvironmentReading, SensorError>;
}

/// Read a BMP180 sensor through the Linux Industrial I/O subsystem.
///
/// The kernel `bmp280` driver supports the BMP180 and exposes its processed
/// temperature and pressure values as files in the device directory. The device
/// directory is located by name on every read so that a sensor that appears after
/// startup (or moves to a different device number) is still found.
#[derive(Debug)]
pub struct Bmp180Sensor {
    iio_root: PathBuf,
    device_name: String,
}

impl Bmp180Sensor {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(iio_root: P, device_name: S) -> Self {
        Self {
            iio_root: iio_root.into(),
            device_name: device_name.into(),
        }
    }

    /// Find the device directory under the IIO root whose `name` matches the
    /// configured device name.
    fn device_dir(&self) -> Result<PathBuf, SensorError> {
        let entries = fs::read_dir(&self.iio_root).map_err(|e| {
            SensorError::KindMsgCause(SensorErrorKind::Io, "unable to list IIO devices", Box::new(e))
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            match fs::read_to_string(path.join("name")) {
                Ok(name) if name.trim() == self.device_name => {
                    tracing::trace!(message = "found IIO device", path = %path.display());
                    return Ok(path);
                }
                _ => continue,
            }
        }

        Err(SensorError::KindMsg(
            SensorErrorKind::Unavailable,
            "no IIO device matching the configured sensor name",
        ))
    }

    fn read_value(dir: &Path, file: &str) -> Result<(String, f64), SensorError> {
        let raw = fs::read_to_string(dir.join(file))
            .map_err(|e| SensorError::KindMsgCause(SensorErrorKind::Io, "unable to read sensor value", Box::new(e)))?;

        let trimmed = raw.trim().to_owned();
        let value = trimmed
            .parse::<f64>()
            .map_err(|e| SensorError::KindMsgCause(SensorErrorKind::Parse, "unable to parse sensor value", Box::new(e)))?;

        Ok((trimmed, value))
    }
}

impl EnvironmentSensor for Bmp180Sensor {
    fn read_temperature_pressure(&mut self) -> Result<EnvironmentReading, SensorError> {
        let dir = self.device_dir()?;
        let (raw_temperature, milli_celsius) = Self::read_value(&dir, TEMPERATURE_FILE)?;
        let (raw_pressure, kilopascals) = Self::read_value(&dir, PRESSURE_FILE)?;

        let temperature = TemperatureCelsius::from(milli_celsius / 1000.0);
        let pressure = PressureHectopascals::from(kilopascals * 10.0);

        tracing::debug!(
            message = "parsed external sensor data",
            raw_temperature = %raw_temperature,
            raw_pressure = %raw_pressure,
            temperature = %temperature,
            pressure = %pressure
        );

        Ok(EnvironmentReading {
            temperature,
            pressure,
            raw: RawSample {
                temperature: raw_temperature,
                pressure: raw_pressure,
            },
        })
    }
}
