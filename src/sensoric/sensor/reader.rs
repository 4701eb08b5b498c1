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

use crate::sensor::bmp180::EnvironmentSensor;
use crate::sensor::core::{SensorError, TemperatureUnit};
use crate::sensor::fan::FanSensor;
use crate::sensor::host::HostMetrics;
use serde::Serialize;
use std::fmt::{self, Debug, Formatter};
use std::path::PathBuf;

/// Which groups of sensors are read and persisted by a single run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    All,
    ExternalOnly,
    HostOnly,
}

impl Selection {
    pub fn includes_external(&self) -> bool {
        matches!(self, Selection::All | Selection::ExternalOnly)
    }

    pub fn includes_host(&self) -> bool {
        matches!(self, Selection::All | Selection::HostOnly)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Selection::All => "all",
            Selection::ExternalOnly => "external_only",
            Selection::HostOnly => "host_only",
        })
    }
}

/// Temperature and pressure from the external sensor, temperature already
/// converted to the requested unit.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ExternalReading {
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
}

/// Metrics about the machine itself, including the fan.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct HostReading {
    pub process_count: Option<u64>,
    pub cpu_usage_percent: Option<f64>,
    pub cpu_frequency_mhz: Option<f64>,
    pub cpu_temperature_c: Option<f64>,
    pub fan_rpm: Option<f64>,
    pub ram_usage_percent: Option<f64>,
    pub disk_free_bytes: Option<u64>,
    pub disk_used_bytes: Option<u64>,
}

/// Every value read during a single run. Any field is `None` if the sensor it comes
/// from couldn't be read or wasn't part of the selection.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct SensorReading {
    pub process_count: Option<u64>,
    pub cpu_usage_percent: Option<f64>,
    pub cpu_frequency_mhz: Option<f64>,
    pub cpu_temperature_c: Option<f64>,
    pub fan_rpm: Option<f64>,
    pub ram_usage_percent: Option<f64>,
    pub disk_free_bytes: Option<u64>,
    pub disk_used_bytes: Option<u64>,
    pub external_temperature: Option<f64>,
    pub external_pressure: Option<f64>,
    pub temperature_unit: TemperatureUnit,
}

impl SensorReading {
    pub fn new(external: ExternalReading, host: HostReading, temperature_unit: TemperatureUnit) -> Self {
        Self {
            process_count: host.process_count,
            cpu_usage_percent: host.cpu_usage_percent,
            cpu_frequency_mhz: host.cpu_frequency_mhz,
            cpu_temperature_c: host.cpu_temperature_c,
            fan_rpm: host.fan_rpm,
            ram_usage_percent: host.ram_usage_percent,
            disk_free_bytes: host.disk_free_bytes,
            disk_used_bytes: host.disk_used_bytes,
            external_temperature: external.temperature,
            external_pressure: external.pressure,
            temperature_unit,
        }
    }
}

/// Log a failed sensor read and substitute `None` for its value.
fn value_or_none<T>(sensor: &'static str, res: Result<T, SensorError>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(
                message = "unable to read sensor, substituting null",
                sensor = sensor,
                kind = e.kind().as_label(),
                error = %e
            );
            None
        }
    }
}

/// Reads each configured sensor exactly once, isolating failures of individual sensors.
pub struct SensorReader {
    host: Box<dyn HostMetrics>,
    external: Box<dyn EnvironmentSensor>,
    fan: FanSensor,
    disk_mount: PathBuf,
}

impl SensorReader {
    pub fn new<H, E, P>(host: H, external: E, fan: FanSensor, disk_mount: P) -> Self
    where
        H: HostMetrics + 'static,
        E: EnvironmentSensor + 'static,
        P: Into<PathBuf>,
    {
        Self {
            host: Box::new(host),
            external: Box::new(external),
            fan,
            disk_mount: disk_mount.into(),
        }
    }

    /// Read the external sensor, converting its temperature to `unit`. Both values
    /// are `None` if the sensor couldn't be read.
    pub fn read_external(&mut self, unit: TemperatureUnit) -> ExternalReading {
        match value_or_none("bmp180", self.external.read_temperature_pressure()) {
            Some(reading) => ExternalReading {
                temperature: Some(unit.convert(reading.temperature)),
                pressure: Some(reading.pressure.into()),
            },
            None => ExternalReading::default(),
        }
    }

    /// Read every host metric and the fan speed, each one independently.
    pub fn read_host(&mut self) -> HostReading {
        let disk = value_or_none("disk_usage", self.host.disk_usage(&self.disk_mount));

        let reading = HostReading {
            process_count: value_or_none("process_count", self.host.process_count()),
            cpu_usage_percent: value_or_none("cpu_usage", self.host.cpu_usage_percent()),
            cpu_frequency_mhz: value_or_none("cpu_frequency", self.host.cpu_frequency_mhz()),
            cpu_temperature_c: value_or_none("cpu_temperature", self.host.cpu_temperature()).map(f64::from),
            fan_rpm: value_or_none("cpu_fan_rpm", self.fan.read()).map(f64::from),
            ram_usage_percent: value_or_none("ram_usage", self.host.ram_usage_percent()),
            disk_free_bytes: disk.map(|d| d.free),
            disk_used_bytes: disk.map(|d| d.used),
        };

        tracing::debug!(message = "read host metrics", reading = ?reading);
        reading
    }

    /// Read the sensor groups included in `selection`, leaving the others `None`.
    pub fn read(&mut self, selection: Selection, unit: TemperatureUnit) -> SensorReading {
        let external = if selection.includes_external() {
            self.read_external(unit)
        } else {
            ExternalReading::default()
        };

        let host = if selection.includes_host() {
            self.read_host()
        } else {
            HostReading::default()
        };

        SensorReading::new(external, host, unit)
    }
}

impl Debug for SensorReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorReader")
            .field("fan", &self.fan)
            .field("disk_mount", &self.disk_mount)
            .finish()
    }
}
