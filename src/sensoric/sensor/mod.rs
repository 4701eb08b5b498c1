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

mod bmp180;
mod core;
mod fan;
mod host;
mod reader;

pub use crate::sensor::bmp180::{
    Bmp180Sensor, EnvironmentReading, EnvironmentSensor, RawSample, DEFAULT_DEVICE_NAME, DEFAULT_IIO_ROOT,
};
pub use crate::sensor::core::{
    FanSpeed, PressureHectopascals, SensorError, SensorErrorKind, TemperatureCelsius, TemperatureUnit,
};
pub use crate::sensor::fan::{
    FanSensor, GpioTachPin, MonotonicClock, TachPin, TickSource, DEBOUNCE_INTERVAL, DEFAULT_TACH_BCM_PIN,
    PULSES_PER_REVOLUTION, SAMPLE_WINDOW,
};
pub use crate::sensor::host::{DiskUsage, HostMetrics, SysinfoHost, DEFAULT_DISK_MOUNT, DEFAULT_THERMAL_LABEL};
pub use crate::sensor::reader::{ExternalReading, HostReading, Selection, SensorReader, SensorReading};
