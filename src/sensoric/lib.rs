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

//! Record Raspberry Pi host metrics, fan speed, and BMP180 readings as database rows.
//!
//! ## Features
//!
//! Each run of `sensoric` reads a set of sensors once and inserts the readings into
//! a PostgreSQL database. It is meant to be run periodically by a systemd timer or
//! cron on a Raspberry PI (3 or 4). Two groups of sensors are supported:
//!
//! * External: temperature and barometric pressure from a BMP180 sensor, read
//!   through the Linux Industrial I/O subsystem. Rows are written to the
//!   `sensor_bmp180_values` table, with the unit of the values written to the
//!   `sensor_bmp180_units` table.
//! * Host: number of processes, CPU usage, frequency, and temperature, RAM usage,
//!   disk usage, and CPU fan speed. A single row is written to the `pi_hw_monitor`
//!   table.
//!
//! A sensor that cannot be read is logged and stored as `NULL`, it does not prevent
//! the other sensors from being read or written.
//!
//! ## Fan speed
//!
//! Fan speed is computed by counting falling edges on the tachometer wire of the fan
//! for one second. The fan is expected to emit two pulses per revolution. The
//! tachometer wire is expected on **GPIO pin 16** (BCM numbering) by default.
//!
//! ## BMP180
//!
//! The BMP180 must be enabled with the `i2c-sensor` device tree overlay so that it is
//! handled by the kernel `bmp280` driver.
//!
//! ```text
//! dtoverlay=i2c-sensor,bmp180
//! ```
//!
//! ## Configuration
//!
//! Database credentials are read from `/etc/sensoric/sensoric.toml` (or the file
//! given with `--config`). The user and password may instead be supplied with the
//! `SENSORIC_DB_USER` and `SENSORIC_DB_PASSWORD` environment variables, in which case
//! the default file doesn't need to exist. Credentials aren't needed with `--dry-run`.
//!
//! ```toml
//! [database]
//! host = "localhost"
//! port = 5432
//! user = "sensoric"
//! password = "changeme"
//!
//! [sensors]
//! tach_bcm_pin = 16
//! disk_mount = "/mnt/sda1"
//! ```
//!
//! ## Schema
//!
//! Tables are expected to exist already. Integer columns must be `BIGINT` and
//! floating point columns `DOUBLE PRECISION`. `sensor_bmp180_values` must have a
//! `SERIAL` or `BIGSERIAL` primary key named `id`.
//!
//! ## Build
//!
//! Since it's meant to be run on a Raspberry PI, you will likely need to cross-compile
//! `sensoric`.
//!
//! ```text
//! rustup target add armv7-unknown-linux-musleabihf
//! cargo build --release --target armv7-unknown-linux-musleabihf
//! ```
//!

pub mod config;
pub mod db;
pub mod sensor;
pub mod writer;
