// Sensoric - Record Raspberry Pi sensor readings in a database
//
// Copyright 2022-2023 Nick Pillitteri
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

use clap::{ArgGroup, Parser};
use sensoric::config::{Config, DEFAULT_CONFIG_PATH};
use sensoric::db::{DatabaseName, PgConnector};
use sensoric::sensor::{
    Bmp180Sensor, FanSensor, GpioTachPin, Selection, SensorReader, SysinfoHost, TemperatureUnit,
};
use sensoric::writer::write_row;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::Level;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_LOG_DIR: &str = "/var/log/sensoric";
const LOG_FILE_PREFIX: &str = "sensoric";

/// Record Raspberry Pi sensor readings in a database
///
/// Read temperature and barometric pressure from a BMP180 sensor and/or metrics
/// about the machine itself (processes, CPU, RAM, disk, and fan speed) and insert
/// them as rows in one of the sensoric databases. Sensors that can't be read are
/// stored as NULL. Any database error causes sensoric to exit with a non-zero status.
#[derive(Debug, Parser)]
#[command(
    name = "sensoric",
    version = clap::crate_version!(),
    group(ArgGroup::new("selection").required(true).args(["all_data", "bmp180_only", "pi_hw_only"]))
)]
struct SensoricApplication {
    /// Database to write readings to. Allowed values are 'dev_sensoric', 'test_sensoric',
    /// and 'prod_sensoric'
    #[arg(long)]
    database: DatabaseName,

    /// Read and write both the BMP180 sensor and host metrics
    #[arg(long = "all_data")]
    all_data: bool,

    /// Read and write only the BMP180 sensor
    #[arg(long = "bmp180_only", visible_alias = "external_only")]
    bmp180_only: bool,

    /// Read and write only host metrics
    #[arg(long = "pi_hw_only", visible_alias = "host_only")]
    pi_hw_only: bool,

    /// Unit to store the BMP180 temperature in. Allowed values are 'C', 'F', 'K', and
    /// 'NO'. 'NO' stores celsius without writing a unit row
    #[arg(long = "temp_unit", default_value_t = TemperatureUnit::Celsius)]
    temp_unit: TemperatureUnit,

    /// Path to the configuration file containing database credentials. If not given,
    /// /etc/sensoric/sensoric.toml is used when it exists
    #[arg(long)]
    config: Option<PathBuf>,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[arg(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Directory to write daily rotated log files to, in addition to the console
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Read the selected sensors and print the readings as JSON without writing
    /// anything to the database
    #[arg(long)]
    dry_run: bool,
}

impl SensoricApplication {
    fn selection(&self) -> Selection {
        if self.bmp180_only {
            Selection::ExternalOnly
        } else if self.pi_hw_only {
            Selection::HostOnly
        } else {
            Selection::All
        }
    }
}

fn main() {
    let opts = SensoricApplication::parse();
    let file_error = init_logging(opts.log_level, &opts.log_dir);

    if let Some(e) = file_error {
        tracing::warn!(
            message = "unable to open log directory, logging to console only",
            log_dir = %opts.log_dir.display(),
            error = %e
        );
    }

    let (config_path, required) = match &opts.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let config = Config::load(&config_path, required).unwrap_or_else(|e| {
        tracing::error!(message = "failed to load configuration", path = %config_path.display(), error = %e);
        process::exit(1)
    });

    tracing::debug!(message = "loaded configuration", config = ?config);

    let sensors = &config.sensors;
    let fan = FanSensor::from_pin(GpioTachPin::new(sensors.tach_bcm_pin));
    let external = Bmp180Sensor::new(&sensors.iio_root, &sensors.external_device);
    let host = SysinfoHost::new(&sensors.thermal_label);
    let mut reader = SensorReader::new(host, external, fan, &sensors.disk_mount);
    let selection = opts.selection();

    if opts.dry_run {
        let reading = reader.read(selection, opts.temp_unit);
        match serde_json::to_string_pretty(&reading) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                tracing::error!(message = "failed to encode readings", error = %e);
                process::exit(1)
            }
        }

        return;
    }

    if let Err(e) = config.validate() {
        tracing::error!(message = "invalid database configuration", path = %config_path.display(), error = %e);
        process::exit(1)
    }

    let connector = PgConnector::new(config.database.clone());
    if write_row(&connector, &mut reader, opts.database, selection, opts.temp_unit).is_err() {
        // Details have already been logged by the writer.
        process::exit(1)
    }

    println!("OK");
}

/// Log to stderr and to a daily rotated file in `log_dir`. If the log file can't be
/// created, only stderr is used and the error is returned so that it can be logged
/// once logging is set up.
fn init_logging(level: Level, log_dir: &Path) -> Option<InitError> {
    let (file, error) = match file_appender(log_dir) {
        Ok(appender) => (Some(appender), None),
        Err(e) => (None, Some(e)),
    };

    // stdout is reserved for the dry-run JSON and the success marker.
    let console = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    let file = file.map(|appender| tracing_subscriber::fmt::layer().with_ansi(false).with_writer(appender));

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(LevelFilter::from_level(level))
            .with(console)
            .with(file),
    )
    .expect("failed to set tracing subscriber");

    error
}

fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
}
