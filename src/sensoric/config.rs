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

//! Configuration loaded from a TOML file with credentials optionally supplied
//! through the environment.

use crate::sensor::{DEFAULT_DEVICE_NAME, DEFAULT_DISK_MOUNT, DEFAULT_IIO_ROOT, DEFAULT_TACH_BCM_PIN, DEFAULT_THERMAL_LABEL};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{self, Debug, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Path the configuration is loaded from when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sensoric/sensoric.toml";

pub const ENV_DB_HOST: &str = "SENSORIC_DB_HOST";
pub const ENV_DB_PORT: &str = "SENSORIC_DB_PORT";
pub const ENV_DB_USER: &str = "SENSORIC_DB_USER";
pub const ENV_DB_PASSWORD: &str = "SENSORIC_DB_PASSWORD";

/// Potential kinds of errors that can be encountered loading configuration
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum ConfigErrorKind {
    Io,
    Parse,
    Missing,
}

/// Error reading, parsing, or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    KindMsg(ConfigErrorKind, &'static str),
    KindMsgCause(ConfigErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl ConfigError {
    pub fn kind(&self) -> ConfigErrorKind {
        match self {
            ConfigError::KindMsg(kind, _) => *kind,
            ConfigError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::KindMsg(_, msg) => f.write_str(msg),
            ConfigError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Database server address and credentials.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Debug for DatabaseConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Location and identification of each sensor.
#[derive(Clone, Debug, Deserialize)]
pub struct SensorsConfig {
    /// BCM GPIO pin number of the fan tachometer wire
    #[serde(default = "default_tach_pin")]
    pub tach_bcm_pin: u8,

    /// Mount point of the disk to report usage for
    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,

    /// Directory containing Industrial I/O devices
    #[serde(default = "default_iio_root")]
    pub iio_root: PathBuf,

    /// Name of the IIO device of the external temperature and pressure sensor
    #[serde(default = "default_external_device")]
    pub external_device: String,

    /// Label of the temperature sensor to report as the CPU temperature
    #[serde(default = "default_thermal_label")]
    pub thermal_label: String,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            tach_bcm_pin: default_tach_pin(),
            disk_mount: default_disk_mount(),
            iio_root: default_iio_root(),
            external_device: default_external_device(),
            thermal_label: default_thermal_label(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub sensors: SensorsConfig,
}

impl Config {
    /// Load configuration from `path` and apply overrides from the process environment.
    ///
    /// If `required` is false and nothing exists at `path`, defaults are used instead so
    /// that every setting can come from the environment. Credentials are not checked
    /// here, call `validate` before connecting to the database.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        Self::load_with(path, required, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: &Path, required: bool, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents)?,
            Err(e) if !required && e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(ConfigError::KindMsgCause(
                    ConfigErrorKind::Io,
                    "unable to read configuration file",
                    Box::new(e),
                ))
            }
        };

        config.apply_env(lookup)?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| {
            ConfigError::KindMsgCause(ConfigErrorKind::Parse, "unable to parse configuration file", Box::new(e))
        })
    }

    /// Override database settings with values looked up by `lookup`. Values that are
    /// present always win over the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_DB_HOST) {
            self.database.host = host;
        }

        if let Some(port) = lookup(ENV_DB_PORT) {
            self.database.port = port.parse().map_err(|e| {
                ConfigError::KindMsgCause(ConfigErrorKind::Parse, "invalid database port in environment", Box::new(e))
            })?;
        }

        if let Some(user) = lookup(ENV_DB_USER) {
            self.database.user = user;
        }

        if let Some(password) = lookup(ENV_DB_PASSWORD) {
            self.database.password = password;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.user.is_empty() {
            return Err(ConfigError::KindMsg(ConfigErrorKind::Missing, "database user is not set"));
        }

        if self.database.password.is_empty() {
            return Err(ConfigError::KindMsg(ConfigErrorKind::Missing, "database password is not set"));
        }

        Ok(())
    }
}

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_port() -> u16 {
    5432
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_tach_pin() -> u8 {
    DEFAULT_TACH_BCM_PIN
}

fn default_disk_mount() -> PathBuf {
    PathBuf::from(DEFAULT_DISK_MOUNT)
}

fn default_iio_root() -> PathBuf {
    PathBuf::from(DEFAULT_IIO_ROOT)
}

fn default_external_device() -> String {
    DEFAULT_DEVICE_NAME.to_owned()
}

fn default_thermal_label() -> String {
    DEFAULT_THERMAL_LABEL.to_owned()
}

#[cfg(test)]
mod test {
    use super::{Config, ConfigErrorKind, ENV_DB_PASSWORD, ENV_DB_PORT, ENV_DB_USER};
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_parse_full() {
        let config = Config::parse(
            r#"
            [database]
            host = "db.local"
            port = 5433
            user = "pi"
            password = "hunter2"
            connect_timeout_secs = 3

            [sensors]
            tach_bcm_pin = 18
            disk_mount = "/"
            iio_root = "/tmp/iio"
            external_device = "bmp280"
            thermal_label = "soc"
            "#,
        )
        .unwrap();

        assert_eq!("db.local", config.database.host);
        assert_eq!(5433, config.database.port);
        assert_eq!("pi", config.database.user);
        assert_eq!("hunter2", config.database.password);
        assert_eq!(3, config.database.connect_timeout_secs);
        assert_eq!(18, config.sensors.tach_bcm_pin);
        assert_eq!(PathBuf::from("/"), config.sensors.disk_mount);
        assert_eq!(PathBuf::from("/tmp/iio"), config.sensors.iio_root);
        assert_eq!("bmp280", config.sensors.external_device);
        assert_eq!("soc", config.sensors.thermal_label);
    }

    #[test]
    fn test_parse_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!("localhost", config.database.host);
        assert_eq!(5432, config.database.port);
        assert_eq!(16, config.sensors.tach_bcm_pin);
        assert_eq!(PathBuf::from("/mnt/sda1"), config.sensors.disk_mount);
        assert_eq!("bmp180", config.sensors.external_device);
        assert_eq!("cpu_thermal", config.sensors.thermal_label);
    }

    #[test]
    fn test_parse_invalid() {
        let res = Config::parse("[database\nport = 1");

        assert!(res.is_err());
        assert_eq!(ConfigErrorKind::Parse, res.unwrap_err().kind());
    }

    #[test]
    fn test_missing_credentials() {
        let config = Config::parse("[database]\nuser = \"pi\"\n").unwrap();
        let res = config.validate();

        assert!(res.is_err());
        assert_eq!(ConfigErrorKind::Missing, res.unwrap_err().kind());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::parse("[database]\nuser = \"pi\"\npassword = \"from-file\"\n").unwrap();
        let env: HashMap<&str, &str> = [(ENV_DB_PASSWORD, "from-env"), (ENV_DB_PORT, "6432")].into_iter().collect();

        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!("pi", config.database.user);
        assert_eq!("from-env", config.database.password);
        assert_eq!(6432, config.database.port);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_supplies_credentials() {
        let mut config = Config::parse("").unwrap();
        let env: HashMap<&str, &str> = [(ENV_DB_USER, "pi"), (ENV_DB_PASSWORD, "secret")].into_iter().collect();

        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_invalid_port() {
        let mut config = Config::parse("").unwrap();
        let res = config.apply_env(|k| if k == ENV_DB_PORT { Some("lots".to_owned()) } else { None });

        assert!(res.is_err());
        assert_eq!(ConfigErrorKind::Parse, res.unwrap_err().kind());
    }

    #[test]
    fn test_load_missing_required_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = Config::load_with(&dir.path().join("missing.toml"), true, |_| None);

        assert!(res.is_err());
        assert_eq!(ConfigErrorKind::Io, res.unwrap_err().kind());
    }

    #[test]
    fn test_load_missing_optional_file_uses_env() {
        let dir = tempfile::tempdir().unwrap();
        let env: HashMap<&str, &str> = [(ENV_DB_USER, "pi"), (ENV_DB_PASSWORD, "secret")].into_iter().collect();

        let config = Config::load_with(&dir.path().join("sensoric.toml"), false, |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!("pi", config.database.user);
        assert_eq!("secret", config.database.password);
        assert_eq!("localhost", config.database.host);
        assert_eq!(16, config.sensors.tach_bcm_pin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_does_not_require_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(&dir.path().join("sensoric.toml"), false, |_| None).unwrap();

        assert_eq!(ConfigErrorKind::Missing, config.validate().unwrap_err().kind());
    }

    #[test]
    fn test_load_optional_path_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = Config::load_with(dir.path(), false, |_| None);

        assert!(res.is_err());
        assert_eq!(ConfigErrorKind::Io, res.unwrap_err().kind());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensoric.toml");
        fs::write(&path, "[database]\nuser = \"pi\"\npassword = \"secret\"\n").unwrap();

        let config = Config::load_with(&path, true, |_| None).unwrap();

        assert_eq!("pi", config.database.user);
        assert!(config.validate().is_ok());
    }
}
