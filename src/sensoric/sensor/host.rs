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

use crate::sensor::core::{SensorError, SensorErrorKind, TemperatureCelsius};
use std::path::Path;
use std::thread;
use sysinfo::{Components, Disks, ProcessesToUpdate, System, MINIMUM_CPU_UPDATE_INTERVAL};

/// Mount point of the disk usage is reported for by default.
pub const DEFAULT_DISK_MOUNT: &str = "/mnt/sda1";

/// Label prefix of the SoC temperature sensor on a Raspberry PI.
pub const DEFAULT_THERMAL_LABEL: &str = "cpu_thermal";

/// Free and used space of a mounted filesystem, in bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiskUsage {
    pub free: u64,
    pub used: u64,
}

/// Operating system and hardware metrics of the machine we're running on.
///
/// Each metric is read independently so that a failure reading one of them
/// doesn't prevent the others from being read.
pub trait HostMetrics {
    fn process_count(&mut self) -> Result<u64, SensorError>;
    fn cpu_usage_percent(&mut self) -> Result<f64, SensorError>;
    fn cpu_frequency_mhz(&mut self) -> Result<f64, SensorError>;
    fn cpu_temperature(&mut self) -> Result<TemperatureCelsius, SensorError>;
    fn ram_usage_percent(&mut self) -> Result<f64, SensorError>;
    fn disk_usage(&mut self, mount: &Path) -> Result<DiskUsage, SensorError>;
}

/// `HostMetrics` implementation backed by `sysinfo`.
pub struct SysinfoHost {
    sys: System,
    components: Components,
    disks: Disks,
    thermal_label: String,
}

impl SysinfoHost {
    pub fn new<S: Into<String>>(thermal_label: S) -> Self {
        Self {
            sys: System::new(),
            components: Components::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
            thermal_label: thermal_label.into().to_lowercase(),
        }
    }
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_LABEL)
    }
}

impl HostMetrics for SysinfoHost {
    fn process_count(&mut self) -> Result<u64, SensorError> {
        self.sys.refresh_processes(ProcessesToUpdate::All, true);

        // Threads are listed as processes on Linux.
        let count = self.sys.processes().values().filter(|p| p.thread_kind().is_none()).count();
        Ok(count as u64)
    }

    fn cpu_usage_percent(&mut self) -> Result<f64, SensorError> {
        // Usage is computed from the difference between two refreshes so the first
        // refresh only establishes a baseline.
        self.sys.refresh_cpu_usage();
        thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        self.sys.refresh_cpu_usage();

        if self.sys.cpus().is_empty() {
            return Err(SensorError::KindMsg(SensorErrorKind::Unavailable, "no CPUs found"));
        }

        Ok(self.sys.global_cpu_usage() as f64)
    }

    fn cpu_frequency_mhz(&mut self) -> Result<f64, SensorError> {
        self.sys.refresh_cpu_frequency();

        match self.sys.cpus().first().map(|c| c.frequency()) {
            Some(mhz) if mhz > 0 => Ok(mhz as f64),
            _ => Err(SensorError::KindMsg(
                SensorErrorKind::Unavailable,
                "CPU frequency not reported",
            )),
        }
    }

    fn cpu_temperature(&mut self) -> Result<TemperatureCelsius, SensorError> {
        self.components.refresh(true);

        self.components
            .iter()
            .filter(|c| c.label().to_lowercase().contains(&self.thermal_label))
            .find_map(|c| c.temperature())
            .map(|t| TemperatureCelsius::from(t as f64))
            .ok_or(SensorError::KindMsg(
                SensorErrorKind::Unavailable,
                "no temperature sensor matching the configured label",
            ))
    }

    fn ram_usage_percent(&mut self) -> Result<f64, SensorError> {
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        if total == 0 {
            return Err(SensorError::KindMsg(SensorErrorKind::Unavailable, "total memory not reported"));
        }

        let used = total.saturating_sub(self.sys.available_memory());
        Ok(used as f64 / total as f64 * 100.0)
    }

    fn disk_usage(&mut self, mount: &Path) -> Result<DiskUsage, SensorError> {
        self.disks.refresh(true);

        self.disks
            .iter()
            .find(|d| d.mount_point() == mount)
            .map(|d| DiskUsage {
                free: d.available_space(),
                used: d.total_space().saturating_sub(d.available_space()),
            })
            .ok_or(SensorError::KindMsg(
                SensorErrorKind::Unavailable,
                "no disk mounted at the configured path",
            ))
    }
}
