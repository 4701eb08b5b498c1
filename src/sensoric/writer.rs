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

use crate::db::{Connection, Connector, DatabaseName, DbError, SqlValue};
use crate::sensor::{Selection, SensorReader, TemperatureUnit};

pub const VALUES_TABLE: &str = "sensor_bmp180_values";
pub const UNITS_TABLE: &str = "sensor_bmp180_units";
pub const HOST_TABLE: &str = "pi_hw_monitor";

/// Pressure is always stored in the unit the external sensor reports it in.
pub const PRESSURE_UNIT: &str = "hPa";

const INSERT_VALUES: &str = "INSERT INTO sensor_bmp180_values (temperature, pressure) VALUES ($1, $2)";

const INSERT_UNITS: &str =
    "INSERT INTO sensor_bmp180_units (values_id, temperature_unit, pressure_unit) VALUES ($1, $2, $3)";

const INSERT_HOST: &str = "INSERT INTO pi_hw_monitor (nr_of_processes, cpu_usage, cpu_frequency, \
     cpu_temperature, cpu_fan_rpm, ram_usage, disk_usage_free, disk_usage_used) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

/// Rows written by a single call to `write_row`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Identifier of the external sensor values row, if one was written
    pub values_id: Option<i64>,
    pub units_row: bool,
    pub host_row: bool,
}

/// Read the sensor groups included in `selection` and write them to `database`.
///
/// The external sensor values row and its unit row are committed separately. If
/// writing the unit row fails, the values row stays committed without one. Sensor
/// read failures are stored as `NULL` but any database error is returned after
/// being logged. The connection is closed before returning in every case.
pub fn write_row<C>(
    connector: &C,
    reader: &mut SensorReader,
    database: DatabaseName,
    selection: Selection,
    unit: TemperatureUnit,
) -> Result<WriteSummary, DbError>
where
    C: Connector,
{
    let mut conn = connector.connect(database).map_err(|e| {
        tracing::error!(message = "unable to connect to database", database = %database, error = %e);
        e
    })?;

    let res = write_groups(&mut conn, reader, selection, unit);
    conn.close();

    match res {
        Ok(summary) => {
            tracing::info!(
                message = "wrote sensor readings",
                database = %database,
                selection = %selection,
                values_id = ?summary.values_id,
                units_row = summary.units_row,
                host_row = summary.host_row
            );
            Ok(summary)
        }
        Err(e) => {
            tracing::error!(
                message = "unable to write sensor readings",
                database = %database,
                selection = %selection,
                kind = e.kind().as_label(),
                error = %e
            );
            Err(e)
        }
    }
}

fn write_groups<T: Connection>(
    conn: &mut T,
    reader: &mut SensorReader,
    selection: Selection,
    unit: TemperatureUnit,
) -> Result<WriteSummary, DbError> {
    let mut summary = WriteSummary::default();

    if selection.includes_external() {
        let external = reader.read_external(unit);
        insert(
            conn,
            VALUES_TABLE,
            INSERT_VALUES,
            &[external.temperature.into(), external.pressure.into()],
        )?;
        let values_id = conn.last_insert_id()?;
        summary.values_id = Some(values_id);

        if let Some(label) = unit.as_label() {
            insert(
                conn,
                UNITS_TABLE,
                INSERT_UNITS,
                &[values_id.into(), label.into(), PRESSURE_UNIT.into()],
            )?;
            summary.units_row = true;
        }
    }

    if selection.includes_host() {
        let host = reader.read_host();
        insert(
            conn,
            HOST_TABLE,
            INSERT_HOST,
            &[
                host.process_count.into(),
                host.cpu_usage_percent.into(),
                host.cpu_frequency_mhz.into(),
                host.cpu_temperature_c.into(),
                host.fan_rpm.into(),
                host.ram_usage_percent.into(),
                host.disk_free_bytes.into(),
                host.disk_used_bytes.into(),
            ],
        )?;
        summary.host_row = true;
    }

    Ok(summary)
}

/// Execute a single insert and commit it on its own.
fn insert<T: Connection>(conn: &mut T, table: &'static str, sql: &str, params: &[SqlValue]) -> Result<(), DbError> {
    conn.execute(sql, params)?;
    conn.commit()?;

    tracing::debug!(message = "inserted row", table = table);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{write_row, HOST_TABLE, UNITS_TABLE, VALUES_TABLE};
    use crate::db::test::{SpyConnector, SPY_INSERT_ID};
    use crate::db::{DatabaseName, DbErrorKind, SqlValue};
    use crate::sensor::test::{CallCounter, MockClock, MockEnvironment, MockHost, MockTachPin};
    use crate::sensor::{FanSensor, Selection, SensorReader, TemperatureUnit, SAMPLE_WINDOW};

    fn reader() -> (SensorReader, CallCounter, CallCounter) {
        let clock = MockClock::default();
        let pin = MockTachPin::evenly_spaced(clock.clone(), 50, SAMPLE_WINDOW);
        let host = MockHost::default();
        let external = MockEnvironment::default();
        let host_calls = host.calls_handle();
        let external_calls = external.calls_handle();

        let reader = SensorReader::new(host, external, FanSensor::with_clock(pin, clock), "/mnt/sda1");
        (reader, host_calls, external_calls)
    }

    #[test]
    fn test_write_all() {
        let connector = SpyConnector::default();
        let (mut reader, _, _) = reader();

        let summary = write_row(
            &connector,
            &mut reader,
            DatabaseName::Dev,
            Selection::All,
            TemperatureUnit::Celsius,
        )
        .unwrap();

        assert_eq!(Some(SPY_INSERT_ID), summary.values_id);
        assert!(summary.units_row);
        assert!(summary.host_row);

        let log = connector.log();
        assert_eq!(3, log.committed.len());

        let values = log.committed_into(VALUES_TABLE);
        assert_eq!(1, values.len());
        assert_eq!(
            vec![SqlValue::Double(Some(20.0)), SqlValue::Double(Some(1013.25))],
            values[0].params
        );

        let units = log.committed_into(UNITS_TABLE);
        assert_eq!(1, units.len());
        assert_eq!(
            vec![
                SqlValue::BigInt(Some(SPY_INSERT_ID)),
                SqlValue::Text("C".to_owned()),
                SqlValue::Text("hPa".to_owned()),
            ],
            units[0].params
        );

        let host = log.committed_into(HOST_TABLE);
        assert_eq!(1, host.len());
        assert_eq!(8, host[0].params.len());
        assert_eq!(SqlValue::BigInt(Some(123)), host[0].params[0]);
        assert_eq!(1, log.closed);
    }

    #[test]
    fn test_write_host_only() {
        let connector = SpyConnector::default();
        let (mut reader, host_calls, external_calls) = reader();

        let summary = write_row(
            &connector,
            &mut reader,
            DatabaseName::Test,
            Selection::HostOnly,
            TemperatureUnit::Celsius,
        )
        .unwrap();

        assert_eq!(None, summary.values_id);
        assert!(!summary.units_row);
        assert!(summary.host_row);
        assert_eq!(0, external_calls.get());
        assert!(host_calls.get() > 0);

        let log = connector.log();
        assert_eq!(1, log.executed.len());
        assert!(log.committed_into(VALUES_TABLE).is_empty());
        assert!(log.committed_into(UNITS_TABLE).is_empty());
        assert_eq!(1, log.committed_into(HOST_TABLE).len());
    }

    #[test]
    fn test_write_external_only() {
        let connector = SpyConnector::default();
        let (mut reader, host_calls, _) = reader();

        let summary = write_row(
            &connector,
            &mut reader,
            DatabaseName::Prod,
            Selection::ExternalOnly,
            TemperatureUnit::Kelvin,
        )
        .unwrap();

        assert!(!summary.host_row);
        assert_eq!(0, host_calls.get());

        let log = connector.log();
        assert!(log.committed_into(HOST_TABLE).is_empty());
        assert_eq!(SqlValue::Double(Some(293.15)), log.committed_into(VALUES_TABLE)[0].params[0]);
        assert_eq!(SqlValue::Text("K".to_owned()), log.committed_into(UNITS_TABLE)[0].params[1]);
    }

    #[test]
    fn test_write_omit_unit_skips_units_row() {
        let connector = SpyConnector::default();
        let (mut reader, _, _) = reader();

        let summary = write_row(
            &connector,
            &mut reader,
            DatabaseName::Dev,
            Selection::ExternalOnly,
            TemperatureUnit::Omit,
        )
        .unwrap();

        assert_eq!(Some(SPY_INSERT_ID), summary.values_id);
        assert!(!summary.units_row);

        let log = connector.log();
        assert!(log.committed_into(UNITS_TABLE).is_empty());
        let values = log.committed_into(VALUES_TABLE);
        assert_eq!(1, values.len());
        assert_eq!(SqlValue::Double(Some(20.0)), values[0].params[0]);
    }

    #[test]
    fn test_write_connection_failure() {
        let connector = SpyConnector::default().fail_connect();
        let (mut reader, host_calls, external_calls) = reader();

        let res = write_row(
            &connector,
            &mut reader,
            DatabaseName::Dev,
            Selection::All,
            TemperatureUnit::Celsius,
        );

        assert!(res.is_err());
        assert_eq!(DbErrorKind::Connection, res.unwrap_err().kind());
        assert_eq!(0, host_calls.get());
        assert_eq!(0, external_calls.get());

        let log = connector.log();
        assert_eq!(1, log.connects);
        assert!(log.executed.is_empty());
    }

    #[test]
    fn test_write_units_failure_leaves_values_row() {
        let connector = SpyConnector::default().fail_insert_into(UNITS_TABLE);
        let (mut reader, host_calls, _) = reader();

        let res = write_row(
            &connector,
            &mut reader,
            DatabaseName::Dev,
            Selection::All,
            TemperatureUnit::Fahrenheit,
        );

        assert!(res.is_err());
        assert_eq!(DbErrorKind::Statement, res.unwrap_err().kind());
        // Host metrics are never read once an earlier statement fails.
        assert_eq!(0, host_calls.get());

        let log = connector.log();
        assert_eq!(1, log.committed_into(VALUES_TABLE).len());
        assert!(log.committed_into(UNITS_TABLE).is_empty());
        assert!(log.committed_into(HOST_TABLE).is_empty());
        assert_eq!(1, log.closed);
    }

    #[test]
    fn test_write_external_sensor_failure_writes_nulls() {
        let connector = SpyConnector::default();
        let clock = MockClock::default();
        let pin = MockTachPin::evenly_spaced(clock.clone(), 50, SAMPLE_WINDOW);
        let mut reader = SensorReader::new(
            MockHost::default(),
            MockEnvironment::default().failing(),
            FanSensor::with_clock(pin, clock),
            "/mnt/sda1",
        );

        let summary = write_row(
            &connector,
            &mut reader,
            DatabaseName::Dev,
            Selection::All,
            TemperatureUnit::Celsius,
        )
        .unwrap();

        assert!(summary.host_row);

        let log = connector.log();
        assert_eq!(
            vec![SqlValue::Double(None), SqlValue::Double(None)],
            log.committed_into(VALUES_TABLE)[0].params
        );
    }

    #[test]
    fn test_write_host_sensor_failure_writes_null_column() {
        let connector = SpyConnector::default();
        let clock = MockClock::default();
        let pin = MockTachPin::evenly_spaced(clock.clone(), 50, SAMPLE_WINDOW);
        let mut reader = SensorReader::new(
            MockHost::default().fail("cpu_frequency"),
            MockEnvironment::default(),
            FanSensor::with_clock(pin, clock),
            "/mnt/sda1",
        );

        write_row(
            &connector,
            &mut reader,
            DatabaseName::Dev,
            Selection::HostOnly,
            TemperatureUnit::Celsius,
        )
        .unwrap();

        let log = connector.log();
        let host = log.committed_into(HOST_TABLE);
        let params = &host[0].params;
        assert_eq!(SqlValue::Double(None), params[2]);
        assert_eq!(SqlValue::Double(Some(12.5)), params[1]);
        assert_eq!(SqlValue::Double(Some(48.3)), params[3]);
    }
}
