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

use crate::config::DatabaseConfig;
use crate::db::core::{Connection, Connector, DatabaseName, DbError, DbErrorKind, SqlValue};
use postgres::types::ToSql;
use postgres::{Client, NoTls};
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

impl SqlValue {
    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlValue::BigInt(v) => v,
            SqlValue::Double(v) => v,
            SqlValue::Text(v) => v,
        }
    }
}

/// Opens connections to a PostgreSQL server using credentials from the configuration.
pub struct PgConnector {
    config: DatabaseConfig,
}

impl PgConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

impl Connector for PgConnector {
    type Conn = PgConnection;

    fn connect(&self, database: DatabaseName) -> Result<Self::Conn, DbError> {
        let client = postgres::Config::new()
            .host(&self.config.host)
            .port(self.config.port)
            .user(&self.config.user)
            .password(&self.config.password)
            .dbname(database.as_str())
            .application_name(env!("CARGO_PKG_NAME"))
            .connect_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .connect(NoTls)
            .map_err(|e| DbError::KindMsgCause(DbErrorKind::Connection, "unable to connect to database", Box::new(e)))?;

        tracing::debug!(
            message = "connected to database",
            host = %self.config.host,
            port = self.config.port,
            database = %database
        );

        Ok(PgConnection {
            client: Some(client),
            in_transaction: false,
        })
    }
}

impl Debug for PgConnector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnector")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("user", &self.config.user)
            .finish()
    }
}

/// Connection to a PostgreSQL server. Statements are grouped into explicit
/// transactions so that each `commit` covers everything executed since the last one.
pub struct PgConnection {
    client: Option<Client>,
    in_transaction: bool,
}

impl PgConnection {
    fn client(&mut self) -> Result<&mut Client, DbError> {
        self.client
            .as_mut()
            .ok_or(DbError::KindMsg(DbErrorKind::Connection, "connection has been closed"))
    }
}

impl Connection for PgConnection {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        let begin = !self.in_transaction;
        let client = self.client()?;

        if begin {
            client.batch_execute("BEGIN").map_err(|e| {
                DbError::KindMsgCause(DbErrorKind::Statement, "unable to start transaction", Box::new(e))
            })?;
        }
        self.in_transaction = true;

        let values: Vec<&(dyn ToSql + Sync)> = params.iter().map(SqlValue::as_sql).collect();
        let client = self.client()?;
        client
            .execute(sql, &values)
            .map_err(|e| DbError::KindMsgCause(DbErrorKind::Statement, "unable to execute statement", Box::new(e)))
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Ok(());
        }

        self.in_transaction = false;
        self.client()?
            .batch_execute("COMMIT")
            .map_err(|e| DbError::KindMsgCause(DbErrorKind::Commit, "unable to commit transaction", Box::new(e)))
    }

    fn last_insert_id(&mut self) -> Result<i64, DbError> {
        let row = self
            .client()?
            .query_one("SELECT lastval()", &[])
            .map_err(|e| DbError::KindMsgCause(DbErrorKind::Statement, "unable to get last insert id", Box::new(e)))?;

        row.try_get::<_, i64>(0)
            .map_err(|e| DbError::KindMsgCause(DbErrorKind::Statement, "unable to get last insert id", Box::new(e)))
    }

    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if self.in_transaction {
                tracing::warn!(message = "closing connection with uncommitted statements");
            }

            self.in_transaction = false;
            if let Err(e) = client.close() {
                tracing::warn!(message = "error closing database connection", error = %e);
            }
        }
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl Debug for PgConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnection")
            .field("open", &self.client.is_some())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}
