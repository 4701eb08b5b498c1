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

use std::error::Error;
use std::fmt::{self, Formatter};
use std::str::FromStr;

/// Database instance readings are written to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DatabaseName {
    Dev,
    Test,
    Prod,
}

impl DatabaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseName::Dev => "dev_sensoric",
            DatabaseName::Test => "test_sensoric",
            DatabaseName::Prod => "prod_sensoric",
        }
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev_sensoric" => Ok(DatabaseName::Dev),
            "test_sensoric" => Ok(DatabaseName::Test),
            "prod_sensoric" => Ok(DatabaseName::Prod),
            _ => Err(format!(
                "unknown database '{}', expected one of dev_sensoric, test_sensoric, prod_sensoric",
                s
            )),
        }
    }
}

/// Parameter bound to a placeholder of a SQL statement. `None` values are bound as `NULL`.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    BigInt(Option<i64>),
    Double(Option<f64>),
    Text(String),
}

impl From<Option<u64>> for SqlValue {
    fn from(v: Option<u64>) -> Self {
        // Values that don't fit in a signed column are stored as NULL.
        SqlValue::BigInt(v.and_then(|n| i64::try_from(n).ok()))
    }
}

impl From<Option<f64>> for SqlValue {
    fn from(v: Option<f64>) -> Self {
        SqlValue::Double(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(Some(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_owned())
    }
}

/// Potential kinds of errors that can be encountered talking to the database
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum DbErrorKind {
    Connection,
    Statement,
    Commit,
}

impl DbErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            DbErrorKind::Connection => "connection",
            DbErrorKind::Statement => "statement",
            DbErrorKind::Commit => "commit",
        }
    }
}

/// Error connecting to the database or executing statements against it
#[derive(Debug)]
pub enum DbError {
    KindMsg(DbErrorKind, &'static str),
    KindMsgCause(DbErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl DbError {
    pub fn kind(&self) -> DbErrorKind {
        match self {
            DbError::KindMsg(kind, _) => *kind,
            DbError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DbError::KindMsg(_, msg) => f.write_str(msg),
            DbError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DbError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// An open connection to the database.
///
/// Statements run inside a transaction that is started implicitly by the first
/// `execute` after a `commit` (or after the connection is opened) and ended by
/// the next `commit`.
pub trait Connection {
    /// Execute a single statement with `$n` style placeholders bound to `params`,
    /// returning the number of rows affected.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    /// Identifier generated for the most recent row inserted by this connection.
    fn last_insert_id(&mut self) -> Result<i64, DbError>;

    /// Close the connection, discarding any uncommitted statements. Calling this more
    /// than once has no effect.
    fn close(&mut self);
}

/// Creates new connections to a named database.
pub trait Connector {
    type Conn: Connection;

    fn connect(&self, database: DatabaseName) -> Result<Self::Conn, DbError>;
}
