//! Identifier types used throughout the Burrow engine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for one open connection, attached to its log events.
/// Uses UUID v7 so ids sort by open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new connection ID with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a connection ID from a string.
    pub fn parse(s: &str) -> Result<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URI naming a table, of the form `table:<name>`.
///
/// The name may contain ASCII letters, digits, `_`, `-` and `.`, and is used
/// to derive the table's block file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableUri(String);

impl TableUri {
    /// URI scheme prefix for tables.
    pub const PREFIX: &'static str = "table:";

    /// Parses and validates a table URI.
    pub fn parse(s: &str) -> Result<Self> {
        let name = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| Error::InvalidUri(format!("'{s}' does not start with 'table:'")))?;
        if name.is_empty() {
            return Err(Error::InvalidUri(format!("'{s}' has an empty name")));
        }
        if name.starts_with('.') {
            return Err(Error::InvalidUri(format!("'{s}' starts with '.'")));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(Error::InvalidUri(format!("'{s}' contains '{bad}'")));
        }
        Ok(Self(s.to_string()))
    }

    /// The table name without the scheme.
    pub fn name(&self) -> &str {
        &self.0[Self::PREFIX.len()..]
    }

    /// The full URI.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the table's block file.
    pub fn file_name(&self) -> String {
        format!("{}.bdb", self.name())
    }
}

impl fmt::Display for TableUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TableUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TableUri {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<TableUri> for String {
    fn from(uri: TableUri) -> Self {
        uri.0
    }
}
