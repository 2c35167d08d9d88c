//! Typed views of connection and table configuration strings.

use crate::error::{StorageError, StorageResult};
use burrow_types::{ConfigMap, EncryptionConfig, EncryptionDescriptor};

const CONNECTION_KEYS: &[&str] = &["create", "error_prefix", "encryption", "extensions"];
const TABLE_KEYS: &[&str] = &["key_format", "value_format", "encryption"];

/// Record formats a table may declare.
pub const FORMATS: &[&str] = &["S", "u"];

/// Options accepted by [`crate::Connection::open`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    /// Create the home directory if it is missing.
    pub create: bool,
    /// Attached to every error and warning logged by the connection.
    pub error_prefix: String,
    pub encryption: EncryptionConfig,
    /// Extension locations, in the order given.
    pub extensions: Vec<String>,
}

impl ConnectionSettings {
    /// Parses a connection configuration string.
    pub fn parse(config: &str) -> StorageResult<Self> {
        let map = ConfigMap::parse(config)?;
        map.check_keys(CONNECTION_KEYS)?;
        Ok(Self {
            create: map.get_bool("create")?.unwrap_or(false),
            error_prefix: map.get_str("error_prefix")?.unwrap_or_default().to_string(),
            encryption: EncryptionConfig::from_config(&map)?,
            extensions: map.get_str_list("extensions")?,
        })
    }
}

/// Options accepted by [`crate::Connection::create_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSettings {
    pub key_format: String,
    pub value_format: String,
    /// Explicit descriptor; `None` inherits the connection's encryption.
    pub encryption: Option<EncryptionDescriptor>,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            key_format: "u".to_string(),
            value_format: "u".to_string(),
            encryption: None,
        }
    }
}

impl TableSettings {
    /// Parses a table configuration string.
    pub fn parse(config: &str) -> StorageResult<Self> {
        let map = ConfigMap::parse(config)?;
        map.check_keys(TABLE_KEYS)?;

        let encryption = match map.get_group("encryption")? {
            None => None,
            Some(group) => {
                if group.get("secretkey").is_some() {
                    return Err(StorageError::InvalidConfig(
                        "secretkey may only be given in the connection configuration".to_string(),
                    ));
                }
                group.check_keys(&["name", "keyid"])?;
                Some(
                    EncryptionDescriptor::from_config(&map)
                        .map_err(|e| StorageError::InvalidConfig(e.to_string()))?,
                )
            }
        };

        let defaults = Self::default();
        Ok(Self {
            key_format: format_option(&map, "key_format", defaults.key_format)?,
            value_format: format_option(&map, "value_format", defaults.value_format)?,
            encryption,
        })
    }
}

fn format_option(map: &ConfigMap, key: &str, default: String) -> StorageResult<String> {
    match map.get_str(key)? {
        None => Ok(default),
        Some(format) if FORMATS.contains(&format) => Ok(format.to_string()),
        Some(format) => Err(StorageError::InvalidConfig(format!(
            "unsupported {key} '{format}', expected one of {FORMATS:?}"
        ))),
    }
}
