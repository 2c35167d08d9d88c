//! Encryption descriptors and requested encryption configurations.
//!
//! A descriptor is what a table persists about how its pages were
//! encrypted: the encryptor name and keyid. A config is what a caller asks
//! for when opening a connection, which additionally carries the secret key.
//!
//! Both are explicit `None | Named` variants. The `none` encryptor is never
//! represented by a magic string inside `Named`.

use crate::config::{ConfigMap, ConfigValue};
use crate::secret::SecretKey;
use crate::{Error, Result};
use std::fmt;

/// Name of the identity encryptor.
pub const NONE_ENCRYPTOR: &str = "none";

const ENCRYPTION_KEY: &str = "encryption";

/// Persisted record of how a table's existing pages were encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum EncryptionDescriptor {
    /// Pages are stored as plaintext.
    #[default]
    None,
    /// Pages are encrypted by the named encryptor with the given keyid.
    Named { name: String, keyid: String },
}

impl EncryptionDescriptor {
    /// Builds a descriptor, mapping an empty name or `none` to [`Self::None`].
    pub fn named(name: impl Into<String>, keyid: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() || name == NONE_ENCRYPTOR {
            Self::None
        } else {
            Self::Named {
                name,
                keyid: keyid.into(),
            }
        }
    }

    /// Encryptor name, `none` for plaintext.
    pub fn name(&self) -> &str {
        match self {
            Self::None => NONE_ENCRYPTOR,
            Self::Named { name, .. } => name,
        }
    }

    /// Keyid, empty for plaintext.
    pub fn keyid(&self) -> &str {
        match self {
            Self::None => "",
            Self::Named { keyid, .. } => keyid,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Group value `(name=...,keyid=...)`.
    pub fn to_config(&self) -> ConfigValue {
        let mut group = ConfigMap::new();
        group.push("name", ConfigValue::Str(self.name().to_string()));
        group.push("keyid", ConfigValue::Str(self.keyid().to_string()));
        ConfigValue::Group(group)
    }

    /// Canonical metadata fragment, e.g. `encryption=(name=rotn,keyid=11)`.
    pub fn encode(&self) -> String {
        let mut map = ConfigMap::new();
        map.push(ENCRYPTION_KEY, self.to_config());
        map.to_string()
    }

    /// Decodes a descriptor from a metadata fragment or a full metadata
    /// record. A record without an `encryption` item is plaintext.
    pub fn decode(record: &str) -> Result<Self> {
        let map = ConfigMap::parse(record)
            .map_err(|e| Error::MalformedDescriptor(e.to_string()))?;
        Self::from_config(&map)
    }

    /// Extracts the descriptor from a parsed metadata record.
    ///
    /// The named encryptor does not have to be available; that is checked
    /// later, when the descriptor is resolved.
    pub fn from_config(map: &ConfigMap) -> Result<Self> {
        let Some(value) = map.get(ENCRYPTION_KEY) else {
            return Ok(Self::None);
        };
        let group = value.as_group().ok_or_else(|| {
            Error::MalformedDescriptor(format!("'{ENCRYPTION_KEY}' is not a group: {value}"))
        })?;
        for (key, _) in group.iter() {
            match key {
                "name" | "keyid" => {}
                "secretkey" => {
                    return Err(Error::MalformedDescriptor(
                        "a persisted descriptor must not carry a secretkey".to_string(),
                    ));
                }
                other => {
                    return Err(Error::MalformedDescriptor(format!("unknown field '{other}'")));
                }
            }
        }
        let name = descriptor_str(group, "name")?;
        let keyid = descriptor_str(group, "keyid")?;
        Ok(Self::named(name, keyid))
    }
}

impl fmt::Display for EncryptionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str(NONE_ENCRYPTOR),
            Self::Named { name, keyid } => write!(f, "{name}(keyid={keyid})"),
        }
    }
}

fn descriptor_str(group: &ConfigMap, key: &str) -> Result<String> {
    match group.get(key) {
        None => Ok(String::new()),
        Some(ConfigValue::Str(s)) => Ok(s.clone()),
        Some(other) => Err(Error::MalformedDescriptor(format!(
            "'{key}' is not a string: {other}"
        ))),
    }
}

/// Encryption requested by a caller at connection open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EncryptionConfig {
    /// No encryption requested.
    #[default]
    None,
    /// Encrypt with the named encryptor, customized by keyid and secretkey.
    Named {
        name: String,
        keyid: String,
        secretkey: SecretKey,
    },
}

impl EncryptionConfig {
    /// Builds a config, mapping an empty name or `none` to [`Self::None`].
    pub fn named(
        name: impl Into<String>,
        keyid: impl Into<String>,
        secretkey: impl Into<String>,
    ) -> Self {
        let name = name.into();
        if name.is_empty() || name == NONE_ENCRYPTOR {
            Self::None
        } else {
            Self::Named {
                name,
                keyid: keyid.into(),
                secretkey: SecretKey::new(secretkey),
            }
        }
    }

    /// Reads the `encryption=(name,keyid,secretkey)` group of a connection
    /// configuration. Absent means no encryption.
    pub fn from_config(map: &ConfigMap) -> Result<Self> {
        let Some(group) = map.get_group(ENCRYPTION_KEY)? else {
            return Ok(Self::None);
        };
        group.check_keys(&["name", "keyid", "secretkey"])?;
        let name = group.get_str("name")?.unwrap_or_default();
        let keyid = group.get_str("keyid")?.unwrap_or_default();
        let secretkey = group.get_str("secretkey")?.unwrap_or_default();
        Ok(Self::named(name, keyid, secretkey))
    }

    /// Encryptor name, `none` for plaintext.
    pub fn name(&self) -> &str {
        match self {
            Self::None => NONE_ENCRYPTOR,
            Self::Named { name, .. } => name,
        }
    }

    /// Keyid, empty for plaintext.
    pub fn keyid(&self) -> &str {
        match self {
            Self::None => "",
            Self::Named { keyid, .. } => keyid,
        }
    }

    /// Secret key, if a non-empty one was supplied.
    pub fn secretkey(&self) -> Option<&SecretKey> {
        match self {
            Self::Named { secretkey, .. } if !secretkey.is_empty() => Some(secretkey),
            _ => None,
        }
    }

    /// The descriptor a table created under this config would persist.
    pub fn descriptor(&self) -> EncryptionDescriptor {
        match self {
            Self::None => EncryptionDescriptor::None,
            Self::Named { name, keyid, .. } => EncryptionDescriptor::Named {
                name: name.clone(),
                keyid: keyid.clone(),
            },
        }
    }
}
