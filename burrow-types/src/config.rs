//! Configuration string parsing.
//!
//! Burrow is configured with compact strings in the style
//! `create,encryption=(name=rotn,keyid=11),extensions=["rotn"]`:
//!
//! - items are separated by commas; empty items are skipped
//! - `key=value` binds a value, a bare `key` means `true`
//! - values are bare words, double-quoted strings, `( ... )` groups of
//!   nested items, or `[ ... ]` lists of values
//!
//! When a key appears more than once the last occurrence wins.

use crate::{Error, Result};
use std::fmt;

/// A parsed configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// A bare key without `=`.
    Bool(bool),
    /// A bare word or quoted string (possibly empty).
    Str(String),
    /// A parenthesized group of nested items.
    Group(ConfigMap),
    /// A bracketed list of values.
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested group, if this is a group.
    pub fn as_group(&self) -> Option<&ConfigMap> {
        match self {
            Self::Group(map) => Some(map),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Str(_) => "string",
            Self::Group(_) => "group",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Str(s) => write_word(f, s),
            Self::Group(map) => write!(f, "({map})"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// An ordered list of configuration items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMap {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration string.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser::new(input);
        let map = parser.items(None)?;
        parser.skip_ws();
        if let Some(c) = parser.peek() {
            return Err(parser.error(format!("unexpected '{c}'")));
        }
        Ok(map)
    }

    /// Appends an item. A later item with the same key shadows earlier ones.
    pub fn push(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.entries.push((key.into(), value));
    }

    /// Returns the effective value for `key`.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Iterates items in insertion order, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true if there are no items.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the string value for `key`, failing if it has another shape.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigValue::Str(s)) => Ok(Some(s)),
            Some(other) => Err(shape_error(key, "string", other)),
        }
    }

    /// Returns the boolean value for `key`.
    ///
    /// A bare key is `true`; `key=true`, `key=false`, `key=1` and `key=0`
    /// are also accepted.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigValue::Bool(b)) => Ok(Some(*b)),
            Some(ConfigValue::Str(s)) => match s.as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(Error::ConfigValue {
                    key: key.to_string(),
                    message: format!("expected a boolean, found '{s}'"),
                }),
            },
            Some(other) => Err(shape_error(key, "boolean", other)),
        }
    }

    /// Returns the group value for `key`.
    pub fn get_group(&self, key: &str) -> Result<Option<&ConfigMap>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigValue::Group(map)) => Ok(Some(map)),
            Some(other) => Err(shape_error(key, "group", other)),
        }
    }

    /// Returns the list of strings for `key`. A single string is a list of one.
    pub fn get_str_list(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(ConfigValue::Str(s)) if s.is_empty() => Ok(Vec::new()),
            Some(ConfigValue::Str(s)) => Ok(vec![s.clone()]),
            Some(ConfigValue::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| shape_error(key, "list of strings", item))
                })
                .collect(),
            Some(other) => Err(shape_error(key, "list", other)),
        }
    }

    /// Fails if any key is not in `allowed`.
    pub fn check_keys(&self, allowed: &[&str]) -> Result<()> {
        for (key, _) in self.iter() {
            if !allowed.contains(&key) {
                return Err(Error::ConfigValue {
                    key: key.to_string(),
                    message: "unknown configuration key".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfigMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write_word(f, key)?;
            match value {
                ConfigValue::Bool(true) => {}
                _ => write!(f, "={value}")?,
            }
        }
        Ok(())
    }
}

fn shape_error(key: &str, expected: &str, found: &ConfigValue) -> Error {
    Error::ConfigValue {
        key: key.to_string(),
        message: format!("expected a {expected}, found a {}", found.kind()),
    }
}

fn is_special(c: char) -> bool {
    matches!(c, ',' | '=' | '(' | ')' | '[' | ']' | '"' | '\\') || c.is_whitespace()
}

fn write_word(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if !s.chars().any(is_special) {
        return f.write_str(s);
    }
    f.write_str("\"")?;
    for c in s.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("\"")
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::ConfigSyntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!("expected '{want}', found '{c}'"))),
            None => Err(self.error(format!("expected '{want}', found end of input"))),
        }
    }

    /// Parses items until `close` (or end of input when `close` is None).
    fn items(&mut self, close: Option<char>) -> Result<ConfigMap> {
        let mut map = ConfigMap::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None if close.is_none() => return Ok(map),
                None => {
                    return Err(self.error(format!(
                        "unterminated group, expected '{}'",
                        close.unwrap_or(')')
                    )));
                }
                Some(c) if Some(c) == close => return Ok(map),
                Some(',') => {
                    self.bump();
                    continue;
                }
                Some(_) => {}
            }

            let key = self.word()?;
            if key.is_empty() {
                let c = self.peek().unwrap_or(' ');
                return Err(self.error(format!("expected a key, found '{c}'")));
            }
            self.skip_ws();
            if self.peek() == Some('=') {
                self.bump();
                let value = self.value()?;
                map.push(key, value);
            } else {
                map.push(key, ConfigValue::Bool(true));
            }

            self.skip_ws();
            match self.peek() {
                Some(',') | None => {}
                Some(c) if Some(c) == close => {}
                Some(c) => return Err(self.error(format!("expected ',', found '{c}'"))),
            }
        }
    }

    fn value(&mut self) -> Result<ConfigValue> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.bump();
                let map = self.items(Some(')'))?;
                self.expect(')')?;
                Ok(ConfigValue::Group(map))
            }
            Some('[') => {
                self.bump();
                let items = self.list()?;
                self.expect(']')?;
                Ok(ConfigValue::List(items))
            }
            _ => Ok(ConfigValue::Str(self.word()?)),
        }
    }

    fn list(&mut self) -> Result<Vec<ConfigValue>> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(self.error("unterminated list, expected ']'")),
                Some(']') => return Ok(items),
                Some(',') => {
                    self.bump();
                }
                Some(_) => {
                    items.push(self.value()?);
                    self.skip_ws();
                    match self.peek() {
                        Some(',') | Some(']') => {}
                        Some(c) => return Err(self.error(format!("expected ',', found '{c}'"))),
                        None => return Err(self.error("unterminated list, expected ']'")),
                    }
                }
            }
        }
    }

    /// A bare word (possibly empty) or a quoted string.
    fn word(&mut self) -> Result<String> {
        if self.peek() == Some('"') {
            return self.quoted();
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| !is_special(c)) {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn quoted(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }
}
