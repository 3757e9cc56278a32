// MIT License - Copyright (c) 2026 Peter Wright
// Command code lookup table

use std::collections::HashMap;

use serde::Deserialize;

use crate::constants::CODE_LEN;
use crate::error::{Result, TpiError};

/// The command table bundled with the crate (DSC panels behind an EnvisaLink).
const BUILTIN_TABLE: &str = include_str!("../data/tpi.toml");

/// How a frame is dispatched once its code has been looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    UpdateZone,
    UpdatePartition,
    UpdatePartitionUser,
    UpdateSystem,
    LoginResponse,
}

/// Static description of one 3-character command code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandDescriptor {
    /// Canonical status label, reported as `status` on update events.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Text logged before the frame payload.
    #[serde(rename = "pre", default)]
    pub log_prefix: String,
    /// Text logged after the frame payload.
    #[serde(rename = "post", default)]
    pub log_suffix: String,
    /// Expected payload length. Zero marks an informational code.
    #[serde(rename = "bytes", default)]
    pub payload_len: usize,
    #[serde(default)]
    pub action: Option<Action>,
    /// Whether the code may be sent to the panel.
    #[serde(rename = "send", default)]
    pub is_command: bool,
}

impl CommandDescriptor {
    /// Informational codes are logged but never update state.
    pub fn is_informational(&self) -> bool {
        self.payload_len == 0
    }
}

/// Immutable mapping of command code to descriptor.
///
/// The engine only reads from the table. Unknown codes are silently dropped
/// by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    entries: HashMap<String, CommandDescriptor>,
}

impl CommandTable {
    /// The table bundled in `data/tpi.toml`.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_TABLE)
    }

    /// Parse a table from TOML, one `["<code>"]` section per descriptor.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let entries: HashMap<String, CommandDescriptor> =
            toml::from_str(text).map_err(|e| TpiError::CommandTable {
                details: e.to_string(),
            })?;
        Self::from_entries(entries)
    }

    /// Build a table from already-parsed entries, rejecting malformed codes.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, CommandDescriptor)>,
    ) -> Result<Self> {
        let mut map = HashMap::new();
        for (code, descriptor) in entries {
            if code.len() != CODE_LEN || !code.is_ascii() {
                return Err(TpiError::CommandTable {
                    details: format!("command code {code:?} is not {CODE_LEN} ASCII characters"),
                });
            }
            map.insert(code, descriptor);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, code: &str) -> Option<&CommandDescriptor> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_parses() {
        let table = CommandTable::builtin().unwrap();
        assert!(!table.is_empty());

        let login = table.get("505").unwrap();
        assert_eq!(login.action, Some(Action::LoginResponse));
        assert_eq!(login.payload_len, 1);

        let armed = table.get("652").unwrap();
        assert_eq!(armed.action, Some(Action::UpdatePartition));

        let status = table.get("001").unwrap();
        assert!(status.is_command);
        assert!(status.action.is_none());
    }

    #[test]
    fn test_from_toml_str_defaults() {
        let table = CommandTable::from_toml_str(
            r#"
            ["609"]
            name = "Zone Open"
            pre = "Zone"
            bytes = 3
            action = "updatezone"

            ["560"]
            name = "Ring Detected"
            "#,
        )
        .unwrap();

        let open = table.get("609").unwrap();
        assert_eq!(open.display_name, "Zone Open");
        assert_eq!(open.log_suffix, "");
        assert!(!open.is_command);
        assert!(!open.is_informational());

        assert!(table.get("560").unwrap().is_informational());
        assert!(table.get("999").is_none());
    }

    #[test]
    fn test_rejects_bad_code() {
        let result = CommandTable::from_toml_str(
            r#"
            ["60"]
            name = "Short"
            "#,
        );
        assert!(matches!(result, Err(TpiError::CommandTable { .. })));
    }

    #[test]
    fn test_rejects_unknown_action() {
        let result = CommandTable::from_toml_str(
            r#"
            ["609"]
            name = "Zone Open"
            action = "updatekeypad"
            "#,
        );
        assert!(result.is_err());
    }
}
