//! Mode configuration.
//!
//! A mode names a complete routing arrangement: which classes
//! participate, how emissions fan out between classes, and which
//! attribute overrides apply when the mode becomes current. Modes are
//! plain data; the router stores them verbatim and consults the active
//! one on every fan-out.
//!
//! Modes can be built fluently in code or loaded as a [`ModeBook`] from
//! TOML:
//!
//! ```toml
//! [modes.live]
//! nodes = ["Source", "Relay", "Sink"]
//!
//! [modes.live.wiring]
//! Source = ["Relay"]
//! Relay = ["Sink"]
//!
//! [modes.live.attributes.Sink]
//! gain = 0.5
//! ```

use patchbay_types::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// One mode: participants, wiring, and attribute overrides.
///
/// `wiring` maps an emitting class to the ordered list of classes that
/// consume its emissions. `attributes` maps a class to the attribute
/// values applied to its live instances when the mode is switched to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Classes that participate in this mode. Informational; routing is
    /// driven by `wiring` alone.
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Emitting class to ordered consuming classes.
    #[serde(default)]
    pub wiring: BTreeMap<String, Vec<String>>,

    /// Class to attribute overrides applied on switch.
    #[serde(default)]
    pub attributes: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ModeConfig {
    /// Creates an empty mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participating class.
    #[must_use]
    pub fn with_node(mut self, class: impl Into<String>) -> Self {
        self.nodes.push(class.into());
        self
    }

    /// Wires an emitting class to its consumers, in delivery order.
    ///
    /// Wiring the same source twice replaces its consumer list.
    #[must_use]
    pub fn wire<I, S>(mut self, source: impl Into<String>, consumers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wiring
            .insert(source.into(), consumers.into_iter().map(Into::into).collect());
        self
    }

    /// Adds one attribute override for a class.
    #[must_use]
    pub fn with_attribute(
        mut self,
        class: impl Into<String>,
        name: impl Into<String>,
        value: Value,
    ) -> Self {
        self.attributes
            .entry(class.into())
            .or_default()
            .insert(name.into(), value);
        self
    }

    /// Consumers wired to an emitting class, in delivery order.
    #[must_use]
    pub fn consumers(&self, class: &str) -> &[String] {
        self.wiring.get(class).map_or(&[], Vec::as_slice)
    }
}

/// A named collection of modes, loadable from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeBook {
    /// Modes keyed by name.
    #[serde(default)]
    pub modes: BTreeMap<String, ModeConfig>,
}

impl ModeBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mode, builder style.
    #[must_use]
    pub fn with_mode(mut self, name: impl Into<String>, config: ModeConfig) -> Self {
        self.modes.insert(name.into(), config);
        self
    }

    /// Parses a book from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ModeBookError::ParseFailed`] if the text is not valid
    /// TOML for this shape.
    pub fn from_toml_str(text: &str) -> Result<Self, ModeBookError> {
        toml::from_str(text).map_err(|err| ModeBookError::ParseFailed {
            path: "<string>".into(),
            reason: err.to_string(),
        })
    }

    /// Loads a book from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ModeBookError::ReadFailed`] if the file cannot be
    /// read, or [`ModeBookError::ParseFailed`] if its contents do not
    /// parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModeBookError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ModeBookError::ReadFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        toml::from_str(&text).map_err(|err| ModeBookError::ParseFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }

    /// Looks up a mode by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModeConfig> {
        self.modes.get(name)
    }

    /// Number of modes in the book.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Returns `true` if the book holds no modes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

/// Mode book loading error.
///
/// # Error Code Convention
///
/// | Error | Code | Recoverable |
/// |-------|------|-------------|
/// | [`ReadFailed`](ModeBookError::ReadFailed) | `MODEBOOK_READ_FAILED` | Yes |
/// | [`ParseFailed`](ModeBookError::ParseFailed) | `MODEBOOK_PARSE_FAILED` | No |
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum ModeBookError {
    /// The file could not be read.
    ///
    /// **Recoverable** - the file may appear or permissions may change.
    #[error("failed to read mode book from {path}: {reason}")]
    ReadFailed {
        /// Path that was read.
        path: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// The file was read but did not parse as a mode book.
    ///
    /// **Not recoverable** - fix the file.
    #[error("failed to parse mode book from {path}: {reason}")]
    ParseFailed {
        /// Path that was parsed.
        path: String,
        /// Underlying parse failure.
        reason: String,
    },
}

impl ErrorCode for ModeBookError {
    /// Returns a machine-readable error code.
    ///
    /// All mode book errors use the `MODEBOOK_` prefix.
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFailed { .. } => "MODEBOOK_READ_FAILED",
            Self::ParseFailed { .. } => "MODEBOOK_PARSE_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ReadFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_types::assert_error_codes;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn builder_preserves_consumer_order() {
        let mode = ModeConfig::new()
            .with_node("Source")
            .wire("Source", ["Sink", "Relay", "Monitor"]);

        assert_eq!(mode.consumers("Source"), ["Sink", "Relay", "Monitor"]);
        assert!(mode.consumers("Relay").is_empty());
    }

    #[test]
    fn builder_wire_replaces_consumer_list() {
        let mode = ModeConfig::new()
            .wire("Source", ["Sink"])
            .wire("Source", ["Relay"]);

        assert_eq!(mode.consumers("Source"), ["Relay"]);
    }

    #[test]
    fn builder_attribute_overrides() {
        let mode = ModeConfig::new()
            .with_attribute("Sink", "gain", json!(0.5))
            .with_attribute("Sink", "muted", json!(true));

        let sink = mode.attributes.get("Sink").expect("Sink overrides");
        assert_eq!(sink.get("gain"), Some(&json!(0.5)));
        assert_eq!(sink.get("muted"), Some(&json!(true)));
    }

    #[test]
    fn parse_full_book() {
        let text = r#"
            [modes.live]
            nodes = ["Source", "Sink"]

            [modes.live.wiring]
            Source = ["Sink"]

            [modes.live.attributes.Sink]
            gain = 0.5

            [modes.standby]
            nodes = []
        "#;

        let book = ModeBook::from_toml_str(text).expect("book should parse");
        assert_eq!(book.len(), 2);

        let live = book.get("live").expect("live mode");
        assert_eq!(live.consumers("Source"), ["Sink"]);
        assert_eq!(
            live.attributes.get("Sink").and_then(|a| a.get("gain")),
            Some(&json!(0.5))
        );

        let standby = book.get("standby").expect("standby mode");
        assert!(standby.wiring.is_empty());
        assert!(standby.attributes.is_empty());
    }

    #[test]
    fn parse_rejects_invalid_toml() {
        let err = ModeBook::from_toml_str("modes = 5").expect_err("should fail");
        assert_eq!(err.code(), "MODEBOOK_PARSE_FAILED");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[modes.live.wiring]\nSource = [\"Sink\"]"
        )
        .expect("write");

        let book = ModeBook::from_file(file.path()).expect("book should load");
        assert_eq!(book.get("live").expect("live").consumers("Source"), ["Sink"]);
    }

    #[test]
    fn from_file_missing_path() {
        let err = ModeBook::from_file("/nonexistent/modes.toml").expect_err("should fail");
        assert_eq!(err.code(), "MODEBOOK_READ_FAILED");
        assert!(err.is_recoverable());
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                ModeBookError::ReadFailed {
                    path: "x".into(),
                    reason: "x".into(),
                },
                ModeBookError::ParseFailed {
                    path: "x".into(),
                    reason: "x".into(),
                },
            ],
            "MODEBOOK_",
        );
    }

    #[test]
    fn book_serializes_back_to_toml() {
        let book = ModeBook::new().with_mode("live", ModeConfig::new().wire("Source", ["Sink"]));
        let text = toml::to_string(&book).expect("serialize");
        let restored = ModeBook::from_toml_str(&text).expect("reparse");
        assert_eq!(restored, book);
    }
}
