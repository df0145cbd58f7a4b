//! Training-data documents for exporting and seeding stores.
//!
//! A training document carries pattern content only, never ids or vectors:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "exported_at": 1718000000000,
//!   "patterns": [
//!     { "action": "fill_form", "selector": "input[name=email]", "success": true }
//!   ]
//! }
//! ```
//!
//! Hand-authored documents may omit `exported_at` and any optional pattern
//! field.

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, StorageError};
use crate::pattern::ActionPattern;
use crate::types::Timestamp;

/// Version tag written by [`TrainingData::new`].
pub const TRAINING_DATA_VERSION: &str = "1.0";

/// Major version accepted on import.
const SUPPORTED_MAJOR: &str = "1";

/// Serialized pattern content for export and import.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    /// Format version, `"<major>.<minor>"`.
    pub version: String,

    /// When the document was exported; absent in hand-authored documents.
    #[serde(default)]
    pub exported_at: Option<Timestamp>,

    /// Patterns in export order.
    pub patterns: Vec<ActionPattern>,
}

impl TrainingData {
    /// Creates a document for the current version stamped with the current time.
    pub fn new(patterns: Vec<ActionPattern>) -> Self {
        Self {
            version: TRAINING_DATA_VERSION.to_string(),
            exported_at: Some(Timestamp::now()),
            patterns,
        }
    }

    /// Parses and version-checks a JSON document.
    ///
    /// # Errors
    ///
    /// - `ImportError::Malformed` if the text is not JSON or lacks a
    ///   `version` string or a `patterns` array
    /// - `ImportError::UnsupportedVersion` if the major version is not 1
    ///
    /// # Example
    ///
    /// ```rust
    /// use agentdb::TrainingData;
    ///
    /// let doc = TrainingData::from_json(r#"{"version":"1.0","patterns":[{"action":"click"}]}"#).unwrap();
    /// assert_eq!(doc.patterns.len(), 1);
    ///
    /// assert!(TrainingData::from_json(r#"{"version":"1.0"}"#).is_err());
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        let doc: TrainingData =
            serde_json::from_str(json).map_err(|e| ImportError::Malformed(e.to_string()))?;
        doc.check_version()?;
        Ok(doc)
    }

    /// Serializes the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the document cannot be
    /// encoded.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::serialization(e.to_string()))
    }

    /// Checks that the document's major version is supported.
    pub fn check_version(&self) -> Result<(), ImportError> {
        let major = self.version.split('.').next().unwrap_or_default().trim();
        if major != SUPPORTED_MAJOR {
            return Err(ImportError::UnsupportedVersion(self.version.clone()));
        }
        Ok(())
    }
}
