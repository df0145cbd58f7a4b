//! Input validation for action patterns.
//!
//! Validates [`ActionPattern`] fields before they reach the embedder, the
//! index or the catalog. All size/count constraints are defined as
//! constants in [`crate::storage::schema`].
//!
//! # Validation Layers
//!
//! ```text
//! AgentDB::store_action() / find_similar() / import_training_data()
//!     ├── validate_pattern()       ← every public entry point
//!     └── embed → index → catalog  ← only reached if valid
//! ```

use crate::error::ValidationError;
use crate::pattern::types::ActionPattern;
use crate::storage::schema::{
    MAX_ACTION_LENGTH, MAX_FIELD_SIZE, MAX_METADATA_ENTRIES, MAX_METADATA_KEY_LENGTH,
    MAX_METADATA_VALUE_SIZE,
};

/// Validates an [`ActionPattern`].
///
/// # Rules
///
/// | Field | Constraint |
/// |-------|------------|
/// | `action` | Non-empty, max 256 bytes |
/// | `selector`, `value`, `url` | Max 64 KiB each |
/// | `metadata` | Max 64 entries; keys non-empty, max 256 bytes; values max 4 KiB |
///
/// A non-empty `action` guarantees the embedding has unit norm.
pub(crate) fn validate_pattern(pattern: &ActionPattern) -> Result<(), ValidationError> {
    if pattern.action.trim().is_empty() {
        return Err(ValidationError::required_field("action"));
    }
    if pattern.action.len() > MAX_ACTION_LENGTH {
        return Err(ValidationError::content_too_large(
            "action",
            pattern.action.len(),
            MAX_ACTION_LENGTH,
        ));
    }

    for (field, value) in [
        ("selector", &pattern.selector),
        ("value", &pattern.value),
        ("url", &pattern.url),
    ] {
        if let Some(value) = value {
            if value.len() > MAX_FIELD_SIZE {
                return Err(ValidationError::content_too_large(
                    field,
                    value.len(),
                    MAX_FIELD_SIZE,
                ));
            }
        }
    }

    if let Some(ref metadata) = pattern.metadata {
        if metadata.len() > MAX_METADATA_ENTRIES {
            return Err(ValidationError::too_many_items(
                "metadata",
                metadata.len(),
                MAX_METADATA_ENTRIES,
            ));
        }
        for (key, value) in metadata {
            if key.is_empty() {
                return Err(ValidationError::invalid_field(
                    "metadata",
                    "keys must be non-empty",
                ));
            }
            if key.len() > MAX_METADATA_KEY_LENGTH {
                return Err(ValidationError::invalid_field(
                    "metadata",
                    format!(
                        "key exceeds max length of {} bytes (got {})",
                        MAX_METADATA_KEY_LENGTH,
                        key.len()
                    ),
                ));
            }
            if value.len() > MAX_METADATA_VALUE_SIZE {
                return Err(ValidationError::invalid_field(
                    "metadata",
                    format!(
                        "value for '{}' exceeds max size of {} bytes (got {})",
                        key,
                        MAX_METADATA_VALUE_SIZE,
                        value.len()
                    ),
                ));
            }
        }
    }

    Ok(())
}
