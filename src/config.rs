//! Graph configuration
//!
//! Every constant the mapper, organizer and mutation API rely on lives
//! here, so a different parser's document dialect can be supported without
//! code changes. Config files are JSON; missing fields take defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::utils::{Error, Result};

/// What ingestion does with `null`-valued fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Null fields are not stored and do not reappear on reconstruction.
    #[default]
    Drop,
    /// Null fields are stored as null properties and reconstructed verbatim.
    Preserve,
}

/// What `remove_node` does with the removed node's children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Children lose their parent edge and become new roots.
    #[default]
    Orphan,
    /// Descendants reachable only through the removed node are removed too.
    ExclusiveDescendants,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AstConfig {
    /// Edge kind produced by ingestion
    pub containment_kind: String,

    /// Property names nested back under `attributes` on reconstruction
    pub attribute_keys: Vec<String>,

    /// Field linking a file container to its top-level statements
    pub statement_field: String,

    /// Field linking the project root to its file containers
    pub files_field: String,

    pub root_id: String,
    pub root_node_type: String,
    pub file_node_type: String,

    /// Hex characters of the path digest used as a file container id
    pub file_id_width: usize,

    pub null_policy: NullPolicy,
    pub cascade_policy: CascadePolicy,
}

/// Position value carried by synthetic nodes
pub const SYNTHETIC_LINE: i64 = -1;

impl Default for AstConfig {
    fn default() -> Self {
        Self {
            containment_kind: "PARENT_OF".to_string(),
            attribute_keys: [
                "startLine",
                "endLine",
                "startFilePos",
                "endFilePos",
                "startTokenPos",
                "endTokenPos",
                "kind",
                "comments",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            statement_field: "stmts".to_string(),
            files_field: "files".to_string(),
            root_id: "project".to_string(),
            root_node_type: "Project".to_string(),
            file_node_type: "File".to_string(),
            file_id_width: 8,
            null_policy: NullPolicy::Drop,
            cascade_policy: CascadePolicy::Orphan,
        }
    }
}

impl AstConfig {
    /// Load a JSON config file and validate it
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        let config: AstConfig = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let names = [
            ("containment_kind", &self.containment_kind),
            ("statement_field", &self.statement_field),
            ("files_field", &self.files_field),
            ("root_id", &self.root_id),
            ("root_node_type", &self.root_node_type),
            ("file_node_type", &self.file_node_type),
        ];
        for (name, value) in names {
            if value.is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }
        if !(4..=64).contains(&self.file_id_width) {
            return Err(Error::Config(format!(
                "file_id_width must be between 4 and 64, got {}",
                self.file_id_width
            )));
        }
        if self.root_id.contains('_') {
            // '_' separates a file id from its node counter
            return Err(Error::Config("root_id must not contain '_'".to_string()));
        }
        Ok(())
    }

    /// Node types introduced by the organizer rather than the parser
    pub fn synthetic_node_types(&self) -> Vec<String> {
        vec![self.root_node_type.clone(), self.file_node_type.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AstConfig =
            serde_json::from_str(r#"{"null_policy": "preserve", "file_id_width": 12}"#).unwrap();
        assert_eq!(config.null_policy, NullPolicy::Preserve);
        assert_eq!(config.file_id_width, 12);
        assert_eq!(config.containment_kind, "PARENT_OF");
        assert_eq!(config.cascade_policy, CascadePolicy::Orphan);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_width() {
        let config = AstConfig {
            file_id_width: 2,
            ..AstConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_kind() {
        let config = AstConfig {
            containment_kind: String::new(),
            ..AstConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_cascade_policy_names() {
        let policy: CascadePolicy = serde_json::from_str(r#""exclusive_descendants""#).unwrap();
        assert_eq!(policy, CascadePolicy::ExclusiveDescendants);
    }
}
