//! Error handling for ast-graph

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Graph, mapping and boundary errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Document Shape ====================

    /// The nested document (or the graph being rebuilt into one) breaks
    /// the shape contract.
    #[error("Malformed document structure: {0}")]
    Structure(String),

    // ==================== External Boundary ====================

    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<i64> },

    #[error("Runner error: {message}")]
    Runner {
        message: String,
        stderr: String,
        exit_code: i32,
    },

    // ==================== Lookups ====================

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge not found: ({source_id}, {target_id}, {kind})")]
    EdgeNotFound {
        source_id: String,
        target_id: String,
        kind: String,
    },

    #[error("No node matches the predicate")]
    NoMatch,

    #[error("Node {0} is not inside a file container")]
    NotInContainer(String),

    // ==================== Mutation Invariants ====================

    #[error("Node already exists: {0}")]
    DuplicateId(String),

    #[error("Edge already exists: ({source_id}, {target_id}, {kind})")]
    DuplicateEdge {
        source_id: String,
        target_id: String,
        kind: String,
    },

    #[error("Removing node {node} would leave {edges} dangling edge(s)")]
    DanglingEdge { node: String, edges: usize },

    #[error("File id {id} is shared by {first} and {second}")]
    Collision {
        id: String,
        first: String,
        second: String,
    },

    #[error("Index {index} out of range for field '{field}' (len {len})")]
    IndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },

    // ==================== Environment ====================

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    pub(crate) fn structure(message: impl Into<String>) -> Self {
        Self::Structure(message.into())
    }

    pub(crate) fn edge_not_found(source_id: &str, target_id: &str, kind: &str) -> Self {
        Self::EdgeNotFound {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Line reported by the external parser, if this is a parse error
    pub fn line(&self) -> Option<i64> {
        match self {
            Self::Parse { line, .. } => *line,
            _ => None,
        }
    }

    /// Whether the failure came from the external process boundary
    /// rather than from the graph itself.
    pub fn is_boundary(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Runner { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Structure(format!("invalid JSON: {}", err))
    }
}
