//! ast-graph
//!
//! Graph-shaped abstract syntax trees: ingest a nested tree document into
//! a property graph, query and edit it structurally, and rebuild the tree.

pub mod ast;
pub mod config;
pub mod project;
pub mod runner;
pub mod utils;

pub use ast::{
    Ast, DocumentShape, Edge, EdgeKey, Modifier, Node, NodeLayout, PropertyMap, PropertyTarget,
    ReconstructOptions,
};
pub use config::{AstConfig, CascadePolicy, NullPolicy};
pub use runner::{ProcessBackend, SourceBackend};
pub use utils::{Error, Result};
