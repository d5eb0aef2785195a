//! Project/File organizer
//!
//! Wraps ingested documents under one synthetic project root and one
//! synthetic container per file. A file container's id is a fixed-width
//! hex digest of its path; nodes ingested for that file are named
//! `<fileId>_<n>`, which lets `containing_file` answer from the id alone.
//!
//! Short digests can collide. A collision between two distinct paths is
//! reported as [`Error::Collision`]; widen `file_id_width` to avoid it.

use log::debug;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::ast::converter::TreeConverter;
use crate::ast::{Ast, Node, PropertyMap, ReconstructOptions};
use crate::config::{AstConfig, SYNTHETIC_LINE};
use crate::utils::{Error, Result};

const FILE_PATH: &str = "filePath";
const PATH: &str = "path";
const LABEL: &str = "label";

/// Container id for `path`: the first `width` hex chars of its SHA-256
pub fn file_id(path: &Path, width: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(width);
    digest
}

/// Ingest one document under a project root and a single file container
pub fn wrap_single(document: &Value, path: &Path, config: AstConfig) -> Result<Ast> {
    wrap_many(&[(path.to_path_buf(), document.clone())], None, config)
}

/// Ingest several documents, one file container each, under one root.
/// Without `project_path` the root's path is the files' common directory.
pub fn wrap_many(documents: &[(PathBuf, Value)], project_path: Option<&Path>, config: AstConfig) -> Result<Ast> {
    config.validate()?;
    let project_path = match project_path {
        Some(p) => p.to_path_buf(),
        None => common_directory(documents.iter().map(|(p, _)| p.as_path())),
    };

    let mut ast = Ast::with_config(config);
    ast.create_project_root(&project_path)?;
    for (path, document) in documents {
        ast.add_file(path, document)?;
    }
    Ok(ast)
}

/// Longest shared directory of `paths`; a single file yields its parent
fn common_directory<'a>(paths: impl Iterator<Item = &'a Path>) -> PathBuf {
    let mut common: Option<PathBuf> = None;
    for path in paths {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        common = Some(match common {
            None => dir.to_path_buf(),
            Some(prev) => prev
                .components()
                .zip(dir.components())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common.unwrap_or_default()
}

impl Ast {
    fn create_project_root(&mut self, project_path: &Path) -> Result<()> {
        let config = self.config().clone();
        let mut props = PropertyMap::new();
        props.insert(LABEL.to_string(), Value::from("Project"));
        props.insert(PATH.to_string(), Value::from(project_path.to_string_lossy().into_owned()));
        props.insert("startLine".to_string(), Value::from(SYNTHETIC_LINE));
        props.insert("endLine".to_string(), Value::from(SYNTHETIC_LINE));
        self.modifier()
            .add_node(&config.root_id, &config.root_node_type, props)?;
        Ok(())
    }

    /// The synthetic project root
    pub fn project_root(&self) -> Result<Node<'_>> {
        self.node(&self.config().root_id)
    }

    /// Ingest `document` as a new file of this project and return the
    /// file container's id. Creates the project root if there is none.
    pub fn add_file(&mut self, path: &Path, document: &Value) -> Result<String> {
        let config = self.config().clone();
        if !self.contains_node(&config.root_id) {
            let parent = path.parent().unwrap_or_else(|| Path::new(""));
            self.create_project_root(parent)?;
        }

        let id = file_id(path, config.file_id_width);
        let path_str = path.to_string_lossy().into_owned();
        if let Ok(existing) = self.node(&id) {
            let existing_path = existing.get(FILE_PATH).and_then(Value::as_str);
            if existing.is_type(&config.file_node_type) && existing_path == Some(path_str.as_str()) {
                return Err(Error::DuplicateId(id));
            }
            return Err(Error::Collision {
                id,
                first: existing_path.unwrap_or(existing.id()).to_string(),
                second: path_str,
            });
        }

        let mut scratch = Ast::with_config(config.clone());
        let roots = TreeConverter::new(&mut scratch, Some(id.clone())).convert(document)?;
        self.absorb(scratch)?;

        let project_path = self
            .project_root()?
            .get(PATH)
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_default();
        let relative = match path.strip_prefix(&project_path) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().into_owned(),
            _ => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path_str.clone()),
        };

        let mut props = PropertyMap::new();
        props.insert(LABEL.to_string(), Value::from("File"));
        props.insert(FILE_PATH.to_string(), Value::from(path_str.clone()));
        props.insert(PATH.to_string(), Value::from(relative));
        props.insert("startLine".to_string(), Value::from(SYNTHETIC_LINE));
        props.insert("endLine".to_string(), Value::from(SYNTHETIC_LINE));

        let file_count = self.field_edges(&config.root_id, &config.files_field)?.len();
        let mut modifier = self.modifier();
        modifier.add_node(&id, &config.file_node_type, props)?;
        modifier.add_edge(
            &config.root_id,
            &id,
            &config.containment_kind,
            &config.files_field,
            Some(file_count),
        )?;
        for (index, root) in roots.iter().enumerate() {
            modifier.add_edge(
                &id,
                root,
                &config.containment_kind,
                &config.statement_field,
                Some(index),
            )?;
        }
        if roots.is_empty() {
            modifier.set_property(id.as_str(), &config.statement_field, Value::Array(Vec::new()))?;
        }

        debug!("added file {} as {} with {} statement(s)", path_str, id, roots.len());
        Ok(id)
    }

    /// File containers, sorted by path
    pub fn files(&self) -> Vec<Node<'_>> {
        let mut files: Vec<Node<'_>> = self.nodes_of_type(&self.config().file_node_type).collect();
        files.sort_by(|a, b| {
            let pa = a.get(FILE_PATH).and_then(Value::as_str);
            let pb = b.get(FILE_PATH).and_then(Value::as_str);
            pa.cmp(&pb).then_with(|| a.id().cmp(b.id()))
        });
        files
    }

    /// The file container holding `id`. Uses the `<fileId>_<n>` id
    /// convention when it applies, the nearest file ancestor otherwise.
    pub fn containing_file(&self, id: &str) -> Result<Node<'_>> {
        let node = self.node(id)?;
        let config = self.config();
        if node.is_type(&config.root_node_type) || node.is_type(&config.file_node_type) {
            return Err(Error::NotInContainer(id.to_string()));
        }
        if let Some(file) = self.file_by_prefix(id) {
            return Ok(file);
        }
        self.nearest_file_ancestor(id)
    }

    fn file_by_prefix(&self, id: &str) -> Option<Node<'_>> {
        let (prefix, counter) = id.rsplit_once('_')?;
        counter.parse::<usize>().ok()?;
        let file = self.node(prefix).ok()?;
        if file.is_type(&self.config().file_node_type) {
            Some(file)
        } else {
            None
        }
    }

    pub(crate) fn nearest_file_ancestor(&self, id: &str) -> Result<Node<'_>> {
        let file_type = self.config().file_node_type.as_str();
        self.ancestors(id)?
            .find(|n| n.is_type(file_type))
            .ok_or_else(|| Error::NotInContainer(id.to_string()))
    }

    /// One file's statement list, ready for the external printer
    pub fn file_document(&self, file_id: &str) -> Result<Value> {
        let file = self.node(file_id)?;
        if !file.is_type(&self.config().file_node_type) {
            return Err(Error::structure(format!("{} is not a file container", file_id)));
        }
        let options = ReconstructOptions::excluding_synthetic(self.config());
        self.reconstruct(&[file_id], &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn nested_doc() -> Value {
        json!([
            {
                "nodeType": "Stmt_Function",
                "name": {"nodeType": "Identifier", "name": "run"},
                "stmts": [
                    {
                        "nodeType": "Stmt_If",
                        "cond": {"nodeType": "Expr_Variable", "name": "ok"},
                        "stmts": [{"nodeType": "Stmt_Echo", "exprs": [{"nodeType": "Scalar_String", "value": "yes"}]}]
                    }
                ]
            }
        ])
    }

    #[test]
    fn test_wrap_single_shape() {
        let doc = json!([{"nodeType": "Stmt_Nop"}]);
        let path = Path::new("/app/index.php");
        let ast = wrap_single(&doc, path, AstConfig::default()).unwrap();
        let fid = file_id(path, 8);

        assert_eq!(ast.node_count(), 3);
        assert_eq!(ast.project_root().unwrap().node_type(), Some("Project"));
        assert!(ast.project_root().unwrap().is_synthetic());

        let files = ast.field_edges("project", "files").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].target(), fid);

        let stmts = ast.field_edges(&fid, "stmts").unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].index(), Some(0));
        assert_eq!(stmts[0].target(), format!("{}_1", fid));

        let file = ast.node(&fid).unwrap();
        assert_eq!(file.get("filePath"), Some(&json!("/app/index.php")));
        assert_eq!(file.get("path"), Some(&json!("index.php")));
        assert_eq!(ast.project_root().unwrap().get("path"), Some(&json!("/app")));
    }

    #[test]
    fn test_file_id_is_stable_and_fixed_width() {
        let a = file_id(Path::new("src/a.php"), 8);
        assert_eq!(a.len(), 8);
        assert_eq!(a, file_id(Path::new("src/a.php"), 8));
        assert_ne!(a, file_id(Path::new("src/b.php"), 8));
        assert_eq!(file_id(Path::new("src/a.php"), 16).len(), 16);
    }

    #[test]
    fn test_wrap_many_lists_files_by_path() {
        let docs = vec![
            (PathBuf::from("/src/lib/b.php"), json!([{"nodeType": "Stmt_Nop"}])),
            (PathBuf::from("/src/app/a.php"), json!([{"nodeType": "Stmt_Echo"}])),
        ];
        let ast = wrap_many(&docs, None, AstConfig::default()).unwrap();
        let paths: Vec<_> = ast
            .files()
            .iter()
            .map(|f| f.get("path").and_then(Value::as_str).unwrap().to_string())
            .collect();
        assert_eq!(paths, vec!["app/a.php", "lib/b.php"]);
        assert_eq!(ast.project_root().unwrap().get("path"), Some(&json!("/src")));

        let indices: Vec<_> = ast
            .field_edges("project", "files")
            .unwrap()
            .iter()
            .map(|e| e.index())
            .collect();
        assert_eq!(indices, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_same_path_twice_is_duplicate() {
        let doc = json!([{"nodeType": "Stmt_Nop"}]);
        let docs = vec![(PathBuf::from("a.php"), doc.clone()), (PathBuf::from("a.php"), doc)];
        let err = wrap_many(&docs, None, AstConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
    }

    #[test]
    fn test_hash_collision_is_reported() {
        let path = Path::new("a.php");
        let mut ast = wrap_single(&json!([]), path, AstConfig::default()).unwrap();
        let fid = file_id(path, 8);
        // Pretend another path already owns this digest
        ast.modifier().set_property(fid.as_str(), "filePath", json!("other.php")).unwrap();
        let before = ast.node_count();
        let err = ast.add_file(path, &json!([{"nodeType": "Stmt_Nop"}])).unwrap_err();
        assert!(matches!(err, Error::Collision { .. }));
        assert_eq!(ast.node_count(), before);
    }

    #[test]
    fn test_containing_file_via_prefix_and_ancestors() {
        let path = Path::new("/p/deep.php");
        let mut ast = wrap_single(&nested_doc(), path, AstConfig::default()).unwrap();
        let fid = file_id(path, 8);

        let echo = ast.first_node(|n| n.is_type("Stmt_Echo")).unwrap().id().to_string();
        assert_eq!(ast.ancestors(&echo).unwrap().count(), 4);
        let by_prefix = ast.containing_file(&echo).unwrap();
        let by_walk = ast.nearest_file_ancestor(&echo).unwrap();
        assert_eq!(by_prefix.id(), fid);
        assert_eq!(by_prefix, by_walk);

        // Ids outside the naming scheme fall back to the ancestor walk
        ast.modifier().add_node("manual", "Expr_Variable", PropertyMap::new()).unwrap();
        ast.modifier().add_edge(&echo, "manual", "PARENT_OF", "extra", None).unwrap();
        assert_eq!(ast.containing_file("manual").unwrap().id(), fid);
    }

    #[test]
    fn test_containing_file_rejects_root_and_loose_nodes() {
        let mut ast = wrap_single(&nested_doc(), Path::new("x.php"), AstConfig::default()).unwrap();
        assert_eq!(
            ast.containing_file("project").unwrap_err(),
            Error::NotInContainer("project".to_string())
        );
        ast.modifier().add_node("loose", "Stmt_Nop", PropertyMap::new()).unwrap();
        assert!(matches!(ast.containing_file("loose"), Err(Error::NotInContainer(_))));
        assert!(matches!(ast.containing_file("missing"), Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn test_file_document_round_trip() {
        let doc = nested_doc();
        let path = Path::new("/p/deep.php");
        let ast = wrap_single(&doc, path, AstConfig::default()).unwrap();
        assert_eq!(ast.file_document(&file_id(path, 8)).unwrap(), doc);
        assert_eq!(ast.to_document().unwrap(), doc);
        assert!(matches!(ast.file_document("project"), Err(Error::Structure(_))));
    }

    #[test]
    fn test_empty_file_keeps_statement_marker() {
        let path = Path::new("empty.php");
        let ast = wrap_single(&json!([]), path, AstConfig::default()).unwrap();
        let file = ast.node(&file_id(path, 8)).unwrap();
        assert_eq!(file.get("stmts"), Some(&json!([])));
        assert_eq!(ast.file_document(file.id()).unwrap(), json!([]));
    }
}
