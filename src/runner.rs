//! External parser/printer boundary
//!
//! The language-specific parser and printer live outside this crate. A
//! [`SourceBackend`] turns source text into a nested tree document and
//! back; [`ProcessBackend`] does so by running an external program with
//! the payload on stdin and the result on stdout.

use log::debug;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::ast::{Ast, ReconstructOptions};
use crate::config::AstConfig;
use crate::project;
use crate::utils::{Error, Result};

/// Converts between source text and nested tree documents
pub trait SourceBackend {
    /// Parse source text. Syntax problems are [`Error::Parse`].
    fn parse(&self, code: &str) -> Result<Value>;

    /// Print a nested tree document back to source text
    fn print(&self, document: &Value) -> Result<String>;
}

// ==================== Process Backend ====================

/// Backend that runs one external program per request
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessBackend {
    program: PathBuf,
    parse_args: Vec<String>,
    print_args: Vec<String>,
}

impl ProcessBackend {
    /// Runs `<program> parse` and `<program> print` by default
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            parse_args: vec!["parse".to_string()],
            print_args: vec!["print".to_string()],
        }
    }

    pub fn with_parse_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parse_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_print_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.print_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the program once. Returns stdout on a zero exit. A parse error
    /// payload on stdout wins over the exit status.
    fn run(&self, args: &[String], input: &[u8]) -> Result<Vec<u8>> {
        let program = self.program.display().to_string();
        debug!("running {} {}", program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| process_failure(&program, "start", e))?;

        let mut stdin = child.stdin.take().ok_or_else(|| Error::Runner {
            message: format!("no stdin pipe for {}", program),
            stderr: String::new(),
            exit_code: -1,
        })?;
        let payload = input.to_vec();
        let writer = thread::spawn(move || stdin.write_all(&payload));

        let output = child
            .wait_with_output()
            .map_err(|e| process_failure(&program, "wait for", e))?;
        match writer.join() {
            Ok(Err(e)) => debug!("stdin of {} closed early: {}", program, e),
            Err(_) => debug!("stdin writer for {} panicked", program),
            Ok(Ok(())) => {}
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("{} exited with {}", program, output.status);

        if let Ok(payload) = serde_json::from_slice::<Value>(&output.stdout) {
            if let Some(err) = parse_error(&payload) {
                return Err(err);
            }
        }
        if !output.status.success() {
            return Err(Error::Runner {
                message: format!("{} exited with {}", program, output.status),
                stderr,
                exit_code: output.status.code().unwrap_or(-1),
            });
        }
        Ok(output.stdout)
    }
}

impl SourceBackend for ProcessBackend {
    fn parse(&self, code: &str) -> Result<Value> {
        let stdout = self.run(&self.parse_args, code.as_bytes())?;
        serde_json::from_slice(&stdout).map_err(|e| Error::Runner {
            message: format!("undecodable parser output: {}", e),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    fn print(&self, document: &Value) -> Result<String> {
        let input = serde_json::to_vec(document)?;
        let stdout = self.run(&self.print_args, &input)?;
        String::from_utf8(stdout).map_err(|e| Error::Runner {
            message: format!("printer output is not UTF-8: {}", e),
            stderr: String::new(),
            exit_code: 0,
        })
    }
}

/// The process never produced an exit status
fn process_failure(program: &str, action: &str, err: std::io::Error) -> Error {
    Error::Runner {
        message: format!("failed to {} {}: {}", action, program, err),
        stderr: String::new(),
        exit_code: -1,
    }
}

/// `{"errors": [{"message", "line"}, ...]}` or `{"error": "..."}` payloads.
/// Only the first reported error is surfaced; its line is kept as given.
fn parse_error(payload: &Value) -> Option<Error> {
    let obj = payload.as_object()?;
    if let Some(errors) = obj.get("errors").and_then(Value::as_array) {
        let first = errors.first()?;
        let message = first
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown parse error")
            .to_string();
        let line = first.get("line").and_then(Value::as_i64);
        return Some(Error::Parse { message, line });
    }
    obj.get("error").and_then(Value::as_str).map(|message| Error::Parse {
        message: message.to_string(),
        line: None,
    })
}

// ==================== Facade ====================

/// Parse a code string into a standalone graph (ids `node_<n>`)
pub fn parse_code<B>(backend: &B, code: &str, config: AstConfig) -> Result<(Ast, Vec<String>)>
where
    B: SourceBackend + ?Sized,
{
    let document = backend.parse(code)?;
    Ast::ingest_with_config(&document, config)
}

/// Parse one file under a project root and a file container
pub fn parse_file<B>(backend: &B, path: &Path, config: AstConfig) -> Result<Ast>
where
    B: SourceBackend + ?Sized,
{
    let code = fs::read_to_string(path)?;
    let document = backend.parse(&code)?;
    project::wrap_single(&document, path, config)
}

/// Parse several files into one project. Stops at the first failure.
pub fn parse_project<B>(
    backend: &B,
    paths: &[PathBuf],
    project_path: Option<&Path>,
    config: AstConfig,
) -> Result<Ast>
where
    B: SourceBackend + ?Sized,
{
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let code = fs::read_to_string(path)?;
        let document = backend.parse(&code).map_err(|e| {
            debug!("parsing {} failed: {}", path.display(), e);
            e
        })?;
        documents.push((path.clone(), document));
    }
    project::wrap_many(&documents, project_path, config)
}

/// Rebuild the given roots and hand them to the printer
pub fn print<B, S>(backend: &B, ast: &Ast, roots: &[S]) -> Result<String>
where
    B: SourceBackend + ?Sized,
    S: AsRef<str>,
{
    let options = ReconstructOptions::excluding_synthetic(ast.config());
    let document = ast.reconstruct(roots, &options)?;
    backend.print(&document)
}

/// Print one file container's statements
pub fn print_file<B>(backend: &B, ast: &Ast, file_id: &str) -> Result<String>
where
    B: SourceBackend + ?Sized,
{
    let document = ast.file_document(file_id)?;
    backend.print(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    /// Recognizes `echo '<text>';` lines and nothing else
    struct FakeBackend;

    impl SourceBackend for FakeBackend {
        fn parse(&self, code: &str) -> Result<Value> {
            let mut stmts = Vec::new();
            for (n, line) in code.lines().enumerate() {
                let line_no = n as i64 + 1;
                let text = line
                    .strip_prefix("echo '")
                    .and_then(|rest| rest.strip_suffix("';"))
                    .ok_or_else(|| Error::Parse {
                        message: format!("Syntax error, unexpected '{}'", line),
                        line: Some(line_no),
                    })?;
                stmts.push(json!({
                    "nodeType": "Stmt_Echo",
                    "attributes": {"startLine": line_no, "endLine": line_no},
                    "exprs": [{"nodeType": "Scalar_String", "value": text}]
                }));
            }
            Ok(Value::Array(stmts))
        }

        fn print(&self, document: &Value) -> Result<String> {
            let stmts = document
                .as_array()
                .ok_or_else(|| Error::structure("expected a statement list"))?;
            let mut out = String::new();
            for stmt in stmts {
                let text = stmt["exprs"][0]["value"].as_str().unwrap_or_default();
                out.push_str(&format!("echo '{}';\n", text));
            }
            Ok(out)
        }
    }

    #[test]
    fn test_parse_error_line_is_kept() {
        let err = parse_code(&FakeBackend, "echo 'a';\n$$$", AstConfig::default()).unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_parse_then_print() {
        let code = "echo 'a';\necho 'b';\n";
        let (ast, roots) = parse_code(&FakeBackend, code, AstConfig::default()).unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(ast.node(&roots[1]).unwrap().start_line(), Some(2));
        assert_eq!(print(&FakeBackend, &ast, &roots).unwrap(), code);
    }

    #[test]
    fn test_parse_file_and_print_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.php");
        fs::write(&path, "echo 'hi';\n").unwrap();

        let ast = parse_file(&FakeBackend, &path, AstConfig::default()).unwrap();
        let files = ast.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].get("path"), Some(&json!("hello.php")));
        assert_eq!(print_file(&FakeBackend, &ast, files[0].id()).unwrap(), "echo 'hi';\n");

        let missing = parse_file(&FakeBackend, &dir.path().join("nope.php"), AstConfig::default());
        assert!(matches!(missing, Err(Error::Io(_))));
    }

    #[test]
    fn test_error_payloads() {
        let payload = json!({"errors": [{"message": "Syntax error", "line": 7}, {"message": "later"}]});
        assert_eq!(
            parse_error(&payload),
            Some(Error::Parse {
                message: "Syntax error".to_string(),
                line: Some(7)
            })
        );
        assert!(matches!(parse_error(&json!({"error": "boom"})), Some(Error::Parse { line: None, .. })));
        assert_eq!(parse_error(&json!([{"nodeType": "Stmt_Nop"}])), None);
    }

    #[test]
    fn test_process_failures_are_runner_errors() {
        let err = process_failure(
            "php",
            "wait for",
            std::io::Error::new(std::io::ErrorKind::Interrupted, "interrupted"),
        );
        assert_eq!(
            err,
            Error::Runner {
                message: "failed to wait for php: interrupted".to_string(),
                stderr: String::new(),
                exit_code: -1,
            }
        );
        assert!(err.is_boundary());
    }

    #[test]
    fn test_missing_program_is_runner_error() {
        let backend = ProcessBackend::new("/nonexistent/astg-parser");
        let err = backend.parse("<?php").unwrap_err();
        assert!(matches!(err, Error::Runner { exit_code: -1, .. }));
        assert!(err.is_boundary());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_backend_through_sh() {
        let echo = ProcessBackend::new("sh")
            .with_parse_args(["-c", "cat >/dev/null; printf '[{\"nodeType\":\"Stmt_Nop\"}]'"])
            .with_print_args(["-c", "cat >/dev/null; printf 'ok'"]);
        let doc = echo.parse("anything").unwrap();
        assert_eq!(doc, json!([{"nodeType": "Stmt_Nop"}]));
        assert_eq!(echo.print(&doc).unwrap(), "ok");

        let failing = ProcessBackend::new("sh")
            .with_parse_args(["-c", "cat >/dev/null; echo broken >&2; exit 3"]);
        match failing.parse("x").unwrap_err() {
            Error::Runner { stderr, exit_code, .. } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let syntax = ProcessBackend::new("sh").with_parse_args([
            "-c",
            "cat >/dev/null; printf '{\"errors\":[{\"message\":\"Syntax error\",\"line\":4}]}'; exit 1",
        ]);
        assert_eq!(syntax.parse("x").unwrap_err().line(), Some(4));
    }
}
