use crate::rules::danger::{PatternMatch, PatternVisitor, RuleTable};
use crate::rules::routes::{EntryPoint, RouteCatalog, RouteVisitor};
use crate::utils::{is_package_init, module_id_from_path, LineIndex};
use rustpython_ast::{Mod, Stmt};
use rustpython_parser::{parse, Mode};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One declared import, with the syntactic hints the graph builder needs to
/// resolve it: leading-dot count for relative imports and the `as` alias.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImportRecord {
    /// Dotted target as written, without leading dots.
    pub target: String,
    /// Number of leading dots; 0 for absolute imports.
    pub level: usize,
    pub alias: Option<String>,
    pub line: usize,
}

/// Structural facts extracted from one successfully parsed file. Immutable
/// after scanning; everything downstream works from these records.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    /// Dotted identifier derived from the project-relative path.
    pub module: String,
    pub path: PathBuf,
    /// Whether this file is a package initializer (its own package position).
    pub is_package: bool,
    pub line_count: usize,
    pub imports: Vec<ImportRecord>,
    pub matches: Vec<PatternMatch>,
    pub routes: Vec<EntryPoint>,
}

/// A file the scanner could not turn into a record. Non-fatal; the file is
/// simply absent from every downstream stage.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Parses one file and extracts its imports, pattern matches, and entry
/// points. `path` must be project-relative; it names the module.
pub fn scan_file(
    path: &Path,
    source: &str,
    rules: &RuleTable,
    catalog: &RouteCatalog,
) -> Result<FileRecord, ScanFailure> {
    let module = module_id_from_path(path);
    let line_index = LineIndex::new(source);

    let parsed = parse(source, Mode::Module, &path.to_string_lossy()).map_err(|e| ScanFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let Mod::Module(module_node) = parsed else {
        return Err(ScanFailure {
            path: path.to_path_buf(),
            reason: "source did not parse as a module".to_string(),
        });
    };

    let mut imports = ImportVisitor::new(&line_index);
    let mut patterns = PatternVisitor::new(rules, &line_index);
    let mut router = RouteVisitor::new(module.clone(), catalog, &line_index);
    for stmt in &module_node.body {
        imports.visit_stmt(stmt);
        patterns.visit_stmt(stmt);
        router.visit_stmt(stmt);
    }

    Ok(FileRecord {
        module,
        path: path.to_path_buf(),
        is_package: is_package_init(path),
        line_count: source.lines().count(),
        imports: imports.imports,
        matches: patterns.matches,
        routes: router.routes,
    })
}

/// Visitor collecting import statements, including those nested inside
/// function bodies and control flow.
struct ImportVisitor<'a> {
    imports: Vec<ImportRecord>,
    line_index: &'a LineIndex,
}

impl<'a> ImportVisitor<'a> {
    fn new(line_index: &'a LineIndex) -> Self {
        Self {
            imports: Vec::new(),
            line_index,
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import(node) => {
                let line = self.line_index.line_index(node.range.start());
                for alias in &node.names {
                    self.imports.push(ImportRecord {
                        target: alias.name.to_string(),
                        level: 0,
                        alias: alias.asname.as_ref().map(|a| a.to_string()),
                        line,
                    });
                }
            }
            Stmt::ImportFrom(node) => {
                // `from __future__ import ...` is a compiler directive.
                if let Some(module) = &node.module {
                    if module == "__future__" {
                        return;
                    }
                }

                let line = self.line_index.line_index(node.range.start());
                let level = node.level.as_ref().map_or(0, |l| l.to_u32() as usize);
                match &node.module {
                    Some(module) => {
                        self.imports.push(ImportRecord {
                            target: module.to_string(),
                            level,
                            alias: None,
                            line,
                        });
                    }
                    // `from . import a, b` names the submodules directly.
                    None => {
                        for alias in &node.names {
                            self.imports.push(ImportRecord {
                                target: alias.name.to_string(),
                                level,
                                alias: alias.asname.as_ref().map(|a| a.to_string()),
                                line,
                            });
                        }
                    }
                }
            }
            Stmt::FunctionDef(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::AsyncFunctionDef(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::ClassDef(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::If(node) => {
                for stmt in node.body.iter().chain(&node.orelse) {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::For(node) => {
                for stmt in node.body.iter().chain(&node.orelse) {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::While(node) => {
                for stmt in node.body.iter().chain(&node.orelse) {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::With(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Try(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
                for handler in &node.handlers {
                    if let rustpython_ast::ExceptHandler::ExceptHandler(handler_node) = handler {
                        for stmt in &handler_node.body {
                            self.visit_stmt(stmt);
                        }
                    }
                }
                for stmt in node.orelse.iter().chain(&node.finalbody) {
                    self.visit_stmt(stmt);
                }
            }
            _ => {}
        }
    }
}
