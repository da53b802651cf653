use crate::utils::LineIndex;
use lazy_static::lazy_static;
use rustpython_ast::{self as ast, Expr, Stmt};
use serde::Serialize;
use std::fmt;

/// Severity of a detected pattern. Variants are declared in rank order so
/// `Ord` makes `Critical` compare greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifier, severity and message shared by every rule entry.
#[derive(Debug, Clone)]
pub struct RuleMeta {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
}

fn meta(rule_id: &str, severity: Severity, message: &str) -> RuleMeta {
    RuleMeta {
        rule_id: rule_id.to_string(),
        severity,
        message: message.to_string(),
    }
}

/// The pattern rule table. A plain data table: callee or module names mapped
/// to rule metadata, plus the few rules that need call-site context (keyword
/// arguments, argument shape) to decide.
#[derive(Debug, Clone)]
pub struct RuleTable {
    /// Exact dotted callee names that are findings on sight.
    pub calls: Vec<(String, RuleMeta)>,
    /// Modules whose import alone is a finding.
    pub dangerous_imports: Vec<(String, RuleMeta)>,
    /// Process-spawn wrappers that are findings only with `shell=True`.
    pub shell_spawn: Vec<String>,
    pub shell_spawn_meta: RuleMeta,
    /// DB-API methods that are findings when handed a templated string.
    pub templated_sql: Vec<String>,
    pub templated_sql_meta: RuleMeta,
    /// `yaml.load` without a safe loader.
    pub unsafe_yaml_meta: RuleMeta,
}

lazy_static! {
    static ref DEFAULT_RULES: RuleTable = RuleTable {
        calls: vec![
            (
                "eval".to_string(),
                meta("RG-D201", Severity::Critical, "eval() executes arbitrary code"),
            ),
            (
                "exec".to_string(),
                meta("RG-D202", Severity::Critical, "exec() executes arbitrary code"),
            ),
            (
                "os.system".to_string(),
                meta("RG-D203", Severity::Critical, "os.system() hands its argument to the OS shell"),
            ),
            (
                "os.popen".to_string(),
                meta("RG-D204", Severity::Critical, "os.popen() hands its argument to the OS shell"),
            ),
            (
                "pickle.load".to_string(),
                meta("RG-D205", Severity::Critical, "unpickling untrusted data executes arbitrary code"),
            ),
            (
                "pickle.loads".to_string(),
                meta("RG-D205", Severity::Critical, "unpickling untrusted data executes arbitrary code"),
            ),
            (
                "marshal.load".to_string(),
                meta("RG-D205", Severity::Critical, "marshal deserialization of untrusted data"),
            ),
            (
                "marshal.loads".to_string(),
                meta("RG-D205", Severity::Critical, "marshal deserialization of untrusted data"),
            ),
            (
                "compile".to_string(),
                meta("RG-D207", Severity::High, "compile() builds executable code from strings"),
            ),
            (
                "__import__".to_string(),
                meta("RG-D208", Severity::High, "dynamic import bypasses static resolution"),
            ),
            (
                "importlib.import_module".to_string(),
                meta("RG-D208", Severity::High, "dynamic import bypasses static resolution"),
            ),
            (
                "input".to_string(),
                meta("RG-D212", Severity::Medium, "interactive input captured without validation"),
            ),
        ],
        dangerous_imports: vec![
            (
                "pickle".to_string(),
                meta("RG-D210", Severity::High, "pickle enables unsafe deserialization"),
            ),
            (
                "marshal".to_string(),
                meta("RG-D210", Severity::High, "marshal enables unsafe deserialization"),
            ),
            (
                "shelve".to_string(),
                meta("RG-D210", Severity::High, "shelve stores objects via pickle"),
            ),
        ],
        shell_spawn: vec![
            "subprocess.call".to_string(),
            "subprocess.run".to_string(),
            "subprocess.Popen".to_string(),
            "subprocess.check_call".to_string(),
            "subprocess.check_output".to_string(),
        ],
        shell_spawn_meta: meta("RG-D209", Severity::High, "subprocess invoked with shell=True"),
        templated_sql: vec![
            "execute".to_string(),
            "executemany".to_string(),
            "executescript".to_string(),
        ],
        templated_sql_meta: meta(
            "RG-D211",
            Severity::Critical,
            "SQL statement built with string formatting",
        ),
        unsafe_yaml_meta: meta("RG-D206", Severity::Critical, "yaml.load() without a safe loader"),
    };
}

impl Default for RuleTable {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

/// A single rule match inside one file. The scanner keeps these on the
/// module record; the security stage turns them into findings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatternMatch {
    pub rule_id: String,
    pub severity: Severity,
    pub line: usize,
    /// The callee or module name that matched.
    pub snippet: String,
    pub message: String,
}

/// Visitor that matches call sites and imports against the rule table.
pub struct PatternVisitor<'a> {
    pub matches: Vec<PatternMatch>,
    rules: &'a RuleTable,
    line_index: &'a LineIndex,
}

impl<'a> PatternVisitor<'a> {
    pub fn new(rules: &'a RuleTable, line_index: &'a LineIndex) -> Self {
        Self {
            matches: Vec::new(),
            rules,
            line_index,
        }
    }

    pub fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(node) => self.visit_expr(&node.value),
            Stmt::Assign(node) => self.visit_expr(&node.value),
            Stmt::Return(node) => {
                if let Some(value) = &node.value {
                    self.visit_expr(value);
                }
            }
            Stmt::Import(node) => {
                let line = self.line_index.line_index(node.range.start());
                for alias in &node.names {
                    self.check_import(alias.name.as_str(), line);
                }
            }
            Stmt::ImportFrom(node) => {
                if let Some(module) = &node.module {
                    let line = self.line_index.line_index(node.range.start());
                    self.check_import(module.as_str(), line);
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
                self.visit_expr(&node.test);
                for stmt in node.body.iter().chain(&node.orelse) {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::For(node) => {
                self.visit_expr(&node.iter);
                for stmt in node.body.iter().chain(&node.orelse) {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::AsyncFor(node) => {
                self.visit_expr(&node.iter);
                for stmt in node.body.iter().chain(&node.orelse) {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::While(node) => {
                self.visit_expr(&node.test);
                for stmt in node.body.iter().chain(&node.orelse) {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::With(node) => {
                for item in &node.items {
                    self.visit_expr(&item.context_expr);
                }
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::AsyncWith(node) => {
                for item in &node.items {
                    self.visit_expr(&item.context_expr);
                }
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Try(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
                for handler in &node.handlers {
                    if let ast::ExceptHandler::ExceptHandler(handler_node) = handler {
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

    pub fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call(node) => {
                self.check_call(node);
                self.visit_expr(&node.func);
                for arg in &node.args {
                    self.visit_expr(arg);
                }
                for keyword in &node.keywords {
                    self.visit_expr(&keyword.value);
                }
            }
            Expr::BoolOp(node) => {
                for value in &node.values {
                    self.visit_expr(value);
                }
            }
            Expr::BinOp(node) => {
                self.visit_expr(&node.left);
                self.visit_expr(&node.right);
            }
            Expr::UnaryOp(node) => self.visit_expr(&node.operand),
            Expr::Lambda(node) => self.visit_expr(&node.body),
            Expr::IfExp(node) => {
                self.visit_expr(&node.test);
                self.visit_expr(&node.body);
                self.visit_expr(&node.orelse);
            }
            Expr::Compare(node) => {
                self.visit_expr(&node.left);
                for comparator in &node.comparators {
                    self.visit_expr(comparator);
                }
            }
            Expr::Await(node) => self.visit_expr(&node.value),
            Expr::Subscript(node) => {
                self.visit_expr(&node.value);
                self.visit_expr(&node.slice);
            }
            Expr::FormattedValue(node) => self.visit_expr(&node.value),
            Expr::JoinedStr(node) => {
                for value in &node.values {
                    self.visit_expr(value);
                }
            }
            Expr::List(node) => {
                for elt in &node.elts {
                    self.visit_expr(elt);
                }
            }
            Expr::Set(node) => {
                for elt in &node.elts {
                    self.visit_expr(elt);
                }
            }
            Expr::Dict(node) => {
                for (key, value) in node.keys.iter().zip(&node.values) {
                    if let Some(k) = key {
                        self.visit_expr(k);
                    }
                    self.visit_expr(value);
                }
            }
            Expr::Tuple(node) => {
                for elt in &node.elts {
                    self.visit_expr(elt);
                }
            }
            _ => {}
        }
    }

    fn check_call(&mut self, call: &ast::ExprCall) {
        let rules = self.rules;
        let Some(name) = call_name(&call.func) else {
            return;
        };
        let line = self.line_index.line_index(call.range.start());

        // yaml.load is safe when a safe loader is supplied, so it cannot sit
        // in the plain callee table.
        if name == "yaml.load" {
            if !has_safe_loader(call) {
                self.push(&rules.unsafe_yaml_meta, line, &name);
            }
            return;
        }

        if let Some((_, rule)) = rules.calls.iter().find(|(callee, _)| *callee == name) {
            self.push(rule, line, &name);
            return;
        }

        let simple = name.rsplit('.').next().unwrap_or(&name);
        if rules.templated_sql.iter().any(|m| m == simple) && has_templated_argument(call) {
            self.push(&rules.templated_sql_meta, line, &name);
            return;
        }

        if rules.shell_spawn.iter().any(|m| *m == name) && has_shell_true(call) {
            self.push(&rules.shell_spawn_meta, line, &name);
        }
    }

    fn check_import(&mut self, module: &str, line: usize) {
        let rules = self.rules;
        if let Some((name, rule)) = rules.dangerous_imports.iter().find(|(m, _)| m == module) {
            let snippet = name.clone();
            self.push(rule, line, &snippet);
        }
    }

    fn push(&mut self, rule: &RuleMeta, line: usize, snippet: &str) {
        self.matches.push(PatternMatch {
            rule_id: rule.rule_id.clone(),
            severity: rule.severity,
            line,
            snippet: snippet.to_string(),
            message: rule.message.clone(),
        });
    }
}

/// Extracts the dotted callee name from a call target. A chain whose base is
/// not a plain name keeps only the attribute parts, so `cur.execute` and
/// `conn.cursor().execute` both end in `execute`.
pub fn call_name(func: &Expr) -> Option<String> {
    match func {
        Expr::Name(node) => Some(node.id.to_string()),
        Expr::Attribute(node) => {
            let mut parts = vec![node.attr.to_string()];
            let mut current = &*node.value;
            while let Expr::Attribute(inner) = current {
                parts.push(inner.attr.to_string());
                current = &*inner.value;
            }
            if let Expr::Name(name) = current {
                parts.push(name.id.to_string());
            }
            parts.reverse();
            Some(parts.join("."))
        }
        _ => None,
    }
}

fn has_shell_true(call: &ast::ExprCall) -> bool {
    for keyword in &call.keywords {
        if let Some(arg) = &keyword.arg {
            if arg == "shell" {
                if let Expr::Constant(c) = &keyword.value {
                    if let ast::Constant::Bool(true) = c.value {
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// An f-string, `%`-formatted string, or `.format()` call in argument
/// position marks the statement as templated.
fn has_templated_argument(call: &ast::ExprCall) -> bool {
    call.args.iter().any(is_templated_string)
}

fn is_templated_string(expr: &Expr) -> bool {
    match expr {
        Expr::JoinedStr(_) => true,
        Expr::BinOp(node) => matches!(node.op, ast::Operator::Mod),
        Expr::Call(node) => call_name(&node.func).map_or(false, |n| n.ends_with("format")),
        _ => false,
    }
}

fn has_safe_loader(call: &ast::ExprCall) -> bool {
    fn mentions_safe(expr: &Expr) -> bool {
        match expr {
            Expr::Name(node) => node.id.as_str().contains("Safe"),
            Expr::Attribute(node) => node.attr.as_str().contains("Safe"),
            _ => false,
        }
    }

    let keyword_loader = call.keywords.iter().any(|keyword| {
        keyword
            .arg
            .as_ref()
            .map_or(false, |arg| arg == "Loader")
            && mentions_safe(&keyword.value)
    });
    let positional_loader = call.args.iter().skip(1).any(mentions_safe);

    keyword_loader || positional_loader
}
