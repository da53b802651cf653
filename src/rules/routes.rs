use crate::rules::danger::call_name;
use crate::utils::LineIndex;
use lazy_static::lazy_static;
use rustpython_ast::{self as ast, Expr, Stmt};
use serde::Serialize;
use std::fmt;

/// Web framework a route declaration was recognized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Framework {
    Flask,
    FastApi,
    Django,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Framework::Flask => "flask",
            Framework::FastApi => "fastapi",
            Framework::Django => "django",
        };
        f.write_str(name)
    }
}

/// An externally triggerable code location: a route handler or a registered
/// class-based view. One module may host several.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntryPoint {
    pub module: String,
    /// Decorated function or registered view class.
    pub handler: String,
    /// Declared path pattern, when the decorator carries one.
    pub route: Option<String>,
    /// HTTP verbs, when declared or implied by the decorator name.
    pub methods: Vec<String>,
    pub framework: Framework,
    pub line: usize,
}

/// Route-registration idioms the scanner recognizes. Configuration data,
/// separate from the detection code so frameworks can be added without
/// touching the visitor.
#[derive(Debug, Clone)]
pub struct RouteCatalog {
    /// Flask-style registration decorators (`@app.route`, blueprint `.route`).
    pub route_decorators: Vec<String>,
    /// FastAPI-style verb decorators; the verb is the decorator name itself.
    pub verb_decorators: Vec<String>,
    /// Django REST Framework function decorators.
    pub drf_decorators: Vec<String>,
    /// Base-class names registering a class-based view.
    pub view_bases: Vec<String>,
}

lazy_static! {
    static ref DEFAULT_CATALOG: RouteCatalog = RouteCatalog {
        route_decorators: vec!["route".to_string()],
        verb_decorators: vec![
            "get".to_string(),
            "post".to_string(),
            "put".to_string(),
            "delete".to_string(),
            "patch".to_string(),
        ],
        drf_decorators: vec!["api_view".to_string(), "action".to_string()],
        view_bases: vec![
            "View".to_string(),
            "APIView".to_string(),
            "ViewSet".to_string(),
            "ModelViewSet".to_string(),
            "GenericViewSet".to_string(),
        ],
    };
}

impl Default for RouteCatalog {
    fn default() -> Self {
        DEFAULT_CATALOG.clone()
    }
}

impl RouteCatalog {
    /// Classifies the final decorator-name segment, lowercased.
    pub fn classify(&self, segment: &str) -> Option<Framework> {
        if self.route_decorators.iter().any(|d| d == segment) {
            return Some(Framework::Flask);
        }
        if self.verb_decorators.iter().any(|d| d == segment) {
            return Some(Framework::FastApi);
        }
        if self.drf_decorators.iter().any(|d| d == segment) {
            return Some(Framework::Django);
        }
        None
    }

    pub fn is_view_base(&self, name: &str) -> bool {
        self.view_bases.iter().any(|b| b == name)
    }
}

/// Visitor that collects entry-point declarations from one file.
pub struct RouteVisitor<'a> {
    pub routes: Vec<EntryPoint>,
    module: String,
    catalog: &'a RouteCatalog,
    line_index: &'a LineIndex,
}

impl<'a> RouteVisitor<'a> {
    pub fn new(module: String, catalog: &'a RouteCatalog, line_index: &'a LineIndex) -> Self {
        Self {
            routes: Vec::new(),
            module,
            catalog,
            line_index,
        }
    }

    pub fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef(node) => {
                let line = self.line_index.line_index(node.range.start());
                self.check_decorators(node.name.as_str(), &node.decorator_list, line);
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::AsyncFunctionDef(node) => {
                let line = self.line_index.line_index(node.range.start());
                self.check_decorators(node.name.as_str(), &node.decorator_list, line);
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::ClassDef(node) => {
                let line = self.line_index.line_index(node.range.start());
                self.check_view_bases(node.name.as_str(), &node.bases, line);
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            _ => {}
        }
    }

    fn check_decorators(&mut self, handler: &str, decorators: &[Expr], line: usize) {
        for decorator in decorators {
            let Some(name) = decorator_name(decorator) else {
                continue;
            };
            let segment = name.rsplit('.').next().unwrap_or(&name).to_lowercase();
            let Some(framework) = self.catalog.classify(&segment) else {
                continue;
            };

            let (route, mut methods) = route_arguments(decorator);
            if framework == Framework::FastApi && methods.is_empty() {
                methods.push(segment.to_uppercase());
            }

            self.routes.push(EntryPoint {
                module: self.module.clone(),
                handler: handler.to_string(),
                route,
                methods,
                framework,
                line,
            });
        }
    }

    /// Class-based views register through inheritance rather than a
    /// decorator, so the route path is not statically visible here.
    fn check_view_bases(&mut self, class_name: &str, bases: &[Expr], line: usize) {
        for base in bases {
            let base_name = match base {
                Expr::Name(node) => node.id.to_string(),
                Expr::Attribute(node) => node.attr.to_string(),
                _ => continue,
            };
            if self.catalog.is_view_base(&base_name) {
                self.routes.push(EntryPoint {
                    module: self.module.clone(),
                    handler: class_name.to_string(),
                    route: None,
                    methods: Vec::new(),
                    framework: Framework::Django,
                    line,
                });
                return;
            }
        }
    }
}

/// Name of a decorator, looking through a call wrapper such as
/// `@app.route("/x")`.
fn decorator_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Call(node) => decorator_name(&node.func),
        other => call_name(other),
    }
}

/// Pulls the declared path and HTTP methods out of a decorator call.
/// The path is the first string argument starting with `/`; methods come
/// from a `methods=[...]` keyword or a positional list (`@api_view(['GET'])`).
fn route_arguments(decorator: &Expr) -> (Option<String>, Vec<String>) {
    let mut route = None;
    let mut methods = Vec::new();

    let Expr::Call(call) = decorator else {
        return (route, methods);
    };

    for arg in &call.args {
        match arg {
            Expr::Constant(node) => {
                if let ast::Constant::Str(s) = &node.value {
                    if route.is_none() && s.starts_with('/') {
                        route = Some(s.to_string());
                    }
                }
            }
            Expr::List(node) => methods.extend(string_elements(&node.elts)),
            _ => {}
        }
    }

    for keyword in &call.keywords {
        if keyword.arg.as_ref().map_or(false, |arg| arg == "methods") {
            if let Expr::List(node) = &keyword.value {
                methods.extend(string_elements(&node.elts));
            }
        }
    }

    (route, methods)
}

fn string_elements(elts: &[Expr]) -> Vec<String> {
    elts.iter()
        .filter_map(|elt| match elt {
            Expr::Constant(node) => match &node.value {
                ast::Constant::Str(s) => Some(s.to_uppercase()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}
