// Unit tests for entry-point (route) detection.

use riskgraph_rs::rules::routes::{Framework, RouteCatalog, RouteVisitor};
use riskgraph_rs::utils::LineIndex;
use rustpython_parser::{parse, Mode};

macro_rules! scan_routes {
    ($source:expr, $visitor:ident) => {
        let catalog = RouteCatalog::default();
        let tree = parse($source, Mode::Module, "test.py").expect("failed to parse");
        let line_index = LineIndex::new($source);
        let mut $visitor = RouteVisitor::new("app".to_string(), &catalog, &line_index);

        if let rustpython_ast::Mod::Module(module) = tree {
            for stmt in &module.body {
                $visitor.visit_stmt(stmt);
            }
        }
    };
}

#[test]
fn test_flask_route_with_path_and_methods() {
    let source = r#"
from flask import Flask
app = Flask(__name__)

@app.route("/todo", methods=["get", "post"])
def todo():
    return "ok"
"#;
    scan_routes!(source, visitor);
    assert_eq!(visitor.routes.len(), 1);
    let route = &visitor.routes[0];
    assert_eq!(route.framework, Framework::Flask);
    assert_eq!(route.handler, "todo");
    assert_eq!(route.route.as_deref(), Some("/todo"));
    assert_eq!(route.methods, vec!["GET", "POST"]);
    assert_eq!(route.module, "app");
}

#[test]
fn test_blueprint_route() {
    let source = r#"
@api.route("/items/<id>")
def get_item(id):
    return None
"#;
    scan_routes!(source, visitor);
    assert_eq!(visitor.routes.len(), 1);
    assert_eq!(visitor.routes[0].framework, Framework::Flask);
    assert_eq!(visitor.routes[0].route.as_deref(), Some("/items/<id>"));
}

#[test]
fn test_fastapi_verb_decorator_implies_method() {
    let source = r#"
@app.get("/items")
async def list_items():
    return []
"#;
    scan_routes!(source, visitor);
    assert_eq!(visitor.routes.len(), 1);
    let route = &visitor.routes[0];
    assert_eq!(route.framework, Framework::FastApi);
    assert_eq!(route.methods, vec!["GET"]);
    assert_eq!(route.route.as_deref(), Some("/items"));
}

#[test]
fn test_drf_api_view_with_positional_methods() {
    let source = r#"
@api_view(["POST"])
def create(request):
    pass
"#;
    scan_routes!(source, visitor);
    assert_eq!(visitor.routes.len(), 1);
    let route = &visitor.routes[0];
    assert_eq!(route.framework, Framework::Django);
    assert_eq!(route.methods, vec!["POST"]);
    assert_eq!(route.route, None);
}

#[test]
fn test_class_based_view_registration() {
    let source = r#"
class TodoView(APIView):
    def get(self, request):
        pass
"#;
    scan_routes!(source, visitor);
    // The class registration counts; its `get` method carries no decorator.
    let class_entry = visitor
        .routes
        .iter()
        .find(|r| r.handler == "TodoView")
        .expect("class-based view should register");
    assert_eq!(class_entry.framework, Framework::Django);
    assert_eq!(class_entry.route, None);
}

#[test]
fn test_attribute_base_class_view() {
    let source = r#"
class ItemViewSet(viewsets.ModelViewSet):
    queryset = None
"#;
    scan_routes!(source, visitor);
    assert!(visitor.routes.iter().any(|r| r.handler == "ItemViewSet"));
}

#[test]
fn test_unrelated_decorators_do_not_register() {
    let source = r#"
@staticmethod
def helper():
    pass

@property
def value(self):
    return 1
"#;
    scan_routes!(source, visitor);
    assert!(visitor.routes.is_empty());
}

#[test]
fn test_plain_class_does_not_register() {
    let source = r#"
class Todo:
    pass
"#;
    scan_routes!(source, visitor);
    assert!(visitor.routes.is_empty());
}
