//! Routing through a mounted router: groups, route stacks, responders.

use std::sync::Arc;

use http::StatusCode;
use serde_json::json;
use tether::middleware::{from_fn, Registry};
use tether::{App, Layer, Method, Middleware, Request, Response, Router, Routes};

fn send(router: &Arc<Router>, method: Method, path: &str) -> Response {
    let mut app = App::new(Request::new(method, path));
    app.use_middleware(Arc::clone(router)).unwrap();
    app.run().unwrap()
}

fn body(res: &Response) -> &str {
    std::str::from_utf8(res.body()).unwrap()
}

#[test]
fn group_prefixes_compose() {
    let mut router = Router::new();
    router.group("/admin", |admin| {
        admin.get("/users", |_req: Request| "users");
        admin.get("/", |_req: Request| "root");
        admin.group("/reports", |reports| {
            reports.get("", |_req: Request| "reports");
            reports.get("/{year}", |req: Request| req.param("year").unwrap_or("").to_owned());
        });
    });
    let router = Arc::new(router);

    assert_eq!(body(&send(&router, Method::Get, "/admin/users")), "users");
    assert_eq!(body(&send(&router, Method::Get, "/admin")), "root");
    assert_eq!(body(&send(&router, Method::Get, "/admin/reports")), "reports");
    assert_eq!(body(&send(&router, Method::Get, "/admin/reports/2024")), "2024");
    assert_eq!(send(&router, Method::Get, "/users").status_code(), StatusCode::NOT_FOUND);
}

#[test]
fn path_params_round_trip_through_json_bodies() {
    let mut router = Router::new();
    router.get("/users/{id}", |req: Request| {
        let id = req.param("id").unwrap_or("unknown");
        Response::json(json!({ "id": id }).to_string().into_bytes())
    });
    let router = Arc::new(router);

    let res = send(&router, Method::Get, "/users/a\"b");
    let value: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(value["id"], "a\"b");
}

#[test]
fn router_shares_the_chain_with_app_middleware() {
    let mut router = Router::new();
    router.get("/hi", |_req: Request| "hi");

    let mut app = App::new(Request::new(Method::Get, "/hi"));
    app.use_middleware(vec![
        Layer::from(from_fn(|req: Request, next: &mut App| {
            let mut res = next.handle(req);
            res.set_header("x-wrapped", "yes");
            res
        })),
        Layer::from(router),
    ])
    .unwrap();

    let res = app.run().unwrap();
    assert_eq!(res.body(), b"hi");
    assert_eq!(res.header("x-wrapped"), Some("yes"));
}

#[test]
fn route_stack_runs_constituents_then_continues_the_app() {
    #[derive(Default)]
    struct Count;

    impl Middleware for Count {
        fn process(&self, _req: Request, next: &mut App) -> Response {
            let seen = next.container().get::<u32>("seen").map(|n| *n).unwrap_or(0);
            next.container_mut().set("seen", seen + 1).unwrap();
            next.response().clone()
        }
    }

    let mut registry = Registry::new();
    registry.register::<Count>("count");

    let mut router = Router::with_registry(registry);
    router
        .use_with(&[Method::Post], vec![Layer::from("count"), Layer::of::<Count>()], "/items", |_req: Request| {
            StatusCode::CREATED
        })
        .unwrap();

    let mut app = App::new(Request::new(Method::Post, "/items"));
    app.use_middleware(vec![
        Layer::from(router),
        // Runs after the route stack hands over to `next.handle`.
        Layer::from(from_fn(|req: Request, next: &mut App| {
            let mut res = next.handle(req);
            res.write("after");
            res
        })),
    ])
    .unwrap();

    let res = app.run().unwrap();

    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(res.body(), b"after");
    assert_eq!(*app.container().get::<u32>("seen").unwrap(), 2);
}

#[test]
fn canned_responders() {
    let mut router = Router::new();
    router
        .text(&[Method::Get, Method::Post], "/text", "plain", StatusCode::OK)
        .html(&[Method::Get], "/html", "<p>hi</p>", StatusCode::OK)
        .xml(&[Method::Get], "/xml", "<ok/>", StatusCode::OK)
        .json(&[Method::Get], "/json", &json!({ "a": 1 }), StatusCode::CREATED)
        .jsonp(&[Method::Get], "/jsonp", &json!([1, 2]), "cb", StatusCode::OK)
        .redirect("/old", "/new", StatusCode::MOVED_PERMANENTLY);
    let router = Arc::new(router);

    let res = send(&router, Method::Post, "/text");
    assert_eq!((body(&res), res.header("content-type")), ("plain", Some("text/plain; charset=utf-8")));

    let res = send(&router, Method::Get, "/html");
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));

    let res = send(&router, Method::Get, "/xml");
    assert_eq!((body(&res), res.header("content-type")), ("<ok/>", Some("application/xml")));

    let res = send(&router, Method::Get, "/json");
    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(body(&res), r#"{"a":1}"#);

    let res = send(&router, Method::Get, "/jsonp");
    assert_eq!(body(&res), "/**/cb([1,2]);");
    assert_eq!(res.header("content-type"), Some("application/javascript"));

    let res = send(&router, Method::Get, "/old");
    assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.header("location"), Some("/new"));
    assert_eq!(send(&router, Method::Post, "/old").status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn file_and_download_routes() {
    let path = std::env::temp_dir().join("tether-routing-test.json");
    std::fs::write(&path, r#"{"ok":true}"#).unwrap();

    let mut router = Router::new();
    router
        .file("/inline", &path)
        .download("/save", &path, "report.json")
        .file("/gone", "/no/such/file");
    let router = Arc::new(router);

    let res = send(&router, Method::Get, "/inline");
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.header("content-disposition"), None);
    assert_eq!(body(&res), r#"{"ok":true}"#);

    let res = send(&router, Method::Get, "/save");
    assert_eq!(res.header("content-disposition"), Some("attachment; filename=\"report.json\""));

    assert_eq!(send(&router, Method::Get, "/gone").status_code(), StatusCode::NOT_FOUND);

    std::fs::remove_file(&path).unwrap();
}
