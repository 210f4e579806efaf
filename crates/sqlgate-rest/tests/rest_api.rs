//! REST surface tests over an in-memory SQLite backend.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use sqlgate_connectors::sqlite::SqliteConnector;
use sqlgate_core::GatewayConfig;
use sqlgate_rest::{RestApi, RestOptions};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

const CONFIG_YAML: &str = r#"
api:
  name: HR API
  description: Employee directory
  version: 1.0.0
database:
  type: sqlite
  connection: "sqlite::memory:"
  endpoints:
    - group: Employees
      http_method: GET
      http_path: /employees
      summary: List all employees
      query: "SELECT id, name, email, department, salary FROM employees ORDER BY id LIMIT :limit OFFSET :offset"
      is_array_result: true
      params:
        - name: limit
          type: integer
          location: query
          default: 10
        - name: offset
          type: integer
          location: query
          default: 0
    - group: Employees
      http_method: GET
      http_path: /employees/{id}
      summary: Get employee by ID
      mcp_method: get_employee
      query: "SELECT id, name, email, department, salary FROM employees WHERE id = :id"
      params:
        - name: id
          type: integer
          location: path
          required: true
    - group: Employees
      http_method: GET
      http_path: /employees/by_department
      summary: Employees of one department
      query: "SELECT id, name FROM employees WHERE department = :department ORDER BY id"
      is_array_result: true
      params:
        - name: department
          type: string
          location: query
          required: true
    - group: Admin
      http_method: DELETE
      http_path: /employees
      summary: Delete everything
      query: "DELETE FROM employees"
      is_array_result: true
"#;

async fn build_router(readonly: bool, options: RestOptions) -> axum::Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE employees (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            department TEXT,
            salary REAL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    let names = [
        "John Doe",
        "Jane Smith",
        "Bob Wilson",
        "Alice Brown",
        "Carol White",
        "David Lee",
        "Emma Davis",
        "Frank Moore",
        "Grace Taylor",
        "Henry Clark",
    ];
    for (i, name) in names.iter().enumerate() {
        let department = if i < 3 { "Engineering" } else { "Sales" };
        sqlx::query("INSERT INTO employees (id, name, email, department, salary) VALUES (?, ?, ?, ?, ?)")
            .bind(i as i64 + 1)
            .bind(name)
            .bind(format!("{}@example.com", i + 1))
            .bind(department)
            .bind(70000.0 + i as f64 * 1000.0)
            .execute(&pool)
            .await
            .unwrap();
    }

    let config = GatewayConfig::from_yaml(CONFIG_YAML).unwrap();
    let connector = Arc::new(SqliteConnector::from_pool(pool, readonly));
    let api = RestApi::new(&config, connector, "").unwrap();
    api.router(&options)
}

async fn get_json(router: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_list_employees_binds_query_params() {
    let router = build_router(false, RestOptions::default()).await;

    let (status, body) = get_json(&router, "/employees?limit=5&offset=0").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["name"], json!("John Doe"));
}

#[tokio::test]
async fn test_defaults_apply_without_query_params() {
    let router = build_router(false, RestOptions::default()).await;

    let (status, body) = get_json(&router, "/employees").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_path_param_binding() {
    let router = build_router(false, RestOptions::default()).await;

    let (status, body) = get_json(&router, "/employees/1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_object());
    assert_eq!(body["name"], json!("John Doe"));
}

#[tokio::test]
async fn test_missing_row_is_404() {
    let router = build_router(false, RestOptions::default()).await;

    let (status, _) = get_json(&router, "/employees/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_required_param_is_400() {
    let router = build_router(false, RestOptions::default()).await;

    let (status, body) = get_json(&router, "/employees/by_department").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("department"));
}

#[tokio::test]
async fn test_bad_param_is_400() {
    let router = build_router(false, RestOptions::default()).await;

    let (status, _) = get_json(&router, "/employees/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_readonly_mutation_is_403() {
    let router = build_router(true, RestOptions::default()).await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/employees")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // nothing was deleted
    let (status, body) = get_json(&router, "/employees").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_openapi_document() {
    let options = RestOptions {
        servers: vec!["http://localhost:9090".into()],
        ..Default::default()
    };
    let router = build_router(false, options).await;

    let (status, document) = get_json(&router, "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(document["info"]["title"], "HR API");
    assert_eq!(document["servers"][0]["url"], "http://localhost:9090");
    assert!(document["paths"]["/employees/{id}"]["get"].is_object());
    assert_eq!(
        document["paths"]["/employees"]["get"]["tags"][0],
        json!("Employees")
    );
}

#[tokio::test]
async fn test_swagger_ui_served_unless_disabled() {
    let router = build_router(false, RestOptions::default()).await;
    let response = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("swagger-ui"));

    let disabled = build_router(
        false,
        RestOptions {
            disable_swagger: true,
            ..Default::default()
        },
    )
    .await;
    let response = disabled
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoint() {
    let router = build_router(false, RestOptions::default()).await;
    let (status, body) = get_json(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn test_raw_envelope_dispatches_by_tool_name() {
    let options = RestOptions {
        raw_mode: true,
        ..Default::default()
    };
    let router = build_router(false, options).await;

    let request = Request::builder()
        .method("POST")
        .uri("/raw")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"endpoint": "get_employee", "params": {"id": 2}}).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["name"], json!("Jane Smith"));

    // raw mode off: the route does not exist
    let router = build_router(false, RestOptions::default()).await;
    let request = Request::builder()
        .method("POST")
        .uri("/raw")
        .header("content-type", "application/json")
        .body(Body::from(json!({"endpoint": "get_employee"}).to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
