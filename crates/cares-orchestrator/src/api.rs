//! HTTP API and the invocation pipeline.

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::dispatch;
use crate::error::OrchestratorError;
use crate::functions::{Function, FunctionRegistry};
use crate::registry::{Node, NodeRegistry};
use crate::scheduler::Scheduler;

/// Shared application state.
pub struct AppState {
    pub nodes: Arc<NodeRegistry>,
    pub functions: Arc<FunctionRegistry>,
    pub scheduler: Scheduler,
    pub dispatch_timeout: Duration,
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/functions", get(list_functions).post(register_function))
        .route(
            "/functions/{id}",
            get(get_function).delete(delete_function),
        )
        .route("/invoke/{name}", post(invoke_function))
        .route("/nodes", get(list_nodes))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Register a new function: `POST /functions`.
async fn register_function(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterFunctionBody>,
) -> Result<impl IntoResponse, OrchestratorError> {
    if body.name.is_empty() {
        return Err(OrchestratorError::InvalidRequest(
            "function name is required".to_owned(),
        ));
    }
    if body.image.is_empty() {
        return Err(OrchestratorError::InvalidRequest(
            "container image is required".to_owned(),
        ));
    }

    let function = state
        .functions
        .add(body.name, body.image, body.description)?;

    info!(name = %function.name, image = %function.image, "function registered");

    let response = RegisterResponse {
        status: "success",
        message: format!("function '{}' registered successfully", function.name),
        invoke_path: format!("/invoke/{}", function.name),
        function,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List all functions: `GET /functions`.
async fn list_functions(State(state): State<Arc<AppState>>) -> Json<ListFunctionsResponse> {
    Json(ListFunctionsResponse {
        status: "success",
        functions: state.functions.snapshot(),
    })
}

/// Get one function: `GET /functions/{id}`.
async fn get_function(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GetFunctionResponse>, OrchestratorError> {
    let function = state
        .functions
        .get(&id)
        .ok_or(OrchestratorError::FunctionIdNotFound)?;

    Ok(Json(GetFunctionResponse {
        status: "success",
        function,
    }))
}

/// Delete a function: `DELETE /functions/{id}`.
async fn delete_function(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteFunctionResponse>, OrchestratorError> {
    if !state.functions.remove(&id) {
        return Err(OrchestratorError::FunctionIdNotFound);
    }

    Ok(Json(DeleteFunctionResponse {
        status: "success",
        message: "function deleted successfully",
    }))
}

/// Invoke a function: `POST /invoke/{name}`.
///
/// The pipeline: look the function up by name, snapshot the node
/// registry, ask the scheduler for the cheapest active worker, dispatch,
/// and relay the result. The request body is currently ignored.
async fn invoke_function(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<InvokeResponse>, OrchestratorError> {
    let function = state
        .functions
        .get_by_name(&name)
        .ok_or_else(|| OrchestratorError::FunctionNotFound(name.clone()))?;

    let snapshot = state.nodes.snapshot();
    let node = state
        .scheduler
        .select(&snapshot)
        .ok_or(OrchestratorError::NoWorkersAvailable)?;

    info!(node_id = %node.id, function = %function.name, "node selected for invocation");

    let result = dispatch::execute_on_node(node, &function, state.dispatch_timeout).await?;

    if !result.success {
        return Err(OrchestratorError::ExecutionFailed(result.error));
    }

    Ok(Json(InvokeResponse {
        status: "success",
        output: result.output,
        node: node.id.clone(),
    }))
}

/// List all nodes: `GET /nodes`.
async fn list_nodes(State(state): State<Arc<AppState>>) -> Json<ListNodesResponse> {
    let mut nodes: Vec<NodeResponse> = state
        .nodes
        .snapshot()
        .into_iter()
        .map(NodeResponse::from)
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    Json(ListNodesResponse {
        status: "success",
        nodes,
    })
}

// Request and response types

/// All fields default so that a missing `name` or `image` reaches the
/// handler's own validation (400) instead of a serde rejection.
#[derive(Deserialize)]
#[serde(default)]
struct RegisterFunctionBody {
    name: String,
    image: String,
    description: Option<String>,
}

impl Default for RegisterFunctionBody {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: String::new(),
            description: None,
        }
    }
}

#[derive(Serialize)]
struct RegisterResponse {
    status: &'static str,
    message: String,
    function: Function,
    invoke_path: String,
}

#[derive(Serialize)]
struct ListFunctionsResponse {
    status: &'static str,
    functions: Vec<Function>,
}

#[derive(Serialize)]
struct GetFunctionResponse {
    status: &'static str,
    function: Function,
}

#[derive(Serialize)]
struct DeleteFunctionResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
struct InvokeResponse {
    status: &'static str,
    output: String,
    node: String,
}

#[derive(Serialize)]
struct ListNodesResponse {
    status: &'static str,
    nodes: Vec<NodeResponse>,
}

#[derive(Serialize)]
pub struct NodeResponse {
    pub id: String,
    pub address: String,
    pub hostname: String,
    pub status: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub joined_at: String,
    pub last_seen: String,
}

impl From<Node> for NodeResponse {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            address: node.address.to_string(),
            hostname: node.hostname,
            status: format!("{:?}", node.status),
            cpu_usage: node.cpu_usage,
            memory_usage: node.memory_usage,
            joined_at: node.joined_at.to_rfc3339(),
            last_seen: node.last_seen.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_app_state() -> Arc<AppState> {
        Arc::new(AppState {
            nodes: Arc::new(NodeRegistry::new()),
            functions: Arc::new(FunctionRegistry::new()),
            scheduler: Scheduler::new(),
            dispatch_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = router(make_app_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn functions_list_empty() {
        let app = router(make_app_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/functions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_rejects_missing_name() {
        let app = router(make_app_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/functions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"","image":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
