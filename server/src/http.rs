use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{NaiveDate, Utc};
use entity::employees::{Model, Status};
use platform_db::DbPool;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use service::{EmployeeError, EmployeePatch, EmployeeService, NewEmployee};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub service: EmployeeService,
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "employee server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/createEmp", post(create_employee_handler))
        .route("/employees", get(list_employees_handler))
        .route(
            "/employees/{id}",
            put(update_employee_handler).delete(delete_employee_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// The only wall-clock read; everything below the boundary takes the date
/// as a parameter.
fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CreateEmployeeBody {
    name: Option<String>,
    join_date: Option<NaiveDate>,
    status: Option<Status>,
    position: Option<String>,
}

/// Partial update body. `name` and `id` are not part of the contract and
/// are ignored when present.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UpdateEmployeeBody {
    position: Option<String>,
    status: Option<Status>,
    join_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeBody {
    id: i64,
    name: String,
    join_date: NaiveDate,
    status: Status,
    position: Option<String>,
    flagged: bool,
}

impl EmployeeBody {
    fn from_model(model: Model, today: NaiveDate) -> Self {
        let flagged = model.is_flagged(today);
        Self {
            id: model.id,
            name: model.name,
            join_date: model.join_date,
            status: model.status,
            position: model.position,
            flagged,
        }
    }
}

async fn create_employee_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateEmployeeBody>,
) -> HttpResult<(StatusCode, Json<EmployeeBody>)> {
    let input = NewEmployee {
        name: body.name,
        join_date: body.join_date,
        status: body.status,
        position: body.position,
    };
    let created = state.service.create_employee(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(EmployeeBody::from_model(created, today())),
    ))
}

async fn list_employees_handler(
    State(state): State<AppState>,
) -> HttpResult<Json<Vec<EmployeeBody>>> {
    let employees = state.service.get_all_employees().await?;
    let evaluation_date = today();
    let body = employees
        .into_iter()
        .map(|model| EmployeeBody::from_model(model, evaluation_date))
        .collect();
    Ok(Json(body))
}

async fn update_employee_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateEmployeeBody>,
) -> HttpResult<Json<EmployeeBody>> {
    let patch = EmployeePatch {
        position: body.position,
        status: body.status,
        join_date: body.join_date,
    };
    let updated = state.service.update_employee(id, patch).await?;
    Ok(Json(EmployeeBody::from_model(updated, today())))
}

async fn delete_employee_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HttpResult<StatusCode> {
    state.service.delete_employee(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.pool.execute_unprepared("SELECT 1").await.is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug)]
struct HttpError {
    status: StatusCode,
    message: String,
}

impl From<EmployeeError> for HttpError {
    fn from(err: EmployeeError) -> Self {
        match err {
            EmployeeError::Validation(message) => Self {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            EmployeeError::NotFound(id) => Self {
                status: StatusCode::NOT_FOUND,
                message: format!("Employee not found with id: {id}"),
            },
            EmployeeError::Db(err) => {
                error!(%err, "store failure");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal server error".into(),
                }
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use serde_json::{Value, json};
    use service::SeaOrmStore;
    use tower::ServiceExt;

    use super::*;

    async fn test_router() -> Router {
        let conn = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&conn, None).await.unwrap();
        let store = Arc::new(SeaOrmStore::new(conn.clone()));
        let state = AppState {
            service: EmployeeService::new(store),
            pool: conn,
            config: Arc::new(AppConfig {
                cors_allowed_origins: Vec::new(),
            }),
        };
        build_router(state)
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    fn parse(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    fn alice() -> Value {
        json!({
            "name": "Alice",
            "joinDate": "2015-01-01",
            "status": "ACTIVE",
            "position": "Engineer"
        })
    }

    #[tokio::test]
    async fn create_returns_created_record_with_id_and_flagged() {
        let router = test_router().await;
        let (status, body) = send(&router, "POST", "/createEmp", Some(alice())).await;

        assert_eq!(status, StatusCode::CREATED);
        let json = parse(&body);
        assert!(json["id"].as_i64().unwrap() > 0);
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["joinDate"], "2015-01-01");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["position"], "Engineer");
        assert_eq!(json["flagged"], true);
    }

    #[tokio::test]
    async fn create_without_name_is_bad_request() {
        let router = test_router().await;
        let (status, body) = send(
            &router,
            "POST",
            "/createEmp",
            Some(json!({ "joinDate": "2015-01-01", "status": "ACTIVE" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "Employee name cannot be null or empty."
        );
    }

    #[tokio::test]
    async fn duplicate_name_is_bad_request() {
        let router = test_router().await;
        send(&router, "POST", "/createEmp", Some(alice())).await;
        let (status, body) = send(&router, "POST", "/createEmp", Some(alice())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "An employee with the name 'Alice' already exists."
        );
    }

    #[tokio::test]
    async fn listing_returns_all_records() {
        let router = test_router().await;
        send(&router, "POST", "/createEmp", Some(alice())).await;
        send(
            &router,
            "POST",
            "/createEmp",
            Some(json!({ "name": "Bob", "joinDate": "2024-03-01", "status": "ON_LEAVE" })),
        )
        .await;

        let (status, body) = send(&router, "GET", "/employees", None).await;
        assert_eq!(status, StatusCode::OK);
        let json = parse(&body);
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 2);
        let bob = list.iter().find(|emp| emp["name"] == "Bob").unwrap();
        assert_eq!(bob["position"], Value::Null);
        assert_eq!(bob["flagged"], false);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let router = test_router().await;
        let (status, body) = send(
            &router,
            "PUT",
            "/employees/42",
            Some(json!({ "status": "INACTIVE" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "Employee not found with id: 42"
        );
    }

    #[tokio::test]
    async fn update_ignores_name_and_trims_position() {
        let router = test_router().await;
        let (_, body) = send(&router, "POST", "/createEmp", Some(alice())).await;
        let id = parse(&body)["id"].as_i64().unwrap();

        let (status, body) = send(
            &router,
            "PUT",
            &format!("/employees/{id}"),
            Some(json!({ "name": "Mallory", "position": "  Lead  " })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json = parse(&body);
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["position"], "Lead");
    }

    #[tokio::test]
    async fn update_to_inactive_clears_flagged() {
        let router = test_router().await;
        let (_, body) = send(&router, "POST", "/createEmp", Some(alice())).await;
        let id = parse(&body)["id"].as_i64().unwrap();

        let (status, body) = send(
            &router,
            "PUT",
            &format!("/employees/{id}"),
            Some(json!({ "status": "INACTIVE" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json = parse(&body);
        assert_eq!(json["status"], "INACTIVE");
        assert_eq!(json["flagged"], false);
    }

    #[tokio::test]
    async fn delete_returns_no_content_then_not_found() {
        let router = test_router().await;
        let (_, body) = send(&router, "POST", "/createEmp", Some(alice())).await;
        let id = parse(&body)["id"].as_i64().unwrap();

        let (status, body) = send(&router, "DELETE", &format!("/employees/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let (status, _) = send(&router, "DELETE", &format!("/employees/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_database_status() {
        let router = test_router().await;
        let (status, body) = send(&router, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        let json = parse(&body);
        assert_eq!(json["ok"], true);
        assert_eq!(json["db_ok"], true);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}
