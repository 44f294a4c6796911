//! Purpose: Provide the HTTP/JSON server for the placement portal.
//! Exports: `ServeConfig`, `AppState`, `app`, `serve`.
//! Role: Axum-based server; thin handlers over `Store` plus the streaming
//! applicant CSV export.
//! Invariants: JSON envelopes are `{success, message, data}`; error statuses
//! derive from `ErrorKind`.
//! Invariants: The applicant export streams row by row; once the CSV header
//! is on the wire a later fault truncates the download instead of producing
//! an error body.

use std::future::IntoFuture;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path as AxumPath, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::api::{
    format_deadline, parse_deadline, write_csv, Application, ColumnSelection, Company,
    DriveNotice, DriveRequest, Error, ErrorKind, Notifier, OutboxNotifier, Store,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub token: Option<String>,
    pub token_file_used: bool,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
    pub cors_origins: Vec<String>,
}

pub struct AppState {
    pub store: Arc<Store>,
    pub notifier: Arc<dyn Notifier>,
    pub token: Option<String>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let store = Arc::new(Store::open(&config.db_path)?);
    store.init_schema()?;
    let notifier: Arc<dyn Notifier> = Arc::new(OutboxNotifier::new(store.clone()));
    let state = Arc::new(AppState {
        store,
        notifier,
        token: config.token,
    });

    let cors = cors_layer(&config.cors_origins)?;
    let router = app(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/companies", post(create_company).get(list_companies))
        .route("/v1/companies/:id", get(get_company))
        .route("/v1/student/companies", get(list_companies_for_students))
        .route("/v1/drives", post(create_drive).get(list_drives))
        .route("/v1/drives/:id", get(get_drive).delete(delete_drive))
        .route("/v1/applications", post(apply_to_drive))
        .route("/v1/exports/applicants", post(export_applicants))
        .with_state(state)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    let is_loopback_bind = is_loopback(config.bind.ip());
    if !is_loopback_bind && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    if !is_loopback_bind {
        if config.token.is_none() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("non-loopback bind requires a bearer token")
                .with_hint("Use --token-file for safer deployments."));
        }
        if !config.token_file_used {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("non-loopback bind requires --token-file")
                .with_hint("Tokens on the command line leak via process listings."));
        }
    }

    Ok(())
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, Error> {
    let mut layer = CorsLayer::new();
    for origin in origins {
        let value = origin.parse::<HeaderValue>().map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid CORS origin {origin:?}"))
                .with_source(err)
        })?;
        layer = layer.allow_origin(value);
    }
    Ok(layer)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Error> {
    let Some(token) = state.token.as_ref() else {
        return Ok(());
    };
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(Error::new(ErrorKind::Permission).with_message("missing bearer token"));
    };
    let value = value.to_str().unwrap_or_default();
    let expected = format!("Bearer {token}");
    if value != expected {
        return Err(Error::new(ErrorKind::Permission).with_message("invalid bearer token"));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ApiEnvelope {
    success: bool,
    message: String,
    data: serde_json::Value,
}

fn envelope_response(
    status: StatusCode,
    message: impl Into<String>,
    data: serde_json::Value,
) -> Response {
    let body = ApiEnvelope {
        success: true,
        message: message.into(),
        data,
    };
    let mut response = (status, Json(body)).into_response();
    stamp_version(&mut response);
    response
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage | ErrorKind::MissingParameter => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Permission => StatusCode::UNAUTHORIZED,
        ErrorKind::Query
        | ErrorKind::Write
        | ErrorKind::Iteration
        | ErrorKind::Io
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    let body = ApiEnvelope {
        success: false,
        message: err.message().unwrap_or("request failed").to_string(),
        data: serde_json::Value::Null,
    };
    let mut response = (status, Json(body)).into_response();
    stamp_version(&mut response);
    response
}

fn stamp_version(response: &mut Response) {
    response
        .headers_mut()
        .insert("placementd-version", HeaderValue::from_static("1"));
}

fn bind_error(rejection: JsonRejection) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message("failed to parse request body")
        .with_source(rejection)
}

async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> Result<T, Error> + Send + 'static,
) -> Result<T, Error> {
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("worker task failed")
            .with_source(err)
    })?
}

async fn healthz() -> Response {
    let mut response = Json(json!({ "ok": true })).into_response();
    stamp_version(&mut response);
    response
}

// Companies

async fn create_company(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Company>, JsonRejection>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let Json(mut company) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(bind_error(rejection)),
    };
    let store = state.store.clone();
    let result = run_blocking(move || {
        store.create_company(&mut company)?;
        Ok(company)
    })
    .await;
    match result {
        Ok(company) => envelope_response(
            StatusCode::CREATED,
            "company created",
            json!({ "company_id": company.id }),
        ),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    page: i64,
    #[serde(default)]
    q: String,
}

async fn list_companies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let store = state.store.clone();
    let result = run_blocking(move || store.companies(query.page, &query.q)).await;
    match result {
        Ok(companies) => {
            let total = companies.len();
            envelope_response(
                StatusCode::OK,
                "companies found",
                json!({ "companies": companies, "total_companies": total }),
            )
        }
        Err(err) => error_response(err),
    }
}

async fn list_companies_for_students(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let store = state.store.clone();
    let result = run_blocking(move || store.companies_for_students(query.page, &query.q)).await;
    match result {
        Ok(companies) => {
            let total = companies.len();
            envelope_response(
                StatusCode::OK,
                "companies found",
                json!({ "companies": companies, "total_companies": total }),
            )
        }
        Err(err) => error_response(err),
    }
}

async fn get_company(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let store = state.store.clone();
    let result = run_blocking(move || store.company(&id)).await;
    match result {
        Ok(company) => envelope_response(
            StatusCode::OK,
            "company found",
            serde_json::to_value(company).unwrap_or_default(),
        ),
        Err(err) => error_response(err),
    }
}

// Drives

async fn create_drive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<DriveRequest>, JsonRejection>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(bind_error(rejection)),
    };
    let deadline = match parse_deadline(&request.deadline) {
        Ok(deadline) => deadline,
        Err(err) => return error_response(err),
    };

    let store = state.store.clone();
    let notifier = state.notifier.clone();
    let result = run_blocking(move || {
        let company = store.company(&request.company_id)?;
        let drive_id = store.create_drive(&request)?;
        let recipients = store.mailing_list(&request.branches(), request.min_cgpa)?;
        if !recipients.is_empty() {
            let notice = DriveNotice {
                drive_id: drive_id.clone(),
                company_name: company.name,
                deadline_display: format_deadline(deadline),
            };
            notifier.notify(&recipients, &notice)?;
            tracing::info!(
                students = recipients.len(),
                drive = %drive_id,
                "queued drive notification"
            );
        }
        Ok(drive_id)
    })
    .await;
    match result {
        Ok(drive_id) => envelope_response(
            StatusCode::CREATED,
            "drive created",
            json!({ "drive_id": drive_id }),
        ),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct DriveQuery {
    student_id: Option<String>,
}

async fn get_drive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<DriveQuery>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let store = state.store.clone();
    let result = run_blocking(move || {
        let mut detail = store.drive(&id)?;
        if let Some(student_id) = query.student_id.as_deref() {
            detail.applied_role = store.applied_role(student_id, &id)?;
        }
        Ok(detail)
    })
    .await;
    match result {
        Ok(detail) => envelope_response(
            StatusCode::OK,
            "drive found",
            serde_json::to_value(detail).unwrap_or_default(),
        ),
        Err(err) => error_response(err),
    }
}

async fn list_drives(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let store = state.store.clone();
    let result = run_blocking(move || store.drives_for_students()).await;
    match result {
        Ok(drives) => {
            let total = drives.len();
            envelope_response(
                StatusCode::OK,
                "drives found",
                json!({ "drives": drives, "total_drives": total }),
            )
        }
        Err(err) => error_response(err),
    }
}

async fn delete_drive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let store = state.store.clone();
    let drive_id = id.clone();
    let result = run_blocking(move || store.delete_drive(&drive_id)).await;
    match result {
        Ok(()) => envelope_response(
            StatusCode::OK,
            "drive deleted",
            json!({ "drive_id": id }),
        ),
        Err(err) => error_response(err),
    }
}

// Applications

async fn apply_to_drive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Application>, JsonRejection>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let Json(mut application) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(bind_error(rejection)),
    };
    let store = state.store.clone();
    let result = run_blocking(move || {
        store.apply(&mut application)?;
        Ok(application)
    })
    .await;
    match result {
        Ok(application) => envelope_response(
            StatusCode::CREATED,
            "application recorded",
            json!({ "application_id": application.id }),
        ),
        Err(err) => error_response(err),
    }
}

// Applicant export

#[derive(Debug, Deserialize)]
struct ExportQuery {
    rid: Option<String>,
    did: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    required_data: String,
}

/// Streaming CSV export of a role's applicants.
///
/// Failures before the CSV header is written (missing parameters, bad column
/// selection, query errors) still produce the JSON error envelope. Once the
/// header record has been sent the response is committed; a later cursor or
/// write fault terminates the stream and the client sees a truncated file.
async fn export_applicants(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ExportQuery>,
    body: Result<Json<ExportRequest>, JsonRejection>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let role_id = query.rid.unwrap_or_default();
    let drive_id = query.did.unwrap_or_default();
    if role_id.is_empty() || drive_id.is_empty() {
        return error_response(
            Error::new(ErrorKind::MissingParameter)
                .with_message("rid and did query parameters are required"),
        );
    }
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(bind_error(rejection)),
    };
    let selection = match ColumnSelection::parse(&request.required_data) {
        Ok(selection) => selection,
        Err(err) => return error_response(err),
    };

    let (tx, mut rx) = mpsc::channel::<Result<Bytes, Error>>(16);
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || {
        let result = store.with_applicant_rows(&role_id, &selection, &drive_id, |columns, rows| {
            let mut sink = ChannelWriter { tx: tx.clone() };
            write_csv(columns, rows, &mut sink)
        });
        match result {
            Ok(written) => tracing::debug!(rows = written, "applicant export complete"),
            Err(err) => {
                let _ = tx.blocking_send(Err(err));
            }
        }
    });

    // Peek the first chunk: a failure before any output can still be reported
    // cleanly. From the first byte on, the download can only truncate.
    let first = match rx.recv().await {
        Some(Ok(bytes)) => bytes,
        Some(Err(err)) => return error_response(err),
        None => {
            return error_response(
                Error::new(ErrorKind::Internal).with_message("export worker produced no output"),
            )
        }
    };

    let stream = tokio_stream::once(Ok::<Bytes, Error>(first))
        .chain(ReceiverStream::new(rx))
        .map(|result| result.map_err(|err| io::Error::other(err.to_string())));

    let mut response = Response::new(Body::from_stream(stream));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=applicants.csv"),
    );
    stamp_version(&mut response);
    response
}

/// Bridges the synchronous CSV writer to the response body channel. Each
/// flushed record becomes one channel item; a dropped receiver (client gone)
/// surfaces as a broken-pipe write error, which aborts the export and lets
/// the cursor scope unwind. Writes block when the channel is full, so the
/// cursor and the store's connection lock are paced at the client's
/// download speed.
struct ChannelWriter {
    tx: mpsc::Sender<Result<Bytes, Error>>,
}

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self
            .tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .is_err()
        {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "export client disconnected",
            ));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
