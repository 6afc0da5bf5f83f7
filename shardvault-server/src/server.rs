use crate::config::Config;
use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use shardvault_core::{
    ChunkTransport, DeleteFileOperation, DeleteFileOperationOutcome, DeleteFileOperationRequest,
    ErrorKind, HttpChunkTransport, ListFilesOperation, MetadataStore, NodeInfo, NodeRegistry,
    ReadFileOperation, ReadFileOperationOutcome, ReadFileOperationRequest, UploadFileOperation,
    UploadFileOperationRequest, VaultError,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub registry: Arc<NodeRegistry>,
    pub metadata_store: Arc<MetadataStore>,
    upload_file: UploadFileOperation,
    read_file: ReadFileOperation,
    delete_file: DeleteFileOperation,
    list_files: ListFilesOperation,
    spool_dir: PathBuf,
    max_upload_bytes: u64,
}

impl AppState {
    pub fn new(
        registry: Arc<NodeRegistry>,
        metadata_store: Arc<MetadataStore>,
        transport: Arc<dyn ChunkTransport>,
        spool_dir: PathBuf,
        max_upload_bytes: u64,
        max_in_flight: usize,
    ) -> Self {
        Self {
            upload_file: UploadFileOperation::new(
                registry.clone(),
                metadata_store.clone(),
                transport.clone(),
                max_in_flight,
            ),
            read_file: ReadFileOperation::new(
                registry.clone(),
                metadata_store.clone(),
                transport.clone(),
            ),
            delete_file: DeleteFileOperation::new(
                registry.clone(),
                metadata_store.clone(),
                transport,
            ),
            list_files: ListFilesOperation::new(metadata_store.clone()),
            registry,
            metadata_store,
            spool_dir,
            max_upload_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Error side of every handler, rendered in the `ApiResponse` envelope.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::Integrity => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Transport | ErrorKind::Precondition | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRequest {
    #[serde(default)]
    node_id: String,
    #[serde(default, alias = "nodeURL")]
    node_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileQuery {
    file_id: String,
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let metadata_store = Arc::new(
        MetadataStore::new(&config.metadata.db_path).with_context(|| {
            format!(
                "failed to open metadata store at {}",
                config.metadata.db_path.display()
            )
        })?,
    );

    std::fs::create_dir_all(&config.upload.spool_dir).with_context(|| {
        format!(
            "failed to create spool dir {}",
            config.upload.spool_dir.display()
        )
    })?;

    let registry = Arc::new(NodeRegistry::new());
    for node in config.seed_nodes() {
        registry.register(node).await?;
    }

    let options = config.transport.options();
    let transport: Arc<dyn ChunkTransport> = Arc::new(HttpChunkTransport::new(&options)?);

    let state = Arc::new(AppState::new(
        registry,
        metadata_store,
        transport,
        config.upload.spool_dir.clone(),
        config.upload.max_upload_bytes,
        options.max_in_flight,
    ));

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health_handler))
        .route("/node/register", post(register_node))
        .route("/node/unregister", post(unregister_node))
        .route("/node/allnodes", get(list_nodes))
        .route("/file/upload", post(upload_file))
        .route("/file/retrieve", get(retrieve_file))
        .route("/file/metadata", get(list_file_metadata))
        .route("/file/delete", delete(delete_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "nodes": state.registry.len().await,
    });

    (StatusCode::OK, Json(response))
}

async fn register_node(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NodeRequest>,
) -> ApiResult<impl IntoResponse> {
    let node = NodeInfo::new(request.node_id, request.node_url);
    let message = format!("Node {} registered successfully", node.node_id);
    state.registry.register(node).await?;

    Ok(Json(serde_json::json!({ "message": message })))
}

async fn unregister_node(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NodeRequest>,
) -> ApiResult<impl IntoResponse> {
    let removed = state
        .registry
        .unregister(&request.node_id, &request.node_url)
        .await
        .map_err(|e| match e {
            VaultError::NodeNotFound { .. } => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            other => ApiError::from(other),
        })?;

    Ok(Json(serde_json::json!({
        "message": format!("Node {} unregistered successfully", removed.node_id),
    })))
}

async fn list_nodes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "nodes": state.registry.list().await }))
}

/// The `file` field of an upload, spooled to disk. The temp file is removed
/// when this value drops.
struct SpooledUpload {
    file: NamedTempFile,
    file_name: String,
    file_type: String,
}

async fn spool_upload(state: &AppState, multipart: &mut Multipart) -> ApiResult<Option<SpooledUpload>> {
    let multipart_error =
        |e: axum::extract::multipart::MultipartError| ApiError::new(e.status(), e.body_text());

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let file_type = field.content_type().unwrap_or_default().to_string();
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&state.spool_dir)
            .map_err(VaultError::from)?;

        let mut written: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            written += chunk.len() as u64;
            if written > state.max_upload_bytes {
                return Err(ApiError::new(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("upload exceeds {} bytes", state.max_upload_bytes),
                ));
            }
            file.write_all(&chunk).map_err(VaultError::from)?;
        }
        file.flush().map_err(VaultError::from)?;

        return Ok(Some(SpooledUpload {
            file,
            file_name,
            file_type,
        }));
    }

    Ok(None)
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let Some(spooled) = spool_upload(&state, &mut multipart).await? else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "No file uploaded"));
    };

    let body = tokio::fs::read(spooled.file.path())
        .await
        .map_err(VaultError::from)?;

    let result = state
        .upload_file
        .run(UploadFileOperationRequest {
            file_name: spooled.file_name,
            file_type: spooled.file_type,
            body: Bytes::from(body),
        })
        .await?;

    Ok(Json(result))
}

async fn retrieve_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Response> {
    let outcome = state
        .read_file
        .run(ReadFileOperationRequest {
            file_id: query.file_id.clone(),
        })
        .await?;

    match outcome {
        ReadFileOperationOutcome::Found { metadata, body } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_str(&metadata.file_type)
                    .unwrap_or(HeaderValue::from_static("application/octet-stream")),
            );
            headers.insert(
                header::CONTENT_DISPOSITION,
                content_disposition(&metadata.file_name),
            );
            Ok((StatusCode::OK, headers, body).into_response())
        }
        ReadFileOperationOutcome::NotFound => {
            Err(ApiError::from(VaultError::FileNotFound(query.file_id)))
        }
        ReadFileOperationOutcome::Tampered { expected, actual } => Err(ApiError::from(
            VaultError::IntegrityMismatch { expected, actual },
        )),
    }
}

fn content_disposition(file_name: &str) -> HeaderValue {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", safe))
        .unwrap_or(HeaderValue::from_static("attachment"))
}

async fn list_file_metadata(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.list_files.run().await?))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state
        .delete_file
        .run(DeleteFileOperationRequest {
            file_id: query.file_id.clone(),
        })
        .await?;

    match outcome {
        DeleteFileOperationOutcome::Deleted { metadata } => Ok(Json(serde_json::json!({
            "message": "File deleted successfully",
            "deleted": metadata,
        }))),
        DeleteFileOperationOutcome::NotFound => {
            Err(ApiError::from(VaultError::FileNotFound(query.file_id)))
        }
    }
}
