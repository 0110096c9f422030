// ==========================================
// 进度计划引擎 - HTTP 路由
// ==========================================
// 职责: 将 ScheduleApi 暴露为 REST 接口
// 约定: 失败统一返回 { error, details?, code } + 对应状态码
// ==========================================

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::api::{ApiError, ApiResult, CriticalPathResponse, DeleteScheduleResponse, ImportScheduleResponse};
use crate::app::state::AppState;
use crate::domain::schedule::{ScheduleSummary, WbsProgress};

/// multipart 分隔符等额外开销
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// 上传表单中的文件字段名
const FILE_FIELD: &str = "file";

type SharedState = Arc<AppState>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "请求处理失败");
        } else {
            warn!(code = self.code(), error = %self, "请求被拒绝");
        }
        (status, Json(self.to_body())).into_response()
    }
}

/// 构建路由
///
/// # 参数
/// - state: 应用状态
/// - max_upload_bytes: 上传文件大小上限（超出返回 413）
pub fn build_router(state: SharedState, max_upload_bytes: u64) -> Router {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/projects/:project_id/schedule/import", post(import_schedule))
        .route(
            "/api/projects/:project_id/schedule",
            get(get_schedule_summary).delete(delete_schedule),
        )
        .route("/api/projects/:project_id/schedule/summary", get(get_schedule_summary))
        .route("/api/projects/:project_id/schedule/critical-path", get(get_critical_path))
        .route("/api/projects/:project_id/schedule/wbs", get(list_wbs_progress))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 在阻塞线程池中执行同步读取
async fn run_blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ApiResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::InternalError(format!("后台任务异常: {}", e)))?
}

// ==========================================
// Handlers
// ==========================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

/// POST /api/projects/:project_id/schedule/import
async fn import_schedule(
    State(state): State<SharedState>,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<ImportScheduleResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, bytes.to_vec()));
    }

    let (file_name, content) =
        upload.ok_or_else(|| ApiError::InvalidInput(format!("缺少上传字段 {}", FILE_FIELD)))?;

    let response = state
        .schedule_api
        .import_schedule(&project_id, &file_name, content)
        .await?;
    Ok(Json(response))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::InvalidInput(format!("上传内容无法解析: {}", err.body_text()))
    }
}

/// DELETE /api/projects/:project_id/schedule
async fn delete_schedule(
    State(state): State<SharedState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<DeleteScheduleResponse>> {
    Ok(Json(state.schedule_api.delete_schedule(&project_id).await?))
}

/// GET /api/projects/:project_id/schedule/summary
async fn get_schedule_summary(
    State(state): State<SharedState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ScheduleSummary>> {
    let api = state.schedule_api.clone();
    let summary = run_blocking(move || api.get_schedule_summary(&project_id)).await?;
    Ok(Json(summary))
}

/// GET /api/projects/:project_id/schedule/critical-path
async fn get_critical_path(
    State(state): State<SharedState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<CriticalPathResponse>> {
    let api = state.schedule_api.clone();
    let path = run_blocking(move || api.get_critical_path(&project_id)).await?;
    Ok(Json(path))
}

/// GET /api/projects/:project_id/schedule/wbs
async fn list_wbs_progress(
    State(state): State<SharedState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<WbsProgress>>> {
    let api = state.schedule_api.clone();
    let rows = run_blocking(move || api.list_wbs_progress(&project_id)).await?;
    Ok(Json(rows))
}
