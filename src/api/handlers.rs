use axum::{
    extract::{Json, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::AppState;
use crate::db::RecordStore;
use crate::error::AppError;
use crate::ingest::parse_file;
use crate::models::{
    normalize_cuit, ActionType, AnalyticsSummary, Client, Domain, NewQrScan, ProductPassport, ProductStatus,
    ProductView, QrScan, RawDataset, SessionUser, Settings, ValidationFinding, ValidationSummary,
};
use crate::service::{report, validate as run_validation, SyncOutcome};

type ApiResult<T> = Result<Json<T>, AppError>;

/// 通用响应体
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// 暂存数据摘要
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedResponse {
    pub success: bool,
    pub domain: Domain,
    pub file_name: String,
    pub total_rows: usize,
    pub headers: Vec<String>,
}

impl StagedResponse {
    fn new(domain: Domain, dataset: RawDataset) -> Self {
        Self {
            success: true,
            domain,
            file_name: dataset.file_name,
            total_rows: dataset.total_rows,
            headers: dataset.headers,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub success: bool,
    pub summary: ValidationSummary,
    pub findings: Vec<ValidationFinding>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientFilter {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanFilter {
    pub code: Option<String>,
}

/// 客户列表行: 客户 + 缺失数据提示
#[derive(Debug, Serialize)]
pub struct ClientView {
    #[serde(flatten)]
    pub client: Client,
    pub missing: Vec<&'static str>,
}

impl From<Client> for ClientView {
    fn from(client: Client) -> Self {
        let missing = client.missing_fields();
        Self { client, missing }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub view: ClientView,
    pub products: Vec<ProductView>,
}

#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub success: bool,
    pub url: String,
}

fn parse_domain(raw: &str) -> Result<Domain, AppError> {
    raw.parse::<Domain>().map_err(AppError::BadRequest)
}

fn staged_or_404(state: &AppState, domain: Domain) -> Result<RawDataset, AppError> {
    state
        .staging
        .get(domain)?
        .ok_or_else(|| AppError::NotFound(format!("No hay datos de {} cargados", domain)))
}

/// 未配置后端时列表类接口返回空结果
fn backend_or_empty(state: &AppState, what: &str) -> Option<Arc<dyn RecordStore>> {
    if state.store.is_none() {
        tracing::warn!("Backend not configured, returning empty {}", what);
    }
    state.store.clone()
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.map_or(false, |h| h.to_lowercase().contains(needle))
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 上传文件 (multipart 字段 "file")，解析后覆盖该数据域的暂存数据
pub async fn upload(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<StagedResponse> {
    let domain = parse_domain(&domain)?;

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if part.name() != Some("file") {
            continue;
        }
        let file_name = part.file_name().unwrap_or("upload").to_string();
        let bytes = part.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;

        let dataset = parse_file(&file_name, &bytes)?;
        state.staging.put(domain, &dataset)?;
        return Ok(Json(StagedResponse::new(domain, dataset)));
    }

    Err(AppError::BadRequest("Falta el archivo (campo \"file\")".to_string()))
}

pub async fn staged(State(state): State<AppState>, Path(domain): Path<String>) -> ApiResult<StagedResponse> {
    let domain = parse_domain(&domain)?;
    let dataset = staged_or_404(&state, domain)?;
    Ok(Json(StagedResponse::new(domain, dataset)))
}

pub async fn clear_upload(State(state): State<AppState>, Path(domain): Path<String>) -> ApiResult<MessageResponse> {
    let domain = parse_domain(&domain)?;
    state.staging.clear(domain)?;
    Ok(MessageResponse::ok(format!("Datos de {} eliminados", domain)))
}

/// 校验暂存数据; 结果不是错误，总是 200
pub async fn validate(State(state): State<AppState>, Path(domain): Path<String>) -> ApiResult<ValidationResponse> {
    let domain = parse_domain(&domain)?;
    let dataset = staged_or_404(&state, domain)?;

    let findings = run_validation(&dataset, domain);
    let summary = ValidationSummary::from_findings(dataset.total_rows, &findings);
    tracing::info!(
        "Validated {} ({}): {} errors, {} warnings",
        domain,
        dataset.file_name,
        summary.errors,
        summary.warnings
    );

    state
        .analytics
        .log(ActionType::Validation, domain.as_str(), json!(summary))
        .await;

    Ok(Json(ValidationResponse {
        success: true,
        summary,
        findings,
    }))
}

/// 下载校验报告 CSV
pub async fn validation_report(State(state): State<AppState>, Path(domain): Path<String>) -> Result<Response, AppError> {
    let domain = parse_domain(&domain)?;
    let dataset = staged_or_404(&state, domain)?;

    let findings = run_validation(&dataset, domain);
    let body = report::export_csv(&findings)
        .map_err(|e| AppError::BadRequest(format!("Error al generar el reporte: {}", e)))?;
    let file_name = report::report_file_name(domain, Local::now().date_naive());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        body,
    )
        .into_response())
}

pub async fn sync(State(state): State<AppState>, Path(domain): Path<String>) -> ApiResult<SyncResponse> {
    let domain = parse_domain(&domain)?;
    let outcome = state.sync.sync(domain).await?;
    Ok(Json(SyncResponse {
        success: true,
        message: format!("{} registros de {} sincronizados", outcome.synced, domain),
        outcome,
    }))
}

/// 产品列表 (新建在前)，按编码/持证人模糊搜索、按状态精确过滤
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Vec<ProductView>> {
    let Some(store) = backend_or_empty(&state, "products") else {
        return Ok(Json(Vec::new()));
    };

    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);
    let status = filter
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ProductStatus::parse);
    let today = Local::now().date_naive();
    let threshold = state.settings.threshold();

    let views = store
        .list_products()
        .await?
        .into_iter()
        .filter(|p| {
            search.as_deref().map_or(true, |s| {
                p.record.codificacion.to_lowercase().contains(s) || contains_ci(p.record.titular.as_deref(), s)
            })
        })
        .filter(|p| {
            status
                .as_ref()
                .map_or(true, |s| ProductStatus::from(p.record.estado.as_deref()) == *s)
        })
        .map(|p| ProductView::new(p, today, threshold))
        .collect();
    Ok(Json(views))
}

/// 产品护照: 产品 + 持证客户
pub async fn get_product(State(state): State<AppState>, Path(code): Path<String>) -> ApiResult<ProductPassport> {
    let not_found = || AppError::NotFound(format!("Producto no encontrado: {}", code));
    let store = state.store.as_ref().ok_or_else(not_found)?;
    let product = store.get_product(&code).await?.ok_or_else(not_found)?;

    let client = match product.record.cuit {
        Some(cuit) => store.get_client(cuit).await?,
        None => None,
    };
    let view = ProductView::new(product, Local::now().date_naive(), state.settings.threshold());
    Ok(Json(ProductPassport { view, client }))
}

pub async fn list_clients(
    State(state): State<AppState>,
    Query(filter): Query<ClientFilter>,
) -> ApiResult<Vec<ClientView>> {
    let Some(store) = backend_or_empty(&state, "clients") else {
        return Ok(Json(Vec::new()));
    };

    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);
    let views = store
        .list_clients()
        .await?
        .into_iter()
        .filter(|c| {
            search.as_deref().map_or(true, |s| {
                c.record.cuit.to_string().contains(s)
                    || contains_ci(c.record.razon_social.as_deref(), s)
                    || contains_ci(c.record.nombre_comercial.as_deref(), s)
            })
        })
        .map(ClientView::from)
        .collect();
    Ok(Json(views))
}

/// 客户详情及其名下产品
pub async fn get_client(State(state): State<AppState>, Path(cuit): Path<String>) -> ApiResult<ClientDetail> {
    let key = normalize_cuit(&cuit).ok_or_else(|| AppError::BadRequest(format!("CUIT inválido: {}", cuit)))?;
    let not_found = || AppError::NotFound(format!("Cliente no encontrado: {}", cuit));
    let store = state.store.as_ref().ok_or_else(not_found)?;
    let client = store.get_client(key).await?.ok_or_else(not_found)?;

    let today = Local::now().date_naive();
    let threshold = state.settings.threshold();
    let products = store
        .list_products_by_cuit(key)
        .await?
        .into_iter()
        .map(|p| ProductView::new(p, today, threshold))
        .collect();

    Ok(Json(ClientDetail {
        view: ClientView::from(client),
        products,
    }))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.current())
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(changes): Json<HashMap<String, String>>,
) -> ApiResult<Settings> {
    Ok(Json(state.settings.save(&changes).await?))
}

pub async fn reload_settings(State(state): State<AppState>) -> ApiResult<Settings> {
    Ok(Json(state.settings.reload().await?))
}

pub async fn analytics_summary(State(state): State<AppState>) -> ApiResult<AnalyticsSummary> {
    Ok(Json(state.analytics.summary().await?))
}

/// 登录: 缓存外部身份 (令牌交换在外部完成)
pub async fn sign_in(State(state): State<AppState>, Json(user): Json<SessionUser>) -> ApiResult<MessageResponse> {
    if !user.has_token() {
        return Err(AppError::BadRequest("Falta el token de acceso".to_string()));
    }
    let message = format!("Sesión iniciada: {}", user.email.as_deref().unwrap_or(&user.id));
    state.session.sign_in(user)?;
    Ok(MessageResponse::ok(message))
}

pub async fn sign_out(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    state.session.sign_out()?;
    Ok(MessageResponse::ok("Sesión cerrada"))
}

pub async fn record_qr(State(state): State<AppState>, Path(code): Path<String>) -> ApiResult<QrResponse> {
    let url = state.qr.record_generated(&code).await?;
    Ok(Json(QrResponse { success: true, url }))
}

/// 二维码图片 (SVG)
pub async fn qr_image(State(state): State<AppState>, Path(code): Path<String>) -> Result<Response, AppError> {
    let image = state.qr.render_svg(&code)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], image).into_response())
}

/// 记录一次扫码，来源信息取自请求头
pub async fn log_qr_scan(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> ApiResult<MessageResponse> {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let ip_address = header_text("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty());

    let scan = NewQrScan {
        product_codificacion: code,
        user_agent: header_text("user-agent"),
        ip_address,
        referrer: header_text("referer"),
    };
    state.qr.log_scan(scan).await?;
    Ok(MessageResponse::ok("Escaneo registrado"))
}

pub async fn qr_scans(State(state): State<AppState>, Query(filter): Query<ScanFilter>) -> ApiResult<Vec<QrScan>> {
    let code = filter.code.as_deref().map(str::trim).filter(|c| !c.is_empty());
    Ok(Json(state.qr.scans(code).await?))
}
