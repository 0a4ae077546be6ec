use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::Domain;

/// 文件解析错误 (需重新上传)
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Formato de archivo no soportado: {0}. Use Excel (.xlsx, .xls) o CSV (.csv)")]
    UnsupportedFormat(String),

    #[error("El archivo {0} no contiene filas de datos")]
    EmptyFile(String),

    #[error("Error al procesar el archivo {file}: {reason}")]
    Malformed { file: String, reason: String },
}

/// 本地暂存读写错误
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("staging io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("staging encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 后端或外部依赖未配置 (功能降级)
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Backend no está configurado")]
    BackendNotConfigured,

    #[error("Origen público no configurado (PUBLIC_ORIGIN)")]
    OriginNotConfigured,
}

/// 同步错误 (整批回滚)
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No hay datos de {0} validados para sincronizar")]
    NothingStaged(Domain),

    #[error("No se encontraron registros válidos de {0} para sincronizar")]
    NoValidRecords(Domain),

    #[error("Ya hay una sincronización de {0} en curso")]
    InProgress(Domain),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("Error al sincronizar: {0}")]
    Backend(#[from] sqlx::Error),
}

/// 接口层统一错误
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("Error de base de datos: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Parse(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Configuration(_) | AppError::Sync(SyncError::Configuration(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Sync(SyncError::InProgress(_)) => StatusCode::CONFLICT,
            AppError::Sync(SyncError::NothingStaged(_)) | AppError::Sync(SyncError::NoValidRecords(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Sync(_) | AppError::Staging(_) | AppError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::warn!("request rejected: {}", self);
        }
        let body = ErrorBody {
            success: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::from(ParseError::UnsupportedFormat("pdf".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(SyncError::InProgress(Domain::Clients)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(SyncError::from(ConfigurationError::BackendNotConfigured)).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(SyncError::NothingStaged(Domain::Products)).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
