use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 客户同步记录 (clients 表可写列，自然键 cuit)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ClientRecord {
    pub cuit: i64,
    pub razon_social: Option<String>,
    pub nombre_comercial: Option<String>,
    pub domicilio_legal: Option<String>,
    pub domicilio_planta: Option<String>,
    pub telefono: Option<String>,
    pub correo_electronico: Option<String>,
    pub representante_nombre: Option<String>,
    pub representante_domicilio: Option<String>,
    pub representante_cuit: Option<String>,
    pub enlace_djc: Option<String>,
}

impl ClientRecord {
    pub fn new(cuit: i64) -> Self {
        Self {
            cuit,
            razon_social: None,
            nombre_comercial: None,
            domicilio_legal: None,
            domicilio_planta: None,
            telefono: None,
            correo_electronico: None,
            representante_nombre: None,
            representante_domicilio: None,
            representante_cuit: None,
            enlace_djc: None,
        }
    }
}

/// 客户表完整行
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: ClientRecord,
    pub documents_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// 缺失数据提示
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.record.razon_social) {
            missing.push("Razón Social");
        }
        if blank(&self.record.correo_electronico) {
            missing.push("Correo Electrónico");
        }
        if blank(&self.record.domicilio_legal) {
            missing.push("Domicilio Legal");
        }
        missing
    }
}

/// 把 CUIT 文本规范化为 11 位数字
///
/// 去掉所有非数字字符后必须恰好 11 位且大于 0。
pub fn normalize_cuit(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 11 {
        return None;
    }
    digits.parse::<i64>().ok().filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuit_with_dashes_normalizes() {
        assert_eq!(normalize_cuit("30-69891427-7"), Some(30698914277));
        assert_eq!(normalize_cuit(" 30698914277 "), Some(30698914277));
    }

    #[test]
    fn cuit_with_wrong_length_is_rejected() {
        assert_eq!(normalize_cuit("123"), None);
        assert_eq!(normalize_cuit("306989142771"), None);
        assert_eq!(normalize_cuit(""), None);
        assert_eq!(normalize_cuit("00000000000"), None);
    }
}
