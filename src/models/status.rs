use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 默认预警天数 (CRITICAL_DAYS_THRESHOLD)
pub const DEFAULT_THRESHOLD_DAYS: i64 = 30;

/// 证书状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Vigente,
    Vencido,
    Cancelado,
    Other(String),
}

impl ProductStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "VIGENTE" => ProductStatus::Vigente,
            "VENCIDO" => ProductStatus::Vencido,
            "CANCELADO" => ProductStatus::Cancelado,
            _ => ProductStatus::Other(raw.trim().to_string()),
        }
    }
}

impl From<Option<&str>> for ProductStatus {
    fn from(raw: Option<&str>) -> Self {
        raw.map(ProductStatus::parse)
            .unwrap_or_else(|| ProductStatus::Other(String::new()))
    }
}

/// 显示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSeverity {
    Ok,
    Warning,
    Critical,
    Neutral,
}

/// 距到期天数 (到期日 - 今天)
pub fn days_until(expiration: NaiveDate, today: NaiveDate) -> i64 {
    (expiration - today).num_days()
}

/// 状态 + 剩余天数 -> 显示级别
pub fn classify(status: &ProductStatus, days: Option<i64>, threshold: i64) -> StatusSeverity {
    match status {
        ProductStatus::Vigente => match days {
            Some(d) if d <= threshold => StatusSeverity::Warning,
            _ => StatusSeverity::Ok,
        },
        ProductStatus::Vencido => StatusSeverity::Critical,
        ProductStatus::Cancelado | ProductStatus::Other(_) => StatusSeverity::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundary() {
        let vigente = ProductStatus::Vigente;
        assert_eq!(classify(&vigente, Some(30), 30), StatusSeverity::Warning);
        assert_eq!(classify(&vigente, Some(31), 30), StatusSeverity::Ok);
        assert_eq!(classify(&vigente, Some(-5), 30), StatusSeverity::Warning);
        assert_eq!(classify(&vigente, None, 30), StatusSeverity::Ok);
    }

    #[test]
    fn non_active_statuses() {
        assert_eq!(classify(&ProductStatus::Vencido, Some(100), 30), StatusSeverity::Critical);
        assert_eq!(classify(&ProductStatus::Cancelado, Some(1), 30), StatusSeverity::Neutral);
        assert_eq!(classify(&ProductStatus::parse("EN TRÁMITE"), Some(1), 30), StatusSeverity::Neutral);
        assert_eq!(classify(&ProductStatus::from(None), None, 30), StatusSeverity::Neutral);
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(ProductStatus::parse(" vigente "), ProductStatus::Vigente);
        assert_eq!(ProductStatus::parse("Vencido"), ProductStatus::Vencido);
    }

    #[test]
    fn day_count() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let exp = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(days_until(exp, today), 30);
        assert_eq!(days_until(today, exp), -30);
    }
}
