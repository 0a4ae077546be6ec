use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::DEFAULT_THRESHOLD_DAYS;

/// settings 表行
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SettingRow {
    pub key: String,
    pub value: Option<String>,
}

/// 运行时设置 (键值对覆盖默认值)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    pub spreadsheet_id_products: String,
    pub spreadsheet_id_products_tab: String,
    pub spreadsheet_id_clients: String,
    pub spreadsheet_id_clients_tab: String,
    pub google_drive_folder_id: String,
    pub supabase_bucket_certificates: String,
    pub supabase_bucket_client_docs: String,
    pub supabase_bucket_qrs: String,
    pub critical_days_threshold: i64,
    pub djc_template_res16_id: String,
    pub djc_template_res17_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            spreadsheet_id_products: String::new(),
            spreadsheet_id_products_tab: "Base de producto".to_string(),
            spreadsheet_id_clients: String::new(),
            spreadsheet_id_clients_tab: "Cliente".to_string(),
            google_drive_folder_id: String::new(),
            supabase_bucket_certificates: "certificates".to_string(),
            supabase_bucket_client_docs: "client-documents".to_string(),
            supabase_bucket_qrs: "qr-codes".to_string(),
            critical_days_threshold: DEFAULT_THRESHOLD_DAYS,
            djc_template_res16_id: String::new(),
            djc_template_res17_id: String::new(),
        }
    }
}

/// 已知设置键
pub const SETTING_KEYS: &[&str] = &[
    "SPREADSHEET_ID_PRODUCTS",
    "SPREADSHEET_ID_PRODUCTS_TAB",
    "SPREADSHEET_ID_CLIENTS",
    "SPREADSHEET_ID_CLIENTS_TAB",
    "GOOGLE_DRIVE_FOLDER_ID",
    "SUPABASE_BUCKET_CERTIFICATES",
    "SUPABASE_BUCKET_CLIENT_DOCS",
    "SUPABASE_BUCKET_QRS",
    "CRITICAL_DAYS_THRESHOLD",
    "DJC_TEMPLATE_RES16_ID",
    "DJC_TEMPLATE_RES17_ID",
];

impl Settings {
    /// 应用一条键值; 未知键返回 false。空值或无法解析的阈值保留默认值
    pub fn apply(&mut self, key: &str, value: Option<&str>) -> bool {
        let defaults = Settings::default();
        let text = value.map(str::trim).filter(|v| !v.is_empty());
        let pick = |current: String| text.map(str::to_string).unwrap_or(current);

        match key {
            "SPREADSHEET_ID_PRODUCTS" => self.spreadsheet_id_products = pick(defaults.spreadsheet_id_products),
            "SPREADSHEET_ID_PRODUCTS_TAB" => {
                self.spreadsheet_id_products_tab = pick(defaults.spreadsheet_id_products_tab)
            }
            "SPREADSHEET_ID_CLIENTS" => self.spreadsheet_id_clients = pick(defaults.spreadsheet_id_clients),
            "SPREADSHEET_ID_CLIENTS_TAB" => {
                self.spreadsheet_id_clients_tab = pick(defaults.spreadsheet_id_clients_tab)
            }
            "GOOGLE_DRIVE_FOLDER_ID" => self.google_drive_folder_id = pick(defaults.google_drive_folder_id),
            "SUPABASE_BUCKET_CERTIFICATES" => {
                self.supabase_bucket_certificates = pick(defaults.supabase_bucket_certificates)
            }
            "SUPABASE_BUCKET_CLIENT_DOCS" => {
                self.supabase_bucket_client_docs = pick(defaults.supabase_bucket_client_docs)
            }
            "SUPABASE_BUCKET_QRS" => self.supabase_bucket_qrs = pick(defaults.supabase_bucket_qrs),
            "CRITICAL_DAYS_THRESHOLD" => {
                self.critical_days_threshold = text
                    .and_then(|v| v.parse::<i64>().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(defaults.critical_days_threshold)
            }
            "DJC_TEMPLATE_RES16_ID" => self.djc_template_res16_id = pick(defaults.djc_template_res16_id),
            "DJC_TEMPLATE_RES17_ID" => self.djc_template_res17_id = pick(defaults.djc_template_res17_id),
            _ => return false,
        }
        true
    }

    pub fn from_rows(rows: &[SettingRow]) -> Self {
        let mut settings = Settings::default();
        for row in rows {
            settings.apply(&row.key, row.value.as_deref());
        }
        settings
    }

    pub fn description(key: &str) -> &'static str {
        match key {
            "SPREADSHEET_ID_PRODUCTS" => "ID del Google Sheet que contiene los datos de productos",
            "SPREADSHEET_ID_PRODUCTS_TAB" => "Pestaña del Google Sheet de productos (formato: nombre|id)",
            "SPREADSHEET_ID_CLIENTS" => "ID del Google Sheet que contiene los datos de clientes",
            "SPREADSHEET_ID_CLIENTS_TAB" => "Pestaña del Google Sheet de clientes (formato: nombre|id)",
            "GOOGLE_DRIVE_FOLDER_ID" => "ID de la carpeta de Google Drive para almacenar archivos",
            "SUPABASE_BUCKET_CERTIFICATES" => "Nombre del bucket para certificados",
            "SUPABASE_BUCKET_CLIENT_DOCS" => "Nombre del bucket para documentos de clientes",
            "SUPABASE_BUCKET_QRS" => "Nombre del bucket para códigos QR",
            "CRITICAL_DAYS_THRESHOLD" => "Número de días antes del vencimiento para mostrar alerta",
            "DJC_TEMPLATE_RES16_ID" => "ID del template DJC para Resolución 16/2025",
            "DJC_TEMPLATE_RES17_ID" => "ID del template DJC para Resolución 17/2025",
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: &str) -> SettingRow {
        SettingRow {
            key: key.to_string(),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn rows_override_defaults() {
        let s = Settings::from_rows(&[row("CRITICAL_DAYS_THRESHOLD", "45"), row("SUPABASE_BUCKET_QRS", "qrs")]);
        assert_eq!(s.critical_days_threshold, 45);
        assert_eq!(s.supabase_bucket_qrs, "qrs");
        assert_eq!(s.supabase_bucket_certificates, "certificates");
    }

    #[test]
    fn bad_threshold_falls_back() {
        let s = Settings::from_rows(&[row("CRITICAL_DAYS_THRESHOLD", "soon")]);
        assert_eq!(s.critical_days_threshold, DEFAULT_THRESHOLD_DAYS);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut s = Settings::default();
        assert!(!s.apply("THEME", Some("dark")));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn serializes_with_setting_keys() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        for key in SETTING_KEYS {
            assert!(json.get(*key).is_some(), "missing {}", key);
        }
    }
}
