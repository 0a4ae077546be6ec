use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::client::Client;
use super::status::{self, ProductStatus, StatusSeverity};

/// 产品同步记录 (products 表可写列，自然键 codificacion)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ProductRecord {
    pub codificacion: String,
    pub cuit: Option<i64>,
    pub titular: Option<String>,
    pub tipo_certificacion: Option<String>,
    pub estado: Option<String>,
    pub en_proceso_renovacion: Option<String>,
    pub direccion_legal: Option<String>,
    pub fabricante: Option<String>,
    pub planta_fabricacion: Option<String>,
    pub origen: Option<String>,
    pub producto: Option<String>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub caracteristicas_tecnicas: Option<String>,
    pub normas_aplicacion: Option<String>,
    pub informe_ensayo_nro: Option<String>,
    pub laboratorio: Option<String>,
    pub ocp_extranjero: Option<String>,
    pub certificado_extranjero_nro: Option<String>,
    pub fecha_emision_cert_extranjero: Option<NaiveDate>,
    pub disposicion_convenio: Option<String>,
    pub cod_rubro: Option<i32>,
    pub cod_subrubro: Option<i32>,
    pub nombre_subrubro: Option<String>,
    pub fecha_emision: Option<NaiveDate>,
    pub fecha_ultima_vigilancia: Option<NaiveDate>,
    pub vencimiento: Option<NaiveDate>,
    pub fecha_cancelacion: Option<NaiveDate>,
    pub motivo_cancelacion: Option<String>,
}

impl ProductRecord {
    pub fn new(codificacion: impl Into<String>) -> Self {
        Self {
            codificacion: codificacion.into(),
            cuit: None,
            titular: None,
            tipo_certificacion: None,
            estado: None,
            en_proceso_renovacion: None,
            direccion_legal: None,
            fabricante: None,
            planta_fabricacion: None,
            origen: None,
            producto: None,
            marca: None,
            modelo: None,
            caracteristicas_tecnicas: None,
            normas_aplicacion: None,
            informe_ensayo_nro: None,
            laboratorio: None,
            ocp_extranjero: None,
            certificado_extranjero_nro: None,
            fecha_emision_cert_extranjero: None,
            disposicion_convenio: None,
            cod_rubro: None,
            cod_subrubro: None,
            nombre_subrubro: None,
            fecha_emision: None,
            fecha_ultima_vigilancia: None,
            vencimiento: None,
            fecha_cancelacion: None,
            motivo_cancelacion: None,
        }
    }
}

/// 产品表完整行 (含证书/DJC/二维码路径)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: ProductRecord,
    pub certificates_path: Option<String>,
    pub djc_path: Option<String>,
    pub qr_code_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.record.titular) {
            missing.push("Titular");
        }
        if blank(&self.record.tipo_certificacion) {
            missing.push("Tipo de Certificación");
        }
        if blank(&self.record.estado) {
            missing.push("Estado");
        }
        if self.record.vencimiento.is_none() {
            missing.push("Vencimiento");
        }
        if blank(&self.certificates_path) {
            missing.push("Certificados");
        }
        if blank(&self.djc_path) {
            missing.push("DJC");
        }
        if blank(&self.qr_code_path) {
            missing.push("Código QR");
        }
        missing
    }
}

/// 列表视图: 产品 + 派生状态
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub dias_para_vencer: Option<i64>,
    pub severity: StatusSeverity,
    pub missing: Vec<&'static str>,
}

impl ProductView {
    pub fn new(product: Product, today: NaiveDate, threshold: i64) -> Self {
        let dias_para_vencer = product.record.vencimiento.map(|v| status::days_until(v, today));
        let estado = ProductStatus::from(product.record.estado.as_deref());
        let severity = status::classify(&estado, dias_para_vencer, threshold);
        let missing = product.missing_fields();
        Self {
            product,
            dias_para_vencer,
            severity,
            missing,
        }
    }
}

/// 产品护照: 产品 + 持证客户
#[derive(Debug, Clone, Serialize)]
pub struct ProductPassport {
    #[serde(flatten)]
    pub view: ProductView,
    pub client: Option<Client>,
}
