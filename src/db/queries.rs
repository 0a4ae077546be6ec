use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::{Duration, Instant};

use super::store::RecordStore;
use crate::models::{
    AnalyticsEvent, Client, ClientRecord, NewAnalyticsEvent, NewQrScan, Product, ProductRecord, QrScan,
    SettingRow,
};

/// 单条 INSERT 的最大行数 (Postgres 绑定参数上限 65535)
const UPSERT_CHUNK: usize = 1000;
/// 整批 upsert 超时
const UPSERT_TIMEOUT: Duration = Duration::from_secs(30);

const CLIENT_COLUMNS: &[&str] = &[
    "cuit",
    "razon_social",
    "nombre_comercial",
    "domicilio_legal",
    "domicilio_planta",
    "telefono",
    "correo_electronico",
    "representante_nombre",
    "representante_domicilio",
    "representante_cuit",
    "enlace_djc",
];

const PRODUCT_COLUMNS: &[&str] = &[
    "codificacion",
    "cuit",
    "titular",
    "tipo_certificacion",
    "estado",
    "en_proceso_renovacion",
    "direccion_legal",
    "fabricante",
    "planta_fabricacion",
    "origen",
    "producto",
    "marca",
    "modelo",
    "caracteristicas_tecnicas",
    "normas_aplicacion",
    "informe_ensayo_nro",
    "laboratorio",
    "ocp_extranjero",
    "certificado_extranjero_nro",
    "fecha_emision_cert_extranjero",
    "disposicion_convenio",
    "cod_rubro",
    "cod_subrubro",
    "nombre_subrubro",
    "fecha_emision",
    "fecha_ultima_vigilancia",
    "vencimiento",
    "fecha_cancelacion",
    "motivo_cancelacion",
];

const CLIENT_SELECT: &str = r#"
    SELECT id, cuit, razon_social, nombre_comercial, domicilio_legal, domicilio_planta,
           telefono, correo_electronico, representante_nombre, representante_domicilio,
           representante_cuit, enlace_djc, documents_path, created_at, updated_at
    FROM clients
"#;

const PRODUCT_SELECT: &str = r#"
    SELECT id, codificacion, cuit, titular, tipo_certificacion, estado, en_proceso_renovacion,
           direccion_legal, fabricante, planta_fabricacion, origen, producto, marca, modelo,
           caracteristicas_tecnicas, normas_aplicacion, informe_ensayo_nro, laboratorio,
           ocp_extranjero, certificado_extranjero_nro, fecha_emision_cert_extranjero,
           disposicion_convenio, cod_rubro, cod_subrubro, nombre_subrubro, fecha_emision,
           fecha_ultima_vigilancia, vencimiento, fecha_cancelacion, motivo_cancelacion,
           certificates_path, djc_path, qr_code_path, created_at, updated_at
    FROM products
"#;

/// `INSERT INTO {table} ({columns}) `
fn insert_prefix(table: &str, columns: &[&str]) -> String {
    format!("INSERT INTO {} ({}) ", table, columns.join(", "))
}

/// ` ON CONFLICT ({key}) DO UPDATE SET col = EXCLUDED.col, ..., updated_at = now()`
fn conflict_clause(key: &str, columns: &[&str]) -> String {
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != key)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();
    format!(" ON CONFLICT ({}) DO UPDATE SET {}, updated_at = now()", key, updates.join(", "))
}

/// Postgres 实现
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_clients_tx(&self, records: &[ClientRecord]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for chunk in records.chunks(UPSERT_CHUNK) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(insert_prefix("clients", CLIENT_COLUMNS));
            query_builder.push_values(chunk, |mut b, r| {
                b.push_bind(r.cuit)
                    .push_bind(&r.razon_social)
                    .push_bind(&r.nombre_comercial)
                    .push_bind(&r.domicilio_legal)
                    .push_bind(&r.domicilio_planta)
                    .push_bind(&r.telefono)
                    .push_bind(&r.correo_electronico)
                    .push_bind(&r.representante_nombre)
                    .push_bind(&r.representante_domicilio)
                    .push_bind(&r.representante_cuit)
                    .push_bind(&r.enlace_djc);
            });
            query_builder.push(conflict_clause("cuit", CLIENT_COLUMNS));
            affected += query_builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(affected)
    }

    async fn upsert_products_tx(&self, records: &[ProductRecord]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for chunk in records.chunks(UPSERT_CHUNK) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(insert_prefix("products", PRODUCT_COLUMNS));
            query_builder.push_values(chunk, |mut b, r| {
                b.push_bind(&r.codificacion)
                    .push_bind(r.cuit)
                    .push_bind(&r.titular)
                    .push_bind(&r.tipo_certificacion)
                    .push_bind(&r.estado)
                    .push_bind(&r.en_proceso_renovacion)
                    .push_bind(&r.direccion_legal)
                    .push_bind(&r.fabricante)
                    .push_bind(&r.planta_fabricacion)
                    .push_bind(&r.origen)
                    .push_bind(&r.producto)
                    .push_bind(&r.marca)
                    .push_bind(&r.modelo)
                    .push_bind(&r.caracteristicas_tecnicas)
                    .push_bind(&r.normas_aplicacion)
                    .push_bind(&r.informe_ensayo_nro)
                    .push_bind(&r.laboratorio)
                    .push_bind(&r.ocp_extranjero)
                    .push_bind(&r.certificado_extranjero_nro)
                    .push_bind(r.fecha_emision_cert_extranjero)
                    .push_bind(&r.disposicion_convenio)
                    .push_bind(r.cod_rubro)
                    .push_bind(r.cod_subrubro)
                    .push_bind(&r.nombre_subrubro)
                    .push_bind(r.fecha_emision)
                    .push_bind(r.fecha_ultima_vigilancia)
                    .push_bind(r.vencimiento)
                    .push_bind(r.fecha_cancelacion)
                    .push_bind(&r.motivo_cancelacion);
            });
            query_builder.push(conflict_clause("codificacion", PRODUCT_COLUMNS));
            affected += query_builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(affected)
    }
}

/// 带超时执行整批 upsert，超时按连接池超时上报
async fn with_timeout<F>(label: &str, count: usize, fut: F) -> Result<u64, sqlx::Error>
where
    F: std::future::Future<Output = Result<u64, sqlx::Error>>,
{
    tracing::debug!("开始 upsert {}, {} 条记录", label, count);
    let start = Instant::now();

    match tokio::time::timeout(UPSERT_TIMEOUT, fut).await {
        Ok(Ok(affected)) => {
            tracing::info!("✓ UPSERT {} 成功, 影响 {} 行, 耗时: {:?}", label, affected, start.elapsed());
            Ok(affected)
        }
        Ok(Err(e)) => {
            tracing::error!("✗ UPSERT {} 失败, 耗时: {:?}, 错误: {:?}", label, start.elapsed(), e);
            Err(e)
        }
        Err(_) => {
            tracing::error!("✗ UPSERT {} 超时 (>30秒)!", label);
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn upsert_clients(&self, records: &[ClientRecord]) -> Result<u64, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }
        with_timeout("clients", records.len(), self.upsert_clients_tx(records)).await
    }

    async fn upsert_products(&self, records: &[ProductRecord]) -> Result<u64, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }
        with_timeout("products", records.len(), self.upsert_products_tx(records)).await
    }

    async fn list_clients(&self) -> Result<Vec<Client>, sqlx::Error> {
        sqlx::query_as::<_, Client>(&format!("{CLIENT_SELECT} ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await
    }

    async fn get_client(&self, cuit: i64) -> Result<Option<Client>, sqlx::Error> {
        sqlx::query_as::<_, Client>(&format!("{CLIENT_SELECT} WHERE cuit = $1"))
            .bind(cuit)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await
    }

    async fn get_product(&self, codificacion: &str) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE codificacion = $1"))
            .bind(codificacion)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_products_by_cuit(&self, cuit: i64) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE cuit = $1 ORDER BY codificacion"))
            .bind(cuit)
            .fetch_all(&self.pool)
            .await
    }

    async fn set_qr_code_path(&self, codificacion: &str, path: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET qr_code_path = $2, updated_at = now()
            WHERE codificacion = $1
            "#,
        )
        .bind(codificacion)
        .bind(path)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn load_settings(&self) -> Result<Vec<SettingRow>, sqlx::Error> {
        sqlx::query_as::<_, SettingRow>("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
    }

    async fn upsert_setting(&self, key: &str, value: &str, description: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, description = EXCLUDED.description, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_analytics(&self, event: &NewAnalyticsEvent) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO analytics (user_id, action_type, section, details)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&event.user_id)
        .bind(event.action_type.as_str())
        .bind(&event.section)
        .bind(&event.details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_analytics(&self, user_id: &str) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT action_type, count(*)
            FROM analytics
            WHERE user_id = $1
            GROUP BY action_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn recent_analytics(&self, user_id: &str, limit: i64) -> Result<Vec<AnalyticsEvent>, sqlx::Error> {
        sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            SELECT id, user_id, action_type, section, details, created_at
            FROM analytics
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn insert_qr_scan(&self, scan: &NewQrScan) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO qr_scans (product_codificacion, user_agent, ip_address, referrer)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&scan.product_codificacion)
        .bind(&scan.user_agent)
        .bind(&scan.ip_address)
        .bind(&scan.referrer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_qr_scans(&self, codificacion: Option<&str>, limit: i64) -> Result<Vec<QrScan>, sqlx::Error> {
        sqlx::query_as::<_, QrScan>(
            r#"
            SELECT id, product_codificacion, scan_timestamp, user_agent, ip_address, referrer
            FROM qr_scans
            WHERE ($1::text IS NULL OR product_codificacion = $1)
            ORDER BY scan_timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(codificacion)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_clause_skips_key_column() {
        let clause = conflict_clause("cuit", &["cuit", "razon_social", "telefono"]);
        assert_eq!(
            clause,
            " ON CONFLICT (cuit) DO UPDATE SET razon_social = EXCLUDED.razon_social, \
             telefono = EXCLUDED.telefono, updated_at = now()"
        );
    }

    #[test]
    fn insert_prefix_lists_columns() {
        assert_eq!(
            insert_prefix("clients", &["cuit", "razon_social"]),
            "INSERT INTO clients (cuit, razon_social) "
        );
    }

    #[test]
    fn chunk_stays_under_bind_limit() {
        assert!(UPSERT_CHUNK * PRODUCT_COLUMNS.len() < 65535);
        assert!(UPSERT_CHUNK * CLIENT_COLUMNS.len() < 65535);
    }
}
