use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::analytics::AnalyticsService;
use crate::db::RecordStore;
use crate::error::{ConfigurationError, SyncError};
use crate::ingest::parser::{serial_to_date, year_in_range};
use crate::ingest::{field, HeaderIndex, LogicalField};
use crate::models::{normalize_cuit, ActionType, Cell, ClientRecord, Domain, ProductRecord, RawDataset};
use crate::staging::StagingStore;

/// 文本日期可接受的格式
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// 单次同步结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub domain: Domain,
    pub synced: u64,
    pub skipped: usize,
}

/// 客户行 -> 记录
///
/// CUIT 固定取 B 列; 名称、地址、邮箱优先按表头取，缺列时退回 A/C/D 列。
/// CUIT 规范化失败的行计入 skipped，同一 CUIT 以最后一行为准。
pub fn map_clients(dataset: &RawDataset, index: &HeaderIndex) -> (Vec<ClientRecord>, usize) {
    let mut records: IndexMap<i64, ClientRecord> = IndexMap::new();
    let mut skipped = 0;

    for row in &dataset.rows {
        let cuit = RawDataset::cell(row, 1)
            .and_then(Cell::as_text)
            .and_then(|raw| normalize_cuit(&raw));
        let Some(cuit) = cuit else {
            skipped += 1;
            continue;
        };

        let text = |logical: LogicalField| field(row, index, logical).and_then(Cell::as_text);
        let text_or_column = |logical: LogicalField, column: usize| {
            if index.has(logical) {
                text(logical)
            } else {
                RawDataset::cell(row, column).and_then(Cell::as_text)
            }
        };

        let record = ClientRecord {
            razon_social: text_or_column(LogicalField::LegalName, 0),
            nombre_comercial: text(LogicalField::TradeName),
            domicilio_legal: text_or_column(LogicalField::Address, 2),
            domicilio_planta: text(LogicalField::PlantAddress),
            telefono: text(LogicalField::Phone),
            correo_electronico: text_or_column(LogicalField::Email, 3),
            representante_nombre: text(LogicalField::RepresentativeName),
            representante_domicilio: text(LogicalField::RepresentativeAddress),
            representante_cuit: text(LogicalField::RepresentativeTaxId),
            enlace_djc: text(LogicalField::DjcLink),
            ..ClientRecord::new(cuit)
        };
        records.insert(cuit, record);
    }

    (records.into_values().collect(), skipped)
}

/// 产品行 -> 记录
///
/// 编码为空的行计入 skipped，同一编码以最后一行为准。
pub fn map_products(dataset: &RawDataset, index: &HeaderIndex) -> (Vec<ProductRecord>, usize) {
    let mut records: IndexMap<String, ProductRecord> = IndexMap::new();
    let mut skipped = 0;

    for row in &dataset.rows {
        let cell = |logical: LogicalField| field(row, index, logical);
        let text = |logical: LogicalField| cell(logical).and_then(Cell::as_text);
        let date = |logical: LogicalField| cell(logical).and_then(coerce_date);
        let int = |logical: LogicalField| cell(logical).and_then(leading_int);

        let Some(codificacion) = text(LogicalField::Code) else {
            skipped += 1;
            continue;
        };

        let record = ProductRecord {
            cuit: text(LogicalField::TaxId).and_then(|raw| normalize_cuit(&raw)),
            titular: text(LogicalField::Holder),
            tipo_certificacion: text(LogicalField::CertificationType),
            estado: Some(text(LogicalField::Status).unwrap_or_else(|| "VIGENTE".to_string())),
            en_proceso_renovacion: text(LogicalField::RenewalInProgress),
            direccion_legal: text(LogicalField::LegalAddress),
            fabricante: text(LogicalField::Manufacturer),
            planta_fabricacion: text(LogicalField::ManufacturingPlant),
            origen: Some(text(LogicalField::Origin).unwrap_or_else(|| "NACIONAL".to_string())),
            producto: text(LogicalField::ProductName),
            marca: text(LogicalField::Brand),
            modelo: text(LogicalField::Model),
            caracteristicas_tecnicas: text(LogicalField::TechnicalFeatures),
            normas_aplicacion: text(LogicalField::Standards),
            informe_ensayo_nro: text(LogicalField::TestReport),
            laboratorio: text(LogicalField::Laboratory),
            ocp_extranjero: text(LogicalField::ForeignOcp),
            certificado_extranjero_nro: text(LogicalField::ForeignCertificate),
            fecha_emision_cert_extranjero: date(LogicalField::ForeignCertificateDate),
            disposicion_convenio: text(LogicalField::AgreementDisposition),
            cod_rubro: int(LogicalField::CategoryCode),
            cod_subrubro: int(LogicalField::SubcategoryCode),
            nombre_subrubro: text(LogicalField::SubcategoryName),
            fecha_emision: date(LogicalField::IssueDate),
            fecha_ultima_vigilancia: date(LogicalField::LastSurveillanceDate),
            vencimiento: date(LogicalField::Expiration),
            fecha_cancelacion: date(LogicalField::CancellationDate),
            motivo_cancelacion: text(LogicalField::CancellationReason),
            ..ProductRecord::new(codificacion.clone())
        };
        records.insert(codificacion, record);
    }

    (records.into_values().collect(), skipped)
}

/// 单元格 -> 日期，年份须在 [1900, 2100]
pub fn coerce_date(cell: &Cell) -> Option<NaiveDate> {
    let date = match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => serial_to_date(*n),
        Cell::Text(s) => {
            let s = s.trim();
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        }
        Cell::Empty | Cell::Bool(_) => None,
    };
    date.filter(|d| year_in_range(*d))
}

/// 取开头的整数部分 ("12 - Eléctricos" -> 12)
fn leading_int(cell: &Cell) -> Option<i32> {
    match cell {
        Cell::Number(n) if n.is_finite() => i32::try_from(n.trunc() as i64).ok(),
        Cell::Text(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// 暂存数据 -> 后端 upsert
///
/// 每个数据域同一时间只允许一次同步。
pub struct SyncService {
    store: Option<Arc<dyn RecordStore>>,
    staging: StagingStore,
    analytics: Arc<AnalyticsService>,
    products_lock: Mutex<()>,
    clients_lock: Mutex<()>,
}

impl SyncService {
    pub fn new(store: Option<Arc<dyn RecordStore>>, staging: StagingStore, analytics: Arc<AnalyticsService>) -> Self {
        Self {
            store,
            staging,
            analytics,
            products_lock: Mutex::new(()),
            clients_lock: Mutex::new(()),
        }
    }

    fn lock(&self, domain: Domain) -> &Mutex<()> {
        match domain {
            Domain::Products => &self.products_lock,
            Domain::Clients => &self.clients_lock,
        }
    }

    pub async fn sync(&self, domain: Domain) -> Result<SyncOutcome, SyncError> {
        let store = self.store.as_ref().ok_or(ConfigurationError::BackendNotConfigured)?;
        let _guard = self
            .lock(domain)
            .try_lock()
            .map_err(|_| SyncError::InProgress(domain))?;

        let dataset = self.staging.get(domain)?.ok_or(SyncError::NothingStaged(domain))?;
        let index = HeaderIndex::build(&dataset.headers);

        tracing::info!("开始同步 {}: {} ({} 行)", domain, dataset.file_name, dataset.total_rows);

        let (synced, skipped) = match domain {
            Domain::Clients => {
                let (records, skipped) = map_clients(&dataset, &index);
                if records.is_empty() {
                    return Err(SyncError::NoValidRecords(domain));
                }
                (store.upsert_clients(&records).await?, skipped)
            }
            Domain::Products => {
                let (records, skipped) = map_products(&dataset, &index);
                if records.is_empty() {
                    return Err(SyncError::NoValidRecords(domain));
                }
                (store.upsert_products(&records).await?, skipped)
            }
        };

        tracing::info!("✓ 同步完成 {}: {} 条，跳过 {} 行", domain, synced, skipped);

        self.analytics
            .log(
                ActionType::Sync,
                domain.as_str(),
                json!({ "count": synced, "skipped": skipped, "fileName": dataset.file_name }),
            )
            .await;

        Ok(SyncOutcome {
            domain,
            synced,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRecordStore;
    use crate::models::{SessionUser, SourceKind};
    use crate::service::session::SessionContext;
    use crate::staging::MemoryStore;

    fn text(v: &str) -> Cell {
        if v.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(v.to_string())
        }
    }

    fn dataset(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawDataset {
        RawDataset::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows,
            "upload.xlsx",
            SourceKind::Excel,
        )
    }

    fn clients_dataset() -> RawDataset {
        dataset(
            &["Razón Social", "CUIT", "Dirección", "Email"],
            vec![
                vec![text("Acme SA"), text("30-69891427-7"), text("Calle 1"), text("a@acme.com")],
                vec![text("Beta"), text("123"), text(""), text("")],
                vec![text("Gamma"), Cell::Number(20123456786.0), text("Calle 3"), text("g@g.com")],
            ],
        )
    }

    struct Fixture {
        store: Arc<MemoryRecordStore>,
        staging: StagingStore,
        service: SyncService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryRecordStore::new());
        let staging = StagingStore::in_memory();
        let session = Arc::new(SessionContext::restore(Arc::new(MemoryStore::new())));
        session
            .sign_in(SessionUser {
                id: "u-1".into(),
                email: None,
                name: None,
                access_token: Some("tok".into()),
            })
            .unwrap();
        let backend: Arc<dyn RecordStore> = store.clone();
        let analytics = Arc::new(AnalyticsService::new(Some(backend.clone()), session));
        let service = SyncService::new(Some(backend), staging.clone(), analytics);
        Fixture {
            store,
            staging,
            service,
        }
    }

    #[test]
    fn client_mapping_skips_bad_cuit() {
        let ds = clients_dataset();
        let index = HeaderIndex::build(&ds.headers);
        let (records, skipped) = map_clients(&ds, &index);

        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cuit, 30698914277);
        assert_eq!(records[0].razon_social.as_deref(), Some("Acme SA"));
        assert_eq!(records[0].domicilio_legal.as_deref(), Some("Calle 1"));
        assert_eq!(records[1].cuit, 20123456786);
    }

    #[test]
    fn client_mapping_falls_back_to_positions() {
        let ds = dataset(
            &["Nombre", "Identificador", "Ubicación", "Contacto"],
            vec![vec![text("Acme"), text("30698914277"), text("Calle 1"), text("a@b.com")]],
        );
        let index = HeaderIndex::build(&ds.headers);
        let (records, _) = map_clients(&ds, &index);
        assert_eq!(records[0].razon_social.as_deref(), Some("Acme"));
        assert_eq!(records[0].correo_electronico.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn duplicate_codes_keep_last_row() {
        let ds = dataset(
            &["CODIFICACIÓN", "TITULAR", "ESTADO"],
            vec![
                vec![text("A-1"), text("Primero"), text("VENCIDO")],
                vec![text(""), text("Sin código"), text("")],
                vec![text("A-1"), text("Segundo"), text("")],
            ],
        );
        let index = HeaderIndex::build(&ds.headers);
        let (records, skipped) = map_products(&ds, &index);

        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].titular.as_deref(), Some("Segundo"));
        assert_eq!(records[0].estado.as_deref(), Some("VIGENTE"));
        assert_eq!(records[0].origen.as_deref(), Some("NACIONAL"));
    }

    #[test]
    fn product_fields_are_coerced() {
        let ds = dataset(
            &["Codificación", "CUIT", "Vencimiento", "Fecha Emisión", "Fecha Cancelación", "Cod Rubro", "Cod Subrubro"],
            vec![vec![
                Cell::Number(1001.0),
                text("30-69891427-7"),
                text("15/06/2026"),
                Cell::Number(45292.0),
                text("1850-01-01"),
                text("12 - Eléctricos"),
                Cell::Number(7.0),
            ]],
        );
        let index = HeaderIndex::build(&ds.headers);
        let (records, _) = map_products(&ds, &index);
        let r = &records[0];

        assert_eq!(r.codificacion, "1001");
        assert_eq!(r.cuit, Some(30698914277));
        assert_eq!(r.vencimiento, NaiveDate::from_ymd_opt(2026, 6, 15));
        assert_eq!(r.fecha_emision, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(r.fecha_cancelacion, None);
        assert_eq!(r.cod_rubro, Some(12));
        assert_eq!(r.cod_subrubro, Some(7));
    }

    #[test]
    fn text_dates_in_all_formats() {
        let expected = NaiveDate::from_ymd_opt(2030, 2, 1);
        for raw in ["2030-02-01", "01/02/2030", "2030/02/01", "2030-02-01T10:00:00Z"] {
            assert_eq!(coerce_date(&text(raw)), expected, "{}", raw);
        }
        assert_eq!(coerce_date(&text("mañana")), None);
        assert_eq!(coerce_date(&Cell::Date(NaiveDate::from_ymd_opt(2200, 1, 1).unwrap())), None);
    }

    #[tokio::test]
    async fn resync_is_idempotent() {
        let f = fixture();
        f.staging.put(Domain::Clients, &clients_dataset()).unwrap();

        let first = f.service.sync(Domain::Clients).await.unwrap();
        let second = f.service.sync(Domain::Clients).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.synced, 2);
        assert_eq!(first.skipped, 1);
        assert_eq!(f.store.client_count(), 2);

        let events = f.store.analytics_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action_type, "sync");
        assert_eq!(events[0].details["count"], 2);
    }

    #[tokio::test]
    async fn rejected_record_aborts_whole_batch() {
        let f = fixture();
        f.staging.put(Domain::Clients, &clients_dataset()).unwrap();
        f.store.reject_key("20123456786");

        let err = f.service.sync(Domain::Clients).await.unwrap_err();
        assert!(matches!(err, SyncError::Backend(_)));
        assert_eq!(f.store.client_count(), 0);
        assert!(f.store.analytics_events().is_empty());
    }

    #[tokio::test]
    async fn nothing_staged_and_no_valid_records() {
        let f = fixture();
        assert!(matches!(
            f.service.sync(Domain::Products).await,
            Err(SyncError::NothingStaged(Domain::Products))
        ));

        let ds = dataset(&["CODIFICACIÓN"], vec![vec![text("")], vec![text(" ")]]);
        f.staging.put(Domain::Products, &ds).unwrap();
        assert!(matches!(
            f.service.sync(Domain::Products).await,
            Err(SyncError::NoValidRecords(Domain::Products))
        ));
    }

    #[tokio::test]
    async fn concurrent_sync_of_same_domain_is_refused() {
        let f = fixture();
        f.staging.put(Domain::Clients, &clients_dataset()).unwrap();

        let _held = f.service.lock(Domain::Clients).try_lock().unwrap();
        assert!(matches!(
            f.service.sync(Domain::Clients).await,
            Err(SyncError::InProgress(Domain::Clients))
        ));
        // 其他数据域不受影响
        assert!(matches!(
            f.service.sync(Domain::Products).await,
            Err(SyncError::NothingStaged(Domain::Products))
        ));
    }

    #[tokio::test]
    async fn no_backend_is_a_configuration_error() {
        let session = Arc::new(SessionContext::restore(Arc::new(MemoryStore::new())));
        let analytics = Arc::new(AnalyticsService::new(None, session));
        let service = SyncService::new(None, StagingStore::in_memory(), analytics);
        assert!(matches!(
            service.sync(Domain::Clients).await,
            Err(SyncError::Configuration(ConfigurationError::BackendNotConfigured))
        ));
    }
}
