pub mod activity;
pub mod client;
pub mod dataset;
pub mod finding;
pub mod product;
pub mod settings;
pub mod status;

pub use activity::{
    ActionType, AnalyticsEvent, AnalyticsSummary, NewAnalyticsEvent, NewQrScan, QrScan, SessionUser,
};
pub use client::{normalize_cuit, Client, ClientRecord};
pub use dataset::{Cell, Domain, RawDataset, SourceKind};
pub use finding::{Severity, ValidationFinding, ValidationSummary};
pub use product::{Product, ProductPassport, ProductRecord, ProductView};
pub use settings::{SettingRow, Settings};
pub use status::{ProductStatus, StatusSeverity};
