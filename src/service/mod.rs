pub mod analytics;
pub mod qr;
pub mod report;
pub mod session;
pub mod settings;
pub mod sync;
pub mod validator;

pub use analytics::AnalyticsService;
pub use qr::QrService;
pub use session::SessionContext;
pub use settings::SettingsService;
pub use sync::{SyncOutcome, SyncService};
pub use validator::validate;
