pub mod models;
pub mod services;
pub mod workers;

pub use services::{
    GeocodingService, PgChangeFeed, PgReportRepository, ReportActions, ReportBoard,
    SubmissionFlow,
};
pub use workers::ReportSyncWorker;
