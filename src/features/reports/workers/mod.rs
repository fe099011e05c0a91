mod report_sync;

pub use report_sync::ReportSyncWorker;
