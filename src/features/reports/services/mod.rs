mod action_service;
mod change_feed;
mod geocoding_service;
mod report_board;
mod report_repository;
mod submission_service;

pub use action_service::{ActionError, ActionOutcome, ReportActions};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeHandler, ChangeSubscription, PgChangeFeed};
pub use geocoding_service::{address_or_unavailable, GeocodingService, ReverseGeocoder};
pub use report_board::{BoardSummary, CategoryFilter, ReportBoard, SharedBoard};
pub use report_repository::{PgReportRepository, ReportRepository};
pub use submission_service::{
    PendingSubmission, PhotoInput, SubmissionError, SubmissionFlow, SubmissionState, Submitted,
};
