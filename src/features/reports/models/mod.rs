mod object_category;
mod report;

pub use object_category::{ObjectCategory, UnknownCategory};
pub(crate) use report::ReportRow;
pub use report::{base_ttl, confirm_bonus, Coordinates, NewReport, Report};
