use chrono::{DateTime, Utc};

use crate::features::device::{ActionKind, LocalActionStore};
use crate::features::reports::models::{ObjectCategory, Report};
use crate::features::reports::services::{address_or_unavailable, ReverseGeocoder};

/// Relative age of a report, as shown in the detail view
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);

    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    let hours = elapsed.num_hours();
    if hours < 1 {
        return format!("Reported {} ago", plural(minutes, "minute"));
    }
    let days = elapsed.num_days();
    if days < 1 {
        return format!("Reported {} ago", plural(hours, "hour"));
    }
    format!("Reported {} ago", plural(days, "day"))
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Everything the detail sheet for one report needs
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDetail {
    pub report: Report,
    pub address: String,
    pub reported_ago: String,
    pub category_label: &'static str,
    pub can_confirm: bool,
    pub can_resolve: bool,
    pub can_flag: bool,
}

impl ReportDetail {
    pub fn can(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Confirm => self.can_confirm,
            ActionKind::Resolve => self.can_resolve,
            ActionKind::Flag => self.can_flag,
        }
    }
}

/// Build the detail view for a tapped marker.
///
/// The address lookup is best effort and never fails the view.
pub async fn load_detail(
    report: &Report,
    geocoder: &dyn ReverseGeocoder,
    local_actions: &dyn LocalActionStore,
    now: DateTime<Utc>,
) -> ReportDetail {
    let address = address_or_unavailable(geocoder, report.coordinates()).await;

    ReportDetail {
        report: report.clone(),
        address,
        reported_ago: time_ago(report.created_at, now),
        category_label: report
            .object_type
            .unwrap_or(ObjectCategory::Other)
            .label(),
        can_confirm: !local_actions.has(ActionKind::Confirm, report.id),
        can_resolve: !local_actions.has(ActionKind::Resolve, report.id),
        can_flag: !local_actions.has(ActionKind::Flag, report.id),
    }
}
