use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::features::reports::models::{ObjectCategory, Report};

/// Category narrowing applied to the displayed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(ObjectCategory),
}

impl CategoryFilter {
    pub fn matches(&self, report: &Report) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => report.object_type == Some(*category),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoryFilter::All => "All",
            CategoryFilter::Only(category) => category.label(),
        }
    }

    /// "All" followed by every category, in display order
    pub fn choices() -> Vec<CategoryFilter> {
        std::iter::once(CategoryFilter::All)
            .chain(ObjectCategory::ALL.into_iter().map(CategoryFilter::Only))
            .collect()
    }
}

impl std::str::FromStr for CategoryFilter {
    type Err = crate::features::reports::models::UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

/// Counts for the board header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSummary {
    pub active: usize,
    pub shown: usize,
}

impl BoardSummary {
    pub fn headline(&self) -> String {
        match self.active {
            0 => "No active savesies".to_string(),
            1 => "1 active savesie".to_string(),
            n => format!("{} active savesies", n),
        }
    }

    /// "N shown" when the filter hides part of the active set
    pub fn shown_label(&self) -> Option<String> {
        (self.shown != self.active).then(|| format!("{} shown", self.shown))
    }
}

/// In-memory copy of the active reports.
///
/// `is_active` is applied on every read because reports expire while they sit
/// here between refetches; the store's own filter only trims the transfer.
#[derive(Debug, Default)]
pub struct ReportBoard {
    reports: Vec<Report>,
    filter: CategoryFilter,
    loaded: bool,
}

pub type SharedBoard = Arc<RwLock<ReportBoard>>;

impl ReportBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedBoard {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Replace the contents with the store's latest rows
    pub fn replace(&mut self, reports: Vec<Report>) {
        self.reports = reports;
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn filter(&self) -> CategoryFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: CategoryFilter) {
        self.filter = filter;
    }

    pub fn get(&self, id: Uuid) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }

    pub fn active(&self, now: DateTime<Utc>) -> Vec<&Report> {
        self.reports.iter().filter(|r| r.is_active(now)).collect()
    }

    /// Active reports that pass the category filter
    pub fn visible(&self, now: DateTime<Utc>) -> Vec<&Report> {
        self.reports
            .iter()
            .filter(|r| r.is_active(now) && self.filter.matches(r))
            .collect()
    }

    pub fn summary(&self, now: DateTime<Utc>) -> BoardSummary {
        BoardSummary {
            active: self.active(now).len(),
            shown: self.visible(now).len(),
        }
    }

    /// Mirror a confirmation the store accepted. Never moves count or expiry backwards.
    pub fn apply_confirmation(
        &mut self,
        id: Uuid,
        confirmations: i32,
        expires_at: DateTime<Utc>,
    ) -> bool {
        match self.reports.iter_mut().find(|r| r.id == id) {
            Some(report) => {
                report.confirmations = report.confirmations.max(confirmations);
                report.expires_at = report.expires_at.max(expires_at);
                true
            }
            None => false,
        }
    }

    /// Mirror a resolution; the report drops out of the active set
    pub fn mark_resolved(&mut self, id: Uuid) -> bool {
        match self.reports.iter_mut().find(|r| r.id == id) {
            Some(report) => {
                report.resolved = true;
                true
            }
            None => false,
        }
    }
}
