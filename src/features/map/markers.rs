use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::config::MapConfig;
use crate::features::reports::models::{Coordinates, ObjectCategory, Report};
use crate::features::reports::services::{BoardSummary, ReportBoard};
use crate::shared::constants::DEFAULT_MARKER_TITLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapTheme {
    #[default]
    Dark,
}

/// What the map widget is asked to show
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapViewport {
    pub center: Coordinates,
    pub zoom: u8,
    pub theme: MapTheme,
}

impl MapViewport {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            center: config.center,
            zoom: config.zoom,
            theme: MapTheme::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerIcon {
    Cone,
    Emoji(&'static str),
}

impl MarkerIcon {
    pub fn for_category(category: Option<ObjectCategory>) -> Self {
        match category {
            Some(ObjectCategory::Cone) => MarkerIcon::Cone,
            Some(other) => MarkerIcon::Emoji(other.emoji()),
            None => MarkerIcon::Emoji(ObjectCategory::Other.emoji()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDescriptor {
    pub report_id: Uuid,
    pub position: Coordinates,
    pub icon: MarkerIcon,
    pub title: String,
}

impl From<&Report> for MarkerDescriptor {
    fn from(report: &Report) -> Self {
        Self {
            report_id: report.id,
            position: report.coordinates(),
            icon: MarkerIcon::for_category(report.object_type),
            title: report
                .object_type
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| DEFAULT_MARKER_TITLE.to_string()),
        }
    }
}

/// Markers for every visible report on the board
pub fn markers(board: &ReportBoard, now: DateTime<Utc>) -> Vec<MarkerDescriptor> {
    board
        .visible(now)
        .into_iter()
        .map(MarkerDescriptor::from)
        .collect()
}

/// Resolve a marker click to the report it points at.
///
/// A report that expired or was resolved since the last render yields `None`.
pub fn select(board: &ReportBoard, report_id: Uuid, now: DateTime<Utc>) -> Option<&Report> {
    board.get(report_id).filter(|report| report.is_active(now))
}

/// The map rendering widget; clicks come back as report ids.
pub trait MapSurface {
    fn render(
        &mut self,
        viewport: &MapViewport,
        summary: &BoardSummary,
        markers: &[MarkerDescriptor],
    );
}

/// `MapSurface` that writes the board to the log, for headless use
#[derive(Debug, Default)]
pub struct LogMapSurface;

impl MapSurface for LogMapSurface {
    fn render(
        &mut self,
        viewport: &MapViewport,
        summary: &BoardSummary,
        markers: &[MarkerDescriptor],
    ) {
        match summary.shown_label() {
            Some(shown) => tracing::info!("{} ({})", summary.headline(), shown),
            None => tracing::info!("{}", summary.headline()),
        }
        tracing::debug!(
            "Viewport {:.4},{:.4} zoom {} ({:?})",
            viewport.center.lat,
            viewport.center.lng,
            viewport.zoom,
            viewport.theme
        );

        for marker in markers {
            let icon = match marker.icon {
                MarkerIcon::Cone => "🚧",
                MarkerIcon::Emoji(emoji) => emoji,
            };
            tracing::info!(
                "{} {} at {:.5},{:.5} [{}]",
                icon,
                marker.title,
                marker.position.lat,
                marker.position.lng,
                marker.report_id
            );
        }
    }
}

/// Redraw the surface from the current board state
pub fn render_board(
    surface: &mut dyn MapSurface,
    viewport: &MapViewport,
    board: &ReportBoard,
    now: DateTime<Utc>,
) {
    let markers = markers(board, now);
    surface.render(viewport, &board.summary(now), &markers);
}
