pub mod detail;
pub mod markers;

pub use detail::{load_detail, time_ago, ReportDetail};
pub use markers::{
    markers, render_board, select, LogMapSurface, MapSurface, MapTheme, MapViewport,
    MarkerDescriptor, MarkerIcon,
};
