// =============================================================================
// REPORT LIFETIME
// =============================================================================

/// NOTIFY channel the `reports` trigger publishes on; the migration hardcodes it
pub const REPORTS_CHANGE_CHANNEL: &str = "reports_changes";

/// Hours a fresh report stays visible before it expires
pub const BASE_TTL_HOURS: i64 = 48;

/// Hours added to a report's expiry by each confirmation
pub const CONFIRM_BONUS_HOURS: i64 = 2;

// =============================================================================
// LOCAL ACTION RECORD KEYS
// =============================================================================

pub const CONFIRMED_KEY: &str = "nosavesies_confirmed";
pub const RESOLVED_KEY: &str = "nosavesies_resolved";
pub const FLAGGED_KEY: &str = "nosavesies_flagged";

// =============================================================================
// USER-FACING MESSAGES
// =============================================================================

pub const REPORT_SUBMITTED_MESSAGE: &str = "Savesie reported! 🚧";
pub const CONFIRMED_MESSAGE: &str = "Thanks for confirming!";
pub const RESOLVED_MESSAGE: &str = "Marked as resolved. Thanks!";
pub const FLAGGED_MESSAGE: &str = "Report flagged. Thanks!";

/// Shown whenever reverse geocoding cannot produce an address
pub const ADDRESS_UNAVAILABLE: &str = "Address unavailable";

/// Title for markers whose report carries no category
pub const DEFAULT_MARKER_TITLE: &str = "savesie";

/// Content type every normalized photo is uploaded with
pub const PHOTO_CONTENT_TYPE: &str = "image/jpeg";
pub const PHOTO_EXTENSION: &str = "jpg";
