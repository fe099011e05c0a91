use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of object left in the parking spot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    Chair,
    TrashCan,
    Cone,
    Other,
}

impl ObjectCategory {
    pub const ALL: [ObjectCategory; 4] = [
        ObjectCategory::Chair,
        ObjectCategory::TrashCan,
        ObjectCategory::Cone,
        ObjectCategory::Other,
    ];

    /// Value stored in the `object_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectCategory::Chair => "chair",
            ObjectCategory::TrashCan => "trash_can",
            ObjectCategory::Cone => "cone",
            ObjectCategory::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ObjectCategory::Chair => "Chair",
            ObjectCategory::TrashCan => "Trash Can",
            ObjectCategory::Cone => "Cone",
            ObjectCategory::Other => "Other",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ObjectCategory::Chair => "🪑",
            ObjectCategory::TrashCan => "🗑️",
            ObjectCategory::Cone => "🚧",
            ObjectCategory::Other => "📦",
        }
    }
}

impl std::fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown object type: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for ObjectCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "trash-can" shows up in hand-written input; the column uses the underscore form
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "chair" => Ok(ObjectCategory::Chair),
            "trash_can" => Ok(ObjectCategory::TrashCan),
            "cone" => Ok(ObjectCategory::Cone),
            "other" => Ok(ObjectCategory::Other),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}
