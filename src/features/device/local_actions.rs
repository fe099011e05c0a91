//! Per-device memory of reports this device already acted on.
//!
//! The backend has no notion of users, so "one confirmation per person" is
//! enforced here, against a small file the device keeps for itself.

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::core::error::Result;
use crate::shared::constants::{CONFIRMED_KEY, FLAGGED_KEY, RESOLVED_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Confirm,
    Resolve,
    Flag,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Confirm, ActionKind::Resolve, ActionKind::Flag];

    /// Key the ids for this action are stored under
    pub fn storage_key(&self) -> &'static str {
        match self {
            ActionKind::Confirm => CONFIRMED_KEY,
            ActionKind::Resolve => RESOLVED_KEY,
            ActionKind::Flag => FLAGGED_KEY,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Confirm => write!(f, "confirm"),
            ActionKind::Resolve => write!(f, "resolve"),
            ActionKind::Flag => write!(f, "flag"),
        }
    }
}

pub trait LocalActionStore: Send + Sync {
    fn has(&self, kind: ActionKind, report_id: Uuid) -> bool;

    fn mark(&self, kind: ActionKind, report_id: Uuid) -> Result<()>;
}

type ActionSets = HashMap<ActionKind, HashSet<Uuid>>;

/// `LocalActionStore` persisted as a JSON object of id lists
pub struct JsonFileActionStore {
    path: PathBuf,
    sets: Mutex<ActionSets>,
}

impl JsonFileActionStore {
    /// Open the record at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sets = Self::load(&path);

        tracing::debug!(
            "Local action record at {} ({} confirmed, {} resolved, {} flagged)",
            path.display(),
            sets.get(&ActionKind::Confirm).map_or(0, HashSet::len),
            sets.get(&ActionKind::Resolve).map_or(0, HashSet::len),
            sets.get(&ActionKind::Flag).map_or(0, HashSet::len),
        );

        Self {
            path,
            sets: Mutex::new(sets),
        }
    }

    fn load(path: &Path) -> ActionSets {
        let mut sets = ActionSets::new();

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return sets,
        };

        let root: Map<String, Value> = match serde_json::from_str(&raw) {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed local action record {}: {}",
                    path.display(),
                    e
                );
                return sets;
            }
        };

        for kind in ActionKind::ALL {
            let ids = root
                .get(kind.storage_key())
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(|id| Uuid::parse_str(id).ok())
                        .collect::<HashSet<_>>()
                })
                .unwrap_or_default();
            sets.insert(kind, ids);
        }

        sets
    }

    fn persist(&self, sets: &ActionSets) -> Result<()> {
        let mut root = Map::new();
        for kind in ActionKind::ALL {
            let mut ids: Vec<String> = sets
                .get(&kind)
                .map(|ids| ids.iter().map(Uuid::to_string).collect())
                .unwrap_or_default();
            ids.sort();
            root.insert(kind.storage_key().to_string(), Value::from(ids));
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a truncated record
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, Value::Object(root).to_string())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ActionSets> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalActionStore for JsonFileActionStore {
    fn has(&self, kind: ActionKind, report_id: Uuid) -> bool {
        self.lock()
            .get(&kind)
            .is_some_and(|ids| ids.contains(&report_id))
    }

    fn mark(&self, kind: ActionKind, report_id: Uuid) -> Result<()> {
        let mut sets = self.lock();
        if !sets.entry(kind).or_default().insert(report_id) {
            return Ok(());
        }
        self.persist(&sets)
    }
}
