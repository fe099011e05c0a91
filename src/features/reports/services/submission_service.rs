use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::features::device::{request_fix, FixOptions, LocationError, LocationProvider};
use crate::features::reports::models::{Coordinates, NewReport, ObjectCategory, Report};
use crate::features::reports::services::ReportRepository;
use crate::modules::imaging::{ImageNormalizer, NormalizeError};
use crate::modules::storage::PhotoStorage;
use crate::shared::constants::{PHOTO_EXTENSION, REPORT_SUBMITTED_MESSAGE};

/// Draft held while the user is mid-flow; never persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSubmission {
    pub location: Coordinates,
    pub category: ObjectCategory,
}

/// Where the submission flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    /// `attempt` ties a pending fix to the `start` call that asked for it
    Locating {
        attempt: u64,
    },
    AwaitingCategory {
        location: Coordinates,
    },
    AwaitingPhoto {
        draft: PendingSubmission,
    },
    Uploading {
        draft: PendingSubmission,
    },
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Locating { .. } => "locating",
            SubmissionState::AwaitingCategory { .. } => "awaiting_category",
            SubmissionState::AwaitingPhoto { .. } => "awaiting_photo",
            SubmissionState::Uploading { .. } => "uploading",
        }
    }
}

/// A photo picked or captured by the user
#[derive(Debug, Clone)]
pub struct PhotoInput {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoInput {
    pub fn is_image(&self) -> bool {
        self.content_type.trim().to_ascii_lowercase().starts_with("image/")
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("'{0}' is not an image")]
    NotAnImage(String),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("photo upload failed: {0}")]
    Upload(#[source] AppError),

    #[error("report insert failed: {0}")]
    Insert(#[source] AppError),

    #[error("cannot {action} while {state}")]
    OutOfStep {
        action: &'static str,
        state: &'static str,
    },
}

impl SubmissionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmissionError::Location(e) => e.user_message(),
            SubmissionError::NotAnImage(_) => "Please choose an image.",
            SubmissionError::Normalize(_) => "Could not process that photo. Try another image.",
            SubmissionError::Upload(_) => {
                "Upload failed. Make sure the \"photos\" bucket exists and allows uploads."
            }
            SubmissionError::Insert(_) => "Could not save report. Try again.",
            SubmissionError::OutOfStep { .. } => "Finish or cancel the current report first.",
        }
    }
}

/// Successful submission
#[derive(Debug, Clone)]
pub struct Submitted {
    pub report: Report,
}

impl Submitted {
    pub fn message(&self) -> &'static str {
        REPORT_SUBMITTED_MESSAGE
    }
}

/// Returns the flow to `Idle` when dropped while armed.
///
/// With `attempt` set, only a flow still locating for that attempt is reset.
struct ResetOnExit<'a> {
    state: &'a Mutex<SubmissionState>,
    attempt: Option<u64>,
    armed: bool,
}

impl ResetOnExit<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ResetOnExit<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let owned = match self.attempt {
            Some(attempt) => *state == SubmissionState::Locating { attempt },
            None => true,
        };
        if owned {
            *state = SubmissionState::Idle;
        }
    }
}

/// The "locate → pick category → attach photo → upload" flow.
///
/// Only one submission runs per instance: requests to start while the flow is
/// not idle are ignored.
pub struct SubmissionFlow {
    state: Mutex<SubmissionState>,
    attempts: AtomicU64,
    location: Arc<dyn LocationProvider>,
    photos: Arc<dyn PhotoStorage>,
    repository: Arc<dyn ReportRepository>,
    normalizer: ImageNormalizer,
    fix_options: FixOptions,
}

impl SubmissionFlow {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        photos: Arc<dyn PhotoStorage>,
        repository: Arc<dyn ReportRepository>,
        normalizer: ImageNormalizer,
        fix_options: FixOptions,
    ) -> Self {
        Self {
            state: Mutex::new(SubmissionState::Idle),
            attempts: AtomicU64::new(0),
            location,
            photos,
            repository,
            normalizer,
            fix_options,
        }
    }

    pub fn state(&self) -> SubmissionState {
        *self.lock_state()
    }

    /// Begin a report by requesting a location fix.
    ///
    /// `Ok(None)` means the request was ignored because a submission is
    /// already under way, or that it was cancelled before the fix arrived.
    pub async fn start(&self) -> Result<Option<Coordinates>, SubmissionError> {
        let attempt = {
            let mut state = self.lock_state();
            if *state != SubmissionState::Idle {
                tracing::debug!("Ignoring new report while {}", state.name());
                return Ok(None);
            }
            let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
            *state = SubmissionState::Locating { attempt };
            attempt
        };

        let reset = ResetOnExit {
            state: &self.state,
            attempt: Some(attempt),
            armed: true,
        };

        let fix = request_fix(self.location.as_ref(), &self.fix_options).await;

        let mut state = self.lock_state();
        if *state != (SubmissionState::Locating { attempt }) {
            // Cancelled while the fix was pending; a newer attempt may own the flow
            tracing::debug!("Discarding location fix for cancelled attempt {}", attempt);
            reset.disarm();
            return Ok(None);
        }

        let location = match fix {
            Ok(location) => location,
            Err(e) => {
                tracing::info!("Location fix failed: {}", e);
                *state = SubmissionState::Idle;
                reset.disarm();
                return Err(e.into());
            }
        };
        *state = SubmissionState::AwaitingCategory { location };
        reset.disarm();

        tracing::info!("Located at {:.5},{:.5}", location.lat, location.lng);
        Ok(Some(location))
    }

    /// Pick what is blocking the spot; the flow then waits for a photo.
    pub fn choose_category(&self, category: ObjectCategory) -> Result<(), SubmissionError> {
        let mut state = self.lock_state();
        match *state {
            SubmissionState::AwaitingCategory { location } => {
                *state = SubmissionState::AwaitingPhoto {
                    draft: PendingSubmission { location, category },
                };
                Ok(())
            }
            other => Err(SubmissionError::OutOfStep {
                action: "choose a category",
                state: other.name(),
            }),
        }
    }

    /// Abandon the draft. Has no effect once the upload has started.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock_state();
        match *state {
            SubmissionState::Uploading { .. } => false,
            SubmissionState::Idle => true,
            _ => {
                tracing::debug!("Submission cancelled while {}", state.name());
                *state = SubmissionState::Idle;
                true
            }
        }
    }

    /// Hand over the photo and run the upload to completion.
    ///
    /// `None` (the user dismissed the picker) leaves the flow waiting for a
    /// photo. Any failure discards the draft and returns the flow to idle.
    pub async fn attach_photo(
        &self,
        photo: Option<PhotoInput>,
    ) -> Result<Option<Submitted>, SubmissionError> {
        let Some(photo) = photo else {
            return Ok(None);
        };

        let draft = {
            let mut state = self.lock_state();
            match *state {
                SubmissionState::AwaitingPhoto { draft } => {
                    *state = SubmissionState::Uploading { draft };
                    draft
                }
                other => {
                    return Err(SubmissionError::OutOfStep {
                        action: "attach a photo",
                        state: other.name(),
                    })
                }
            }
        };

        let _reset = ResetOnExit {
            state: &self.state,
            attempt: None,
            armed: true,
        };

        match self.upload(draft, photo).await {
            Ok(report) => {
                tracing::info!("Report {} submitted ({})", report.id, draft.category);
                Ok(Some(Submitted { report }))
            }
            Err(e) => {
                tracing::warn!("Submission failed: {}", e);
                Err(e)
            }
        }
    }

    async fn upload(
        &self,
        draft: PendingSubmission,
        photo: PhotoInput,
    ) -> Result<Report, SubmissionError> {
        if !photo.is_image() {
            return Err(SubmissionError::NotAnImage(photo.file_name));
        }

        let normalizer = self.normalizer;
        let bytes = photo.bytes;
        let normalized = tokio::task::spawn_blocking(move || normalizer.normalize(&bytes))
            .await
            .map_err(|e| {
                SubmissionError::Upload(AppError::Internal(format!(
                    "Photo normalization task failed: {}",
                    e
                )))
            })??;

        let key = format!("{}.{}", Uuid::new_v4(), PHOTO_EXTENSION);
        let photo_url = self
            .photos
            .upload(&key, normalized.bytes, normalized.content_type)
            .await
            .map_err(|e| SubmissionError::Upload(e.logged()))?;

        let new_report = NewReport {
            lat: draft.location.lat,
            lng: draft.location.lng,
            photo_url,
            city: None,
            object_type: draft.category,
        };

        self.repository
            .insert(&new_report)
            .await
            .map_err(SubmissionError::Insert)
    }

    fn lock_state(&self) -> MutexGuard<'_, SubmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
