//! In-memory stand-ins for the remote store, object storage and device
//! capabilities, shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fake::Fake;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::device::{
    ActionKind, FixOptions, LocalActionStore, LocationError, LocationFix, LocationProvider,
};
use crate::features::reports::models::{base_ttl, Coordinates, NewReport, ObjectCategory, Report};
use crate::features::reports::services::{
    ChangeEvent, ChangeFeed, ChangeHandler, ChangeSubscription, ReportRepository, ReverseGeocoder,
};
use crate::modules::storage::PhotoStorage;

/// A live report somewhere around Philadelphia
pub fn sample_report(category: ObjectCategory) -> Report {
    let now = Utc::now();
    Report {
        id: Uuid::new_v4(),
        lat: (39.90..40.00).fake(),
        lng: (-75.25..-75.10).fake(),
        photo_url: format!("http://localhost:9000/photos/{}.jpg", Uuid::new_v4()),
        city: None,
        object_type: Some(category),
        created_at: now,
        expires_at: now + base_ttl(),
        confirmations: 0,
        resolved: false,
    }
}

/// Tiny valid PNG for submission flows
pub fn sample_png() -> Vec<u8> {
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    let buffer = ImageBuffer::from_pixel(16, 12, Rgb([255u8, 107, 0]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(buffer)
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Shared in-memory report store; clones see the same rows, like two devices
/// talking to one backend.
#[derive(Clone)]
pub struct InMemoryRepository {
    rows: Arc<Mutex<Vec<Report>>>,
    flags: Arc<Mutex<Vec<Uuid>>>,
    changes: broadcast::Sender<ChangeEvent>,
    calls: Arc<AtomicUsize>,
    fail_writes: Arc<Mutex<bool>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            flags: Arc::new(Mutex::new(Vec::new())),
            changes,
            calls: Arc::new(AtomicUsize::new(0)),
            fail_writes: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_reports(reports: Vec<Report>) -> Self {
        let repository = Self::new();
        *repository.rows.lock().unwrap() = reports;
        repository
    }

    /// Number of store operations issued so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn row(&self, id: Uuid) -> Option<Report> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    pub fn flags_for(&self, id: Uuid) -> usize {
        self.flags.lock().unwrap().iter().filter(|f| **f == id).count()
    }

    pub fn reject_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    fn begin_write(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            return Err(AppError::Storage("write rejected".to_string()));
        }
        Ok(())
    }

    fn publish(&self, event: ChangeEvent) {
        let _ = self.changes.send(event);
    }
}

#[async_trait]
impl ReportRepository for InMemoryRepository {
    async fn list_active(&self) -> Result<Vec<Report>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.expires_at > now && !r.resolved)
            .cloned()
            .collect())
    }

    async fn insert(&self, report: &NewReport) -> Result<Report> {
        self.begin_write()?;
        let now = Utc::now();
        let row = Report {
            id: Uuid::new_v4(),
            lat: report.lat,
            lng: report.lng,
            photo_url: report.photo_url.clone(),
            city: report.city.clone(),
            object_type: Some(report.object_type),
            created_at: now,
            expires_at: now + base_ttl(),
            confirmations: 0,
            resolved: false,
        };
        self.rows.lock().unwrap().push(row.clone());
        self.publish(ChangeEvent::Insert);
        Ok(row)
    }

    async fn update_resolved(&self, id: Uuid) -> Result<()> {
        self.begin_write()?;
        {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;
            row.resolved = true;
        }
        self.publish(ChangeEvent::Update);
        Ok(())
    }

    async fn update_confirm(
        &self,
        id: Uuid,
        confirmations: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.begin_write()?;
        {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;
            row.confirmations = confirmations;
            row.expires_at = expires_at;
        }
        self.publish(ChangeEvent::Update);
        Ok(())
    }

    async fn insert_flag(&self, report_id: Uuid) -> Result<()> {
        self.begin_write()?;
        self.flags.lock().unwrap().push(report_id);
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryRepository {
    async fn on_change(&self, handler: ChangeHandler) -> Result<ChangeSubscription> {
        let mut receiver = self.changes.subscribe();
        let task = tokio::spawn(async move {
            while let Ok(event) = receiver.recv().await {
                handler(event);
            }
        });
        Ok(ChangeSubscription::new(task))
    }
}

/// Object storage keeping bytes in memory, addressable by the returned URL
#[derive(Clone, Default)]
pub struct InMemoryPhotoStorage {
    objects: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    reject: bool,
}

impl InMemoryPhotoStorage {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn fetch(&self, url: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().unwrap().get(url).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl PhotoStorage for InMemoryPhotoStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        if self.reject {
            return Err(AppError::Storage("bucket rejected upload".to_string()));
        }
        let url = format!("http://localhost:9000/photos/{}", key);
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&url) {
            return Err(AppError::Storage(format!("'{}' already exists", key)));
        }
        objects.insert(url.clone(), (data, content_type.to_string()));
        Ok(url)
    }
}

#[derive(Default)]
pub struct MemoryActionStore {
    marked: Mutex<HashSet<(ActionKind, Uuid)>>,
}

impl LocalActionStore for MemoryActionStore {
    fn has(&self, kind: ActionKind, report_id: Uuid) -> bool {
        self.marked.lock().unwrap().contains(&(kind, report_id))
    }

    fn mark(&self, kind: ActionKind, report_id: Uuid) -> Result<()> {
        self.marked.lock().unwrap().insert((kind, report_id));
        Ok(())
    }
}

/// Location capability returning a fixed answer
pub struct StubLocation(pub std::result::Result<Coordinates, LocationError>);

impl StubLocation {
    pub fn at(lat: f64, lng: f64) -> Self {
        Self(Ok(Coordinates { lat, lng }))
    }
}

#[async_trait]
impl LocationProvider for StubLocation {
    async fn current_fix(
        &self,
        _options: &FixOptions,
    ) -> std::result::Result<LocationFix, LocationError> {
        self.0.map(LocationFix::now)
    }
}

pub struct StubGeocoder(pub Option<String>);

#[async_trait]
impl ReverseGeocoder for StubGeocoder {
    async fn reverse(&self, _at: Coordinates) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}

pub struct FailingGeocoder;

#[async_trait]
impl ReverseGeocoder for FailingGeocoder {
    async fn reverse(&self, _at: Coordinates) -> Result<Option<String>> {
        Err(AppError::ExternalServiceError("geocoder offline".to_string()))
    }
}
