//! Common test utilities for integration tests.
//!
//! Everything runs in-process: a hand-driven position provider stands in
//! for the device and the in-memory backend records every call.

// Not every suite uses every helper.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use fake::faker::name::en::Name;
use fake::Fake;

use domain::models::{InstallationStatus, LocationSample, LocationUpdate, PaymentStatus, WorkItem};
use fieldtech_agent::backend::MockBackend;
use fieldtech_agent::config::TrackingConfig;
use fieldtech_agent::positioning::{BatteryProbe, ManualPositionProvider};
use fieldtech_agent::tracking::{LocationTrackingService, Subscription};

pub const TECHNICIAN_ID: i64 = 7;

/// Tracking service wired to a manual provider and a mock backend.
pub struct TrackingHarness {
    pub provider: Arc<ManualPositionProvider>,
    pub backend: Arc<MockBackend>,
    pub tracker: LocationTrackingService,
}

impl TrackingHarness {
    pub fn new() -> Self {
        Self::with_battery(None)
    }

    pub fn with_battery(battery: Option<Arc<dyn BatteryProbe>>) -> Self {
        let provider = Arc::new(ManualPositionProvider::new());
        let backend = Arc::new(MockBackend::new());
        let tracker = LocationTrackingService::new(
            provider.clone(),
            backend.clone(),
            battery,
            TrackingConfig::default(),
        );
        Self {
            provider,
            backend,
            tracker,
        }
    }

    /// Queue a first fix and start tracking.
    pub async fn start(&self) -> LocationSample {
        let first = bogota();
        self.provider.queue_fix(Ok(first.clone()));
        assert!(self.tracker.start_tracking(TECHNICIAN_ID).await);
        first
    }
}

/// Collects every update a subscriber receives.
pub fn record_updates(
    tracker: &LocationTrackingService,
) -> (Arc<Mutex<Vec<LocationUpdate>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = tracker.on_location_update(move |update| {
        sink.lock().unwrap().push(update.clone());
    });
    (seen, subscription)
}

/// Let spawned tasks run without moving the paused clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub fn bogota() -> LocationSample {
    LocationSample::new(4.6097, -74.0817).with_accuracy(8.0)
}

pub fn sample(latitude: f64, longitude: f64) -> LocationSample {
    LocationSample::new(latitude, longitude)
}

pub struct FixedBattery(pub i32);

#[async_trait]
impl BatteryProbe for FixedBattery {
    async fn battery_level(&self) -> anyhow::Result<i32> {
        Ok(self.0)
    }
}

pub struct BrokenBattery;

#[async_trait]
impl BatteryProbe for BrokenBattery {
    async fn battery_level(&self) -> anyhow::Result<i32> {
        anyhow::bail!("battery API unavailable")
    }
}

/// Agenda entry with a random customer name.
pub fn work_item(
    id: i64,
    city: Option<&str>,
    time: Option<&str>,
    status: InstallationStatus,
) -> WorkItem {
    WorkItem {
        id,
        lead_name: Name().fake(),
        lead_phone: "3001234567".to_string(),
        product_name: "Cerradura Digital".to_string(),
        product_model: "ZK-200".to_string(),
        product_image: None,
        scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        scheduled_time: time.map(str::to_string),
        address: format!("Calle {} # 10-20", id),
        city: city.map(str::to_string),
        address_notes: None,
        status,
        payment_status: PaymentStatus::Pending,
        total_price: 450_000.0,
        amount_paid: 0.0,
        customer_notes: None,
    }
}
