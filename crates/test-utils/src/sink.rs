use std::sync::Mutex;

use assetwatch::alert::{Alert, AlertSink};

/// Alert sink that keeps every alert for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.alerts.lock().unwrap().clear();
    }
}

impl AlertSink for RecordingSink {
    fn notify(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}
