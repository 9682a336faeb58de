//! In-memory transport for tests.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use sensor_core::{Error, Result};

use crate::GroupTransport;

/// Captures frames per group and can be told to fail or hold specific
/// groups.
#[derive(Default)]
pub struct MemoryTransport {
    frames: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
    held: Mutex<HashSet<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every delivery to `group` fail from now on.
    pub fn fail_group(&self, group: &str) {
        self.failing.lock().insert(group.to_string());
    }

    /// Marks `group` as still occupied transport-side, so release reports
    /// it non-empty.
    pub fn hold_group(&self, group: &str) {
        self.held.lock().insert(group.to_string());
    }

    /// Frames delivered to a group, oldest first.
    pub fn frames_for(&self, group: &str) -> Vec<String> {
        self.frames
            .lock()
            .iter()
            .filter(|(g, _)| g == group)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl GroupTransport for MemoryTransport {
    async fn send(&self, group: &str, payload: &str) -> Result<()> {
        if self.failing.lock().contains(group) {
            return Err(Error::fanout(group, "injected failure"));
        }
        self.frames
            .lock()
            .push((group.to_string(), payload.to_string()));
        Ok(())
    }

    async fn release(&self, group: &str) -> Result<bool> {
        if self.failing.lock().contains(group) {
            return Err(Error::fanout(group, "injected failure"));
        }
        Ok(!self.held.lock().contains(group))
    }
}
