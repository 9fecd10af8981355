//! In-memory audit trail of operator actions against devices
//!
//! Bounded: once full, the oldest entry is evicted. Nothing is persisted.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::security::Operator;

/// Maximum number of retained entries
pub const AUDIT_CAPACITY: usize = 1000;

/// One recorded operator action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operator: String,
    pub device_id: String,
    pub action: String,
    /// sha256 hex of the JSON payload, if the action carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hash: Option<String>,
}

/// Ring buffer of [`AuditEntry`]
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(AUDIT_CAPACITY)
    }
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log retaining at most `capacity` entries (minimum 1)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(AUDIT_CAPACITY))),
            capacity,
        }
    }

    /// Record an action and return the stored entry
    pub fn record(
        &self,
        operator: &Operator,
        device_id: &str,
        action: &str,
        payload: Option<&Value>,
    ) -> AuditEntry {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operator: operator.username().to_string(),
            device_id: device_id.to_string(),
            action: action.to_string(),
            payload_hash: payload.map(payload_hash),
        };

        tracing::info!(
            operator = %entry.operator,
            device_id = %entry.device_id,
            action = %entry.action,
            "audit"
        );

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        entry
    }

    /// Up to `limit` entries, newest first
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().rev().take(limit).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// sha256 hex digest of a JSON value's compact serialization
#[must_use]
pub fn payload_hash(payload: &Value) -> String {
    hex::encode(Sha256::digest(payload.to_string().as_bytes()))
}
