use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::AccountId;

/// One outbound call, for usage accounting. Append-only; never mutated.
///
/// Short-circuited calls (an active rate-limit pause) are recorded too, with
/// the synthetic status the gateway reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointCallRecord {
    pub account_id: AccountId,
    pub endpoint: String,
    pub method: String,
    pub status: u16,
    pub at: DateTime<Utc>,
}

/// Sink for endpoint call records. The state store implements this over its
/// append-only call log; tests use [`NullRecorder`] or a memory recorder.
pub trait CallRecorder: Send + Sync {
    fn record_call(&self, record: EndpointCallRecord);
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NullRecorder;

impl CallRecorder for NullRecorder {
    fn record_call(&self, _record: EndpointCallRecord) {}
}

/// Keeps records in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<EndpointCallRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EndpointCallRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl CallRecorder for MemoryRecorder {
    fn record_call(&self, record: EndpointCallRecord) {
        self.records.lock().push(record);
    }
}
