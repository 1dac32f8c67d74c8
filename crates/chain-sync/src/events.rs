//! Notifications emitted by the sync pipeline for the UI layer.

use civic_ledger_core::sync::{ResultConfidence, SyncTotals};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Started {
        job_id: String,
    },
    Progress {
        job_id: String,
        progress: u8,
        message: String,
    },
    Completed {
        job_id: String,
        totals: SyncTotals,
        confidence: ResultConfidence,
    },
    Failed {
        message: String,
    },
    Cleared,
}

impl SyncEvent {
    /// Title/description pair shown as a toast.
    pub fn notification(&self) -> Option<(&'static str, String)> {
        match self {
            SyncEvent::Completed { totals, .. } => Some((
                "Sync Completed",
                format!(
                    "Successfully synced blockchain data. {} new, {} updated, {} removed.",
                    totals.new_items, totals.updated_items, totals.removed_items
                ),
            )),
            SyncEvent::Failed { message } => Some((
                "Sync Failed",
                format!("Blockchain sync failed: {}", message),
            )),
            SyncEvent::Cleared => Some((
                "Sync Data Cleared",
                "All sync results have been cleared.".to_string(),
            )),
            SyncEvent::Started { .. } | SyncEvent::Progress { .. } => None,
        }
    }
}

pub trait SyncEventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl SyncEventSink for NoopEventSink {
    fn emit(&self, _event: SyncEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_notification_reports_totals() {
        let event = SyncEvent::Completed {
            job_id: "job-1".to_string(),
            totals: SyncTotals {
                new_items: 6,
                updated_items: 2,
                removed_items: 1,
            },
            confidence: ResultConfidence::Measured,
        };
        let (title, body) = event.notification().expect("notification");
        assert_eq!(title, "Sync Completed");
        assert_eq!(
            body,
            "Successfully synced blockchain data. 6 new, 2 updated, 1 removed."
        );
    }

    #[test]
    fn progress_events_are_silent() {
        let event = SyncEvent::Progress {
            job_id: "job-1".to_string(),
            progress: 40,
            message: "Scanning".to_string(),
        };
        assert!(event.notification().is_none());
    }
}
