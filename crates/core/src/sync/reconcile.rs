//! Maps a raw job result payload into per-entity `SyncResult` records.
//!
//! Three payload shapes are understood:
//! - structured: `{ fromBlock, toBlock, results: { proposals: { new, updated, removed, errors[] }, ... } }`
//! - per-entity details: `{ fromBlock, toBlock, details: [ { type, result?: { results: {...} } } ] }`
//! - legacy arrays: `{ proposals: [...], petitions: [...], ... }`, mapped to an estimate only

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::result_model::{BlockRange, EntityType, SyncResult, SyncResultStatus};

/// Errors raised while mapping a result payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Unexpected result format from sync job: {0}")]
    UnexpectedFormat(String),
}

/// How trustworthy the mapped counts are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultConfidence {
    #[default]
    Measured,
    /// Counts synthesized from raw array lengths; not a measurement.
    Estimated,
}

/// Proportions used to synthesize counts from legacy array payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyEstimate {
    pub new_percent: u64,
    pub updated_percent: u64,
}

impl Default for LegacyEstimate {
    fn default() -> Self {
        Self {
            new_percent: 30,
            updated_percent: 10,
        }
    }
}

impl LegacyEstimate {
    fn portion(len: u64, percent: u64) -> u64 {
        len.saturating_mul(percent) / 100
    }
}

/// Sums across all entity types, used for the completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncTotals {
    pub new_items: u64,
    pub updated_items: u64,
    pub removed_items: u64,
}

/// Display-ready outcome of one completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedSyncReport {
    /// Exactly one record per tracked entity type, in `EntityType::ALL` order.
    pub results: Vec<SyncResult>,
    pub block_range: Option<BlockRange>,
    pub confidence: ResultConfidence,
}

impl MappedSyncReport {
    pub fn totals(&self) -> SyncTotals {
        summarize(&self.results)
    }
}

pub fn summarize(results: &[SyncResult]) -> SyncTotals {
    results.iter().fold(SyncTotals::default(), |acc, result| SyncTotals {
        new_items: acc.new_items.saturating_add(result.new_items),
        updated_items: acc.updated_items.saturating_add(result.updated_items),
        removed_items: acc.removed_items.saturating_add(result.removed_items),
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct EntityCounts {
    new: u64,
    updated: u64,
    removed: u64,
    errors: u64,
}

impl EntityCounts {
    fn from_value(value: &Value) -> Self {
        Self {
            new: read_u64(value.get("new")).unwrap_or(0),
            updated: read_u64(value.get("updated")).unwrap_or(0),
            removed: read_u64(value.get("removed")).unwrap_or(0),
            errors: value
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| errors.len() as u64)
                .unwrap_or(0),
        }
    }

    fn into_result(self, entity: EntityType, last_block_scanned: u64) -> SyncResult {
        SyncResult {
            contract_type: entity.display_name().to_string(),
            total_items: self.new.saturating_add(self.updated),
            new_items: self.new,
            updated_items: self.updated,
            removed_items: self.removed,
            errors: self.errors,
            last_block_scanned,
            status: SyncResultStatus::Completed,
        }
    }
}

/// Reads a block height or count that may arrive as a number or numeric string.
fn read_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Maps the `result` field of `GET /api/blockchain/sync/result/{jobId}`.
pub fn map_job_result(
    raw: &Value,
    legacy: &LegacyEstimate,
) -> Result<MappedSyncReport, ReconcileError> {
    let Some(payload) = raw.as_object() else {
        return Err(ReconcileError::UnexpectedFormat(format!(
            "expected an object, got {}",
            json_kind(raw)
        )));
    };

    let from_block = read_u64(payload.get("fromBlock"));
    let to_block = read_u64(payload.get("toBlock"));
    let last_block_scanned = to_block.unwrap_or(0);
    let block_range = match (from_block, to_block) {
        (Some(from), Some(to)) => Some(BlockRange::from_heights(from, to)),
        _ => None,
    };

    let (results, confidence) = if let Some(results) = payload.get("results").and_then(Value::as_object)
    {
        debug!("Mapping structured sync result");
        let mapped = EntityType::ALL
            .iter()
            .map(|entity| {
                results
                    .get(entity.api_key())
                    .map(EntityCounts::from_value)
                    .unwrap_or_default()
                    .into_result(*entity, last_block_scanned)
            })
            .collect();
        (mapped, ResultConfidence::Measured)
    } else if let Some(details) = payload.get("details").and_then(Value::as_array) {
        debug!("Mapping per-entity sync result details ({} entries)", details.len());
        (
            map_details(details, last_block_scanned),
            ResultConfidence::Measured,
        )
    } else {
        warn!(
            "Sync result has no structured `results`; estimating counts from raw arrays (low confidence)"
        );
        (
            map_legacy_arrays(payload, legacy, last_block_scanned),
            ResultConfidence::Estimated,
        )
    };

    Ok(MappedSyncReport {
        results,
        block_range,
        confidence,
    })
}

fn map_details(details: &[Value], last_block_scanned: u64) -> Vec<SyncResult> {
    EntityType::ALL
        .iter()
        .map(|entity| {
            let entry = details.iter().find(|entry| {
                entry
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(EntityType::from_api_key)
                    == Some(*entity)
            });
            match entry.and_then(|entry| entry.get("result")).filter(|r| !r.is_null()) {
                Some(result) => result
                    .get("results")
                    .map(EntityCounts::from_value)
                    .unwrap_or_default()
                    .into_result(*entity, last_block_scanned),
                None => SyncResult {
                    errors: 1,
                    status: SyncResultStatus::Error,
                    ..SyncResult::empty(*entity, last_block_scanned)
                },
            }
        })
        .collect()
}

fn map_legacy_arrays(
    payload: &serde_json::Map<String, Value>,
    legacy: &LegacyEstimate,
    last_block_scanned: u64,
) -> Vec<SyncResult> {
    EntityType::ALL
        .iter()
        .map(|entity| {
            let len = payload
                .get(entity.api_key())
                .and_then(Value::as_array)
                .map(|items| items.len() as u64)
                .unwrap_or(0);
            SyncResult {
                total_items: len,
                new_items: LegacyEstimate::portion(len, legacy.new_percent),
                updated_items: LegacyEstimate::portion(len, legacy.updated_percent),
                status: SyncResultStatus::Completed,
                ..SyncResult::empty(*entity, last_block_scanned)
            }
        })
        .collect()
}

/// Marks retained results as failed after an unsuccessful sync.
pub fn mark_failed(results: &[SyncResult]) -> Vec<SyncResult> {
    results
        .iter()
        .map(|result| SyncResult {
            status: SyncResultStatus::Error,
            errors: result.errors.max(1),
            ..result.clone()
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_for<'a>(report: &'a MappedSyncReport, name: &str) -> &'a SyncResult {
        report
            .results
            .iter()
            .find(|r| r.contract_type == name)
            .expect("entity result")
    }

    #[test]
    fn structured_counts_exclude_removed_from_total() {
        let raw = json!({
            "fromBlock": 100,
            "toBlock": 1100,
            "results": {
                "proposals": { "new": 5, "updated": 2, "removed": 1, "errors": [] },
                "petitions": { "new": 0, "updated": 1, "removed": 0, "errors": [{ "type": "update", "error": "boom" }] }
            }
        });

        let report = map_job_result(&raw, &LegacyEstimate::default()).expect("map result");
        let proposals = result_for(&report, "Proposals");
        assert_eq!(proposals.total_items, 7);
        assert_eq!(proposals.new_items, 5);
        assert_eq!(proposals.updated_items, 2);
        assert_eq!(proposals.removed_items, 1);
        assert_eq!(proposals.errors, 0);
        assert_eq!(proposals.last_block_scanned, 1100);
        assert_eq!(proposals.status, SyncResultStatus::Completed);

        assert_eq!(result_for(&report, "Petitions").errors, 1);
        assert_eq!(report.confidence, ResultConfidence::Measured);
    }

    #[test]
    fn oversized_counts_saturate_instead_of_overflowing() {
        let raw = json!({
            "results": {
                "proposals": { "new": u64::MAX, "updated": 1, "removed": u64::MAX },
                "petitions": { "new": 1, "updated": 0, "removed": 1 }
            }
        });

        let report = map_job_result(&raw, &LegacyEstimate::default()).expect("map result");
        assert_eq!(result_for(&report, "Proposals").total_items, u64::MAX);

        let totals = report.totals();
        assert_eq!(totals.new_items, u64::MAX);
        assert_eq!(totals.updated_items, 1);
        assert_eq!(totals.removed_items, u64::MAX);
    }

    #[test]
    fn output_has_five_records_in_fixed_order() {
        let raw = json!({ "results": { "projects": { "new": 1 } } });
        let report = map_job_result(&raw, &LegacyEstimate::default()).expect("map result");
        let names: Vec<&str> = report
            .results
            .iter()
            .map(|r| r.contract_type.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Proposals", "Petitions", "Reports", "Policies", "Projects"]
        );
        assert!(report
            .results
            .iter()
            .all(|r| r.status == SyncResultStatus::Completed));
    }

    #[test]
    fn legacy_arrays_fall_back_to_estimate() {
        let items: Vec<Value> = (0..10).map(|i| json!({ "id": i })).collect();
        let raw = json!({ "proposals": items });

        let report = map_job_result(&raw, &LegacyEstimate::default()).expect("map legacy");
        let proposals = result_for(&report, "Proposals");
        assert_eq!(proposals.total_items, 10);
        assert_eq!(proposals.new_items, 3);
        assert_eq!(proposals.updated_items, 1);
        assert_eq!(report.confidence, ResultConfidence::Estimated);
        assert_eq!(result_for(&report, "Reports").total_items, 0);
    }

    #[test]
    fn legacy_estimate_ratios_are_configurable() {
        let items: Vec<Value> = (0..20).map(|i| json!(i)).collect();
        let raw = json!({ "reports": items });
        let legacy = LegacyEstimate {
            new_percent: 50,
            updated_percent: 25,
        };
        let report = map_job_result(&raw, &legacy).expect("map legacy");
        let reports = result_for(&report, "Reports");
        assert_eq!(reports.new_items, 10);
        assert_eq!(reports.updated_items, 5);
    }

    #[test]
    fn details_shape_marks_missing_results_as_errors() {
        let raw = json!({
            "fromBlock": "10",
            "toBlock": "20",
            "details": [
                { "type": "proposals", "result": { "results": { "new": 2, "updated": 3, "removed": 0, "errors": [] } } },
                { "type": "petitions", "result": null },
                { "type": "users", "result": { "removed": 4, "errors": [] } }
            ]
        });
        let report = map_job_result(&raw, &LegacyEstimate::default()).expect("map details");

        let proposals = result_for(&report, "Proposals");
        assert_eq!(proposals.total_items, 5);
        assert_eq!(proposals.status, SyncResultStatus::Completed);

        let petitions = result_for(&report, "Petitions");
        assert_eq!(petitions.status, SyncResultStatus::Error);
        assert_eq!(petitions.errors, 1);

        assert_eq!(result_for(&report, "Policies").status, SyncResultStatus::Error);
        assert_eq!(report.results.len(), 5);
        assert_eq!(report.block_range.as_ref().map(|r| r.total), Some(10));
    }

    #[test]
    fn block_range_omitted_unless_both_heights_present() {
        let raw = json!({ "toBlock": 500, "results": {} });
        let report = map_job_result(&raw, &LegacyEstimate::default()).expect("map result");
        assert!(report.block_range.is_none());
        assert_eq!(report.results[0].last_block_scanned, 500);

        let raw = json!({ "fromBlock": 0, "toBlock": 7200, "results": {} });
        let report = map_job_result(&raw, &LegacyEstimate::default()).expect("map result");
        let range = report.block_range.expect("block range");
        assert_eq!(range.total, 7200);
        assert_eq!(range.time_range, "1 day 0h");
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = map_job_result(&Value::Null, &LegacyEstimate::default())
            .expect_err("null payload rejected");
        assert!(matches!(err, ReconcileError::UnexpectedFormat(_)));
    }

    #[test]
    fn totals_sum_all_entities() {
        let raw = json!({
            "results": {
                "proposals": { "new": 5, "updated": 2, "removed": 1 },
                "policies": { "new": 1, "updated": 0, "removed": 3 }
            }
        });
        let totals = map_job_result(&raw, &LegacyEstimate::default())
            .expect("map result")
            .totals();
        assert_eq!(
            totals,
            SyncTotals {
                new_items: 6,
                updated_items: 2,
                removed_items: 4
            }
        );
    }

    #[test]
    fn mark_failed_keeps_counts_and_flags_errors() {
        let retained = vec![SyncResult {
            contract_type: "Projects".to_string(),
            total_items: 4,
            new_items: 4,
            status: SyncResultStatus::Completed,
            ..SyncResult::default()
        }];
        let failed = mark_failed(&retained);
        assert_eq!(failed[0].total_items, 4);
        assert_eq!(failed[0].errors, 1);
        assert_eq!(failed[0].status, SyncResultStatus::Error);
    }
}
