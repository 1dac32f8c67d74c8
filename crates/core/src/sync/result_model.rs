//! Client-side display and persistence records for sync outcomes.

use serde::{Deserialize, Serialize};

use super::chain_sync_scheduler::AVERAGE_BLOCK_TIME_SECS;

/// Entity types mirrored from on-chain events, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Proposals,
    Petitions,
    Reports,
    Policies,
    Projects,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Proposals,
        EntityType::Petitions,
        EntityType::Reports,
        EntityType::Policies,
        EntityType::Projects,
    ];

    /// Key used by the orchestrator result payload and the REST list endpoints.
    pub fn api_key(&self) -> &'static str {
        match self {
            EntityType::Proposals => "proposals",
            EntityType::Petitions => "petitions",
            EntityType::Reports => "reports",
            EntityType::Policies => "policies",
            EntityType::Projects => "projects",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EntityType::Proposals => "Proposals",
            EntityType::Petitions => "Petitions",
            EntityType::Reports => "Reports",
            EntityType::Policies => "Policies",
            EntityType::Projects => "Projects",
        }
    }

    /// Path of the list endpoint used for count-only display.
    pub fn list_path(&self) -> String {
        format!("/api/{}", self.api_key())
    }

    pub fn from_api_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|entity| entity.api_key().eq_ignore_ascii_case(key))
    }
}

/// Outcome status of one entity type within a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResultStatus {
    #[default]
    Pending,
    Completed,
    Error,
}

/// Per-entity-type reconciliation counts.
///
/// `total_items` counts new plus updated records; removals are reported
/// separately in `removed_items` and never folded into the total.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncResult {
    pub contract_type: String,
    pub total_items: u64,
    pub new_items: u64,
    pub updated_items: u64,
    pub removed_items: u64,
    pub errors: u64,
    pub last_block_scanned: u64,
    pub status: SyncResultStatus,
}

impl SyncResult {
    pub fn empty(entity: EntityType, last_block_scanned: u64) -> Self {
        Self {
            contract_type: entity.display_name().to_string(),
            last_block_scanned,
            ..Self::default()
        }
    }
}

/// Span of block heights scanned by one job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
    pub total: u64,
    pub time_range: String,
}

impl BlockRange {
    pub fn from_heights(from: u64, to: u64) -> Self {
        let total = to.saturating_sub(from);
        Self {
            from,
            to,
            total,
            time_range: format_time_range(total),
        }
    }
}

/// Formats the wall-clock estimate of a block span.
///
/// Spans of a full day or more are bucketed as `"<d> day(s) <h>h"`, spans of
/// at least an hour as `"<h>h <m>m"`, anything shorter as `"<m> minute(s)"`.
pub fn format_time_range(block_count: u64) -> String {
    let total_seconds = block_count.saturating_mul(AVERAGE_BLOCK_TIME_SECS);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;

    if hours >= 24 {
        let days = hours / 24;
        let remaining_hours = hours % 24;
        format!("{} day{} {}h", days, plural(days), remaining_hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{} minute{}", minutes, plural(minutes))
    }
}

/// Only counts above one take the plural, so an empty span reads "0 minute".
fn plural(count: u64) -> &'static str {
    if count > 1 {
        "s"
    } else {
        ""
    }
}

/// Record counts per entity type, read straight from the list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbStats {
    pub petitions: usize,
    pub proposals: usize,
    pub reports: usize,
    pub policies: usize,
    pub projects: usize,
}

impl DbStats {
    pub fn get(&self, entity: EntityType) -> usize {
        match entity {
            EntityType::Proposals => self.proposals,
            EntityType::Petitions => self.petitions,
            EntityType::Reports => self.reports,
            EntityType::Policies => self.policies,
            EntityType::Projects => self.projects,
        }
    }

    pub fn set(&mut self, entity: EntityType, count: usize) {
        match entity {
            EntityType::Proposals => self.proposals = count,
            EntityType::Petitions => self.petitions = count,
            EntityType::Reports => self.reports = count,
            EntityType::Policies => self.policies = count,
            EntityType::Projects => self.projects = count,
        }
    }

    pub fn total(&self) -> usize {
        EntityType::ALL
            .iter()
            .map(|entity| self.get(*entity))
            .sum()
    }
}
