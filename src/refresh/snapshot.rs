//! Snapshot documents and job reports

use crate::upstream::GameRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `category/YYYY-MM`
pub fn snapshot_key(category: &str, month: &str) -> String {
    format!("{category}/{month}")
}

/// Month label used for snapshot keys
pub fn month_of(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// An item whose details could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub id: String,
    pub error: String,
}

/// The refreshed top-N listing of one category for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySnapshot {
    pub category: String,
    pub month: String,
    pub games: Vec<GameRecord>,
    pub total_games: usize,
    pub failed_items: Vec<FailedItem>,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOutcome {
    pub category: String,
    pub status: CategoryStatus,
    pub games: usize,
    pub failed_items: usize,
    pub error: Option<String>,
}

/// Result of one bulk refresh run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub month: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub categories: Vec<CategoryOutcome>,
}

impl RefreshReport {
    pub fn total_games(&self) -> usize {
        self.categories.iter().map(|c| c.games).sum()
    }

    pub fn failed_categories(&self) -> usize {
        self.categories
            .iter()
            .filter(|c| c.status == CategoryStatus::Failed)
            .count()
    }

    pub fn outcome(&self, category: &str) -> Option<&CategoryOutcome> {
        self.categories.iter().find(|c| c.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_key_uses_month() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(snapshot_key("thematic", &month_of(at)), "thematic/2024-03");
    }
}
