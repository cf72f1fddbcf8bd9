use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::JobPriority;

/// Lane-resident job counts per priority (scheduled jobs excluded)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth(BTreeMap<JobPriority, usize>);

impl QueueDepth {
    pub(crate) fn set(&mut self, priority: JobPriority, count: usize) {
        self.0.insert(priority, count);
    }

    /// Count for one priority (0 if the lane is empty)
    pub fn get(&self, priority: JobPriority) -> usize {
        self.0.get(&priority).copied().unwrap_or(0)
    }

    /// Count across all lanes
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Iterate `(priority, count)` from low to high
    pub fn iter(&self) -> impl Iterator<Item = (JobPriority, usize)> + '_ {
        self.0.iter().map(|(p, c)| (*p, *c))
    }
}
