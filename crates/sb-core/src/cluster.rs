use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClusterId, ItemId};

/// Output of the periodic clustering job: a connected component of related
/// ready items, summarized and topic-labeled.
///
/// Consumed by the external digest builder; signalbrief produces this as
/// a plain data record with no owning behavior of its own, since rendering
/// is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: ClusterId,
    pub topic: String,
    pub summary: String,
    /// Arena-style membership by id rather than back-pointers from `Item`,
    /// per DESIGN NOTES on cyclic data.
    pub item_ids: Vec<ItemId>,
    pub created_at: DateTime<Utc>,
}

impl ClusterSummary {
    #[must_use]
    pub fn new(topic: String, summary: String, item_ids: Vec<ItemId>) -> Self {
        Self {
            id: ClusterId::new(),
            topic,
            summary,
            item_ids,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_holds_member_ids_not_back_pointers() {
        let members = vec![ItemId::new(), ItemId::new()];
        let cluster = ClusterSummary::new("topic".into(), "summary".into(), members.clone());
        assert_eq!(cluster.item_ids, members);
    }
}
