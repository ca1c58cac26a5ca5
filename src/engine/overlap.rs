use crate::limits::MAX_IN_CLAUSE_IDS;
use crate::model::*;
use crate::page::PageRequest;

use super::{observed, Engine, EngineError};

impl Engine {
    /// Leaves owned by `user_ids` that overlap `range`, start date descending.
    ///
    /// Both bounds are inclusive and independently optional, so a leave that
    /// starts on `range.to` or ends on `range.from` qualifies. An empty id
    /// list selects nothing.
    pub async fn leaves_in_range(
        &self,
        user_ids: &[String],
        range: DateRange,
        page: Option<&PageRequest>,
    ) -> Result<Vec<LeaveRecord>, EngineError> {
        observed("leaves_in_range", async {
            if user_ids.len() > MAX_IN_CLAUSE_IDS {
                return Err(EngineError::LimitExceeded("too many user ids"));
            }
            if user_ids.is_empty() {
                return Ok(Vec::new());
            }
            Ok(self
                .store
                .leaves_for_users_in_range(user_ids, range, page)
                .await?)
        })
        .await
    }

    pub async fn leaves_for_user(
        &self,
        user_id: &str,
        range: DateRange,
        page: Option<&PageRequest>,
    ) -> Result<Vec<LeaveRecord>, EngineError> {
        self.leaves_in_range(&[user_id.to_string()], range, page).await
    }

    /// Every leave of one user, no date bound.
    pub async fn my_leaves(&self, user_id: &str) -> Result<Vec<LeaveRecord>, EngineError> {
        Ok(self.store.leaves_by_user(user_id).await?)
    }
}
