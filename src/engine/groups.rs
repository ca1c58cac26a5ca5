use std::collections::HashMap;

use tracing::debug;

use crate::model::*;

use super::{observed, Engine, EngineError};

impl Engine {
    /// Per-member leave view of a team or pod.
    ///
    /// One entry per resolvable member, including members with no matching
    /// leave. Unknown group → `NotFound`; a group with no members → empty list.
    pub async fn group_leaves(
        &self,
        group: &GroupRef,
        range: DateRange,
    ) -> Result<Vec<MemberLeaves>, EngineError> {
        observed("group_leaves", async {
            let resolved = self
                .store
                .get_group(group)
                .await?
                .ok_or_else(|| EngineError::not_found(group.kind_label(), group.id()))?;

            if resolved.member_ids.is_empty() {
                return Ok(Vec::new());
            }

            let member_ids: Vec<String> = resolved.member_ids.iter().cloned().collect();
            let (members, leaves) = tokio::try_join!(
                self.store.users_by_ids(&member_ids),
                self.store.leaves_for_users_in_range(&member_ids, range, None),
            )?;

            if members.len() < member_ids.len() {
                debug!(
                    "{} {}: {} of {} member ids did not resolve",
                    group.kind_label(),
                    group.id(),
                    member_ids.len() - members.len(),
                    member_ids.len()
                );
            }
            Ok(group_by_member(members, leaves))
        })
        .await
    }

    pub async fn team_leaves(&self, team_id: &str, range: DateRange) -> Result<Vec<MemberLeaves>, EngineError> {
        self.group_leaves(&GroupRef::Team(team_id.to_string()), range).await
    }

    pub async fn pod_leaves(&self, pod_id: &str, range: DateRange) -> Result<Vec<MemberLeaves>, EngineError> {
        self.group_leaves(&GroupRef::Pod(pod_id.to_string()), range).await
    }
}

/// Pair each member with the leaves they own, keeping the leaves' incoming order.
///
/// Members come out sorted by display name, then id. Leaves whose owner is not
/// among `members` are dropped.
pub fn group_by_member(mut members: Vec<User>, leaves: Vec<LeaveRecord>) -> Vec<MemberLeaves> {
    members.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut by_owner: HashMap<String, Vec<LeaveRecord>> = HashMap::new();
    for leave in leaves {
        by_owner.entry(leave.user_id.clone()).or_default().push(leave);
    }

    let grouped: Vec<MemberLeaves> = members
        .into_iter()
        .map(|user| {
            let leaves = by_owner.remove(&user.id).unwrap_or_default();
            MemberLeaves { user, leaves }
        })
        .collect();

    if !by_owner.is_empty() {
        debug!("dropped leaves of {} non-member owners", by_owner.len());
    }
    grouped
}
