use tracing::debug;

use crate::limits::DEFAULT_HISTORY_LIMIT;
use crate::model::*;
use crate::page::{order, PageRequest};

use super::{observed, Engine, EngineError};

fn is_blank(user_id: &str) -> bool {
    user_id.trim().is_empty()
}

impl Engine {
    /// Flip the (user, team) favorite and return the user's favorite team ids,
    /// most recent first.
    ///
    /// A re-added favorite gets a fresh timestamp, so whatever was toggled last
    /// sits at the top. The timestamp is bumped past the user's newest entry
    /// when the clock has not advanced.
    pub async fn toggle_favorite(&self, user_id: &str, team_id: &str) -> Result<Vec<String>, EngineError> {
        observed("toggle_favorite", async {
            if self.store.get_favorite(user_id, team_id).await?.is_some() {
                self.store.delete_favorite(user_id, team_id).await?;
                debug!("unfavorite {user_id} -> {team_id}");
            } else {
                let newest = self
                    .store
                    .favorites_by_user(user_id, None)
                    .await?
                    .first()
                    .map(|f| f.created_at);
                let now = self.now();
                let created_at = match newest {
                    Some(newest) if newest >= now => newest + 1,
                    _ => now,
                };
                let entry = FavoriteEntry {
                    id: Engine::new_id(),
                    user_id: user_id.to_string(),
                    team_id: team_id.to_string(),
                    created_at,
                };
                self.store.create_favorite(entry).await?;
                debug!("favorite {user_id} -> {team_id} at {created_at}");
            }

            let favorites = self.store.favorites_by_user(user_id, None).await?;
            Ok(favorites.into_iter().map(|f| f.team_id).collect())
        })
        .await
    }

    /// No limit returns every favorite.
    pub async fn favorites(
        &self,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<FavoriteEntry>, EngineError> {
        observed("favorites", async {
            let page = PageRequest::from_params(limit, offset, order::FAVORITES)?;
            if is_blank(user_id) {
                return Ok(Vec::new());
            }
            Ok(self.store.favorites_by_user(user_id, page.as_ref()).await?)
        })
        .await
    }

    /// Upsert keyed by (user, item, type): refresh name and timestamp if present.
    /// A missing name is stored as empty.
    pub async fn record_view(
        &self,
        user_id: &str,
        item_id: &str,
        item_type: ViewType,
        name: Option<String>,
    ) -> Result<ViewHistoryEntry, EngineError> {
        observed("record_view", async {
            let name = name.unwrap_or_default();
            let now = self.now();
            let entry = match self.store.get_view_history(user_id, item_id, item_type).await? {
                Some(existing) => existing.refreshed(name, now),
                None => ViewHistoryEntry {
                    id: Engine::new_id(),
                    user_id: user_id.to_string(),
                    item_id: item_id.to_string(),
                    item_type,
                    name,
                    timestamp: now,
                },
            };
            debug!(
                "view {user_id} -> {} {item_id} at {now}",
                item_type.as_str()
            );
            Ok(self.store.upsert_view_history(entry).await?)
        })
        .await
    }

    /// No limit returns the most recent `DEFAULT_HISTORY_LIMIT` entries.
    pub async fn view_history(
        &self,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ViewHistoryEntry>, EngineError> {
        observed("view_history", async {
            let page = PageRequest::new(
                offset.unwrap_or(0),
                limit.unwrap_or(DEFAULT_HISTORY_LIMIT as i64),
                order::HISTORY,
            )?;
            if is_blank(user_id) {
                return Ok(Vec::new());
            }
            Ok(self.store.view_history_by_user(user_id, Some(&page)).await?)
        })
        .await
    }
}
