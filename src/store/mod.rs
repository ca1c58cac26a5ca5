//! Persistence collaborator: one method per access pattern.
//!
//! Listing methods take an optional [`PageRequest`]. Without one they return
//! the full result in the pattern's natural order; with one they sort by the
//! descriptor's key (id as tie-break) and slice.

mod memory;
mod writer;

pub use memory::{MemoryStore, StoreStats};

use async_trait::async_trait;

use crate::model::*;
use crate::page::PageRequest;

#[derive(Debug)]
pub enum StoreError {
    Wal(String),
    WriterClosed,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
            StoreError::WriterClosed => write!(f, "WAL writer shut down"),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait Store: Send + Sync {
    // ── Users ────────────────────────────────────────────────

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Unknown ids are silently omitted. Input order, duplicates removed.
    async fn users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StoreError>;

    async fn list_users(&self, page: Option<&PageRequest>) -> Result<Vec<User>, StoreError>;

    /// Case-insensitive substring over display name, email and employee id.
    async fn search_users(&self, query: &str, page: Option<&PageRequest>) -> Result<Vec<User>, StoreError>;

    async fn save_user(&self, user: User) -> Result<User, StoreError>;

    // ── Teams & pods ─────────────────────────────────────────

    async fn get_group(&self, group: &GroupRef) -> Result<Option<Group>, StoreError>;

    async fn teams_by_ids(&self, ids: &[String]) -> Result<Vec<Group>, StoreError>;

    async fn list_teams(&self, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError>;

    async fn search_teams(&self, query: &str, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError>;

    async fn teams_by_type(
        &self,
        team_type: TeamType,
        page: Option<&PageRequest>,
    ) -> Result<Vec<Group>, StoreError>;

    async fn teams_by_creator(&self, created_by: &str, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError>;

    async fn teams_by_type_and_creator(
        &self,
        team_type: TeamType,
        created_by: &str,
        page: Option<&PageRequest>,
    ) -> Result<Vec<Group>, StoreError>;

    async fn list_pods(&self, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError>;

    async fn search_pods(&self, query: &str, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError>;

    async fn save_group(&self, group: Group) -> Result<Group, StoreError>;

    /// Returns whether anything was removed.
    async fn delete_group(&self, group: &GroupRef) -> Result<bool, StoreError>;

    // ── Leaves ───────────────────────────────────────────────

    async fn get_leave(&self, id: &str) -> Result<Option<LeaveRecord>, StoreError>;

    async fn leaves_by_user(&self, user_id: &str) -> Result<Vec<LeaveRecord>, StoreError>;

    /// Leaves of `user_ids` overlapping `range` (inclusive on both ends).
    async fn leaves_for_users_in_range(
        &self,
        user_ids: &[String],
        range: DateRange,
        page: Option<&PageRequest>,
    ) -> Result<Vec<LeaveRecord>, StoreError>;

    async fn list_leaves(&self, page: Option<&PageRequest>) -> Result<Vec<LeaveRecord>, StoreError>;

    async fn save_leave(&self, leave: LeaveRecord) -> Result<LeaveRecord, StoreError>;

    async fn delete_leave(&self, id: &str) -> Result<bool, StoreError>;

    // ── Favorites ────────────────────────────────────────────

    async fn get_favorite(&self, user_id: &str, team_id: &str) -> Result<Option<FavoriteEntry>, StoreError>;

    async fn create_favorite(&self, entry: FavoriteEntry) -> Result<FavoriteEntry, StoreError>;

    async fn delete_favorite(&self, user_id: &str, team_id: &str) -> Result<bool, StoreError>;

    /// Most recent first.
    async fn favorites_by_user(
        &self,
        user_id: &str,
        page: Option<&PageRequest>,
    ) -> Result<Vec<FavoriteEntry>, StoreError>;

    // ── View history ─────────────────────────────────────────

    async fn get_view_history(
        &self,
        user_id: &str,
        item_id: &str,
        item_type: ViewType,
    ) -> Result<Option<ViewHistoryEntry>, StoreError>;

    /// Insert or replace the entry keyed by (user, item, type).
    async fn upsert_view_history(&self, entry: ViewHistoryEntry) -> Result<ViewHistoryEntry, StoreError>;

    /// Most recent first.
    async fn view_history_by_user(
        &self,
        user_id: &str,
        page: Option<&PageRequest>,
    ) -> Result<Vec<ViewHistoryEntry>, StoreError>;
}
