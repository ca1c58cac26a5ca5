use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard, RwLock};
use tracing::info;

use crate::model::*;
use crate::page::{order, paginate, PageRequest};
use crate::wal::Wal;

use super::writer::{wal_writer_loop, WalCommand};
use super::{Store, StoreError};

type FavoriteKey = (String, String);
type HistoryKey = (String, String, ViewType);

/// Number of key-lock shards. Two keys sharing a shard only serialize.
const KEY_LOCK_SHARDS: usize = 64;

/// Row counts, for startup logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub users: usize,
    pub teams: usize,
    pub pods: usize,
    pub leaves: usize,
    pub favorites: usize,
    pub history: usize,
}

/// `dashmap`-backed tables. Durable when opened on a WAL path: every mutation is
/// appended (group commit) before it is applied, and the log is replayed on open.
pub struct MemoryStore {
    users: DashMap<String, User>,
    teams: DashMap<String, Group>,
    pods: DashMap<String, Group>,
    leaves: DashMap<String, LeaveRecord>,
    /// Owner → start-sorted leaves, for range queries.
    leaves_by_user: DashMap<String, UserLeaves>,
    favorites: DashMap<FavoriteKey, FavoriteEntry>,
    history: DashMap<HistoryKey, ViewHistoryEntry>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
    /// Writers hold it shared across append+apply; compaction holds it exclusively
    /// so the snapshot can't miss an event that is already in the log.
    compaction_gate: RwLock<()>,
    /// Sharded per-key write locks, held across check+append+apply so that
    /// writes to one row reach the WAL and the tables in the same order.
    key_locks: Box<[Mutex<()>]>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store; nothing survives the process.
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            teams: DashMap::new(),
            pods: DashMap::new(),
            leaves: DashMap::new(),
            leaves_by_user: DashMap::new(),
            favorites: DashMap::new(),
            history: DashMap::new(),
            wal_tx: None,
            compaction_gate: RwLock::new(()),
            key_locks: (0..KEY_LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Replay the WAL at `wal_path` and spawn its writer task. Must run inside a tokio runtime.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut store = Self::new();
        store.wal_tx = Some(wal_tx);
        for event in &events {
            store.apply(event);
        }
        info!(
            "replayed {} events from {}: {:?}",
            events.len(),
            wal_path.display(),
            store.stats()
        );
        Ok(store)
    }

    pub fn is_durable(&self) -> bool {
        self.wal_tx.is_some()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            users: self.users.len(),
            teams: self.teams.len(),
            pods: self.pods.len(),
            leaves: self.leaves.len(),
            favorites: self.favorites.len(),
            history: self.history.len(),
        }
    }

    fn apply(&self, event: &Event) {
        match event {
            Event::UserSaved { user } => {
                self.users.insert(user.id.clone(), user.clone());
            }
            Event::GroupSaved { group } => {
                let table = match group.kind {
                    GroupKind::Team { .. } => &self.teams,
                    GroupKind::Pod => &self.pods,
                };
                table.insert(group.id.clone(), group.clone());
            }
            Event::GroupDeleted { group } => {
                self.group_table(group).remove(group.id());
            }
            Event::LeaveSaved { leave } => {
                if let Some(prev) = self.leaves.insert(leave.id.clone(), leave.clone()) {
                    self.unindex_leave(&prev.user_id, &prev.id);
                }
                self.leaves_by_user
                    .entry(leave.user_id.clone())
                    .or_default()
                    .insert(leave.clone());
            }
            Event::LeaveDeleted { id, user_id } => {
                self.leaves.remove(id);
                self.unindex_leave(user_id, id);
            }
            Event::FavoriteCreated { entry } => {
                self.favorites
                    .insert((entry.user_id.clone(), entry.team_id.clone()), entry.clone());
            }
            Event::FavoriteDeleted { user_id, team_id } => {
                self.favorites.remove(&(user_id.clone(), team_id.clone()));
            }
            Event::ViewRecorded { entry } => {
                let key = (entry.user_id.clone(), entry.item_id.clone(), entry.item_type);
                self.history.insert(key, entry.clone());
            }
        }
    }

    fn unindex_leave(&self, user_id: &str, id: &str) {
        let now_empty = match self.leaves_by_user.get_mut(user_id) {
            Some(mut index) => {
                index.remove(id);
                index.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.leaves_by_user.remove_if(user_id, |_, index| index.is_empty());
        }
    }

    fn group_table(&self, group: &GroupRef) -> &DashMap<String, Group> {
        match group {
            GroupRef::Team(_) => &self.teams,
            GroupRef::Pod(_) => &self.pods,
        }
    }

    async fn lock_key(&self, key: impl Hash) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let shard = (hasher.finish() % KEY_LOCK_SHARDS as u64) as usize;
        self.key_locks[shard].lock().await
    }

    /// Append to the WAL (if durable), then apply. Callers hold the row's key lock.
    async fn persist(&self, event: Event) -> Result<(), StoreError> {
        let _gate = self.compaction_gate.read().await;
        if let Some(wal_tx) = &self.wal_tx {
            let (tx, rx) = oneshot::channel();
            wal_tx
                .send(WalCommand::Append {
                    event: event.clone(),
                    response: tx,
                })
                .await
                .map_err(|_| StoreError::WriterClosed)?;
            rx.await
                .map_err(|_| StoreError::WriterClosed)?
                .map_err(|e| StoreError::Wal(e.to_string()))?;
        }
        self.apply(&event);
        Ok(())
    }

    /// Minimal event list that recreates the current tables.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();
        events.extend(self.users.iter().map(|e| Event::UserSaved { user: e.value().clone() }));
        events.extend(self.teams.iter().map(|e| Event::GroupSaved { group: e.value().clone() }));
        events.extend(self.pods.iter().map(|e| Event::GroupSaved { group: e.value().clone() }));
        events.extend(self.leaves.iter().map(|e| Event::LeaveSaved { leave: e.value().clone() }));
        events.extend(
            self.favorites
                .iter()
                .map(|e| Event::FavoriteCreated { entry: e.value().clone() }),
        );
        events.extend(
            self.history
                .iter()
                .map(|e| Event::ViewRecorded { entry: e.value().clone() }),
        );
        events
    }

    /// Rewrite the WAL from a snapshot. No-op for a volatile store.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let _gate = self.compaction_gate.write().await;
        let events = self.snapshot();
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        rx.await
            .map_err(|_| StoreError::WriterClosed)?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let Some(wal_tx) = &self.wal_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    fn collect_groups(
        table: &DashMap<String, Group>,
        page: Option<&PageRequest>,
        keep: impl Fn(&Group) -> bool,
    ) -> Vec<Group> {
        let rows: Vec<Group> = table
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect();
        paginate(rows, order::GROUPS, page)
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Order-preserving dedup.
fn unique<'a>(ids: &'a [String]) -> impl Iterator<Item = &'a String> {
    let mut seen = HashSet::new();
    ids.iter().filter(move |&id| seen.insert(id.as_str()))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id).map(|e| e.value().clone()))
    }

    async fn users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StoreError> {
        Ok(unique(ids)
            .filter_map(|id| self.users.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn list_users(&self, page: Option<&PageRequest>) -> Result<Vec<User>, StoreError> {
        let rows = self.users.iter().map(|e| e.value().clone()).collect();
        Ok(paginate(rows, order::USERS, page))
    }

    async fn search_users(&self, query: &str, page: Option<&PageRequest>) -> Result<Vec<User>, StoreError> {
        let needle = query.to_lowercase();
        let rows = self
            .users
            .iter()
            .filter(|e| {
                let u = e.value();
                contains_ignore_case(&u.display_name, &needle)
                    || contains_ignore_case(&u.email, &needle)
                    || contains_ignore_case(&u.employee_id, &needle)
            })
            .map(|e| e.value().clone())
            .collect();
        Ok(paginate(rows, order::USERS, page))
    }

    async fn save_user(&self, user: User) -> Result<User, StoreError> {
        let _key = self.lock_key(("user", &user.id)).await;
        self.persist(Event::UserSaved { user: user.clone() }).await?;
        Ok(user)
    }

    async fn get_group(&self, group: &GroupRef) -> Result<Option<Group>, StoreError> {
        Ok(self.group_table(group).get(group.id()).map(|e| e.value().clone()))
    }

    async fn teams_by_ids(&self, ids: &[String]) -> Result<Vec<Group>, StoreError> {
        Ok(unique(ids)
            .filter_map(|id| self.teams.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn list_teams(&self, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        Ok(Self::collect_groups(&self.teams, page, |_| true))
    }

    async fn search_teams(&self, query: &str, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        let needle = query.to_lowercase();
        Ok(Self::collect_groups(&self.teams, page, |g| {
            contains_ignore_case(&g.name, &needle)
        }))
    }

    async fn teams_by_type(
        &self,
        team_type: TeamType,
        page: Option<&PageRequest>,
    ) -> Result<Vec<Group>, StoreError> {
        Ok(Self::collect_groups(&self.teams, page, |g| {
            g.team_type() == Some(team_type)
        }))
    }

    async fn teams_by_creator(&self, created_by: &str, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        Ok(Self::collect_groups(&self.teams, page, |g| {
            g.created_by() == Some(created_by)
        }))
    }

    async fn teams_by_type_and_creator(
        &self,
        team_type: TeamType,
        created_by: &str,
        page: Option<&PageRequest>,
    ) -> Result<Vec<Group>, StoreError> {
        Ok(Self::collect_groups(&self.teams, page, |g| {
            g.team_type() == Some(team_type) && g.created_by() == Some(created_by)
        }))
    }

    async fn list_pods(&self, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        Ok(Self::collect_groups(&self.pods, page, |_| true))
    }

    async fn search_pods(&self, query: &str, page: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        let needle = query.to_lowercase();
        Ok(Self::collect_groups(&self.pods, page, |g| {
            contains_ignore_case(&g.name, &needle)
        }))
    }

    async fn save_group(&self, group: Group) -> Result<Group, StoreError> {
        let table = match group.kind {
            GroupKind::Team { .. } => "team",
            GroupKind::Pod => "pod",
        };
        let _key = self.lock_key((table, &group.id)).await;
        self.persist(Event::GroupSaved { group: group.clone() }).await?;
        Ok(group)
    }

    async fn delete_group(&self, group: &GroupRef) -> Result<bool, StoreError> {
        let table = match group {
            GroupRef::Team(_) => "team",
            GroupRef::Pod(_) => "pod",
        };
        let _key = self.lock_key((table, group.id())).await;
        if !self.group_table(group).contains_key(group.id()) {
            return Ok(false);
        }
        self.persist(Event::GroupDeleted { group: group.clone() }).await?;
        Ok(true)
    }

    async fn get_leave(&self, id: &str) -> Result<Option<LeaveRecord>, StoreError> {
        Ok(self.leaves.get(id).map(|e| e.value().clone()))
    }

    async fn leaves_by_user(&self, user_id: &str) -> Result<Vec<LeaveRecord>, StoreError> {
        let rows = self
            .leaves_by_user
            .get(user_id)
            .map(|index| index.leaves.clone())
            .unwrap_or_default();
        Ok(paginate(rows, order::LEAVES, None))
    }

    async fn leaves_for_users_in_range(
        &self,
        user_ids: &[String],
        range: DateRange,
        page: Option<&PageRequest>,
    ) -> Result<Vec<LeaveRecord>, StoreError> {
        let mut rows = Vec::new();
        for user_id in unique(user_ids) {
            if let Some(index) = self.leaves_by_user.get(user_id) {
                rows.extend(index.overlapping(range).cloned());
            }
        }
        Ok(paginate(rows, order::LEAVES, page))
    }

    async fn list_leaves(&self, page: Option<&PageRequest>) -> Result<Vec<LeaveRecord>, StoreError> {
        let rows = self.leaves.iter().map(|e| e.value().clone()).collect();
        Ok(paginate(rows, order::LEAVES, page))
    }

    async fn save_leave(&self, leave: LeaveRecord) -> Result<LeaveRecord, StoreError> {
        let _key = self.lock_key(("leave", &leave.id)).await;
        self.persist(Event::LeaveSaved { leave: leave.clone() }).await?;
        Ok(leave)
    }

    async fn delete_leave(&self, id: &str) -> Result<bool, StoreError> {
        let _key = self.lock_key(("leave", id)).await;
        let Some(user_id) = self.leaves.get(id).map(|e| e.value().user_id.clone()) else {
            return Ok(false);
        };
        self.persist(Event::LeaveDeleted {
            id: id.to_string(),
            user_id,
        })
        .await?;
        Ok(true)
    }

    async fn get_favorite(&self, user_id: &str, team_id: &str) -> Result<Option<FavoriteEntry>, StoreError> {
        let key = (user_id.to_string(), team_id.to_string());
        Ok(self.favorites.get(&key).map(|e| e.value().clone()))
    }

    async fn create_favorite(&self, entry: FavoriteEntry) -> Result<FavoriteEntry, StoreError> {
        let _key = self.lock_key(("favorite", &entry.user_id, &entry.team_id)).await;
        self.persist(Event::FavoriteCreated { entry: entry.clone() }).await?;
        Ok(entry)
    }

    async fn delete_favorite(&self, user_id: &str, team_id: &str) -> Result<bool, StoreError> {
        let _key = self.lock_key(("favorite", user_id, team_id)).await;
        let key = (user_id.to_string(), team_id.to_string());
        if !self.favorites.contains_key(&key) {
            return Ok(false);
        }
        self.persist(Event::FavoriteDeleted {
            user_id: key.0,
            team_id: key.1,
        })
        .await?;
        Ok(true)
    }

    async fn favorites_by_user(
        &self,
        user_id: &str,
        page: Option<&PageRequest>,
    ) -> Result<Vec<FavoriteEntry>, StoreError> {
        let rows = self
            .favorites
            .iter()
            .filter(|e| e.key().0 == user_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(paginate(rows, order::FAVORITES, page))
    }

    async fn get_view_history(
        &self,
        user_id: &str,
        item_id: &str,
        item_type: ViewType,
    ) -> Result<Option<ViewHistoryEntry>, StoreError> {
        let key = (user_id.to_string(), item_id.to_string(), item_type);
        Ok(self.history.get(&key).map(|e| e.value().clone()))
    }

    async fn upsert_view_history(&self, entry: ViewHistoryEntry) -> Result<ViewHistoryEntry, StoreError> {
        let _key = self
            .lock_key(("view", &entry.user_id, &entry.item_id, entry.item_type))
            .await;
        self.persist(Event::ViewRecorded { entry: entry.clone() }).await?;
        Ok(entry)
    }

    async fn view_history_by_user(
        &self,
        user_id: &str,
        page: Option<&PageRequest>,
    ) -> Result<Vec<ViewHistoryEntry>, StoreError> {
        let rows = self
            .history
            .iter()
            .filter(|e| e.key().0 == user_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(paginate(rows, order::HISTORY, page))
    }
}
