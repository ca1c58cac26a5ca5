use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Unix milliseconds. Used for recency timestamps only; leave dates are calendar days.
pub type Ms = i64;

/// Inclusive date filter `[from, to]`. A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub const UNBOUNDED: DateRange = DateRange { from: None, to: None };

    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Inclusive on both ends: a leave starting on `to` or ending on `from` overlaps.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.to.is_none_or(|to| start <= to) && self.from.is_none_or(|from| end >= from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeaveSource {
    Hr,
    Outlook,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeaveStatus {
    Approved,
    Pending,
    Rejected,
}

/// One leave interval owned by a user. `start <= end`, both inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRecord {
    pub id: String,
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: LeaveSource,
    pub status: LeaveStatus,
    pub note: Option<String>,
}

impl LeaveRecord {
    pub fn overlaps(&self, range: &DateRange) -> bool {
        range.overlaps(self.start, self.end)
    }

    /// New value with changed dates and note. Editing always sends the record back to review.
    pub fn edited(&self, start: NaiveDate, end: NaiveDate, note: Option<String>) -> Self {
        Self {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            start,
            end,
            source: self.source,
            status: LeaveStatus::Pending,
            note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub employee_id: String,
    pub display_name: String,
    pub email: String,
    /// ISO country code, e.g. `CN`, `US`.
    pub country: String,
    pub avatar: Option<String>,
    pub team_id: Option<String>,
    pub ad_principal_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TeamType {
    Pod,
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Team {
        team_type: TeamType,
        created_by: Option<String>,
    },
    Pod,
}

/// A team or a pod: a named set of member user ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub kind: GroupKind,
    pub member_ids: BTreeSet<String>,
}

impl Group {
    pub fn team_type(&self) -> Option<TeamType> {
        match &self.kind {
            GroupKind::Team { team_type, .. } => Some(*team_type),
            GroupKind::Pod => None,
        }
    }

    pub fn created_by(&self) -> Option<&str> {
        match &self.kind {
            GroupKind::Team { created_by, .. } => created_by.as_deref(),
            GroupKind::Pod => None,
        }
    }

    pub fn group_ref(&self) -> GroupRef {
        match self.kind {
            GroupKind::Team { .. } => GroupRef::Team(self.id.clone()),
            GroupKind::Pod => GroupRef::Pod(self.id.clone()),
        }
    }
}

/// Identity of a group lookup. Teams and pods live in separate id spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupRef {
    Team(String),
    Pod(String),
}

impl GroupRef {
    pub fn id(&self) -> &str {
        match self {
            GroupRef::Team(id) | GroupRef::Pod(id) => id,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            GroupRef::Team(_) => "team",
            GroupRef::Pod(_) => "pod",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    pub id: String,
    pub user_id: String,
    pub team_id: String,
    pub created_at: Ms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViewType {
    User,
    Team,
    Pod,
}

impl ViewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::User => "USER",
            ViewType::Team => "TEAM",
            ViewType::Pod => "POD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownViewType(pub String);

impl fmt::Display for UnknownViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown view type: {}", self.0)
    }
}

impl std::error::Error for UnknownViewType {}

impl FromStr for ViewType {
    type Err = UnknownViewType;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(ViewType::User),
            "TEAM" => Ok(ViewType::Team),
            "POD" => Ok(ViewType::Pod),
            _ => Err(UnknownViewType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub item_type: ViewType,
    /// Display name captured at view time.
    pub name: String,
    pub timestamp: Ms,
}

impl ViewHistoryEntry {
    pub fn refreshed(&self, name: String, timestamp: Ms) -> Self {
        Self {
            name,
            timestamp,
            ..self.clone()
        }
    }
}

/// One member of a group paired with their matching leaves (possibly none).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLeaves {
    pub user: User,
    pub leaves: Vec<LeaveRecord>,
}

/// All leaves of one user, sorted by `start`.
#[derive(Debug, Clone, Default)]
pub struct UserLeaves {
    pub leaves: Vec<LeaveRecord>,
}

impl UserLeaves {
    /// Insert maintaining sort order by start date.
    pub fn insert(&mut self, leave: LeaveRecord) {
        let pos = self
            .leaves
            .binary_search_by_key(&leave.start, |l| l.start)
            .unwrap_or_else(|e| e);
        self.leaves.insert(pos, leave);
    }

    pub fn remove(&mut self, id: &str) -> Option<LeaveRecord> {
        let pos = self.leaves.iter().position(|l| l.id == id)?;
        Some(self.leaves.remove(pos))
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaves overlapping `range`. Binary search skips everything starting after `range.to`.
    pub fn overlapping(&self, range: DateRange) -> impl Iterator<Item = &LeaveRecord> {
        let right_bound = match range.to {
            Some(to) => self.leaves.partition_point(|l| l.start <= to),
            None => self.leaves.len(),
        };
        self.leaves[..right_bound]
            .iter()
            .filter(move |l| range.from.is_none_or(|from| l.end >= from))
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    UserSaved { user: User },
    GroupSaved { group: Group },
    GroupDeleted { group: GroupRef },
    LeaveSaved { leave: LeaveRecord },
    LeaveDeleted { id: String, user_id: String },
    FavoriteCreated { entry: FavoriteEntry },
    FavoriteDeleted { user_id: String, team_id: String },
    ViewRecorded { entry: ViewHistoryEntry },
}
