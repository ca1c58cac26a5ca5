//! Offset/limit page descriptors, independent of any storage cursor.
//!
//! A list query without a descriptor is unpaged: it returns everything in
//! the default order. Free-text search is the exception and always gets a
//! window (see [`PageRequest::for_search`]).

use std::cmp::Ordering;

use crate::engine::EngineError;
use crate::limits::DEFAULT_SEARCH_LIMIT;
use crate::model::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    StartDate,
    Name,
    DisplayName,
    CreatedAt,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub direction: Direction,
}

impl Sort {
    pub const fn asc(key: SortKey) -> Self {
        Self {
            key,
            direction: Direction::Asc,
        }
    }

    pub const fn desc(key: SortKey) -> Self {
        Self {
            key,
            direction: Direction::Desc,
        }
    }
}

/// Natural order of each listing when no descriptor overrides it.
pub mod order {
    use super::{Sort, SortKey};

    pub const LEAVES: Sort = Sort::desc(SortKey::StartDate);
    pub const USERS: Sort = Sort::asc(SortKey::DisplayName);
    pub const GROUPS: Sort = Sort::asc(SortKey::Name);
    pub const FAVORITES: Sort = Sort::desc(SortKey::CreatedAt);
    pub const HISTORY: Sort = Sort::desc(SortKey::Timestamp);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    offset: usize,
    limit: usize,
    sort: Sort,
}

impl PageRequest {
    /// Fails with `InvalidPageRequest` when `offset < 0` or `limit < 1`.
    pub fn new(offset: i64, limit: i64, sort: Sort) -> Result<Self, EngineError> {
        if offset < 0 {
            return Err(EngineError::InvalidPageRequest("offset must not be negative"));
        }
        if limit < 1 {
            return Err(EngineError::InvalidPageRequest("limit must be greater than zero"));
        }
        let offset = usize::try_from(offset)
            .map_err(|_| EngineError::InvalidPageRequest("offset out of range"))?;
        let limit = usize::try_from(limit)
            .map_err(|_| EngineError::InvalidPageRequest("limit out of range"))?;
        Ok(Self { offset, limit, sort })
    }

    /// Caller-supplied paging parameters. No limit means unpaged; a missing offset is 0.
    pub fn from_params(
        limit: Option<i64>,
        offset: Option<i64>,
        sort: Sort,
    ) -> Result<Option<Self>, EngineError> {
        match limit {
            None => Ok(None),
            Some(limit) => Self::new(offset.unwrap_or(0), limit, sort).map(Some),
        }
    }

    /// Like [`from_params`](Self::from_params) but a missing limit falls back to
    /// `DEFAULT_SEARCH_LIMIT`, since search results are potentially large.
    pub fn for_search(limit: Option<i64>, offset: Option<i64>, sort: Sort) -> Result<Self, EngineError> {
        Self::new(
            offset.unwrap_or(0),
            limit.unwrap_or(DEFAULT_SEARCH_LIMIT as i64),
            sort,
        )
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    /// Display only.
    pub fn page_number(&self) -> usize {
        self.offset / self.limit
    }

    pub fn has_previous(&self) -> bool {
        self.offset > 0
    }

    pub fn first(&self) -> Self {
        Self { offset: 0, ..*self }
    }

    pub fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            ..*self
        }
    }

    pub fn previous_or_first(&self) -> Self {
        match self.offset.checked_sub(self.limit) {
            Some(offset) => Self { offset, ..*self },
            None => self.first(),
        }
    }

    /// Slice an already sorted result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// Records that can be ordered by a [`SortKey`]. Keys that don't apply compare equal
/// and fall through to the id tie-break.
pub trait Sortable {
    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering;
    fn sort_id(&self) -> &str;
}

/// Sort by key and direction, then by id ascending so equal keys page deterministically.
pub fn sort_records<T: Sortable>(items: &mut [T], sort: Sort) {
    items.sort_by(|a, b| {
        let primary = match sort.direction {
            Direction::Asc => a.compare_by(b, sort.key),
            Direction::Desc => b.compare_by(a, sort.key),
        };
        primary.then_with(|| a.sort_id().cmp(b.sort_id()))
    });
}

/// Order with the page's sort (or `default_sort` when unpaged), then slice.
pub fn paginate<T: Sortable>(mut items: Vec<T>, default_sort: Sort, page: Option<&PageRequest>) -> Vec<T> {
    match page {
        Some(page) => {
            sort_records(&mut items, page.sort());
            page.slice(items)
        }
        None => {
            sort_records(&mut items, default_sort);
            items
        }
    }
}

impl Sortable for LeaveRecord {
    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::StartDate => self.start.cmp(&other.start),
            _ => Ordering::Equal,
        }
    }

    fn sort_id(&self) -> &str {
        &self.id
    }
}

impl Sortable for User {
    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::DisplayName | SortKey::Name => self.display_name.cmp(&other.display_name),
            _ => Ordering::Equal,
        }
    }

    fn sort_id(&self) -> &str {
        &self.id
    }
}

impl Sortable for Group {
    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Name | SortKey::DisplayName => self.name.cmp(&other.name),
            _ => Ordering::Equal,
        }
    }

    fn sort_id(&self) -> &str {
        &self.id
    }
}

impl Sortable for FavoriteEntry {
    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::CreatedAt | SortKey::Timestamp => self.created_at.cmp(&other.created_at),
            _ => Ordering::Equal,
        }
    }

    fn sort_id(&self) -> &str {
        &self.id
    }
}

impl Sortable for ViewHistoryEntry {
    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Timestamp | SortKey::CreatedAt => self.timestamp.cmp(&other.timestamp),
            SortKey::Name | SortKey::DisplayName => self.name.cmp(&other.name),
            SortKey::StartDate => Ordering::Equal,
        }
    }

    fn sort_id(&self) -> &str {
        &self.id
    }
}
