use chrono::NaiveDate;
use tracing::debug;

use crate::limits::MAX_NOTE_LEN;
use crate::model::*;
use crate::page::PageRequest;

use super::{observed, Engine, EngineError};

#[derive(Debug, Clone)]
pub struct NewLeave {
    /// Generated when absent.
    pub id: Option<String>,
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: LeaveSource,
    pub status: LeaveStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LeaveEdit {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LeaveQuery {
    pub user_ids: Vec<String>,
    pub range: DateRange,
    pub page: Option<PageRequest>,
}

fn validate(start: NaiveDate, end: NaiveDate, note: Option<&str>) -> Result<(), EngineError> {
    if start > end {
        return Err(EngineError::InvalidInterval { start, end });
    }
    if note.is_some_and(|n| n.len() > MAX_NOTE_LEN) {
        return Err(EngineError::LimitExceeded("note too long"));
    }
    Ok(())
}

impl Engine {
    pub async fn get_leave(&self, id: &str) -> Result<LeaveRecord, EngineError> {
        self.store
            .get_leave(id)
            .await?
            .ok_or_else(|| EngineError::not_found("leave", id))
    }

    pub async fn create_leave(&self, new: NewLeave) -> Result<LeaveRecord, EngineError> {
        observed("create_leave", async {
            validate(new.start, new.end, new.note.as_deref())?;
            let leave = LeaveRecord {
                id: new.id.unwrap_or_else(Engine::new_id),
                user_id: new.user_id,
                start: new.start,
                end: new.end,
                source: new.source,
                status: new.status,
                note: new.note,
            };
            debug!("create leave {} for {}", leave.id, leave.user_id);
            Ok(self.store.save_leave(leave).await?)
        })
        .await
    }

    /// Change dates and note. The edited record goes back to `Pending`.
    pub async fn update_leave(&self, id: &str, edit: LeaveEdit) -> Result<LeaveRecord, EngineError> {
        observed("update_leave", async {
            validate(edit.start, edit.end, edit.note.as_deref())?;
            let current = self.get_leave(id).await?;
            let updated = current.edited(edit.start, edit.end, edit.note);
            Ok(self.store.save_leave(updated).await?)
        })
        .await
    }

    pub async fn delete_leave(&self, id: &str) -> Result<(), EngineError> {
        observed("delete_leave", async {
            if !self.store.delete_leave(id).await? {
                return Err(EngineError::not_found("leave", id));
            }
            debug!("deleted leave {id}");
            Ok(())
        })
        .await
    }

    /// With user ids the overlap filter applies; without, every leave is listed
    /// and the range is ignored.
    pub async fn list_leaves(&self, query: &LeaveQuery) -> Result<Vec<LeaveRecord>, EngineError> {
        if query.user_ids.is_empty() {
            return observed("list_leaves", async {
                Ok(self.store.list_leaves(query.page.as_ref()).await?)
            })
            .await;
        }
        self.leaves_in_range(&query.user_ids, query.range, query.page.as_ref())
            .await
    }
}
