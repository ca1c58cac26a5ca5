mod catalog;
mod error;
mod groups;
mod leaves;
mod overlap;
mod recency;
#[cfg(test)]
mod tests;

pub use catalog::{normalize_ids, NewTeam, PodQuery, TeamQuery, UserQuery};
pub use error::EngineError;
pub use groups::group_by_member;
pub use leaves::{LeaveEdit, LeaveQuery, NewLeave};

use std::future::Future;
use std::sync::Arc;

use ulid::Ulid;

use crate::holiday::{HolidayCalendar, PublicHoliday};
use crate::model::Ms;
use crate::observability::OpTimer;
use crate::store::Store;

/// Source of recency timestamps (epoch millis).
pub type Clock = Arc<dyn Fn() -> Ms + Send + Sync>;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

pub fn system_clock() -> Clock {
    Arc::new(now_ms)
}

/// Leave query and aggregation engine.
///
/// Holds no mutable state of its own: every operation reads and writes through
/// the [`Store`], so one engine can be shared across tasks behind an `Arc`.
/// Read-then-write sequences (favorite toggle, view recording) are not atomic
/// against concurrent callers on the same key; the last writer wins.
pub struct Engine {
    store: Arc<dyn Store>,
    clock: Clock,
    holidays: Arc<HolidayCalendar>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_clock(store, system_clock())
    }

    pub fn with_clock(store: Arc<dyn Store>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            holidays: Arc::new(HolidayCalendar::empty()),
        }
    }

    /// Attach the read-only holiday calendar loaded at startup.
    pub fn with_holidays(mut self, holidays: Arc<HolidayCalendar>) -> Self {
        self.holidays = holidays;
        self
    }

    /// Public holidays in `year`, optionally narrowed to one country (plus `ALL`).
    pub fn holidays(&self, year: i32, country: Option<&str>) -> Vec<&PublicHoliday> {
        match country {
            Some(country) => self.holidays.by_year_and_country(year, country),
            None => self.holidays.by_year(year),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) fn now(&self) -> Ms {
        (self.clock)()
    }

    pub(crate) fn new_id() -> String {
        Ulid::new().to_string()
    }
}

/// Run `fut` and record its outcome under `operation`.
pub(crate) async fn observed<T, F>(operation: &'static str, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    let timer = OpTimer::start(operation);
    let result = fut.await;
    timer.finish(&result);
    result
}
