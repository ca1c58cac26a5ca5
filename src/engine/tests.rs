use super::*;
use crate::holiday::HolidayCalendar;
use crate::limits::*;
use crate::model::fixtures::*;
use crate::model::*;
use crate::page::{order, PageRequest, Sort, SortKey};
use crate::store::{MemoryStore, Store, StoreError};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

/// Clock that advances one millisecond per reading.
fn ticking_clock(start: Ms) -> Clock {
    let t = Arc::new(AtomicI64::new(start));
    Arc::new(move || t.fetch_add(1, Ordering::SeqCst))
}

/// Clock frozen at `at`.
fn frozen_clock(at: Ms) -> Clock {
    Arc::new(move || at)
}

fn engine() -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::with_clock(store.clone(), ticking_clock(1_000));
    (engine, store)
}

fn ids(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

async fn seed_users(engine: &Engine, users: &[(&str, &str)]) {
    for (id, name) in users {
        engine.save_user(user(id, name)).await.unwrap();
    }
}

async fn seed_leave(engine: &Engine, id: &str, user_id: &str, start: &str, end: &str) -> LeaveRecord {
    engine
        .create_leave(NewLeave {
            id: Some(id.into()),
            user_id: user_id.into(),
            start: date(start),
            end: date(end),
            source: LeaveSource::Manual,
            status: LeaveStatus::Approved,
            note: None,
        })
        .await
        .unwrap()
}

fn range(from: &str, to: &str) -> DateRange {
    DateRange::between(date(from), date(to))
}

// ── Interval overlap ─────────────────────────────────────

#[tokio::test]
async fn boundary_touching_leave_is_included() {
    let (engine, _) = engine();
    seed_leave(&engine, "l1", "u1", "2026-02-10", "2026-02-12").await;

    let hit = engine
        .leaves_for_user("u1", range("2026-02-12", "2026-02-12"), None)
        .await
        .unwrap();
    assert_eq!(hit.len(), 1);

    let hit = engine
        .leaves_for_user("u1", range("2026-02-01", "2026-02-10"), None)
        .await
        .unwrap();
    assert_eq!(hit.len(), 1);

    let miss = engine
        .leaves_for_user("u1", DateRange::new(Some(date("2026-02-13")), None), None)
        .await
        .unwrap();
    assert!(miss.is_empty());
}

#[tokio::test]
async fn no_bounds_returns_all_for_users_start_desc() {
    let (engine, _) = engine();
    seed_leave(&engine, "a", "u1", "2026-01-01", "2026-01-02").await;
    seed_leave(&engine, "b", "u2", "2026-03-01", "2026-03-02").await;
    seed_leave(&engine, "c", "u1", "2026-02-01", "2026-02-02").await;
    seed_leave(&engine, "other", "u3", "2026-02-01", "2026-02-02").await;

    let leaves = engine
        .leaves_in_range(&ids(&["u1", "u2"]), DateRange::UNBOUNDED, None)
        .await
        .unwrap();
    let got: Vec<_> = leaves.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(got, vec!["b", "c", "a"]);
}

#[tokio::test]
async fn empty_user_set_selects_nothing() {
    let (engine, _) = engine();
    seed_leave(&engine, "a", "u1", "2026-01-01", "2026-01-02").await;
    let leaves = engine
        .leaves_in_range(&[], DateRange::UNBOUNDED, None)
        .await
        .unwrap();
    assert!(leaves.is_empty());
}

#[tokio::test]
async fn too_many_user_ids_is_rejected() {
    let (engine, _) = engine();
    let user_ids: Vec<String> = (0..=MAX_IN_CLAUSE_IDS).map(|i| format!("u{i}")).collect();
    let err = engine
        .leaves_in_range(&user_ids, DateRange::UNBOUNDED, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LimitExceeded(_)));
}

#[tokio::test]
async fn range_query_pages_through_results() {
    let (engine, _) = engine();
    for d in 1..=5 {
        seed_leave(&engine, &format!("l{d}"), "u1", &format!("2026-04-0{d}"), &format!("2026-04-0{d}")).await;
    }
    let page = PageRequest::new(0, 2, order::LEAVES).unwrap();
    let first = engine
        .leaves_for_user("u1", DateRange::UNBOUNDED, Some(&page))
        .await
        .unwrap();
    let second = engine
        .leaves_for_user("u1", DateRange::UNBOUNDED, Some(&page.next()))
        .await
        .unwrap();
    let last = engine
        .leaves_for_user("u1", DateRange::UNBOUNDED, Some(&page.next().next()))
        .await
        .unwrap();
    assert_eq!(first.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(), vec!["l5", "l4"]);
    assert_eq!(second.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(), vec!["l3", "l2"]);
    assert_eq!(last.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(), vec!["l1"]);
}

#[tokio::test]
async fn my_leaves_ignores_dates() {
    let (engine, _) = engine();
    seed_leave(&engine, "old", "u1", "2020-01-01", "2020-01-02").await;
    seed_leave(&engine, "new", "u1", "2030-01-01", "2030-01-02").await;
    seed_leave(&engine, "theirs", "u2", "2026-01-01", "2026-01-02").await;
    let mine = engine.my_leaves("u1").await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|l| l.user_id == "u1"));
}

// ── Leave records ────────────────────────────────────────

#[tokio::test]
async fn create_rejects_inverted_interval() {
    let (engine, store) = engine();
    let err = engine
        .create_leave(NewLeave {
            id: None,
            user_id: "u1".into(),
            start: date("2026-02-12"),
            end: date("2026-02-10"),
            source: LeaveSource::Manual,
            status: LeaveStatus::Pending,
            note: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInterval { .. }));
    assert_eq!(store.stats().leaves, 0);
}

#[tokio::test]
async fn create_assigns_id_when_absent() {
    let (engine, _) = engine();
    let leave = engine
        .create_leave(NewLeave {
            id: None,
            user_id: "u1".into(),
            start: date("2026-02-10"),
            end: date("2026-02-10"),
            source: LeaveSource::Outlook,
            status: LeaveStatus::Approved,
            note: Some("dentist".into()),
        })
        .await
        .unwrap();
    assert!(!leave.id.is_empty());
    assert_eq!(engine.get_leave(&leave.id).await.unwrap(), leave);
}

#[tokio::test]
async fn oversized_note_is_rejected() {
    let (engine, _) = engine();
    let err = engine
        .create_leave(NewLeave {
            id: None,
            user_id: "u1".into(),
            start: date("2026-02-10"),
            end: date("2026-02-10"),
            source: LeaveSource::Manual,
            status: LeaveStatus::Pending,
            note: Some("x".repeat(MAX_NOTE_LEN + 1)),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LimitExceeded(_)));
}

#[tokio::test]
async fn update_resets_status_to_pending() {
    let (engine, _) = engine();
    seed_leave(&engine, "l1", "u1", "2026-02-10", "2026-02-12").await;

    let updated = engine
        .update_leave(
            "l1",
            LeaveEdit {
                start: date("2026-02-11"),
                end: date("2026-02-14"),
                note: Some("shifted".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, LeaveStatus::Pending);
    assert_eq!(updated.user_id, "u1");

    // the range index follows the new dates
    let hits = engine
        .leaves_for_user("u1", range("2026-02-13", "2026-02-13"), None)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn update_unknown_and_inverted() {
    let (engine, _) = engine();
    let edit = LeaveEdit {
        start: date("2026-02-10"),
        end: date("2026-02-11"),
        note: None,
    };
    assert!(matches!(
        engine.update_leave("missing", edit.clone()).await,
        Err(EngineError::NotFound { kind: "leave", .. })
    ));

    seed_leave(&engine, "l1", "u1", "2026-02-10", "2026-02-12").await;
    let inverted = LeaveEdit {
        start: date("2026-02-12"),
        end: date("2026-02-10"),
        note: None,
    };
    assert!(matches!(
        engine.update_leave("l1", inverted).await,
        Err(EngineError::InvalidInterval { .. })
    ));
}

#[tokio::test]
async fn delete_leave_then_not_found() {
    let (engine, _) = engine();
    seed_leave(&engine, "l1", "u1", "2026-02-10", "2026-02-12").await;
    engine.delete_leave("l1").await.unwrap();
    assert!(matches!(
        engine.delete_leave("l1").await,
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        engine.get_leave("l1").await,
        Err(EngineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn list_leaves_without_users_lists_everything() {
    let (engine, _) = engine();
    seed_leave(&engine, "a", "u1", "2026-01-01", "2026-01-02").await;
    seed_leave(&engine, "b", "u2", "2026-05-01", "2026-05-02").await;

    let all = engine.list_leaves(&LeaveQuery::default()).await.unwrap();
    assert_eq!(all.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);

    let filtered = engine
        .list_leaves(&LeaveQuery {
            user_ids: ids(&["u1"]),
            range: range("2026-01-02", "2026-12-31"),
            page: None,
        })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "a");
}

// ── Grouped aggregation ──────────────────────────────────

#[tokio::test]
async fn every_member_appears_even_without_leave() {
    let (engine, _) = engine();
    seed_users(&engine, &[("u1", "Ada"), ("u2", "Brian"), ("u3", "Cleo")]).await;
    engine.save_group(team("t1", "Core", &["u1", "u2", "u3"])).await.unwrap();
    seed_leave(&engine, "l1", "u1", "2026-02-10", "2026-02-12").await;
    seed_leave(&engine, "l2", "u2", "2026-06-01", "2026-06-02").await;

    let grouped = engine
        .team_leaves("t1", range("2026-02-01", "2026-02-28"))
        .await
        .unwrap();
    assert_eq!(grouped.len(), 3);
    assert_eq!(grouped[0].user.id, "u1");
    assert_eq!(grouped[0].leaves.len(), 1);
    assert!(grouped[1].leaves.is_empty());
    assert!(grouped[2].leaves.is_empty());
}

#[tokio::test]
async fn unknown_group_is_not_found_but_empty_group_is_empty() {
    let (engine, _) = engine();
    let err = engine
        .team_leaves("nope", DateRange::UNBOUNDED)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "team", .. }));

    let err = engine.pod_leaves("nope", DateRange::UNBOUNDED).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "pod", .. }));

    engine.save_group(team("empty", "Nobody", &[])).await.unwrap();
    let grouped = engine.team_leaves("empty", DateRange::UNBOUNDED).await.unwrap();
    assert!(grouped.is_empty());
}

#[tokio::test]
async fn team_and_pod_ids_do_not_collide() {
    let (engine, _) = engine();
    seed_users(&engine, &[("u1", "Ada"), ("u2", "Brian")]).await;
    engine.save_group(team("g1", "Team", &["u1"])).await.unwrap();
    engine
        .save_pod("g1", "Pod", ["u1", "u2"].iter().map(|s| s.to_string()).collect())
        .await
        .unwrap();

    assert_eq!(engine.team_leaves("g1", DateRange::UNBOUNDED).await.unwrap().len(), 1);
    assert_eq!(engine.pod_leaves("g1", DateRange::UNBOUNDED).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unresolvable_members_are_skipped() {
    let (engine, _) = engine();
    seed_users(&engine, &[("u1", "Ada")]).await;
    engine.save_group(team("t1", "Core", &["u1", "ghost"])).await.unwrap();
    seed_leave(&engine, "l1", "ghost", "2026-02-10", "2026-02-12").await;

    let grouped = engine.team_leaves("t1", DateRange::UNBOUNDED).await.unwrap();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].user.id, "u1");
    assert!(grouped[0].leaves.is_empty());
}

#[tokio::test]
async fn large_group_aggregates_every_resolvable_member() {
    let (engine, _) = engine();
    seed_users(&engine, &[("u1", "Ada"), ("u2", "Bob")]).await;
    let mut members: Vec<String> = (0..6_000).map(|i| format!("ghost{i}")).collect();
    members.extend(ids(&["u1", "u2"]));
    let refs: Vec<&str> = members.iter().map(String::as_str).collect();
    engine.save_group(team("t1", "Everyone", &refs)).await.unwrap();
    seed_leave(&engine, "l1", "u2", "2026-02-10", "2026-02-12").await;

    let grouped = engine.team_leaves("t1", DateRange::UNBOUNDED).await.unwrap();
    assert_eq!(grouped.len(), 2);
    let with_leave: Vec<_> = grouped.iter().filter(|g| !g.leaves.is_empty()).collect();
    assert_eq!(with_leave.len(), 1);
    assert_eq!(with_leave[0].user.id, "u2");
}

#[tokio::test]
async fn team_calendar_end_to_end() {
    let (engine, _) = engine();
    seed_users(&engine, &[("u1", "Ada"), ("u2", "Brian")]).await;
    engine.save_group(team("t1", "Core", &["u1", "u2"])).await.unwrap();
    seed_leave(&engine, "l1", "u1", "2026-02-10", "2026-02-12").await;
    seed_leave(&engine, "l2", "u2", "2026-02-15", "2026-02-20").await;

    let grouped = engine
        .team_leaves("t1", range("2026-02-11", "2026-02-16"))
        .await
        .unwrap();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].user.id, "u1");
    assert_eq!(grouped[0].leaves[0].id, "l1");
    assert_eq!(grouped[1].user.id, "u2");
    assert_eq!(grouped[1].leaves[0].id, "l2");
}

// ── Catalog ──────────────────────────────────────────────

#[tokio::test]
async fn users_precedence_ids_then_query_then_all() {
    let (engine, _) = engine();
    seed_users(&engine, &[("u1", "Ada"), ("u2", "Brian"), ("u3", "Adam")]).await;

    let by_ids = engine
        .users(&UserQuery {
            ids: ids(&["u3,u1"]),
            query: Some("brian".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_ids.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), vec!["u3", "u1"]);

    let searched = engine
        .users(&UserQuery {
            query: Some("ad".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(searched.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), vec!["u1", "u3"]);

    let all = engine.users(&UserQuery::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let paged = engine
        .users(&UserQuery {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, "u3");
}

#[tokio::test]
async fn user_search_defaults_to_search_window() {
    let (engine, _) = engine();
    for i in 0..(DEFAULT_SEARCH_LIMIT + 5) {
        engine.save_user(user(&format!("u{i:03}"), &format!("Sam {i:03}"))).await.unwrap();
    }
    let searched = engine
        .users(&UserQuery {
            query: Some("sam".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(searched.len(), DEFAULT_SEARCH_LIMIT);

    let listed = engine.users(&UserQuery::default()).await.unwrap();
    assert_eq!(listed.len(), DEFAULT_SEARCH_LIMIT + 5);
}

#[tokio::test]
async fn invalid_paging_params_fail() {
    let (engine, _) = engine();
    let err = engine
        .users(&UserQuery {
            limit: Some(0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPageRequest(_)));

    let err = engine.favorites("u1", Some(5), Some(-1)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidPageRequest(_)));
}

#[tokio::test]
async fn team_filter_precedence() {
    let (engine, _) = engine();
    let mk = |id: &str, name: &str, team_type, created_by: Option<&str>| NewTeam {
        id: Some(id.into()),
        name: name.into(),
        team_type,
        created_by: created_by.map(str::to_string),
        member_ids: BTreeSet::new(),
    };
    engine.create_team(mk("t1", "Alpha", TeamType::Virtual, Some("u1"))).await.unwrap();
    engine.create_team(mk("t2", "Beta", TeamType::Pod, Some("u1"))).await.unwrap();
    engine.create_team(mk("t3", "Gamma", TeamType::Virtual, Some("u2"))).await.unwrap();
    engine.create_team(mk("t4", "Alphabet", TeamType::Pod, None)).await.unwrap();

    let names = |teams: Vec<Group>| teams.into_iter().map(|t| t.id).collect::<Vec<_>>();

    let both = engine
        .teams(&TeamQuery {
            team_type: Some(TeamType::Virtual),
            created_by: Some("u1".into()),
            query: Some("gamma".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(names(both), vec!["t1"]);

    let creator = engine
        .teams(&TeamQuery {
            created_by: Some("u1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(names(creator), vec!["t1", "t2"]);

    let typed = engine
        .teams(&TeamQuery {
            team_type: Some(TeamType::Pod),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(names(typed), vec!["t4", "t2"]);

    let searched = engine
        .teams(&TeamQuery {
            query: Some("alpha".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(names(searched), vec!["t1", "t4"]);

    let by_ids = engine
        .teams(&TeamQuery {
            ids: ids(&["t3", "t1"]),
            created_by: Some("u1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(names(by_ids), vec!["t3", "t1"]);

    let all = engine.teams(&TeamQuery::default()).await.unwrap();
    assert_eq!(names(all), vec!["t1", "t4", "t2", "t3"]);
}

#[tokio::test]
async fn delete_team_is_idempotent() {
    let (engine, _) = engine();
    engine.save_group(team("t1", "Core", &["u1"])).await.unwrap();
    engine.delete_team("t1").await.unwrap();
    engine.delete_team("t1").await.unwrap();
    assert!(matches!(engine.get_team("t1").await, Err(EngineError::NotFound { .. })));
}

#[tokio::test]
async fn pods_search_and_list() {
    let (engine, _) = engine();
    engine.save_group(pod("p1", "Infra", &[])).await.unwrap();
    engine.save_group(pod("p2", "Payments", &[])).await.unwrap();

    let all = engine.pods(&PodQuery::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    let hit = engine
        .pods(&PodQuery {
            query: Some("PAY".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].id, "p2");
    assert_eq!(engine.get_pod("p1").await.unwrap().name, "Infra");
    assert!(matches!(engine.get_user("nobody").await, Err(EngineError::NotFound { kind: "user", .. })));
}

#[tokio::test]
async fn oversized_group_name_is_rejected() {
    let (engine, _) = engine();
    let err = engine
        .save_group(team("t1", &"n".repeat(MAX_NAME_LEN + 1), &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LimitExceeded(_)));
}

// ── Favorites ────────────────────────────────────────────

#[tokio::test]
async fn toggle_twice_removes_favorite() {
    let (engine, store) = engine();
    let after_first = engine.toggle_favorite("u1", "t1").await.unwrap();
    assert_eq!(after_first, vec!["t1".to_string()]);

    let after_second = engine.toggle_favorite("u1", "t1").await.unwrap();
    assert!(after_second.is_empty());
    assert_eq!(store.stats().favorites, 0);
}

#[tokio::test]
async fn most_recently_toggled_rises_to_top() {
    let (engine, _) = engine();
    engine.toggle_favorite("u1", "t1").await.unwrap();
    engine.toggle_favorite("u1", "t2").await.unwrap();
    let list = engine.toggle_favorite("u1", "t3").await.unwrap();
    assert_eq!(list, ids(&["t3", "t2", "t1"]));

    let list = engine.toggle_favorite("u1", "t1").await.unwrap();
    assert_eq!(list, ids(&["t3", "t2"]));
    // re-added, so first again
    let list = engine.toggle_favorite("u1", "t1").await.unwrap();
    assert_eq!(list, ids(&["t1", "t3", "t2"]));
}

#[tokio::test]
async fn toggle_order_holds_with_frozen_clock() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::with_clock(store, frozen_clock(5_000));
    engine.toggle_favorite("u1", "t1").await.unwrap();
    engine.toggle_favorite("u1", "t2").await.unwrap();
    let list = engine.toggle_favorite("u1", "t3").await.unwrap();
    assert_eq!(list, ids(&["t3", "t2", "t1"]));
}

#[tokio::test]
async fn favorites_are_per_user_and_paged() {
    let (engine, _) = engine();
    engine.toggle_favorite("u1", "t1").await.unwrap();
    engine.toggle_favorite("u1", "t2").await.unwrap();
    engine.toggle_favorite("u2", "t1").await.unwrap();

    let all = engine.favorites("u1", None, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].team_id, "t2");

    let second = engine.favorites("u1", Some(1), Some(1)).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].team_id, "t1");

    assert!(engine.favorites("  ", None, None).await.unwrap().is_empty());
}

// ── View history ─────────────────────────────────────────

#[tokio::test]
async fn recording_twice_keeps_one_entry_with_latest_values() {
    let (engine, store) = engine();
    let first = engine
        .record_view("u1", "t1", ViewType::Team, Some("Core".into()))
        .await
        .unwrap();
    let second = engine
        .record_view("u1", "t1", ViewType::Team, Some("Core Platform".into()))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Core Platform");
    assert!(second.timestamp > first.timestamp);
    assert_eq!(store.stats().history, 1);

    let history = engine.view_history("u1", None, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], second);
}

#[tokio::test]
async fn same_item_different_type_are_separate_entries() {
    let (engine, _) = engine();
    engine.record_view("u1", "x1", ViewType::Team, None).await.unwrap();
    let pod_view = engine.record_view("u1", "x1", ViewType::Pod, None).await.unwrap();
    assert_eq!(pod_view.name, "");

    let history = engine.view_history("u1", None, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].item_type, ViewType::Pod);
}

#[tokio::test]
async fn history_defaults_to_recent_window() {
    let (engine, _) = engine();
    for i in 0..(DEFAULT_HISTORY_LIMIT + 3) {
        engine
            .record_view("u1", &format!("item{i}"), ViewType::User, None)
            .await
            .unwrap();
    }
    let history = engine.view_history("u1", None, None).await.unwrap();
    assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
    assert_eq!(history[0].item_id, format!("item{}", DEFAULT_HISTORY_LIMIT + 2));

    let all = engine.view_history("u1", Some(100), None).await.unwrap();
    assert_eq!(all.len(), DEFAULT_HISTORY_LIMIT + 3);
    assert!(engine.view_history("", None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn revisit_moves_entry_to_top() {
    let (engine, _) = engine();
    engine.record_view("u1", "a", ViewType::User, None).await.unwrap();
    engine.record_view("u1", "b", ViewType::User, None).await.unwrap();
    engine.record_view("u1", "a", ViewType::User, None).await.unwrap();
    let history = engine.view_history("u1", None, None).await.unwrap();
    let order: Vec<_> = history.iter().map(|h| h.item_id.as_str()).collect();
    assert_eq!(order, vec!["a", "b"]);
}

#[tokio::test]
async fn long_view_name_is_recorded_as_given() {
    let (engine, _) = engine();
    let name = "n".repeat(MAX_NAME_LEN * 4);
    let entry = engine
        .record_view("u1", "t1", ViewType::Team, Some(name.clone()))
        .await
        .unwrap();
    assert_eq!(entry.name, name);
}

#[tokio::test]
async fn history_sort_can_be_overridden_by_name() {
    let (engine, store) = engine();
    engine.record_view("u1", "1", ViewType::User, Some("Zed".into())).await.unwrap();
    engine.record_view("u1", "2", ViewType::User, Some("Amy".into())).await.unwrap();
    let page = PageRequest::new(0, 10, Sort::asc(SortKey::Name)).unwrap();
    let rows = store.view_history_by_user("u1", Some(&page)).await.unwrap();
    assert_eq!(rows[0].name, "Amy");
}

// ── Holidays ─────────────────────────────────────────────

#[tokio::test]
async fn holidays_come_from_the_attached_calendar() {
    let (engine, _) = engine();
    assert!(engine.holidays(2026, None).is_empty());

    let calendar = HolidayCalendar::from_json(
        r#"{
            "2026": {
                "ALL": [ { "date": "2026-01-01", "name": "New Year" } ],
                "US": [ { "date": "2026-07-03", "name": "Independence Day (observed)" } ],
                "CN": [ { "date": "2026-02-17", "name": "Spring Festival" } ]
            }
        }"#,
    )
    .unwrap();
    let engine = engine.with_holidays(Arc::new(calendar));

    assert_eq!(engine.holidays(2026, None).len(), 3);
    let us = engine.holidays(2026, Some("us"));
    let us: Vec<_> = us.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(us, vec!["New Year", "Independence Day (observed)"]);
    assert!(engine.holidays(2027, Some("US")).is_empty());
}

// ── Collaborator failure ─────────────────────────────────

/// Store whose every call fails.
struct DownStore;

fn down<T>() -> Result<T, StoreError> {
    Err(StoreError::Wal("disk unavailable".into()))
}

#[async_trait]
impl Store for DownStore {
    async fn get_user(&self, _: &str) -> Result<Option<User>, StoreError> {
        down()
    }
    async fn users_by_ids(&self, _: &[String]) -> Result<Vec<User>, StoreError> {
        down()
    }
    async fn list_users(&self, _: Option<&PageRequest>) -> Result<Vec<User>, StoreError> {
        down()
    }
    async fn search_users(&self, _: &str, _: Option<&PageRequest>) -> Result<Vec<User>, StoreError> {
        down()
    }
    async fn save_user(&self, _: User) -> Result<User, StoreError> {
        down()
    }
    async fn get_group(&self, _: &GroupRef) -> Result<Option<Group>, StoreError> {
        down()
    }
    async fn teams_by_ids(&self, _: &[String]) -> Result<Vec<Group>, StoreError> {
        down()
    }
    async fn list_teams(&self, _: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        down()
    }
    async fn search_teams(&self, _: &str, _: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        down()
    }
    async fn teams_by_type(&self, _: TeamType, _: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        down()
    }
    async fn teams_by_creator(&self, _: &str, _: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        down()
    }
    async fn teams_by_type_and_creator(
        &self,
        _: TeamType,
        _: &str,
        _: Option<&PageRequest>,
    ) -> Result<Vec<Group>, StoreError> {
        down()
    }
    async fn list_pods(&self, _: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        down()
    }
    async fn search_pods(&self, _: &str, _: Option<&PageRequest>) -> Result<Vec<Group>, StoreError> {
        down()
    }
    async fn save_group(&self, _: Group) -> Result<Group, StoreError> {
        down()
    }
    async fn delete_group(&self, _: &GroupRef) -> Result<bool, StoreError> {
        down()
    }
    async fn get_leave(&self, _: &str) -> Result<Option<LeaveRecord>, StoreError> {
        down()
    }
    async fn leaves_by_user(&self, _: &str) -> Result<Vec<LeaveRecord>, StoreError> {
        down()
    }
    async fn leaves_for_users_in_range(
        &self,
        _: &[String],
        _: DateRange,
        _: Option<&PageRequest>,
    ) -> Result<Vec<LeaveRecord>, StoreError> {
        down()
    }
    async fn list_leaves(&self, _: Option<&PageRequest>) -> Result<Vec<LeaveRecord>, StoreError> {
        down()
    }
    async fn save_leave(&self, _: LeaveRecord) -> Result<LeaveRecord, StoreError> {
        down()
    }
    async fn delete_leave(&self, _: &str) -> Result<bool, StoreError> {
        down()
    }
    async fn get_favorite(&self, _: &str, _: &str) -> Result<Option<FavoriteEntry>, StoreError> {
        down()
    }
    async fn create_favorite(&self, _: FavoriteEntry) -> Result<FavoriteEntry, StoreError> {
        down()
    }
    async fn delete_favorite(&self, _: &str, _: &str) -> Result<bool, StoreError> {
        down()
    }
    async fn favorites_by_user(&self, _: &str, _: Option<&PageRequest>) -> Result<Vec<FavoriteEntry>, StoreError> {
        down()
    }
    async fn get_view_history(&self, _: &str, _: &str, _: ViewType) -> Result<Option<ViewHistoryEntry>, StoreError> {
        down()
    }
    async fn upsert_view_history(&self, _: ViewHistoryEntry) -> Result<ViewHistoryEntry, StoreError> {
        down()
    }
    async fn view_history_by_user(
        &self,
        _: &str,
        _: Option<&PageRequest>,
    ) -> Result<Vec<ViewHistoryEntry>, StoreError> {
        down()
    }
}

fn is_collaborator<T: std::fmt::Debug>(r: Result<T, EngineError>) -> bool {
    matches!(r, Err(EngineError::Collaborator(StoreError::Wal(_))))
}

#[tokio::test]
async fn store_failures_surface_unmodified() {
    let engine = Engine::new(Arc::new(DownStore));
    assert!(is_collaborator(engine.team_leaves("t1", DateRange::UNBOUNDED).await));
    assert!(is_collaborator(engine.leaves_for_user("u1", DateRange::UNBOUNDED, None).await));
    assert!(is_collaborator(engine.toggle_favorite("u1", "t1").await));
    assert!(is_collaborator(engine.record_view("u1", "t1", ViewType::Team, None).await));
    assert!(is_collaborator(engine.view_history("u1", None, None).await));
    assert!(is_collaborator(engine.get_leave("l1").await));
    assert!(is_collaborator(engine.teams(&TeamQuery::default()).await));

    let err = engine.get_user("u1").await.unwrap_err();
    assert!(err.to_string().contains("disk unavailable"));
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn validation_runs_before_the_store_is_touched() {
    let engine = Engine::new(Arc::new(DownStore));
    let err = engine
        .create_leave(NewLeave {
            id: None,
            user_id: "u1".into(),
            start: date("2026-02-12"),
            end: date("2026-02-10"),
            source: LeaveSource::Manual,
            status: LeaveStatus::Pending,
            note: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInterval { .. }));

    let err = engine.view_history("u1", Some(0), None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidPageRequest(_)));
}
