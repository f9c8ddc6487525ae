//! Tests for the scheduler module.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use vwatch_core::config::ScheduleConfig;
use vwatch_core::{ScheduleSettings, ViolationRecord};
use vwatch_store::LocalCacheRecord;

use crate::orchestrator::CheckOutcome;
use crate::scheduler::{RecoveryAction, Scheduler, SchedulerStatus};
use crate::testing::{reporting_settings, Harness, SearchMode};

fn scheduler_for(h: &Harness) -> Arc<Scheduler> {
    Scheduler::new(
        h.orchestrator.clone(),
        h.settings.clone(),
        &ScheduleConfig::default(),
    )
    .unwrap()
}

fn enabled_at(next: Option<chrono::DateTime<Utc>>) -> ScheduleSettings {
    ScheduleSettings {
        checks_enabled: true,
        next_check_at: next,
        ..reporting_settings()
    }
}

/// Poll `cond` until it holds or `max` elapses.
async fn wait_for(max: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + max;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

// -- construction ------------------------------------------------------

#[test]
fn new_rejects_bad_config() {
    let h = Harness::new(&[], vec![]);
    let bad_hour = ScheduleConfig {
        target_hour: 24,
        ..Default::default()
    };
    assert!(Scheduler::new(h.orchestrator.clone(), h.settings.clone(), &bad_hour).is_err());

    let bad_tz = ScheduleConfig {
        reference_tz: "Mars/Olympus_Mons".into(),
        ..Default::default()
    };
    assert!(Scheduler::new(h.orchestrator.clone(), h.settings.clone(), &bad_tz).is_err());
}

// -- enable / disable --------------------------------------------------

#[tokio::test]
async fn enable_persists_and_arms() {
    let h = Harness::new(&["1 MAIN ST"], vec![]);
    let scheduler = scheduler_for(&h);

    let due = scheduler.enable().await.unwrap();
    assert!(due > Utc::now());
    assert!(due - Utc::now() <= ChronoDuration::hours(25));
    assert_eq!(scheduler.status(), SchedulerStatus::Armed { due });

    let remote = h.remote.snapshot().unwrap();
    assert!(remote.checks_enabled);
    assert_eq!(remote.next_check_at, Some(due));
    assert!(h.settings.timer_id().is_some());
}

#[tokio::test]
async fn enable_then_disable_leaves_nothing_scheduled() {
    let h = Harness::new(&["1 MAIN ST"], vec![]);
    let scheduler = scheduler_for(&h);

    scheduler.enable().await.unwrap();
    scheduler.disable().await;

    assert_eq!(scheduler.status(), SchedulerStatus::Idle);
    let remote = h.remote.snapshot().unwrap();
    assert!(!remote.checks_enabled);
    assert!(remote.next_check_at.is_none());
    assert!(h.settings.load_local_cache().next_check_at.is_none());
    assert!(h.settings.timer_id().is_none());
}

#[tokio::test]
async fn re_enable_replaces_timer() {
    let h = Harness::new(&["1 MAIN ST"], vec![]);
    let scheduler = scheduler_for(&h);

    scheduler.enable().await.unwrap();
    let first = h.settings.timer_id().unwrap();
    scheduler.enable().await.unwrap();
    let second = h.settings.timer_id().unwrap();

    assert_ne!(first, second);
    assert!(matches!(scheduler.status(), SchedulerStatus::Armed { .. }));
}

#[tokio::test]
async fn enable_survives_remote_outage() {
    let h = Harness::new(&["1 MAIN ST"], vec![]);
    h.remote.set_failing(true);
    let scheduler = scheduler_for(&h);

    let due = scheduler.enable().await.unwrap();
    assert_eq!(h.settings.load_local_cache().next_check_at, Some(due));
    assert!(h.settings.load_local_cache().checks_enabled);
}

// -- firing ------------------------------------------------------------

#[tokio::test]
async fn timer_fires_and_re_arms_for_next_day() {
    let soon = Utc::now() + ChronoDuration::milliseconds(50);
    let h = Harness::with_settings(
        &["1 MAIN ST"],
        vec![ViolationRecord::new("V1", "1 MAIN ST")],
        enabled_at(Some(soon)),
    );
    let scheduler = scheduler_for(&h);

    assert_eq!(
        scheduler.recover_on_startup().await.unwrap(),
        RecoveryAction::Rearmed { due: soon }
    );

    let search = h.search.clone();
    assert!(wait_for(Duration::from_secs(2), || search.calls() == 1).await);
    let s = scheduler.clone();
    assert!(
        wait_for(Duration::from_secs(2), move || matches!(
            s.status(),
            SchedulerStatus::Armed { due } if due > soon
        ))
        .await
    );

    assert_eq!(h.transport.sent_count(), 1);
    let next = h.remote.snapshot().unwrap().next_check_at.unwrap();
    assert!(next > Utc::now());
}

#[tokio::test]
async fn disable_during_cycle_prevents_re_arm() {
    let soon = Utc::now() + ChronoDuration::milliseconds(20);
    let h = Harness::with_settings(&["1 MAIN ST"], vec![], enabled_at(Some(soon)));
    h.search.set_mode(SearchMode::Hang);
    let scheduler = scheduler_for(&h);
    scheduler.recover_on_startup().await.unwrap();

    let s = scheduler.clone();
    assert!(wait_for(Duration::from_secs(2), move || s.status() == SchedulerStatus::Running).await);
    scheduler.disable().await;

    // The hanging search times out after 200ms; give the cycle time to end.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(scheduler.status(), SchedulerStatus::Idle);
    let remote = h.remote.snapshot().unwrap();
    assert!(!remote.checks_enabled);
    assert!(remote.next_check_at.is_none());
}

#[tokio::test]
async fn failed_search_still_re_arms_for_next_day() {
    let soon = Utc::now() + ChronoDuration::milliseconds(50);
    let h = Harness::with_settings(&["1 MAIN ST"], vec![], enabled_at(Some(soon)));
    h.search.set_mode(SearchMode::Fail);
    let scheduler = scheduler_for(&h);
    scheduler.recover_on_startup().await.unwrap();

    let s = scheduler.clone();
    assert!(
        wait_for(Duration::from_secs(2), move || matches!(
            s.status(),
            SchedulerStatus::Armed { due } if due > soon
        ))
        .await
    );

    assert_eq!(h.search.calls(), 1);
    assert_eq!(h.transport.sent_count(), 0);
    assert_eq!(h.index.writes(), 0);
    let next = h.remote.snapshot().unwrap().next_check_at.unwrap();
    assert!(next > soon);
    assert!(next - Utc::now() <= ChronoDuration::hours(25));
}

#[tokio::test]
async fn search_timeout_still_re_arms_for_next_day() {
    let soon = Utc::now() + ChronoDuration::milliseconds(20);
    let h = Harness::with_settings(&["1 MAIN ST"], vec![], enabled_at(Some(soon)));
    h.search.set_mode(SearchMode::Hang);
    let scheduler = scheduler_for(&h);
    scheduler.recover_on_startup().await.unwrap();

    // The harness gives up on the search after 200ms.
    let s = scheduler.clone();
    assert!(
        wait_for(Duration::from_secs(2), move || matches!(
            s.status(),
            SchedulerStatus::Armed { due } if due > soon
        ))
        .await
    );
    assert_eq!(h.transport.sent_count(), 0);
    assert!(h.remote.snapshot().unwrap().checks_enabled);
}

#[tokio::test]
async fn cancelled_timer_never_fires() {
    let soon = Utc::now() + ChronoDuration::milliseconds(50);
    let h = Harness::with_settings(&["1 MAIN ST"], vec![], enabled_at(Some(soon)));
    let scheduler = scheduler_for(&h);
    scheduler.recover_on_startup().await.unwrap();

    scheduler.disable().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.search.calls(), 0);
}

// -- changes made by another process -----------------------------------

#[tokio::test]
async fn disable_from_another_process_stops_pending_timer() {
    let soon = Utc::now() + ChronoDuration::milliseconds(150);
    let h = Harness::with_settings(
        &["1 MAIN ST"],
        vec![ViolationRecord::new("V1", "1 MAIN ST")],
        enabled_at(Some(soon)),
    );
    let daemon = scheduler_for(&h);
    assert_eq!(
        daemon.recover_on_startup().await.unwrap(),
        RecoveryAction::Rearmed { due: soon }
    );

    // A one-shot `vwatch disable` shares the stores but not the timer.
    let command = scheduler_for(&h);
    command.disable().await;
    assert!(matches!(daemon.status(), SchedulerStatus::Armed { .. }));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.search.calls(), 0);
    assert_eq!(h.transport.sent_count(), 0);
    assert_eq!(daemon.status(), SchedulerStatus::Idle);
    let remote = h.remote.snapshot().unwrap();
    assert!(!remote.checks_enabled);
    assert!(remote.next_check_at.is_none());
}

#[tokio::test]
async fn disable_from_another_process_during_cycle_is_kept() {
    let soon = Utc::now() + ChronoDuration::milliseconds(20);
    let h = Harness::with_settings(&["1 MAIN ST"], vec![], enabled_at(Some(soon)));
    h.search.set_mode(SearchMode::Hang);
    let daemon = scheduler_for(&h);
    daemon.recover_on_startup().await.unwrap();

    let d = daemon.clone();
    assert!(wait_for(Duration::from_secs(2), move || d.status() == SchedulerStatus::Running).await);
    scheduler_for(&h).disable().await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(daemon.status(), SchedulerStatus::Idle);
    let remote = h.remote.snapshot().unwrap();
    assert!(!remote.checks_enabled);
    assert!(remote.next_check_at.is_none());
}

#[tokio::test]
async fn sync_follows_enable_and_disable_from_another_process() {
    let h = Harness::new(&["1 MAIN ST"], vec![]);
    let daemon = scheduler_for(&h);
    assert_eq!(daemon.recover_on_startup().await.unwrap(), RecoveryAction::Disabled);

    let command = scheduler_for(&h);
    let due = command.enable().await.unwrap();
    command.shutdown().await;

    assert_eq!(daemon.sync_with_persisted().await, SchedulerStatus::Armed { due });
    // Nothing changed since; the timer is kept.
    let timer = h.settings.timer_id();
    assert_eq!(daemon.sync_with_persisted().await, SchedulerStatus::Armed { due });
    assert_eq!(h.settings.timer_id(), timer);

    command.disable().await;
    assert_eq!(daemon.sync_with_persisted().await, SchedulerStatus::Idle);
    assert!(h.settings.timer_id().is_none());
}

// -- recovery ----------------------------------------------------------

#[tokio::test]
async fn recover_past_due_fires_immediately() {
    let missed = Utc::now() - ChronoDuration::minutes(10);
    let h = Harness::with_settings(
        &["1 MAIN ST"],
        vec![ViolationRecord::new("V1", "1 MAIN ST")],
        enabled_at(Some(missed)),
    );
    let scheduler = scheduler_for(&h);

    let action = scheduler.recover_on_startup().await.unwrap();
    let next = match action {
        RecoveryAction::FiredImmediately { outcome, next } => {
            assert!(matches!(outcome, CheckOutcome::Completed { .. }));
            assert_eq!(outcome.new_violations().len(), 1);
            next
        }
        other => panic!("expected FiredImmediately, got: {other:?}"),
    };

    assert_eq!(h.search.calls(), 1);
    assert!(next > Utc::now());
    assert_eq!(scheduler.status(), SchedulerStatus::Armed { due: next });
    assert_eq!(h.remote.snapshot().unwrap().next_check_at, Some(next));
}

#[tokio::test]
async fn recover_future_due_re_arms_without_checking() {
    let later = Utc::now() + ChronoDuration::hours(3);
    let h = Harness::with_settings(&["1 MAIN ST"], vec![], enabled_at(Some(later)));
    let scheduler = scheduler_for(&h);

    assert_eq!(
        scheduler.recover_on_startup().await.unwrap(),
        RecoveryAction::Rearmed { due: later }
    );
    assert_eq!(h.search.calls(), 0);
    assert_eq!(scheduler.status(), SchedulerStatus::Armed { due: later });
}

#[tokio::test]
async fn recover_without_due_time_schedules_fresh() {
    let h = Harness::with_settings(&["1 MAIN ST"], vec![], enabled_at(None));
    let scheduler = scheduler_for(&h);

    match scheduler.recover_on_startup().await.unwrap() {
        RecoveryAction::Scheduled { due } => assert!(due > Utc::now()),
        other => panic!("expected Scheduled, got: {other:?}"),
    }
    assert_eq!(h.search.calls(), 0);
}

#[tokio::test]
async fn recover_disabled_stays_idle_and_drops_orphan_timer() {
    let cache = LocalCacheRecord {
        timer_id: Some("stale-timer".into()),
        ..Default::default()
    };
    let h = Harness::build(&["1 MAIN ST"], vec![], ScheduleSettings::default(), cache);
    let scheduler = scheduler_for(&h);

    assert_eq!(scheduler.recover_on_startup().await.unwrap(), RecoveryAction::Disabled);
    assert_eq!(scheduler.status(), SchedulerStatus::Idle);
    assert!(h.settings.timer_id().is_none());
}

#[tokio::test]
async fn recover_malformed_cached_time_schedules_fresh() {
    let cache = LocalCacheRecord {
        checks_enabled: Some(true),
        next_check_at: Some("not-a-timestamp".into()),
        ..Default::default()
    };
    let h = Harness::build(&["1 MAIN ST"], vec![], ScheduleSettings::default(), cache);
    h.remote.set_failing(true);
    let scheduler = scheduler_for(&h);

    assert!(matches!(
        scheduler.recover_on_startup().await.unwrap(),
        RecoveryAction::Scheduled { .. }
    ));
    assert_eq!(h.search.calls(), 0);
}

// -- reset -------------------------------------------------------------

#[tokio::test]
async fn reset_clears_schedule_settings_and_index() {
    let h = Harness::with_settings(
        &["1 MAIN ST"],
        vec![ViolationRecord::new("V1", "1 MAIN ST")],
        enabled_at(None),
    );
    let scheduler = scheduler_for(&h);
    scheduler.enable().await.unwrap();
    h.orchestrator.run_saved().await;
    assert!(!h.index.snapshot().is_empty());

    assert!(scheduler.reset().await);

    assert_eq!(scheduler.status(), SchedulerStatus::Idle);
    assert_eq!(h.remote.snapshot().unwrap(), ScheduleSettings::default());
    assert!(h.index.snapshot().is_empty());
    assert!(h.settings.timer_id().is_none());
}
