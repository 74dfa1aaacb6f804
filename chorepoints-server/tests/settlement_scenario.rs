use chorepoints_server::chores::{ClaimError, ClaimRequest};
use chorepoints_server::settlement::run_log::step_code;
use chorepoints_server::settlement::{self, ClaimOutcome, RunLog, RunStatus, SettlementError};
use chorepoints_server::storage::Store;
use chorepoints_shared::domain::{
    AssignmentType, AvailableTime, CHORE_TAG_PAYOUT, Child, Chore, REASON_APPROVED,
    REASON_CONVERSION, REASON_DAILY_POINTS, REASON_INCOMPLETE_PENALTY, SettingSeed,
};
use chrono::{DateTime, Utc};
use diesel::{Connection, SqliteConnection};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const JOB: &str = "chore_app.nightly_action";

struct Fixture {
    store: Store,
    db_path: String,
    _tempdir: tempfile::TempDir,
}

impl Fixture {
    /// A connection outside the store's pool.
    fn connect(&self) -> SqliteConnection {
        SqliteConnection::establish(&self.db_path).unwrap()
    }
}

fn now() -> DateTime<Tz> {
    Utc::now().with_timezone(&chrono_tz::UTC)
}

fn child(id: &str) -> Child {
    Child {
        id: id.to_string(),
        display_name: id.to_uppercase(),
    }
}

fn daily_chore(id: &str, points: Decimal) -> Chore {
    Chore {
        id: id.to_string(),
        name: id.to_string(),
        points,
        comment: String::new(),
        available: true,
        daily: true,
        persistent: false,
        assignment_type: AssignmentType::AnyChild,
        assigned_children: Vec::new(),
        early_bonus: false,
        bonus_end_time: None,
        available_time: AvailableTime(0),
    }
}

fn persistent_chore(id: &str, points: Decimal) -> Chore {
    Chore {
        daily: false,
        persistent: true,
        ..daily_chore(id, points)
    }
}

fn seed(key: &str, value: Decimal) -> SettingSeed {
    SettingSeed {
        key: key.to_string(),
        name: String::new(),
        value,
    }
}

/// Only the auto-approval moves balances; everything else is switched off.
fn quiet_settings() -> Vec<SettingSeed> {
    vec![
        seed("min_points", dec!(-1000)),
        seed("max_points", dec!(1000)),
        seed("daily_bonus", dec!(0)),
        seed("point_value", dec!(0.1)),
        seed("incomplete_chores_penalty", dec!(0)),
        seed("leaderboard_awards", dec!(0)),
        seed("auto_approve", dec!(80)),
    ]
}

fn with_setting(mut settings: Vec<SettingSeed>, key: &str, value: Decimal) -> Vec<SettingSeed> {
    settings.retain(|s| s.key != key);
    settings.push(seed(key, value));
    settings
}

async fn fixture(children: &[&str], chores: Vec<Chore>, settings: Vec<SettingSeed>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("settle.db");
    let db_path = db_path.to_str().unwrap().to_string();
    let store = Store::connect_sqlite(&db_path).await.unwrap();
    let kids: Vec<Child> = children.iter().map(|id| child(id)).collect();
    store
        .seed_from_config(&kids, &chores, &settings)
        .await
        .unwrap();
    Fixture {
        store,
        db_path,
        _tempdir: dir,
    }
}

async fn custom_claim(store: &Store, child_id: &str, name: &str, points: Decimal) -> i32 {
    store
        .submit_claim(
            child_id,
            ClaimRequest::Custom {
                name: name.to_string(),
                points,
                comment: String::new(),
            },
            now(),
        )
        .await
        .unwrap()
        .id
}

async fn balance(store: &Store, child_id: &str) -> Decimal {
    store.get_child(child_id).await.unwrap().points_balance.0
}

async fn ledger_sum(store: &Store, child_id: &str) -> Decimal {
    store
        .list_ledger_for_child(child_id, 1, 1000)
        .await
        .unwrap()
        .iter()
        .map(|e| e.points_change.0)
        .sum()
}

#[tokio::test]
async fn second_run_on_the_same_day_changes_nothing() {
    let fx = fixture(
        &["alice", "bob"],
        vec![daily_chore("dishes", dec!(10))],
        with_setting(quiet_settings(), "daily_bonus", dec!(2)),
    )
    .await;
    custom_claim(&fx.store, "alice", "tidy", dec!(10)).await;

    let first = fx.store.run_settlement(JOB, now()).await.unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.claims_approved, 1);
    assert_eq!(first.children_settled, 2);
    let alice_after = balance(&fx.store, "alice").await;
    let entries_after = fx
        .store
        .list_ledger_for_child("alice", 1, 1000)
        .await
        .unwrap()
        .len();

    let second = fx.store.run_settlement(JOB, now()).await.unwrap();
    assert_eq!(second.status, RunStatus::AlreadyRun);
    assert_eq!(second.claims_approved, 0);
    assert_eq!(balance(&fx.store, "alice").await, alice_after);
    assert_eq!(
        fx.store
            .list_ledger_for_child("alice", 1, 1000)
            .await
            .unwrap()
            .len(),
        entries_after
    );
    assert!(
        fx.store
            .run_recorded(JOB, now().date_naive())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn balances_equal_the_sum_of_their_ledger() {
    let settings = with_setting(
        with_setting(quiet_settings(), "incomplete_chores_penalty", dec!(50)),
        "daily_bonus",
        dec!(3),
    );
    let fx = fixture(
        &["alice", "bob"],
        vec![
            daily_chore("dishes", dec!(10)),
            daily_chore("trash", dec!(7)),
        ],
        with_setting(settings, "leaderboard_awards", dec!(40)),
    )
    .await;
    let claim = fx
        .store
        .submit_claim(
            "alice",
            ClaimRequest::Chore {
                chore_id: "dishes".into(),
            },
            now(),
        )
        .await
        .unwrap();
    fx.store
        .approve_claim(claim.id, dec!(0), "mum")
        .await
        .unwrap();
    fx.store
        .adjust_points("bob", dec!(-4), "Broke a plate", "mum")
        .await
        .unwrap();
    custom_claim(&fx.store, "bob", "garden", dec!(5)).await;

    fx.store.run_settlement(JOB, now()).await.unwrap();

    for id in ["alice", "bob"] {
        assert_eq!(balance(&fx.store, id).await, ledger_sum(&fx.store, id).await, "{id}");
    }
}

#[tokio::test]
async fn penalty_scales_with_the_share_of_completed_points() {
    let fx = fixture(
        &["alice", "bob"],
        vec![
            daily_chore("dishes", dec!(10)),
            daily_chore("trash", dec!(20)),
        ],
        with_setting(quiet_settings(), "incomplete_chores_penalty", dec!(50)),
    )
    .await;
    let claim = fx
        .store
        .submit_claim(
            "alice",
            ClaimRequest::Chore {
                chore_id: "dishes".into(),
            },
            now(),
        )
        .await
        .unwrap();
    fx.store
        .approve_claim(claim.id, dec!(0), "mum")
        .await
        .unwrap();

    fx.store.run_settlement(JOB, now()).await.unwrap();

    // only trash is still open; alice earned the whole cohort total
    assert_eq!(balance(&fx.store, "alice").await, dec!(10));
    assert_eq!(balance(&fx.store, "bob").await, dec!(-10));
    let bob_penalty = fx
        .store
        .list_ledger_for_child("bob", 1, 100)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.reason == REASON_INCOMPLETE_PENALTY)
        .unwrap();
    assert_eq!(bob_penalty.points_change.0, dec!(-10));
    assert_eq!(bob_penalty.penalty.0, dec!(50));
}

#[tokio::test]
async fn empty_cohort_charges_the_full_fraction() {
    let fx = fixture(
        &["alice", "bob"],
        vec![
            daily_chore("dishes", dec!(10)),
            daily_chore("trash", dec!(20)),
        ],
        with_setting(quiet_settings(), "incomplete_chores_penalty", dec!(50)),
    )
    .await;

    let report = fx.store.run_settlement(JOB, now()).await.unwrap();

    assert!(report.skipped.is_empty());
    assert_eq!(balance(&fx.store, "alice").await, dec!(-15));
    assert_eq!(balance(&fx.store, "bob").await, dec!(-15));
}

#[tokio::test]
async fn penalty_above_one_hundred_skips_the_penalty_but_pays_the_bonus() {
    let settings = with_setting(quiet_settings(), "incomplete_chores_penalty", dec!(150));
    let fx = fixture(
        &["alice"],
        vec![daily_chore("dishes", dec!(10))],
        with_setting(settings, "daily_bonus", dec!(2)),
    )
    .await;

    let report = fx.store.run_settlement(JOB, now()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].step, "penalty");
    assert_eq!(balance(&fx.store, "alice").await, dec!(2));
}

#[tokio::test]
async fn bonus_is_clamped_and_overflow_becomes_pocket_money() {
    let settings = with_setting(quiet_settings(), "max_points", dec!(20));
    let settings = with_setting(settings, "daily_bonus", dec!(5));
    let settings = with_setting(settings, "point_value", dec!(0.5));
    let settings = with_setting(settings, "min_points", dec!(-5));
    let fx = fixture(&["alice", "bob"], Vec::new(), settings).await;
    fx.store
        .adjust_points("alice", dec!(25), "Birthday", "mum")
        .await
        .unwrap();
    fx.store
        .adjust_points("bob", dec!(-30), "Lost the keys", "mum")
        .await
        .unwrap();

    fx.store.run_settlement(JOB, now()).await.unwrap();

    let alice = fx.store.get_child("alice").await.unwrap();
    assert_eq!(alice.points_balance.0, dec!(20));
    assert_eq!(alice.pocket_money.0, dec!(5));
    let alice_bonus = fx
        .store
        .list_ledger_for_child("alice", 1, 100)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.reason == REASON_DAILY_POINTS)
        .unwrap();
    assert_eq!(alice_bonus.points_change.0, dec!(-5));

    // floor first, then the bonus
    assert_eq!(balance(&fx.store, "bob").await, dec!(0));
}

#[tokio::test]
async fn leaderboard_awards_the_podium() {
    let fx = fixture(
        &["a", "b", "c", "d"],
        Vec::new(),
        with_setting(quiet_settings(), "leaderboard_awards", dec!(100)),
    )
    .await;
    for (child_id, points) in [("a", dec!(50)), ("b", dec!(30)), ("c", dec!(30))] {
        let id = custom_claim(&fx.store, child_id, "chores", points).await;
        fx.store.approve_claim(id, dec!(0), "mum").await.unwrap();
    }
    let id = custom_claim(&fx.store, "d", "chores", dec!(10)).await;
    assert!(fx.store.reject_claim(id, "mum").await.unwrap());

    let report = fx.store.run_settlement(JOB, now()).await.unwrap();

    let text = report.leaderboard.unwrap();
    assert!(text.starts_with("Leaderboard results!"));
    assert!(text.contains("1st place: A - 50 points (+100)"));
    assert!(text.contains("2nd place: B - 30 points (+50)"));
    assert!(text.contains("3rd place: C - 30 points (+20)"));

    assert_eq!(balance(&fx.store, "a").await, dec!(150));
    assert_eq!(balance(&fx.store, "b").await, dec!(80));
    assert_eq!(balance(&fx.store, "c").await, dec!(50));
    assert_eq!(balance(&fx.store, "d").await, dec!(0));

    let a = fx.store.get_child("a").await.unwrap();
    let b = fx.store.get_child("b").await.unwrap();
    let c = fx.store.get_child("c").await.unwrap();
    let d = fx.store.get_child("d").await.unwrap();
    assert_eq!((a.place_1, a.place_2, a.place_3), (1, 0, 0));
    assert_eq!((b.place_1, b.place_2, b.place_3), (0, 1, 0));
    assert_eq!((c.place_1, c.place_2, c.place_3), (0, 0, 1));
    assert_eq!((d.place_1, d.place_2, d.place_3), (0, 0, 0));

    // fourth place still gets a zero entry carrying the summary
    let d_award = fx
        .store
        .list_ledger_for_child("d", 1, 100)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.reason == text)
        .unwrap();
    assert_eq!(d_award.points_change.0, dec!(0));
}

#[tokio::test]
async fn pending_claims_are_auto_approved() {
    let fx = fixture(&["alice"], Vec::new(), quiet_settings()).await;
    let claim_id = custom_claim(&fx.store, "alice", "windows", dec!(10)).await;

    let report = fx.store.run_settlement(JOB, now()).await.unwrap();

    assert_eq!(report.claims_approved, 1);
    assert_eq!(balance(&fx.store, "alice").await, dec!(8));
    let entry = fx
        .store
        .list_ledger_for_child("alice", 1, 100)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.reason == REASON_APPROVED)
        .unwrap();
    assert_eq!(entry.points_change.0, dec!(8));
    assert_eq!(entry.penalty.0, dec!(20));
    assert_eq!(entry.chore, "windows");
    assert_eq!(entry.approver, None);

    // resolved claims are gone after the reset
    assert!(
        fx.store
            .list_claims_for_child("alice")
            .await
            .unwrap()
            .iter()
            .all(|c| c.id != claim_id)
    );
}

#[tokio::test]
async fn approving_twice_is_a_no_op() {
    let fx = fixture(&["alice"], Vec::new(), quiet_settings()).await;
    let id = custom_claim(&fx.store, "alice", "windows", dec!(10)).await;

    let first = fx.store.approve_claim(id, dec!(10), "mum").await.unwrap();
    let second = fx.store.approve_claim(id, dec!(0), "dad").await.unwrap();

    assert!(matches!(first, ClaimOutcome::Approved { amount, .. } if amount == dec!(9)));
    assert!(
        matches!(second, ClaimOutcome::AlreadyProcessed { approved, .. } if approved == dec!(9))
    );
    assert_eq!(balance(&fx.store, "alice").await, dec!(9));
}

#[tokio::test]
async fn out_of_range_manual_penalty_is_rejected() {
    let fx = fixture(&["alice"], Vec::new(), quiet_settings()).await;
    let id = custom_claim(&fx.store, "alice", "windows", dec!(10)).await;

    let err = fx.store.approve_claim(id, dec!(101), "mum").await.unwrap_err();

    assert!(matches!(err, SettlementError::InvalidPenalty { .. }));
    assert_eq!(balance(&fx.store, "alice").await, dec!(0));
}

#[tokio::test]
async fn reset_reopens_daily_chores_and_clears_claims() {
    let fx = fixture(
        &["alice", "bob"],
        vec![
            daily_chore("dishes", dec!(10)),
            daily_chore("trash", dec!(5)),
        ],
        quiet_settings(),
    )
    .await;
    for (child_id, chore_id) in [("alice", "dishes"), ("bob", "trash")] {
        fx.store
            .submit_claim(
                child_id,
                ClaimRequest::Chore {
                    chore_id: chore_id.into(),
                },
                now(),
            )
            .await
            .unwrap();
    }
    assert!(
        fx.store
            .list_chores()
            .await
            .unwrap()
            .iter()
            .all(|(c, _)| !c.available)
    );

    fx.store.run_settlement(JOB, now()).await.unwrap();

    assert!(fx.store.list_pending_claims().await.unwrap().is_empty());
    for id in ["alice", "bob"] {
        assert!(fx.store.list_claims_for_child(id).await.unwrap().is_empty());
    }
    assert!(
        fx.store
            .list_chores()
            .await
            .unwrap()
            .iter()
            .all(|(c, _)| c.available)
    );
}

#[tokio::test]
async fn claimed_chore_cannot_be_claimed_again() {
    let fx = fixture(
        &["alice", "bob"],
        vec![daily_chore("dishes", dec!(10))],
        quiet_settings(),
    )
    .await;
    let request = ClaimRequest::Chore {
        chore_id: "dishes".into(),
    };
    fx.store
        .submit_claim("alice", request.clone(), now())
        .await
        .unwrap();

    let err = fx
        .store
        .submit_claim("bob", request, now())
        .await
        .unwrap_err();

    assert!(matches!(err, ClaimError::Unavailable));
}

#[tokio::test]
async fn missing_setting_aborts_before_any_change() {
    let mut settings = quiet_settings();
    settings.retain(|s| s.key != "auto_approve");
    let fx = fixture(&["alice"], Vec::new(), settings).await;
    custom_claim(&fx.store, "alice", "windows", dec!(10)).await;

    let err = fx.store.run_settlement(JOB, now()).await.unwrap_err();

    assert!(matches!(err, SettlementError::MissingConfig("auto_approve")));
    assert!(
        !fx.store
            .run_recorded(JOB, now().date_naive())
            .await
            .unwrap()
    );
    assert_eq!(fx.store.list_pending_claims().await.unwrap().len(), 1);
    assert_eq!(balance(&fx.store, "alice").await, dec!(0));
}

#[tokio::test]
async fn conversion_needs_half_of_max_points() {
    let settings = with_setting(quiet_settings(), "max_points", dec!(150));
    let fx = fixture(&["alice"], Vec::new(), settings).await;
    fx.store
        .adjust_points("alice", dec!(70), "Start", "mum")
        .await
        .unwrap();
    assert!(fx.store.convert_points("alice", "alice").await.is_err());

    fx.store
        .adjust_points("alice", dec!(50), "More", "mum")
        .await
        .unwrap();
    let (points, money) = fx.store.convert_points("alice", "alice").await.unwrap();

    assert_eq!(points, dec!(20));
    assert_eq!(money, dec!(10));
    assert_eq!(ledger_sum(&fx.store, "alice").await, dec!(20));
    let conversion = fx
        .store
        .list_ledger_for_child("alice", 1, 100)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.reason == REASON_CONVERSION)
        .unwrap();
    assert_eq!(conversion.points_change.0, dec!(-100));
    assert_eq!(conversion.chore, CHORE_TAG_PAYOUT);
    assert_eq!(conversion.approver.as_deref(), Some("alice"));
}

#[tokio::test]
async fn settled_child_is_skipped_on_a_same_day_retry() {
    let fx = fixture(
        &["alice", "bob"],
        Vec::new(),
        with_setting(quiet_settings(), "daily_bonus", dec!(2)),
    )
    .await;
    let at = now();
    let mut conn = fx.connect();
    // alice was settled by a run that failed later on
    conn.mark_run(
        &step_code(JOB, "child", Some("alice")),
        at.date_naive(),
        at.naive_utc(),
    )
    .unwrap();

    let report = settlement::settle(&mut conn, JOB, at).unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.children_settled, 1);
    assert!(
        fx.store
            .list_ledger_for_child("alice", 1, 100)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(balance(&fx.store, "alice").await, dec!(0));
    assert_eq!(balance(&fx.store, "bob").await, dec!(2));
    assert!(conn.has_run(JOB, at.date_naive()).unwrap());
}

#[tokio::test]
async fn applied_leaderboard_is_not_awarded_again() {
    let fx = fixture(
        &["alice"],
        Vec::new(),
        with_setting(quiet_settings(), "leaderboard_awards", dec!(100)),
    )
    .await;
    let id = custom_claim(&fx.store, "alice", "windows", dec!(10)).await;
    fx.store.approve_claim(id, dec!(0), "mum").await.unwrap();
    let at = now();
    let mut conn = fx.connect();
    conn.mark_run(
        &step_code(JOB, "leaderboard", None),
        at.date_naive(),
        at.naive_utc(),
    )
    .unwrap();

    let report = settlement::settle(&mut conn, JOB, at).unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert!(report.leaderboard.is_none());
    let alice = fx.store.get_child("alice").await.unwrap();
    assert_eq!(alice.points_balance.0, dec!(10));
    assert_eq!(alice.place_1, 0);
}

#[tokio::test]
async fn zero_award_entries_are_logged_when_enabled() {
    let settings = with_setting(quiet_settings(), "leaderboard_log_without_awards", dec!(1));
    let fx = fixture(&["a", "b", "c"], Vec::new(), settings).await;
    for (child_id, points) in [("a", dec!(50)), ("b", dec!(30))] {
        let id = custom_claim(&fx.store, child_id, "chores", points).await;
        fx.store.approve_claim(id, dec!(0), "mum").await.unwrap();
    }

    let report = fx.store.run_settlement(JOB, now()).await.unwrap();

    let text = report.leaderboard.unwrap();
    for child_id in ["a", "b"] {
        let entries: Vec<_> = fx
            .store
            .list_ledger_for_child(child_id, 1, 100)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.reason == text)
            .collect();
        assert_eq!(entries.len(), 1, "{child_id}");
        assert_eq!(entries[0].points_change.0, dec!(0));
    }
    // not ranked without chore points
    assert!(
        fx.store
            .list_ledger_for_child("c", 1, 100)
            .await
            .unwrap()
            .iter()
            .all(|e| e.reason != text)
    );

    assert_eq!(balance(&fx.store, "a").await, dec!(50));
    assert_eq!(balance(&fx.store, "b").await, dec!(30));
    for child_id in ["a", "b", "c"] {
        let c = fx.store.get_child(child_id).await.unwrap();
        assert_eq!((c.place_1, c.place_2, c.place_3), (0, 0, 0), "{child_id}");
    }
}

#[tokio::test]
async fn zero_award_leaderboard_writes_nothing_by_default() {
    let fx = fixture(&["a"], Vec::new(), quiet_settings()).await;
    let id = custom_claim(&fx.store, "a", "chores", dec!(50)).await;
    fx.store.approve_claim(id, dec!(0), "mum").await.unwrap();

    let report = fx.store.run_settlement(JOB, now()).await.unwrap();

    let text = report.leaderboard.unwrap();
    let entries = fx.store.list_ledger_for_child("a", 1, 100).await.unwrap();
    assert!(entries.iter().all(|e| e.reason != text));
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn persistent_chores_are_penalised_only_when_switched_on() {
    for (flag, expected) in [(dec!(0), dec!(0)), (dec!(1), dec!(-10))] {
        let settings = with_setting(quiet_settings(), "incomplete_chores_penalty", dec!(50));
        let settings = with_setting(settings, "penalize_persistent_chores", flag);
        let fx = fixture(
            &["alice", "bob"],
            vec![persistent_chore("garden", dec!(20))],
            settings,
        )
        .await;

        let report = fx.store.run_settlement(JOB, now()).await.unwrap();

        assert!(report.skipped.is_empty());
        assert_eq!(balance(&fx.store, "alice").await, expected, "flag {flag}");
        assert_eq!(balance(&fx.store, "bob").await, expected, "flag {flag}");
    }
}

#[tokio::test]
async fn returned_chore_is_open_again_and_counts_as_incomplete() {
    let fx = fixture(
        &["alice", "bob"],
        vec![daily_chore("dishes", dec!(10))],
        with_setting(quiet_settings(), "incomplete_chores_penalty", dec!(50)),
    )
    .await;
    let claim = fx
        .store
        .submit_claim(
            "alice",
            ClaimRequest::Chore {
                chore_id: "dishes".into(),
            },
            now(),
        )
        .await
        .unwrap();

    assert!(fx.store.return_claim(claim.id, "alice").await.unwrap());

    let chores = fx.store.list_chores().await.unwrap();
    let (dishes, _) = chores.iter().find(|(c, _)| c.id == "dishes").unwrap();
    assert!(dishes.available);
    assert!(fx.store.list_claims_for_child("alice").await.unwrap().is_empty());

    let report = fx.store.run_settlement(JOB, now()).await.unwrap();

    assert_eq!(report.claims_approved, 0);
    assert_eq!(balance(&fx.store, "alice").await, dec!(-5));
    assert_eq!(balance(&fx.store, "bob").await, dec!(-5));
}

#[tokio::test]
async fn only_own_pending_claims_can_be_returned() {
    let fx = fixture(&["alice", "bob"], Vec::new(), quiet_settings()).await;
    let id = custom_claim(&fx.store, "alice", "windows", dec!(10)).await;

    let err = fx.store.return_claim(id, "bob").await.unwrap_err();
    assert!(matches!(err, SettlementError::NotFound { .. }));

    fx.store.approve_claim(id, dec!(0), "mum").await.unwrap();
    assert!(!fx.store.return_claim(id, "alice").await.unwrap());
    assert_eq!(balance(&fx.store, "alice").await, dec!(10));
    assert_eq!(fx.store.list_claims_for_child("alice").await.unwrap().len(), 1);
}
