//! End-to-end scenarios against an on-disk database.

use std::time::Duration;

use studyhall_core::core::{CoreContext, ErrorKind, Services};
use rusqlite::ErrorCode;
use studyhall_core::model::{FlagKind, ReviewTarget, Role};
use studyhall_core::store;
use tempfile::TempDir;

fn setup() -> (TempDir, CoreContext) {
    let dir = TempDir::new().unwrap();
    let ctx = CoreContext::with_db_path(
        &dir.path().join(".studyhall").join("studyhall.db"),
        Duration::from_millis(500),
    );
    assert!(ctx.initialize().unwrap());

    let services = ctx.services().unwrap();
    let users = services.users();
    users.register("dean", "dean", &[Role::Admin]).unwrap();
    for (name, role) in [
        ("alex", Role::Reviewer),
        ("maan", Role::Student),
        ("priya", Role::Student),
        ("sam", Role::Staff),
    ] {
        users.register("dean", name, &[role]).unwrap();
    }
    (dir, ctx)
}

fn seed_answer(services: &Services) -> i64 {
    let q = services
        .questions()
        .ask("maan", "Why is my borrow moved?", "See snippet.", &["rust".to_string()])
        .unwrap();
    services
        .answers()
        .post("priya", q.question_id, "You moved it into the closure.", None)
        .unwrap()
        .answer_id
}

#[test]
fn review_chain_survives_reopen() {
    let (_dir, ctx) = setup();
    let target = {
        let services = ctx.services().unwrap();
        let target = ReviewTarget::answer(seed_answer(&services));
        let first = services
            .reviews()
            .submit("alex", target, 2, Some("Needs work"))
            .unwrap();
        services
            .reviews()
            .update(&first, 5, Some("Fixed everything"))
            .unwrap();
        target
    };

    let services = ctx.services().unwrap();
    let history = services.reviews().history_for("alex", target).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].rating, 2);
    assert!(!history[0].is_latest);
    assert_eq!(history[1].rating, 5);
    assert_eq!(
        history[1].previous_review_id.as_deref(),
        Some(history[0].review_id.as_str())
    );
    assert!(services.doctor().run().unwrap().healthy);
}

#[test]
fn stale_writer_from_another_session_is_rejected() {
    let (_dir, ctx) = setup();
    let first_session = ctx.services().unwrap();
    let second_session = ctx.services().unwrap();

    let target = ReviewTarget::answer(seed_answer(&first_session));
    first_session
        .reviews()
        .submit("alex", target, 3, None)
        .unwrap();

    // Both sessions read the same latest version.
    let seen_by_first = first_session.reviews().latest_for("alex", target).unwrap().unwrap();
    let seen_by_second = second_session.reviews().latest_for("alex", target).unwrap().unwrap();
    assert_eq!(seen_by_first, seen_by_second);

    first_session.reviews().update(&seen_by_first, 4, None).unwrap();
    let err = second_session
        .reviews()
        .update(&seen_by_second, 1, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Concurrency);

    let history = second_session.reviews().history_for("alex", target).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|r| r.is_latest).count(), 1);
    assert_eq!(history[1].rating, 4);
}

#[test]
fn schema_rejects_second_latest_version() {
    let (_dir, ctx) = setup();
    let services = ctx.services().unwrap();
    let target = ReviewTarget::answer(seed_answer(&services));
    let latest = services
        .reviews()
        .submit("alex", target, 3, None)
        .unwrap();

    // Bypass the service and write a rival latest row straight to the table.
    let mut rival = latest.clone();
    rival.review_id = "rv-dupl0001".to_string();
    rival.rating = 1;
    let err = store::reviews::insert_review(services.store().conn(), &rival).unwrap_err();
    let code = err.chain().find_map(|cause| match cause.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => Some((e.code, e.extended_code)),
        _ => None,
    });
    assert_eq!(
        code,
        Some((
            ErrorCode::ConstraintViolation,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        ))
    );

    // A superseded row may share the pair.
    rival.is_latest = false;
    store::reviews::insert_review(services.store().conn(), &rival).unwrap();

    let history = services.reviews().history_for("alex", target).unwrap();
    assert_eq!(history.iter().filter(|r| r.is_latest).count(), 1);
    assert_eq!(
        services.reviews().latest_for("alex", target).unwrap().unwrap().review_id,
        latest.review_id
    );
}

#[test]
fn write_blocked_by_another_session_reports_concurrency() {
    let (_dir, ctx) = setup();
    let holder = ctx.services().unwrap();
    let writer = ctx.services().unwrap();

    let target = ReviewTarget::answer(seed_answer(&holder));
    let first = holder.reviews().submit("alex", target, 3, None).unwrap();

    let tx = holder.store().begin_immediate().unwrap();
    let err = writer.reviews().update(&first, 5, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Concurrency);
    drop(tx);

    let history = writer.reviews().history_for("alex", target).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rating, 3);

    // Once the lock is gone the same write goes through.
    let write = writer.reviews().update(&first, 5, None).unwrap();
    assert!(write.created);
}

#[test]
fn second_session_cannot_submit_same_pair() {
    let (_dir, ctx) = setup();
    let first_session = ctx.services().unwrap();
    let second_session = ctx.services().unwrap();
    let target = ReviewTarget::answer(seed_answer(&first_session));

    let winner = first_session
        .reviews()
        .submit("alex", target, 4, None)
        .unwrap();
    let err = second_session
        .reviews()
        .submit("alex", target, 2, Some("late"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let history = second_session.reviews().history_for("alex", target).unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_latest);
    assert_eq!(history[0].review_id, winner.review_id);
}

#[test]
fn trusted_reviewer_update_reaches_student_inbox() {
    let (_dir, ctx) = setup();
    let services = ctx.services().unwrap();
    let target = ReviewTarget::answer(seed_answer(&services));

    services.trust().add_or_update("maan", "alex", 3).unwrap();
    services.reviews().save("alex", target, 4, None).unwrap();

    assert!(services.trust().list_updated("maan").unwrap().contains("alex"));
    let summary = services.inbox().summary("maan").unwrap();
    assert!(summary.updated_reviewers.contains("alex"));

    services.trust().view_profile("maan", "alex").unwrap();
    assert!(!services.trust().list_updated("maan").unwrap().contains("alex"));
    assert!(services.inbox().summary("maan").unwrap().updated_reviewers.is_empty());
}

#[test]
fn moderation_round_trip() {
    let (_dir, ctx) = setup();
    let services = ctx.services().unwrap();
    let answer = seed_answer(&services);

    let flags = services.flags();
    flags.file(FlagKind::Answer, answer, "sam", "plagiarised").unwrap();
    assert_eq!(services.inbox().unresolved_flag_count("priya").unwrap(), 1);

    assert_eq!(flags.resolve(answer, FlagKind::Answer, "sam").unwrap(), 1);
    assert_eq!(flags.resolve(answer, FlagKind::Answer, "sam").unwrap(), 0);
    assert!(flags.is_resolved(answer, FlagKind::Answer).unwrap());
    assert_eq!(services.inbox().unresolved_flag_count("priya").unwrap(), 0);
}
