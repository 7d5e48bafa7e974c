//! Postgres-backed repository and scheduler tests.
//!
//! Each test recreates its own database from `TEST_DATABASE_URL` and is
//! skipped when that variable is not set.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use diesel_async::scoped_futures::ScopedFutureExt;
use uuid::Uuid;

use adventuremeets_test::component::config::TransitionGuard;
use adventuremeets_test::component::db::query;
use adventuremeets_test::component::db::transaction::with_transaction;
use adventuremeets_test::component::domain::attendee::AttendeeStatus;
use adventuremeets_test::component::domain::status::MeetStatus;
use adventuremeets_test::component::error::ServiceError;
use adventuremeets_test::component::meet::{self, Actor, MeetPatch, MeetView, NewMeetRequest};
use adventuremeets_test::component::predicate::Predicate;
use adventuremeets_test::component::remote::StatusUpdater;
use adventuremeets_test::component::repository::pg::PgRepository;
use adventuremeets_test::component::repository::{
    AttendeeDraft, ContactKeys, MeetRepository, SchedulerStore,
};
use adventuremeets_test::component::scheduler::{MeetScheduler, TickOutcome};
use adventuremeets_test::component::signup::{self, AttendeeFilter};

use super::helpers::{MeetSpec, TestDb, WORKER_KEY, spawn_api, test_db};

fn draft(meet_id: Uuid, email: &str, status: AttendeeStatus) -> AttendeeDraft {
    AttendeeDraft {
        meet_id,
        user_id: None,
        name: Some("Thandi".to_string()),
        email: Some(email.to_string()),
        phone: None,
        guests: Some(0),
        keys: ContactKeys::from_contact(Some(email), None),
        status,
    }
}

async fn waitlist(repo: &PgRepository, meet_id: Uuid, how_many: usize) -> anyhow::Result<()> {
    for n in 0..how_many {
        repo.insert_attendee(draft(meet_id, &format!("wait{n}@example.org"), AttendeeStatus::Waitlisted))
            .await?;
    }
    Ok(())
}

fn repository(db: &TestDb) -> PgRepository {
    PgRepository::new(db.pool.clone())
}

#[test_log::test(tokio::test)]
async fn test_migrations_seed_status_catalogue() -> anyhow::Result<()> {
    let Some(db) = test_db("status_catalogue").await? else {
        return Ok(());
    };

    let rows = repository(&db).list_statuses().await?;

    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, (1..=7).collect::<Vec<_>>());
    assert_eq!(rows[2].name, "Open");
    assert_eq!(rows[6].name, "Completed");
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_due_lookups() -> anyhow::Result<()> {
    let Some(db) = test_db("due_lookups").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let now = Utc::now();
    let past = Some(now - Duration::hours(1));
    let future = Some(now + Duration::hours(1));

    let opening = db
        .insert_meet(
            MeetStatus::Published,
            MeetSpec {
                opening_date: past,
                ..MeetSpec::default()
            },
        )
        .await?;
    // Same dates, wrong source status.
    db.insert_meet(
        MeetStatus::Draft,
        MeetSpec {
            opening_date: past,
            ..MeetSpec::default()
        },
    )
    .await?;
    db.insert_meet(
        MeetStatus::Published,
        MeetSpec {
            opening_date: future,
            ..MeetSpec::default()
        },
    )
    .await?;
    let closing = db
        .insert_meet(
            MeetStatus::Open,
            MeetSpec {
                opening_date: past,
                closing_date: past,
                ..MeetSpec::default()
            },
        )
        .await?;
    let ended = db
        .insert_meet(
            MeetStatus::Closed,
            MeetSpec {
                end_time: past,
                ..MeetSpec::default()
            },
        )
        .await?;
    let full = db
        .insert_meet(
            MeetStatus::Open,
            MeetSpec {
                waitlist_size: Some(2),
                ..MeetSpec::default()
            },
        )
        .await?;
    let no_waitlist = db
        .insert_meet(
            MeetStatus::Open,
            MeetSpec {
                waitlist_size: Some(0),
                ..MeetSpec::default()
            },
        )
        .await?;
    waitlist(&repo, full.id, 2).await?;
    // Stored directly; the service would refuse these.
    waitlist(&repo, no_waitlist.id, 1).await?;

    let mut session = repo.acquire().await?;
    assert_eq!(session.due(Predicate::OpenDue, now).await?, vec![opening.id]);
    assert_eq!(session.due(Predicate::CloseDue, now).await?, vec![closing.id]);
    assert_eq!(session.due(Predicate::WaitlistFull, now).await?, vec![full.id]);
    assert_eq!(session.due(Predicate::EndDue, now).await?, vec![ended.id]);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_scheduler_against_database_and_api() -> anyhow::Result<()> {
    let Some(db) = test_db("scheduler_end_to_end").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let now = Utc::now();
    let opening = db
        .insert_meet(
            MeetStatus::Published,
            MeetSpec {
                opening_date: Some(now - Duration::hours(1)),
                closing_date: Some(now + Duration::hours(1)),
                ..MeetSpec::default()
            },
        )
        .await?;
    let finished = db
        .insert_meet(
            MeetStatus::Open,
            MeetSpec {
                closing_date: Some(now - Duration::minutes(5)),
                end_time: Some(now - Duration::minutes(5)),
                ..MeetSpec::default()
            },
        )
        .await?;

    let api = spawn_api(Arc::new(repo.clone()), TransitionGuard::Strict).await;
    let updater: Arc<dyn StatusUpdater> = Arc::new(api.status_client(WORKER_KEY));
    let scheduler = MeetScheduler::new(Arc::new(repo.clone()), Some(updater), 3);

    let TickOutcome::Completed(first) = scheduler.trigger().await? else {
        panic!("first tick did not complete");
    };
    assert_eq!((first.opened, first.closed, first.archived), (1, 1, 0));
    assert_eq!(first.deferred, 1);
    assert_eq!(db.meet(opening.id).await?.status_id, MeetStatus::Open.id());
    assert_eq!(db.meet(finished.id).await?.status_id, MeetStatus::Closed.id());

    let TickOutcome::Completed(second) = scheduler.trigger().await? else {
        panic!("second tick did not complete");
    };
    assert_eq!((second.opened, second.closed, second.archived), (0, 0, 1));
    assert_eq!(
        db.meet(finished.id).await?.status_id,
        MeetStatus::Completed.id()
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_duplicate_contact_is_conflict() -> anyhow::Result<()> {
    let Some(db) = test_db("duplicate_contact").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let meet = db.insert_meet(MeetStatus::Open, MeetSpec::default()).await?;

    repo.insert_attendee(draft(meet.id, "sipho@example.org", AttendeeStatus::Pending))
        .await?;
    let err = repo
        .insert_attendee(draft(meet.id, " Sipho@Example.org ", AttendeeStatus::Pending))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Conflict(_)), "{err}");
    let found = repo
        .find_attendee_by_contact(meet.id, &ContactKeys::from_contact(Some("SIPHO@example.org"), None))
        .await?;
    assert!(found.is_some());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_capacity_enforced_on_confirm() -> anyhow::Result<()> {
    let Some(db) = test_db("capacity_confirm").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let meet = db
        .insert_meet(
            MeetStatus::Open,
            MeetSpec {
                capacity: Some(1),
                waitlist_size: Some(1),
                ..MeetSpec::default()
            },
        )
        .await?;
    let first = repo
        .insert_attendee(draft(meet.id, "one@example.org", AttendeeStatus::Pending))
        .await?;
    let second = repo
        .insert_attendee(draft(meet.id, "two@example.org", AttendeeStatus::Pending))
        .await?;

    repo.update_attendee_status(meet.id, first.id, AttendeeStatus::Confirmed, Utc::now())
        .await?;
    let err = repo
        .update_attendee_status(meet.id, second.id, AttendeeStatus::Confirmed, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err}");

    let waitlisted = repo
        .update_attendee_status(meet.id, second.id, AttendeeStatus::Waitlisted, Utc::now())
        .await?
        .expect("attendee exists");
    assert_eq!(AttendeeStatus::from(waitlisted.status), AttendeeStatus::Waitlisted);

    let counts = repo.attendee_counts(meet.id).await?;
    assert_eq!(counts.attendee_count, 2);
    assert_eq!(counts.confirmed_count, 1);
    assert_eq!(counts.waitlist_count, 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_concurrent_confirms_respect_capacity() -> anyhow::Result<()> {
    let Some(db) = test_db("concurrent_confirms").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let meet = db
        .insert_meet(
            MeetStatus::Open,
            MeetSpec {
                capacity: Some(1),
                ..MeetSpec::default()
            },
        )
        .await?;
    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..3 {
        let attendee = repo
            .insert_attendee(draft(meet.id, &format!("racer{n}@example.org"), AttendeeStatus::Pending))
            .await?;
        let repo = repo.clone();
        tasks.spawn(async move {
            repo.update_attendee_status(meet.id, attendee.id, AttendeeStatus::Confirmed, Utc::now())
                .await
        });
    }

    let mut confirmed = 0;
    while let Some(result) = tasks.join_next().await {
        match result? {
            Ok(_) => confirmed += 1,
            Err(ServiceError::Conflict(_)) => {}
            Err(other) => return Err(other.into()),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(repo.attendee_counts(meet.id).await?.confirmed_count, 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_delete_draft_only() -> anyhow::Result<()> {
    let Some(db) = test_db("delete_draft").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let draft_meet = db.insert_meet(MeetStatus::Draft, MeetSpec::default()).await?;
    let published = db
        .insert_meet(MeetStatus::Published, MeetSpec::default())
        .await?;

    assert!(repo.delete_draft(draft_meet.id).await?);
    assert!(!repo.delete_draft(published.id).await?);
    assert!(repo.find_meet(draft_meet.id).await?.is_none());
    assert!(repo.find_meet(published.id).await?.is_some());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_status_write_checks_expected_status() -> anyhow::Result<()> {
    let Some(db) = test_db("status_compare_and_set").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let meet = db.insert_meet(MeetStatus::Open, MeetSpec::default()).await?;

    let stale = repo
        .set_status(meet.id, MeetStatus::Closed, Some(MeetStatus::Published), Utc::now())
        .await?;
    assert!(stale.is_none());
    assert_eq!(db.meet(meet.id).await?.status_id, MeetStatus::Open.id());

    let updated = repo
        .set_status(meet.id, MeetStatus::Closed, Some(MeetStatus::Open), Utc::now())
        .await?
        .expect("status matched");
    assert_eq!(updated.status_id, MeetStatus::Closed.id());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_signup_waits_for_concurrent_close() -> anyhow::Result<()> {
    let Some(db) = test_db("signup_during_close").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let meet = db.insert_meet(MeetStatus::Open, MeetSpec::default()).await?;
    let meet_id = meet.id;

    // Close the meet while holding its row; the signup starts in between.
    let mut holder = db.pool.get().await?;
    let pending = with_transaction(&mut holder, move |tx| {
        async move {
            query::meet::lock_by_id(tx, meet_id).await?;
            let signup = tokio::spawn(async move {
                repo.insert_attendee(draft(meet_id, "late@example.org", AttendeeStatus::Pending))
                    .await
            });
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            query::meet::update_status(tx, meet_id, MeetStatus::Closed, Utc::now()).await?;
            Ok::<_, diesel::result::Error>(signup)
        }
        .scope_boxed()
    })
    .await?;

    let err = pending.await?.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err}");
    let counts = repository(&db).attendee_counts(meet_id).await?;
    assert_eq!(counts.attendee_count, 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_organizer_meet_lifecycle() -> anyhow::Result<()> {
    let Some(db) = test_db("organizer_crud").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let user_id = Uuid::now_v7();
    let organizer = Actor::Organizer {
        user_id,
        organization_ids: vec![],
    };
    let start = Utc::now() + Duration::days(7);

    let created = meet::create_meet(
        &repo,
        &organizer,
        NewMeetRequest {
            organization_id: None,
            details: MeetPatch {
                name: Some("Kloof Corner scramble".to_string()),
                start_time: Some(start),
                capacity: Some(4),
                ..MeetPatch::default()
            },
        },
    )
    .await?;
    assert_eq!(created.status_id, MeetStatus::Draft.id());
    assert_eq!(created.organizer_id, user_id);
    assert_eq!(created.capacity, Some(4));

    let updated = meet::update_meet(
        &repo,
        created.id,
        &organizer,
        MeetPatch {
            description: Some("Bring gloves".to_string()),
            ..MeetPatch::default()
        },
    )
    .await?;
    assert_eq!(updated.description.as_deref(), Some("Bring gloves"));
    assert_eq!(updated.capacity, Some(4));
    assert!(updated.updated_at >= created.updated_at);

    // Not managed by this organizer.
    let other = db.insert_meet(MeetStatus::Completed, MeetSpec::default()).await?;
    repo.set_status(created.id, MeetStatus::Open, None, Utc::now())
        .await?;
    repo.insert_attendee(draft(created.id, "a@example.org", AttendeeStatus::Confirmed))
        .await?;

    let plan = meet::list_meets(&repo, &organizer, MeetView::Plan, None, None).await?;
    assert_eq!(plan.total, 1);
    assert_eq!(plan.items[0].meet.id, created.id);
    assert_eq!(plan.items[0].counts.confirmed_count, 1);

    let reports = meet::list_meets(&repo, &Actor::Worker, MeetView::Reports, None, None).await?;
    assert_eq!(reports.total, 1);
    assert_eq!(reports.items[0].meet.id, other.id);
    assert_eq!(reports.items[0].counts.attendee_count, 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_published_limits_follow_counts() -> anyhow::Result<()> {
    let Some(db) = test_db("published_limits").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let meet = db
        .insert_meet(
            MeetStatus::Open,
            MeetSpec {
                capacity: Some(3),
                ..MeetSpec::default()
            },
        )
        .await?;
    for email in ["one@example.org", "two@example.org"] {
        repo.insert_attendee(draft(meet.id, email, AttendeeStatus::Confirmed))
            .await?;
    }

    let shrink = |capacity| MeetPatch {
        capacity: Some(capacity),
        ..MeetPatch::default()
    };
    let err = meet::update_meet(&repo, meet.id, &Actor::Worker, shrink(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err}");
    let kept = meet::update_meet(&repo, meet.id, &Actor::Worker, shrink(2)).await?;
    assert_eq!(kept.capacity, Some(2));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_roster_listing_and_removal() -> anyhow::Result<()> {
    let Some(db) = test_db("roster").await? else {
        return Ok(());
    };
    let repo = repository(&db);
    let meet = db.insert_meet(MeetStatus::Open, MeetSpec::default()).await?;
    let first = repo
        .insert_attendee(draft(meet.id, "first@example.org", AttendeeStatus::Confirmed))
        .await?;
    let second = repo
        .insert_attendee(draft(meet.id, "second@example.org", AttendeeStatus::Pending))
        .await?;

    let all = signup::list_attendees(&repo, meet.id, &Actor::Worker, AttendeeFilter::All).await?;
    let ids: Vec<Uuid> = all.iter().map(|a| a.id).collect();
    assert_eq!(ids, [first.id, second.id]);
    let accepted =
        signup::list_attendees(&repo, meet.id, &Actor::Worker, AttendeeFilter::Accepted).await?;
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, first.id);

    signup::remove_attendee(&repo, meet.id, first.id, &Actor::Worker).await?;
    let err = signup::remove_attendee(&repo, meet.id, first.id, &Actor::Worker)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err}");
    assert_eq!(repo.attendee_counts(meet.id).await?.attendee_count, 1);
    Ok(())
}
