//! `PgStore` against a live database. Runs when `DATABASE_URL` names a
//! Postgres server and returns early otherwise.

use second_brain::records::{
    Event, Grade, Note, Project, ResourceLink, StudySession, Task, TaskPatch,
};
use second_brain::store::{
    ActivityTotals, Page, PgStore, Repository, StatsRepository, StoreError, UserRepository,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, Executor};
use uuid::Uuid;

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with("postgres://") || url.starts_with("postgresql://"))
}

async fn pg_store() -> Option<PgStore> {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL is not a postgres URL; skipping");
        return None;
    };
    let store = PgStore::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    Some(store)
}

async fn new_owner(store: &PgStore) -> Uuid {
    let email = format!("{}@example.com", Uuid::new_v4());
    store.create_user(&email, "hash").await.expect("user").id
}

fn from_json<T: DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("fixture")
}

#[tokio::test]
async fn schema_can_be_applied_again() {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL is not a postgres URL; skipping");
        return;
    };
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .expect("connect");
    let store = PgStore::new(pool.clone());
    store.migrate().await.expect("first migrate");
    store.migrate().await.expect("second migrate");

    let schema = include_str!("../migrations/0001_init.sql");
    pool.execute(schema).await.expect("schema replay");
    pool.execute(schema).await.expect("schema replay again");
}

#[tokio::test]
async fn every_kind_roundtrips_its_columns() {
    let Some(store) = pg_store().await else { return };
    let owner = new_owner(&store).await;

    let project = Repository::<Project>::create(
        &store,
        owner,
        from_json(json!({ "title": "Thesis", "description": "ch. 1-3", "deadline": "2024-06-30" })),
    )
    .await
    .unwrap();
    assert_eq!(
        serde_json::to_value(&project).unwrap()["deadline"],
        "2024-06-30"
    );

    let task = Repository::<Task>::create(
        &store,
        owner,
        from_json(json!({
            "title": "Outline", "description": "draft", "due_date": "2024-05-01",
            "priority": "High", "status": "In Progress", "tags": "thesis",
            "project_id": project.id
        })),
    )
    .await
    .unwrap();
    assert_eq!(task.fields.priority, "High");
    assert_eq!(task.fields.status, "In Progress");
    assert_eq!(task.fields.tags.as_deref(), Some("thesis"));
    assert_eq!(task.fields.project_id, Some(project.id));
    assert!(!task.fields.is_completed);

    let note = Repository::<Note>::create(
        &store,
        owner,
        from_json(json!({ "title": "Lecture 4", "content": "graphs", "tags": "cs", "created_at": "2024-03-01" })),
    )
    .await
    .unwrap();
    assert_eq!(note.fields.content.as_deref(), Some("graphs"));

    let link = Repository::<ResourceLink>::create(
        &store,
        owner,
        from_json(json!({ "title": "Rust book", "url": "https://doc.rust-lang.org/book/", "type": "Link", "tags": "rust" })),
    )
    .await
    .unwrap();
    assert_eq!(link.fields.kind.as_deref(), Some("Link"));
    assert_eq!(link.fields.tags.as_deref(), Some("rust"));

    let grade = Repository::<Grade>::create(
        &store,
        owner,
        from_json(json!({ "subject": "math", "score": 87.5, "weight": 2.0, "date": "2024-02-10" })),
    )
    .await
    .unwrap();
    assert_eq!(grade.fields.score, 87.5);
    assert_eq!(grade.fields.weight, 2.0);

    let event = Repository::<Event>::create(
        &store,
        owner,
        from_json(json!({
            "title": "Exam", "description": "room 4", "start_time": "2024-06-01T09:00",
            "end_time": "2024-06-01T11:00", "recurrence": "none"
        })),
    )
    .await
    .unwrap();
    assert_eq!(event.fields.end_time, "2024-06-01T11:00");
    assert_eq!(event.fields.recurrence.as_deref(), Some("none"));

    let session = Repository::<StudySession>::create(
        &store,
        owner,
        from_json(json!({ "subject": "bio", "duration_minutes": 45, "date": "2024-02-11" })),
    )
    .await
    .unwrap();
    assert_eq!(session.fields.duration_minutes, 45);

    // Updates rewrite every column; the untouched ones must come back unchanged.
    let patch: TaskPatch = from_json(json!({ "is_completed": true, "tags": null }));
    let updated = Repository::<Task>::update(&store, owner, task.id, patch)
        .await
        .unwrap()
        .expect("own task");
    assert!(updated.fields.is_completed);
    assert_eq!(updated.fields.tags, None);
    assert_eq!(updated.fields.title, "Outline");
    assert_eq!(updated.fields.priority, "High");
    assert_eq!(updated.fields.due_date, task.fields.due_date);
    assert_eq!(updated.fields.project_id, Some(project.id));

    let grade_patch = from_json(json!({ "score": 91.0 }));
    let regraded = Repository::<Grade>::update(&store, owner, grade.id, grade_patch)
        .await
        .unwrap()
        .expect("own grade");
    assert_eq!(regraded.fields.score, 91.0);
    assert_eq!(regraded.fields.weight, 2.0);
    assert_eq!(regraded.fields.subject, "math");
}

#[tokio::test]
async fn other_owners_get_nothing() {
    let Some(store) = pg_store().await else { return };
    let alice = new_owner(&store).await;
    let bob = new_owner(&store).await;

    let created = Repository::<Note>::create(&store, alice, from_json(json!({ "title": "private" })))
        .await
        .unwrap();

    assert!(Repository::<Note>::list(&store, bob, Page::new(0, 100))
        .await
        .unwrap()
        .is_empty());
    assert!(Repository::<Note>::get(&store, bob, created.id).await.unwrap().is_none());
    let patch = from_json(json!({ "title": "mine now" }));
    assert!(Repository::<Note>::update(&store, bob, created.id, patch)
        .await
        .unwrap()
        .is_none());
    assert!(Repository::<Note>::delete(&store, bob, created.id).await.unwrap().is_none());

    let still = Repository::<Note>::get(&store, alice, created.id)
        .await
        .unwrap()
        .expect("owner still sees it");
    assert_eq!(still.fields.title, "private");

    let deleted = Repository::<Note>::delete(&store, alice, created.id)
        .await
        .unwrap()
        .expect("owner deletes");
    assert_eq!(deleted.id, created.id);
    assert!(Repository::<Note>::get(&store, alice, created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn pages_follow_insertion_order() {
    let Some(store) = pg_store().await else { return };
    let owner = new_owner(&store).await;
    let other = new_owner(&store).await;

    for i in 0..5 {
        Repository::<Note>::create(&store, owner, from_json(json!({ "title": format!("n{i}") })))
            .await
            .unwrap();
        Repository::<Note>::create(&store, other, from_json(json!({ "title": "noise" })))
            .await
            .unwrap();
    }

    let first = Repository::<Note>::list(&store, owner, Page::new(0, 2)).await.unwrap();
    let second = Repository::<Note>::list(&store, owner, Page::new(2, 2)).await.unwrap();
    let titles = |rows: &[second_brain::store::Owned<Note>]| {
        rows.iter().map(|r| r.fields.title.clone()).collect::<Vec<_>>()
    };
    assert_eq!(titles(&first), ["n0", "n1"]);
    assert_eq!(titles(&second), ["n2", "n3"]);
}

#[tokio::test]
async fn duplicate_email_is_reported() {
    let Some(store) = pg_store().await else { return };
    let email = format!("{}@example.com", Uuid::new_v4());
    store.create_user(&email, "hash").await.unwrap();

    let err = store.create_user(&email, "hash2").await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate));

    store.create_user(&email.to_uppercase(), "hash3").await.unwrap();
}

#[tokio::test]
async fn project_links_are_owner_scoped_and_cleared_on_delete() {
    let Some(store) = pg_store().await else { return };
    let alice = new_owner(&store).await;
    let bob = new_owner(&store).await;

    let project = Repository::<Project>::create(&store, alice, from_json(json!({ "title": "Thesis" })))
        .await
        .unwrap();

    let err = Repository::<Task>::create(
        &store,
        bob,
        from_json(json!({ "title": "sneak", "project_id": project.id })),
    )
    .await
    .unwrap_err();
    match err {
        StoreError::Invalid(fields) => assert_eq!(fields.get("project_id"), Some("unknown project")),
        other => panic!("unexpected error: {other:?}"),
    }

    let task = Repository::<Task>::create(
        &store,
        alice,
        from_json(json!({ "title": "outline", "project_id": project.id })),
    )
    .await
    .unwrap();

    Repository::<Project>::delete(&store, alice, project.id)
        .await
        .unwrap()
        .expect("own project");
    let after = Repository::<Task>::get(&store, alice, task.id)
        .await
        .unwrap()
        .expect("task survives");
    assert_eq!(after.fields.project_id, None);
}

#[tokio::test]
async fn activity_totals_match_owned_rows() {
    let Some(store) = pg_store().await else { return };
    let owner = new_owner(&store).await;
    let other = new_owner(&store).await;

    Repository::<Task>::create(&store, owner, from_json(json!({ "title": "open" })))
        .await
        .unwrap();
    Repository::<Task>::create(
        &store,
        owner,
        from_json(json!({ "title": "done", "is_completed": true })),
    )
    .await
    .unwrap();
    Repository::<Task>::create(&store, other, from_json(json!({ "title": "not mine" })))
        .await
        .unwrap();
    Repository::<Note>::create(&store, owner, from_json(json!({ "title": "n" })))
        .await
        .unwrap();
    for minutes in [30, 90, 45] {
        Repository::<StudySession>::create(
            &store,
            owner,
            from_json(json!({ "subject": "math", "duration_minutes": minutes })),
        )
        .await
        .unwrap();
    }
    Repository::<StudySession>::create(
        &store,
        other,
        from_json(json!({ "subject": "math", "duration_minutes": 600 })),
    )
    .await
    .unwrap();

    let totals = store.activity_totals(owner).await.unwrap();
    assert_eq!(
        totals,
        ActivityTotals {
            pending_tasks: 1,
            notes: 1,
            study_minutes: 165
        }
    );

    let stats = second_brain::stats::compute(&store, owner).await.unwrap();
    assert_eq!(stats.total_study_hours, 2.8);

    let empty = store.activity_totals(new_owner(&store).await).await.unwrap();
    assert_eq!(empty, ActivityTotals::default());
}
