use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    ActivityTotals, Owned, Page, Record, Repository, StatsRepository, StoreError, User,
    UserRepository,
};
use crate::error::FieldErrors;
use crate::records::{Event, Grade, Note, Project, ResourceLink, StudySession, Task};

/// In-process store selected with `DATABASE_URL=memory://`. One mutex guards
/// every table, so each operation is atomic with respect to all others.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

struct Table<R> {
    next_id: i64,
    rows: BTreeMap<i64, Owned<R>>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    records: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Tables {
    fn table<R: Record>(&mut self) -> &mut Table<R> {
        self.records
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Table::<R>::default()))
            .downcast_mut::<Table<R>>()
            .expect("table is keyed by its own record type")
    }

    fn ensure_project_owned(&mut self, owner: Uuid, project_id: Option<i64>) -> Result<(), StoreError> {
        let Some(project_id) = project_id else {
            return Ok(());
        };
        let owned = self
            .table::<Project>()
            .rows
            .get(&project_id)
            .is_some_and(|p| p.user_id == owner);
        if owned {
            Ok(())
        } else {
            Err(StoreError::Invalid(FieldErrors::single(
                "project_id",
                "unknown project",
            )))
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn list_owned<R: Record>(&self, owner: Uuid, page: Page) -> Result<Vec<Owned<R>>, StoreError> {
        let mut tables = self.inner.lock().await;
        let offset = usize::try_from(page.offset).unwrap_or(0);
        let limit = usize::try_from(page.limit).unwrap_or(0);
        Ok(tables
            .table::<R>()
            .rows
            .values()
            .filter(|row| row.user_id == owner)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_owned<R: Record>(&self, owner: Uuid, id: i64) -> Result<Option<Owned<R>>, StoreError> {
        let mut tables = self.inner.lock().await;
        Ok(tables
            .table::<R>()
            .rows
            .get(&id)
            .filter(|row| row.user_id == owner)
            .cloned())
    }

    async fn create_owned<R: Record>(&self, owner: Uuid, fields: R) -> Result<Owned<R>, StoreError> {
        fields.validate().map_err(StoreError::Invalid)?;
        let mut tables = self.inner.lock().await;
        tables.ensure_project_owned(owner, fields.linked_project())?;

        let table = tables.table::<R>();
        let id = table.next_id;
        table.next_id += 1;
        let row = Owned {
            id,
            user_id: owner,
            fields,
        };
        table.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update_owned<R: Record>(
        &self,
        owner: Uuid,
        id: i64,
        patch: R::Patch,
    ) -> Result<Option<Owned<R>>, StoreError> {
        let mut tables = self.inner.lock().await;
        let Some(current) = tables
            .table::<R>()
            .rows
            .get(&id)
            .filter(|row| row.user_id == owner)
        else {
            return Ok(None);
        };

        // Merge into a copy so a rejected patch leaves the stored row intact.
        let mut fields = current.fields.clone();
        fields.merge(patch);
        fields.validate().map_err(StoreError::Invalid)?;
        tables.ensure_project_owned(owner, fields.linked_project())?;

        let row = Owned {
            id,
            user_id: owner,
            fields,
        };
        tables.table::<R>().rows.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn delete_owned<R: Record>(&self, owner: Uuid, id: i64) -> Result<Option<Owned<R>>, StoreError> {
        let mut tables = self.inner.lock().await;
        let table = tables.table::<R>();
        if !table.rows.get(&id).is_some_and(|row| row.user_id == owner) {
            return Ok(None);
        }
        let removed = table.rows.remove(&id);

        if R::TABLE == Project::TABLE {
            for task in tables.table::<Task>().rows.values_mut() {
                task.fields.unlink_project(id);
            }
        }
        Ok(removed)
    }
}

macro_rules! memory_repository {
    ($($kind:ty),+ $(,)?) => {$(
        #[async_trait]
        impl Repository<$kind> for MemoryStore {
            async fn list(&self, owner: Uuid, page: Page) -> Result<Vec<Owned<$kind>>, StoreError> {
                self.list_owned::<$kind>(owner, page).await
            }

            async fn get(&self, owner: Uuid, id: i64) -> Result<Option<Owned<$kind>>, StoreError> {
                self.get_owned::<$kind>(owner, id).await
            }

            async fn create(&self, owner: Uuid, fields: $kind) -> Result<Owned<$kind>, StoreError> {
                self.create_owned(owner, fields).await
            }

            async fn update(
                &self,
                owner: Uuid,
                id: i64,
                patch: <$kind as Record>::Patch,
            ) -> Result<Option<Owned<$kind>>, StoreError> {
                self.update_owned::<$kind>(owner, id, patch).await
            }

            async fn delete(&self, owner: Uuid, id: i64) -> Result<Option<Owned<$kind>>, StoreError> {
                self.delete_owned::<$kind>(owner, id).await
            }
        }
    )+};
}

memory_repository!(Task, Note, ResourceLink, Project, Grade, Event, StudySession);

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut tables = self.inner.lock().await;
        if tables.users.iter().any(|u| u.email == email) {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for MemoryStore {
    async fn activity_totals(&self, owner: Uuid) -> Result<ActivityTotals, StoreError> {
        let mut tables = self.inner.lock().await;
        let pending_tasks = tables
            .table::<Task>()
            .rows
            .values()
            .filter(|t| t.user_id == owner && !t.fields.is_completed)
            .count() as i64;
        let notes = tables
            .table::<Note>()
            .rows
            .values()
            .filter(|n| n.user_id == owner)
            .count() as i64;
        let study_minutes = tables
            .table::<StudySession>()
            .rows
            .values()
            .filter(|s| s.user_id == owner)
            .map(|s| i64::from(s.fields.duration_minutes))
            .sum();
        Ok(ActivityTotals {
            pending_tasks,
            notes,
            study_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{NotePatch, TaskPatch};

    fn task(title: &str) -> Task {
        serde_json::from_value(serde_json::json!({ "title": title })).expect("task")
    }

    fn note(title: &str) -> Note {
        serde_json::from_value(serde_json::json!({ "title": title })).expect("note")
    }

    fn session(minutes: i32) -> StudySession {
        serde_json::from_value(serde_json::json!({ "subject": "math", "duration_minutes": minutes }))
            .expect("session")
    }

    #[tokio::test]
    async fn records_are_invisible_to_other_owners() {
        let store = MemoryStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let created = Repository::<Task>::create(&store, alice, task("alice's")).await.unwrap();

        let bobs = Repository::<Task>::list(&store, bob, Page::new(0, 100)).await.unwrap();
        assert!(bobs.is_empty());
        assert!(Repository::<Task>::get(&store, bob, created.id).await.unwrap().is_none());

        let patch: TaskPatch = serde_json::from_value(serde_json::json!({ "title": "mine now" })).unwrap();
        assert!(Repository::<Task>::update(&store, bob, created.id, patch)
            .await
            .unwrap()
            .is_none());
        assert!(Repository::<Task>::delete(&store, bob, created.id).await.unwrap().is_none());

        let still = Repository::<Task>::get(&store, alice, created.id).await.unwrap().unwrap();
        assert_eq!(still.fields.title, "alice's");
    }

    #[tokio::test]
    async fn pages_do_not_overlap_and_keep_order() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        for i in 0..5 {
            Repository::<Note>::create(&store, owner, note(&format!("n{i}"))).await.unwrap();
        }
        // Someone else's rows interleaved must not shift the window.
        Repository::<Note>::create(&store, Uuid::new_v4(), note("other")).await.unwrap();

        let first = Repository::<Note>::list(&store, owner, Page::new(0, 2)).await.unwrap();
        let second = Repository::<Note>::list(&store, owner, Page::new(2, 2)).await.unwrap();
        let titles = |rows: &[Owned<Note>]| rows.iter().map(|r| r.fields.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&first), ["n0", "n1"]);
        assert_eq!(titles(&second), ["n2", "n3"]);
    }

    #[tokio::test]
    async fn rejected_patch_leaves_row_untouched() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let created = Repository::<Note>::create(&store, owner, note("keep")).await.unwrap();

        let patch: NotePatch = serde_json::from_value(serde_json::json!({ "title": "  " })).unwrap();
        let err = Repository::<Note>::update(&store, owner, created.id, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));

        let row = Repository::<Note>::get(&store, owner, created.id).await.unwrap().unwrap();
        assert_eq!(row.fields.title, "keep");
    }

    #[tokio::test]
    async fn task_cannot_link_someone_elses_project() {
        let store = MemoryStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let project: Project = serde_json::from_value(serde_json::json!({ "title": "thesis" })).unwrap();
        let project = Repository::<Project>::create(&store, alice, project).await.unwrap();

        let mut linked = task("write intro");
        linked.project_id = Some(project.id);
        let err = Repository::<Task>::create(&store, bob, linked.clone()).await.unwrap_err();
        match err {
            StoreError::Invalid(fields) => assert_eq!(fields.get("project_id"), Some("unknown project")),
            other => panic!("unexpected error: {other:?}"),
        }

        let ok = Repository::<Task>::create(&store, alice, linked).await.unwrap();
        assert_eq!(ok.fields.project_id, Some(project.id));
    }

    #[tokio::test]
    async fn deleting_project_unlinks_tasks() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let project: Project = serde_json::from_value(serde_json::json!({ "title": "thesis" })).unwrap();
        let project = Repository::<Project>::create(&store, owner, project).await.unwrap();
        let mut linked = task("outline");
        linked.project_id = Some(project.id);
        let linked = Repository::<Task>::create(&store, owner, linked).await.unwrap();

        Repository::<Project>::delete(&store, owner, project.id).await.unwrap().unwrap();

        let after = Repository::<Task>::get(&store, owner, linked.id).await.unwrap().unwrap();
        assert_eq!(after.fields.project_id, None);
    }

    #[tokio::test]
    async fn activity_totals_count_only_the_owner() {
        let store = MemoryStore::new();
        let (owner, other) = (Uuid::new_v4(), Uuid::new_v4());

        Repository::<Task>::create(&store, owner, task("open")).await.unwrap();
        let mut done = task("done");
        done.is_completed = true;
        Repository::<Task>::create(&store, owner, done).await.unwrap();
        Repository::<Task>::create(&store, other, task("not mine")).await.unwrap();
        Repository::<Note>::create(&store, owner, note("n")).await.unwrap();
        for minutes in [30, 90, 45] {
            Repository::<StudySession>::create(&store, owner, session(minutes)).await.unwrap();
        }
        Repository::<StudySession>::create(&store, other, session(600)).await.unwrap();

        let totals = store.activity_totals(owner).await.unwrap();
        assert_eq!(
            totals,
            ActivityTotals {
                pending_tasks: 1,
                notes: 1,
                study_minutes: 165
            }
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store.create_user("a@example.com", "hash").await.unwrap();
        let err = store.create_user("a@example.com", "hash2").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
        // Stored case-sensitively.
        store.create_user("A@example.com", "hash3").await.unwrap();
    }
}
