//! Persistence seam. Every record operation takes the calling principal and
//! conjoins `user_id = principal` into its predicate; nothing here accepts an
//! owner from request data.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::QueryAs,
    FromRow, Postgres, Row,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::FieldErrors;
use crate::records::{Event, Grade, Note, Project, ResourceLink, StudySession, Task};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate email")]
    Duplicate,
    #[error("invalid record")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Registered principal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub created_at: OffsetDateTime,
}

/// Window over an owner's records, ordered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }
}

/// A stored record: identifier and owner around the kind's own fields.
#[derive(Debug, Clone, Serialize)]
pub struct Owned<R> {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    #[serde(flatten)]
    pub fields: R,
}

impl<'r, R> FromRow<'r, PgRow> for Owned<R>
where
    R: FromRow<'r, PgRow>,
{
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            fields: R::from_row(row)?,
        })
    }
}

pub type PgQueryAs<'q, O> = QueryAs<'q, Postgres, O, PgArguments>;

/// A user-owned record kind (task, note, ...).
///
/// The implementing type is the set of client-writable fields; `Patch` is the
/// update body, where an absent field leaves the stored value untouched.
pub trait Record:
    Clone + Send + Sync + Unpin + Serialize + DeserializeOwned + for<'r> FromRow<'r, PgRow> + 'static
{
    type Patch: DeserializeOwned + Send + 'static;

    /// Used in "<LABEL> not found".
    const LABEL: &'static str;
    const TABLE: &'static str;
    /// Writable columns, in the order `bind` binds them.
    const COLUMNS: &'static [&'static str];

    fn validate(&self) -> Result<(), FieldErrors>;

    fn merge(&mut self, patch: Self::Patch);

    fn bind<'q, O>(self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O>;

    /// Project this record points at, if any. Must belong to the same owner.
    fn linked_project(&self) -> Option<i64> {
        None
    }

    /// Drops a reference to a project that is being deleted.
    fn unlink_project(&mut self, _project_id: i64) {}
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Duplicate` when the email is taken.
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Repository<R: Record>: Send + Sync {
    async fn list(&self, owner: Uuid, page: Page) -> Result<Vec<Owned<R>>, StoreError>;

    async fn get(&self, owner: Uuid, id: i64) -> Result<Option<Owned<R>>, StoreError>;

    async fn create(&self, owner: Uuid, fields: R) -> Result<Owned<R>, StoreError>;

    /// `None` when no record `id` belongs to `owner`.
    async fn update(
        &self,
        owner: Uuid,
        id: i64,
        patch: R::Patch,
    ) -> Result<Option<Owned<R>>, StoreError>;

    async fn delete(&self, owner: Uuid, id: i64) -> Result<Option<Owned<R>>, StoreError>;
}

/// Raw totals behind the dashboard statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct ActivityTotals {
    pub pending_tasks: i64,
    pub notes: i64,
    pub study_minutes: i64,
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn activity_totals(&self, owner: Uuid) -> Result<ActivityTotals, StoreError>;
}

/// Everything the HTTP layer needs from a backend.
pub trait Store:
    UserRepository
    + StatsRepository
    + Repository<Task>
    + Repository<Note>
    + Repository<ResourceLink>
    + Repository<Project>
    + Repository<Grade>
    + Repository<Event>
    + Repository<StudySession>
{
}

impl<T> Store for T where
    T: UserRepository
        + StatsRepository
        + Repository<Task>
        + Repository<Note>
        + Repository<ResourceLink>
        + Repository<Project>
        + Repository<Grade>
        + Repository<Event>
        + Repository<StudySession>
{
}
