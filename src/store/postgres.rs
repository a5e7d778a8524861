use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};
use uuid::Uuid;

use super::{
    ActivityTotals, Owned, Page, Record, Repository, StatsRepository, StoreError, User,
    UserRepository,
};
use crate::error::FieldErrors;
use crate::records::{Event, Grade, Note, Project, ResourceLink, StudySession, Task};

/// Postgres-backed store. Mutations run in their own transaction; a
/// dropped `Transaction` rolls back, so early returns never leave partial
/// writes.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    /// Applies `./migrations`; already-applied steps are skipped.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn list_owned<R: Record>(
        &self,
        owner: Uuid,
        page: Page,
    ) -> Result<Vec<Owned<R>>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
            select_list::<R>(),
            R::TABLE
        );
        let rows = sqlx::query_as::<_, Owned<R>>(&sql)
            .bind(owner)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn get_owned<R: Record>(
        &self,
        owner: Uuid,
        id: i64,
    ) -> Result<Option<Owned<R>>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND user_id = $2",
            select_list::<R>(),
            R::TABLE
        );
        let row = sqlx::query_as::<_, Owned<R>>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn create_owned<R: Record>(&self, owner: Uuid, fields: R) -> Result<Owned<R>, StoreError> {
        fields.validate().map_err(StoreError::Invalid)?;

        let placeholders = (0..R::COLUMNS.len())
            .map(|i| format!("${}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} (user_id, {}) VALUES ($1, {}) RETURNING {}",
            R::TABLE,
            R::COLUMNS.join(", "),
            placeholders,
            select_list::<R>()
        );

        let mut tx = self.db.begin().await?;
        ensure_project_owned(&mut tx, owner, fields.linked_project()).await?;
        let query = sqlx::query_as::<_, Owned<R>>(&sql).bind(owner);
        let row = fields.bind(query).fetch_one(&mut *tx).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_owned<R: Record>(
        &self,
        owner: Uuid,
        id: i64,
        patch: R::Patch,
    ) -> Result<Option<Owned<R>>, StoreError> {
        let select = format!(
            "SELECT {} FROM {} WHERE id = $1 AND user_id = $2 FOR UPDATE",
            select_list::<R>(),
            R::TABLE
        );
        let assignments = R::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ${}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let update = format!(
            "UPDATE {} SET {} WHERE id = $1 AND user_id = $2 RETURNING {}",
            R::TABLE,
            assignments,
            select_list::<R>()
        );

        let mut tx = self.db.begin().await?;
        let Some(current) = sqlx::query_as::<_, Owned<R>>(&select)
            .bind(id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut fields = current.fields;
        fields.merge(patch);
        fields.validate().map_err(StoreError::Invalid)?;
        ensure_project_owned(&mut tx, owner, fields.linked_project()).await?;

        let query = sqlx::query_as::<_, Owned<R>>(&update).bind(id).bind(owner);
        let row = fields.bind(query).fetch_one(&mut *tx).await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    async fn delete_owned<R: Record>(
        &self,
        owner: Uuid,
        id: i64,
    ) -> Result<Option<Owned<R>>, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND user_id = $2 RETURNING {}",
            R::TABLE,
            select_list::<R>()
        );
        let mut tx = self.db.begin().await?;
        let row = sqlx::query_as::<_, Owned<R>>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }
}

fn select_list<R: Record>() -> String {
    format!("id, user_id, {}", R::COLUMNS.join(", "))
}

async fn ensure_project_owned(
    conn: &mut PgConnection,
    owner: Uuid,
    project_id: Option<i64>,
) -> Result<(), StoreError> {
    let Some(project_id) = project_id else {
        return Ok(());
    };
    // Held until commit so the project can't be deleted under the write.
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM projects WHERE id = $1 AND user_id = $2 FOR KEY SHARE",
    )
    .bind(project_id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::Invalid(FieldErrors::single(
            "project_id",
            "unknown project",
        ))),
    }
}

macro_rules! pg_repository {
    ($($kind:ty),+ $(,)?) => {$(
        #[async_trait]
        impl Repository<$kind> for PgStore {
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

pg_repository!(Task, Note, ResourceLink, Project, Grade, Event, StudySession);

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await?;
        user.ok_or(StoreError::Duplicate)
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for PgStore {
    async fn activity_totals(&self, owner: Uuid) -> Result<ActivityTotals, StoreError> {
        let totals = sqlx::query_as::<_, ActivityTotals>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM tasks WHERE user_id = $1 AND NOT is_completed) AS pending_tasks,
                (SELECT COUNT(*) FROM notes WHERE user_id = $1) AS notes,
                (SELECT COALESCE(SUM(duration_minutes), 0)::BIGINT
                   FROM study_sessions WHERE user_id = $1) AS study_minutes
            "#,
        )
        .bind(owner)
        .fetch_one(&self.db)
        .await?;
        Ok(totals)
    }
}
