use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;

use crate::users::model::{NewUser, User, UserChanges, UserRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already taken")]
    EmailTaken,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation()
                    && db_err.constraint().map_or(true, |c| c.contains("email")) =>
            {
                StoreError::EmailTaken
            }
            _ => StoreError::Other(err.into()),
        }
    }
}

/// Persistence for user records. Every read and write ignores soft-deleted
/// rows except `email_taken`, which sees the whole table.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Active users in insertion order.
    async fn list_active(&self) -> Result<Vec<User>, StoreError>;
    async fn find_active(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    /// Applies `changes` to an active user in one statement. `None` if no active row matched.
    async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>, StoreError>;
    /// Marks an active user deleted. `false` if no active row matched.
    async fn soft_delete(&self, id: i64, at: OffsetDateTime) -> Result<bool, StoreError>;
}

const COLUMNS: &str = "id, uid, first_name, last_name, email, password, address, phone, phone_2, \
                       postal_code, birth_date, gender, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_users(rows: Vec<UserRow>) -> Result<Vec<User>, StoreError> {
    rows.into_iter()
        .map(|r| User::try_from(r).map_err(StoreError::from))
        .collect()
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, StoreError> {
    row.map(User::try_from).transpose().map_err(StoreError::from)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list_active(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        into_users(rows)
    }

    async fn find_active(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                 WHERE email = $1
                   AND ($2::BIGINT IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.db)
        .await
        .context("check email uniqueness")?;
        Ok(taken)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (uid, first_name, last_name, email, password, address, phone,
                               phone_2, postal_code, birth_date, gender)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user.uid)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.address)
        .bind(&user.phone)
        .bind(&user.phone_2)
        .bind(&user.postal_code)
        .bind(user.birth_date)
        .bind(user.gender.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(User::try_from(row)?)
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>, StoreError> {
        // phone_2 is nullable, so "leave alone" and "set to NULL" need a separate flag.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET first_name  = COALESCE($2, first_name),
                   last_name   = COALESCE($3, last_name),
                   email       = COALESCE($4, email),
                   password    = COALESCE($5, password),
                   address     = COALESCE($6, address),
                   phone       = COALESCE($7, phone),
                   phone_2     = CASE WHEN $8 THEN $9 ELSE phone_2 END,
                   postal_code = COALESCE($10, postal_code),
                   birth_date  = COALESCE($11, birth_date),
                   gender      = COALESCE($12, gender),
                   updated_at  = now()
             WHERE id = $1 AND deleted_at IS NULL
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(&changes.address)
        .bind(&changes.phone)
        .bind(changes.phone_2.is_some())
        .bind(changes.phone_2.clone().flatten())
        .bind(&changes.postal_code)
        .bind(changes.birth_date)
        .bind(changes.gender.map(|g| g.as_str()))
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }

    async fn soft_delete(&self, id: i64, at: OffsetDateTime) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET deleted_at = $2, updated_at = $2
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}
