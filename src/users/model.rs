use std::fmt;

use serde::{Serialize, Serializer};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    M,
    F,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "M" => Some(Gender::M),
            "F" => Some(Gender::F),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a user row. Serialized as the nullable `deleted_at` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Deleted { at: OffsetDateTime },
}

impl UserStatus {
    pub fn deleted_at(&self) -> Option<OffsetDateTime> {
        match self {
            UserStatus::Active => None,
            UserStatus::Deleted { at } => Some(*at),
        }
    }
}

impl From<Option<OffsetDateTime>> for UserStatus {
    fn from(deleted_at: Option<OffsetDateTime>) -> Self {
        match deleted_at {
            None => UserStatus::Active,
            Some(at) => UserStatus::Deleted { at },
        }
    }
}

impl Serialize for UserStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.deleted_at() {
            None => serializer.serialize_none(),
            Some(at) => time::serde::rfc3339::serialize(&at, serializer),
        }
    }
}

/// A user as exposed by the API. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub uid: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub address: String,
    pub phone: String,
    pub phone_2: Option<String>,
    pub postal_code: String,
    #[serde(with = "iso_date")]
    pub birth_date: Date,
    pub gender: Gender,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(rename = "deleted_at")]
    pub status: UserStatus,
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub uid: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub address: String,
    pub phone: String,
    pub phone_2: Option<String>,
    pub postal_code: String,
    pub birth_date: Date,
    pub gender: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let gender = Gender::parse(r.gender.trim())
            .ok_or_else(|| anyhow::anyhow!("user {} has unknown gender {:?}", r.id, r.gender))?;
        Ok(Self {
            id: r.id,
            uid: r.uid,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            password_hash: r.password,
            address: r.address,
            phone: r.phone,
            phone_2: r.phone_2,
            postal_code: r.postal_code,
            birth_date: r.birth_date,
            gender,
            created_at: r.created_at,
            updated_at: r.updated_at,
            status: r.deleted_at.into(),
        })
    }
}

/// Validated input for a new user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub uid: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub address: String,
    pub phone: String,
    pub phone_2: Option<String>,
    pub postal_code: String,
    pub birth_date: Date,
    pub gender: Gender,
}

/// Partial update. `None` means "not present in the request".
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub phone_2: Option<Option<String>>,
    pub postal_code: Option<String>,
    pub birth_date: Option<Date>,
    pub gender: Option<Gender>,
}

#[cfg(test)]
pub(crate) fn sample_user(id: i64) -> User {
    use time::macros::{date, datetime};
    User {
        id,
        uid: Uuid::new_v4(),
        first_name: "Juan".into(),
        last_name: "Perez".into(),
        email: format!("juan{id}@example.com"),
        password_hash: "$argon2id$fake".into(),
        address: "Av. Siempre Viva 742".into(),
        phone: "5551234".into(),
        phone_2: None,
        postal_code: "12345".into(),
        birth_date: date!(1990-05-17),
        gender: Gender::M,
        created_at: datetime!(2024-01-01 10:00 UTC),
        updated_at: datetime!(2024-01-01 10:00 UTC),
        status: UserStatus::Active,
    }
}
