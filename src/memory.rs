//! In-memory stores with the same semantics as the Postgres ones. Used by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::revocation::RevocationStore,
    users::{
        model::{NewUser, User, UserChanges, UserStatus},
        repo::{StoreError, UserStore},
    },
};

fn is_live(user: &User) -> bool {
    user.status.deleted_at().is_none()
}

/// Overwrites every field present in `changes`, leaving the rest untouched.
fn apply(user: &mut User, changes: &UserChanges, now: OffsetDateTime) {
    fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
        if let Some(v) = value {
            *slot = v.clone();
        }
    }
    set(&mut user.first_name, &changes.first_name);
    set(&mut user.last_name, &changes.last_name);
    set(&mut user.email, &changes.email);
    set(&mut user.password_hash, &changes.password_hash);
    set(&mut user.address, &changes.address);
    set(&mut user.phone, &changes.phone);
    set(&mut user.phone_2, &changes.phone_2);
    set(&mut user.postal_code, &changes.postal_code);
    set(&mut user.birth_date, &changes.birth_date);
    set(&mut user.gender, &changes.gender);
    user.updated_at = now;
}

#[derive(Default)]
struct Table {
    rows: Vec<User>,
    last_id: i64,
}

impl Table {
    fn email_in_use(&self, email: &str, except_id: Option<i64>) -> bool {
        self.rows
            .iter()
            .any(|u| u.email == email && Some(u.id) != except_id)
    }

    fn active_mut(&mut self, id: i64) -> Option<&mut User> {
        self.rows
            .iter_mut()
            .find(|u| u.id == id && is_live(u))
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<Table>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list_active(&self) -> Result<Vec<User>, StoreError> {
        let t = self.table.read().await;
        Ok(t.rows.iter().filter(|u| is_live(u)).cloned().collect())
    }

    async fn find_active(&self, id: i64) -> Result<Option<User>, StoreError> {
        let t = self.table.read().await;
        Ok(t.rows
            .iter()
            .find(|u| u.id == id && is_live(u))
            .cloned())
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.table.read().await;
        Ok(t.rows
            .iter()
            .find(|u| u.email == email && is_live(u))
            .cloned())
    }

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool, StoreError> {
        Ok(self.table.read().await.email_in_use(email, except_id))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.table.write().await;
        if t.email_in_use(&user.email, None) {
            return Err(StoreError::EmailTaken);
        }
        t.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: t.last_id,
            uid: user.uid,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            address: user.address,
            phone: user.phone,
            phone_2: user.phone_2,
            postal_code: user.postal_code,
            birth_date: user.birth_date,
            gender: user.gender,
            created_at: now,
            updated_at: now,
            status: UserStatus::Active,
        };
        t.rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>, StoreError> {
        let mut t = self.table.write().await;
        if let Some(email) = &changes.email {
            if t.email_in_use(email, Some(id)) {
                return Err(StoreError::EmailTaken);
            }
        }
        Ok(t.active_mut(id).map(|u| {
            apply(u, changes, OffsetDateTime::now_utc());
            u.clone()
        }))
    }

    async fn soft_delete(&self, id: i64, at: OffsetDateTime) -> Result<bool, StoreError> {
        let mut t = self.table.write().await;
        Ok(match t.active_mut(id) {
            Some(u) => {
                u.status = UserStatus::Deleted { at };
                u.updated_at = at;
                true
            }
            None => false,
        })
    }
}

#[derive(Default)]
pub struct MemoryRevocationStore {
    revoked: RwLock<HashMap<Uuid, OffsetDateTime>>,
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, jti: Uuid, expires_at: OffsetDateTime) -> anyhow::Result<()> {
        self.revoked.write().await.entry(jti).or_insert(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> anyhow::Result<bool> {
        Ok(self.revoked.read().await.contains_key(&jti))
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let mut revoked = self.revoked.write().await;
        let before = revoked.len();
        revoked.retain(|_, expires_at| *expires_at >= now);
        Ok((before - revoked.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::model::sample_user;
    use time::{macros::datetime, Duration};

    fn new_user(email: &str) -> NewUser {
        let u = sample_user(0);
        NewUser {
            uid: Uuid::new_v4(),
            first_name: u.first_name,
            last_name: u.last_name,
            email: email.into(),
            password_hash: u.password_hash,
            address: u.address,
            phone: u.phone,
            phone_2: u.phone_2,
            postal_code: u.postal_code,
            birth_date: u.birth_date,
            gender: u.gender,
        }
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut user = sample_user(7);
        let before = user.clone();
        let now = datetime!(2024-06-01 12:00 UTC);
        apply(
            &mut user,
            &UserChanges {
                first_name: Some("Ana".into()),
                ..Default::default()
            },
            now,
        );
        assert_eq!(user.first_name, "Ana");
        assert_eq!(user.updated_at, now);
        assert_eq!(
            User {
                first_name: before.first_name.clone(),
                updated_at: before.updated_at,
                ..user.clone()
            },
            before
        );
    }

    #[test]
    fn apply_can_clear_phone_2() {
        let mut user = sample_user(3);
        user.phone_2 = Some("555".into());
        apply(
            &mut user,
            &UserChanges {
                phone_2: Some(None),
                ..Default::default()
            },
            OffsetDateTime::now_utc(),
        );
        assert_eq!(user.phone_2, None);
    }

    #[tokio::test]
    async fn ids_follow_insertion_order() {
        let store = MemoryUserStore::default();
        let a = store.insert(new_user("a@x.io")).await.unwrap();
        let b = store.insert(new_user("b@x.io")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        let ids: Vec<i64> = store.list_active().await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn deleted_rows_are_hidden_but_keep_their_email() {
        let store = MemoryUserStore::default();
        let a = store.insert(new_user("a@x.io")).await.unwrap();
        assert!(store.soft_delete(a.id, OffsetDateTime::now_utc()).await.unwrap());
        assert!(!store.soft_delete(a.id, OffsetDateTime::now_utc()).await.unwrap());
        assert!(store.find_active(a.id).await.unwrap().is_none());
        assert!(store.find_active_by_email("a@x.io").await.unwrap().is_none());
        assert!(store.list_active().await.unwrap().is_empty());
        assert!(store.email_taken("a@x.io", None).await.unwrap());
        assert!(matches!(
            store.insert(new_user("a@x.io")).await,
            Err(StoreError::EmailTaken)
        ));
        assert!(store
            .update(a.id, &UserChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_rejects_email_of_another_user() {
        let store = MemoryUserStore::default();
        let a = store.insert(new_user("a@x.io")).await.unwrap();
        store.insert(new_user("b@x.io")).await.unwrap();
        let steal = UserChanges {
            email: Some("b@x.io".into()),
            ..Default::default()
        };
        assert!(matches!(store.update(a.id, &steal).await, Err(StoreError::EmailTaken)));
        let keep = UserChanges {
            email: Some("a@x.io".into()),
            ..Default::default()
        };
        assert!(store.update(a.id, &keep).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_revocations() {
        let store = MemoryRevocationStore::default();
        let now = OffsetDateTime::now_utc();
        let (old, fresh) = (Uuid::new_v4(), Uuid::new_v4());
        store.revoke(old, now - Duration::minutes(1)).await.unwrap();
        store.revoke(fresh, now + Duration::minutes(1)).await.unwrap();
        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(!store.is_revoked(old).await.unwrap());
        assert!(store.is_revoked(fresh).await.unwrap());
    }
}
