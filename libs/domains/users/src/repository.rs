use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{Contact, Role, RoleRecord, User};

/// Credential store for users, their contacts and the role reference set.
///
/// Emails are compared lower-cased. Soft-deleted users stay visible to every
/// lookup; callers decide what deletion means for them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a user and its contact atomically.
    ///
    /// Fails with [`UserError::EmailInUse`] if the email is taken.
    async fn create(&self, user: User, contact: Contact) -> UserResult<User>;

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> UserResult<bool>;

    /// Write the profile fields, audit stamp and contact.
    ///
    /// Leaves `refresh_token`, `profile_picture` and `deleted_at` alone; those
    /// have their own targeted writes. Returns the stored record.
    async fn update(&self, user: User) -> UserResult<User>;

    /// Returns `false` when no such user exists.
    async fn set_refresh_token(&self, id: Uuid, token: &str, actor: &str) -> UserResult<bool>;

    /// Returns `false` when no such user exists.
    async fn set_profile_picture(&self, id: Uuid, key: &str, actor: &str) -> UserResult<bool>;

    /// Stamp `deleted_at` unless already set. Returns `false` when no such user exists.
    async fn soft_delete(&self, id: Uuid, actor: &str) -> UserResult<bool>;

    async fn find_role_by_name(&self, role: Role) -> UserResult<Option<RoleRecord>>;
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    roles: Arc<Vec<RoleRecord>>,
}

impl InMemoryUserRepository {
    /// Seeded with every [`Role`], the same way the migration seeds `roles`.
    pub fn new() -> Self {
        let roles = Role::ALL
            .into_iter()
            .zip(1..)
            .map(|(role, id)| RoleRecord { id, role })
            .collect();
        Self::with_roles(roles)
    }

    pub fn with_roles(roles: Vec<RoleRecord>) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            roles: Arc::new(roles),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, mut user: User, contact: Contact) -> UserResult<User> {
        let mut users = self.users.write().await;

        user.email = user.email.to_lowercase();
        if users.values().any(|u| u.email == user.email) {
            return Err(UserError::EmailInUse(user.email));
        }

        user.contact = Some(contact);
        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, email = %user.email, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let email = email.to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn email_exists(&self, email: &str) -> UserResult<bool> {
        let email = email.to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().any(|u| u.email == email))
    }

    async fn update(&self, user: User) -> UserResult<User> {
        let mut users = self.users.write().await;

        let Some(existing) = users.get_mut(&user.id) else {
            return Err(UserError::NotFound(user.id));
        };
        let contact = match (existing.contact.take(), user.contact) {
            (Some(_), Some(patched)) => Some(patched),
            (stored, _) => stored,
        };
        *existing = User {
            email: existing.email.clone(),
            password_hash: existing.password_hash.clone(),
            profile_picture: existing.profile_picture.take(),
            refresh_token: existing.refresh_token.take(),
            roles: existing.roles.clone(),
            contact,
            created_at: existing.created_at,
            created_by: existing.created_by.clone(),
            deleted_at: existing.deleted_at,
            ..user
        };

        tracing::info!(user_id = %existing.id, "Updated user");
        Ok(existing.clone())
    }

    async fn set_refresh_token(&self, id: Uuid, token: &str, actor: &str) -> UserResult<bool> {
        let mut users = self.users.write().await;

        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.refresh_token = Some(token.to_string());
        user.touch(actor);
        Ok(true)
    }

    async fn set_profile_picture(&self, id: Uuid, key: &str, actor: &str) -> UserResult<bool> {
        let mut users = self.users.write().await;

        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.profile_picture = Some(key.to_string());
        user.touch(actor);
        Ok(true)
    }

    async fn soft_delete(&self, id: Uuid, actor: &str) -> UserResult<bool> {
        let mut users = self.users.write().await;

        match users.get_mut(&id) {
            Some(user) => {
                let now = Utc::now();
                user.deleted_at.get_or_insert(now);
                user.updated_at = now;
                user.updated_by = actor.to_string();
                tracing::info!(user_id = %id, "Soft-deleted user");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_role_by_name(&self, role: Role) -> UserResult<Option<RoleRecord>> {
        Ok(self.roles.iter().find(|r| r.role == role).cloned())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::user;
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = InMemoryUserRepository::new();
        let (user, contact) = user("test@example.com", vec![Role::Patient]);

        let created = repo.create(user, contact).await.unwrap();
        assert!(created.contact.is_some());

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let repo = InMemoryUserRepository::new();
        let (user, contact) = user("Test@Example.com", vec![Role::Patient]);
        repo.create(user, contact).await.unwrap();

        assert!(repo.get_by_email("TEST@EXAMPLE.COM").await.unwrap().is_some());
        assert!(repo.email_exists("test@example.com").await.unwrap());
        assert!(!repo.email_exists("other@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_error() {
        let repo = InMemoryUserRepository::new();
        let (first, first_contact) = user("test@example.com", vec![Role::Patient]);
        let (second, second_contact) = user("TEST@example.com", vec![Role::Doctor]);

        repo.create(first, first_contact).await.unwrap();
        let result = repo.create(second, second_contact).await;

        assert!(matches!(result, Err(UserError::EmailInUse(e)) if e == "test@example.com"));
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row() {
        let repo = InMemoryUserRepository::new();
        let (user, contact) = user("gone@example.com", vec![Role::Admin]);
        let created = repo.create(user, contact).await.unwrap();

        assert!(repo.soft_delete(created.id, "admin@example.com").await.unwrap());
        assert!(!repo.soft_delete(Uuid::now_v7(), "admin@example.com").await.unwrap());

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert!(fetched.deleted_at.is_some());
        assert_eq!(fetched.updated_by, "admin@example.com");
        assert!(fetched.contact.is_some());
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_first_deletion_time() {
        let repo = InMemoryUserRepository::new();
        let (user, contact) = user("twice@example.com", vec![Role::Patient]);
        let created = repo.create(user, contact).await.unwrap();

        repo.soft_delete(created.id, "a@example.com").await.unwrap();
        let first = repo.get_by_id(created.id).await.unwrap().unwrap().deleted_at;
        assert!(repo.soft_delete(created.id, "b@example.com").await.unwrap());
        let second = repo.get_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(second.deleted_at, first);
        assert_eq!(second.updated_by, "b@example.com");
    }

    #[tokio::test]
    async fn test_update_leaves_token_and_picture_alone() {
        let repo = InMemoryUserRepository::new();
        let (user, contact) = user("keep@example.com", vec![Role::Patient]);
        let created = repo.create(user, contact).await.unwrap();
        let stale = created.clone();

        assert!(repo.set_refresh_token(created.id, "fresh-token", "keep@example.com").await.unwrap());
        assert!(repo.set_profile_picture(created.id, "pic.png", "keep@example.com").await.unwrap());

        let mut patched = stale;
        patched.about = Some("Pediatrics".to_string());
        let updated = repo.update(patched).await.unwrap();

        assert_eq!(updated.about.as_deref(), Some("Pediatrics"));
        assert_eq!(updated.refresh_token.as_deref(), Some("fresh-token"));
        assert_eq!(updated.profile_picture.as_deref(), Some("pic.png"));
        assert_eq!(repo.get_by_id(created.id).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_targeted_writes_report_missing_user() {
        let repo = InMemoryUserRepository::new();

        assert!(!repo.set_refresh_token(Uuid::now_v7(), "t", "a@b.com").await.unwrap());
        assert!(!repo.set_profile_picture(Uuid::now_v7(), "k", "a@b.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let repo = InMemoryUserRepository::new();
        let (user, _) = user("ghost@example.com", vec![Role::Patient]);

        assert!(matches!(repo.update(user).await, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_roles_are_seeded() {
        let repo = InMemoryUserRepository::new();
        for role in Role::ALL {
            let record = repo.find_role_by_name(role).await.unwrap().unwrap();
            assert_eq!(record.role, role);
        }

        let empty = InMemoryUserRepository::with_roles(Vec::new());
        assert!(empty.find_role_by_name(Role::Admin).await.unwrap().is_none());
    }
}
