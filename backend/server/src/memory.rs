//! In-process store with the same semantics as [`RedisStore`](crate::database::RedisStore).
//!
//! Used by the tests and for running the server without Redis (`STORE=memory`).
use assign::{Project, Task, User};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::database::{Store, StoreError, StoredUser};

#[derive(Default)]
struct Collections {
    users: Vec<StoredUser>,
    projects: Vec<Project>,
    tasks: Vec<Task>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: StoredUser) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let email = user.user.email.to_lowercase();

        let taken = collections
            .users
            .iter()
            .any(|stored| stored.user.email.to_lowercase() == email);
        if taken {
            return Err(StoreError::EmailTaken);
        }

        collections.users.push(user);
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, StoreError> {
        let collections = self.collections.read().await;
        let email = email.to_lowercase();

        Ok(collections
            .users
            .iter()
            .find(|stored| stored.user.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections
            .users
            .iter()
            .find(|stored| stored.user.id == id)
            .map(|stored| stored.user.clone()))
    }

    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections.users.iter().map(|stored| stored.user.clone()).collect())
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        self.collections.write().await.projects.push(project.clone());
        Ok(())
    }

    async fn find_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn all_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.collections.read().await.projects.clone())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.collections.write().await.tasks.push(task.clone());
        Ok(())
    }

    async fn all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.collections.read().await.tasks.clone())
    }
}

#[cfg(test)]
mod tests {
    use assign::Role;
    use chrono::Utc;

    use super::*;

    fn stored(id: &str, email: &str, role: Role) -> StoredUser {
        StoredUser {
            user: User {
                id: id.to_string(),
                name: id.to_string(),
                email: email.to_string(),
                role,
                skills: role.default_skills(),
                avatar: String::new(),
                created_at: Utc::now(),
            },
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.insert_user(stored("u1", "ada@example.com", Role::Member)).await.unwrap();

        let result = store.insert_user(stored("u2", "ADA@example.com", Role::Member)).await;
        assert!(matches!(result, Err(StoreError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_users_by_role_keeps_insertion_order() {
        let store = MemoryStore::new();
        store.insert_user(stored("m1", "m1@example.com", Role::Member)).await.unwrap();
        store.insert_user(stored("a1", "a1@example.com", Role::Admin)).await.unwrap();
        store.insert_user(stored("m2", "m2@example.com", Role::Member)).await.unwrap();

        let members = store.users_by_role(Role::Member).await.unwrap();
        let ids: Vec<_> = members.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_lookup_by_email_is_case_insensitive() {
        let store = MemoryStore::new();
        store.insert_user(stored("u1", "Ada@Example.com", Role::Manager)).await.unwrap();

        let found = store.find_user_by_email("ada@example.com").await.unwrap();
        assert_eq!(found.map(|s| s.user.id), Some("u1".to_string()));
        assert!(store.find_user("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_ascii_email_matches_lowercased() {
        let store = MemoryStore::new();
        let email = "ÉMILE@example.com".to_lowercase();
        store.insert_user(stored("u1", &email, Role::Member)).await.unwrap();

        let found = store.find_user_by_email("ÉMILE@example.com").await.unwrap();
        assert_eq!(found.map(|s| s.user.id), Some("u1".to_string()));

        let result = store.insert_user(stored("u2", "Émile@Example.com", Role::Member)).await;
        assert!(matches!(result, Err(StoreError::EmailTaken)));
    }
}
