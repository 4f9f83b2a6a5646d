//! # Redis
//!
//! Document store for users, projects and tasks.
//!
//! ## Layout
//!
//! - `users`, `projects`, `tasks`: hash of id -> JSON document
//! - `users:ids`, `projects:ids`, `tasks:ids`: list of ids in insertion order
//! - `users:email`: hash of lower-cased email -> user id
//!
//! ## Notes
//!
//! - Reads always go to Redis, nothing is cached in the server
//! - The email index is claimed with `HSETNX` before the user document is written, so two
//!   registrations racing on one email cannot both succeed
//! - List order is what the assignment tie-break sees as input order
use std::time::Duration;

use assign::{Project, Role, Task, User};
use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

const USERS: &str = "users";
const USER_IDS: &str = "users:ids";
const USER_EMAILS: &str = "users:email";
const PROJECTS: &str = "projects";
const PROJECT_IDS: &str = "projects:ids";
const TASKS: &str = "tasks";
const TASK_IDS: &str = "tasks:ids";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt document: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Email already registered")]
    EmailTaken,
}

/// A user together with the credential that never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    pub password_hash: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: StoredUser) -> Result<(), StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, StoreError>;

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn all_users(&self) -> Result<Vec<User>, StoreError>;

    async fn users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let users = self.all_users().await?;

        Ok(users.into_iter().filter(|user| user.role == role).collect())
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError>;

    async fn find_project(&self, id: &str) -> Result<Option<Project>, StoreError>;

    async fn all_projects(&self) -> Result<Vec<Project>, StoreError>;

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn all_tasks(&self) -> Result<Vec<Task>, StoreError>;
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            connection: init_redis(redis_url).await?,
        })
    }

    async fn insert_doc<T: Serialize + Sync>(
        &self,
        hash: &str,
        index: &str,
        id: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let json = serde_json::to_string(doc)?;

        redis::pipe()
            .atomic()
            .hset(hash, id, json)
            .ignore()
            .rpush(index, id)
            .ignore()
            .query_async::<()>(&mut connection)
            .await?;

        Ok(())
    }

    async fn load_one<T>(&self, hash: &str, id: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let mut connection = self.connection.clone();
        let doc: Option<String> = connection.hget(hash, id).await?;

        Ok(doc.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn load_all<T>(&self, hash: &str, index: &str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let mut connection = self.connection.clone();
        let ids: Vec<String> = connection.lrange(index, 0, -1).await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let docs: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(hash)
            .arg(&ids)
            .query_async(&mut connection)
            .await?;

        docs.into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn insert_user(&self, user: StoredUser) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let email = user.user.email.to_lowercase();

        let claimed: bool = connection.hset_nx(USER_EMAILS, &email, &user.user.id).await?;
        if !claimed {
            return Err(StoreError::EmailTaken);
        }

        if let Err(e) = self.insert_doc(USERS, USER_IDS, &user.user.id, &user).await {
            // release the email so the user can retry
            let _: redis::RedisResult<()> = connection.hdel(USER_EMAILS, &email).await;
            return Err(e);
        }

        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, StoreError> {
        let mut connection = self.connection.clone();
        let id: Option<String> = connection.hget(USER_EMAILS, email.to_lowercase()).await?;

        match id {
            Some(id) => self.load_one(USERS, &id).await,
            None => Ok(None),
        }
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let stored: Option<StoredUser> = self.load_one(USERS, id).await?;

        Ok(stored.map(|stored| stored.user))
    }

    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        let stored: Vec<StoredUser> = self.load_all(USERS, USER_IDS).await?;

        Ok(stored.into_iter().map(|stored| stored.user).collect())
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        self.insert_doc(PROJECTS, PROJECT_IDS, &project.id, project).await
    }

    async fn find_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        self.load_one(PROJECTS, id).await
    }

    async fn all_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.load_all(PROJECTS, PROJECT_IDS).await
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.insert_doc(TASKS, TASK_IDS, &task.id, task).await
    }

    async fn all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.load_all(TASKS, TASK_IDS).await
    }
}
