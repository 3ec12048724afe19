use chrono::{DateTime, Utc};

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

/// Persistence for user accounts. Every call reads or writes exactly one record.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with [`RepoError::Conflict`] when the email is already registered.
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_by_id(&self, id: Id) -> RepoResult<Option<User>>;
    async fn update_search_count(&self, id: Id, count: u32) -> RepoResult<()>;
    /// Zero the weekly counter and move the window start to `at`.
    async fn reset_search_window(&self, id: Id, at: DateTime<Utc>) -> RepoResult<User>;
    async fn set_subscription(&self, id: Id, tier: Subscription) -> RepoResult<User>;
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

    const SNAPSHOT_FILE: &str = "users.json";
    const SNAPSHOT_TMP_FILE: &str = "users.json.tmp";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        users: HashMap<Id, User>,
        #[serde(skip)]
        by_email: HashMap<String, Id>,
        next_id: Id,
    }

    impl State {
        fn reindex(&mut self) {
            self.by_email = self.users.values().map(|u| (u.email.clone(), u.id)).collect();
        }
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
        // one snapshot writer at a time
        persist_lock: Arc<Mutex<()>>,
    }

    impl InMemRepo {
        /// Volatile store, nothing is written to disk.
        pub fn new() -> Self {
            Self {
                state: Arc::new(RwLock::new(State::default())),
                snapshot_path: None,
                persist_lock: Arc::new(Mutex::new(())),
            }
        }

        /// Store persisted to `<dir>/users.json`, reloading an existing snapshot.
        pub fn with_data_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
                persist_lock: Arc::new(Mutex::new(())),
            }
        }

        fn load_state_from(path: &Path) -> State {
            let mut state = match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("loaded user snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!("failed to parse user snapshot '{}': {e}; starting empty", path.display());
                        State::default()
                    }
                },
                Err(e) => {
                    log::info!("no user snapshot at '{}' ({e}); starting empty", path.display());
                    State::default()
                }
            };
            state.reindex();
            state
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("user store lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("user store lock poisoned".into()))
        }

        /// Write the current state to a temp file and rename it over the snapshot,
        /// so a reader never sees a partially written file.
        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_deref() else { return };
            let _guard = match self.persist_lock.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            // serialized under the writer lock, so the last rename carries the newest state
            let bytes = match self.read().map(|s| serde_json::to_vec_pretty(&*s)) {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => { log::error!("failed to serialize user snapshot: {e}"); return; }
                Err(e) => { log::error!("failed to snapshot users: {e}"); return; }
            };
            if let Some(dir) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    log::error!("failed to create data dir '{}': {e}", dir.display());
                    return;
                }
            }
            let tmp = path.with_file_name(SNAPSHOT_TMP_FILE);
            if let Err(e) = std::fs::write(&tmp, bytes) {
                log::error!("failed to write user snapshot '{}': {e}", tmp.display());
                return;
            }
            if let Err(e) = std::fs::rename(&tmp, path) {
                log::error!("failed to replace user snapshot '{}': {e}", path.display());
            }
        }

        /// Apply `f` to one user under the write lock and persist.
        fn mutate<F>(&self, id: Id, f: F) -> RepoResult<User>
        where
            F: FnOnce(&mut User),
        {
            let mut s = self.write()?;
            let user = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
            f(user);
            user.updated_at = Utc::now();
            let updated = user.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self { Self::new() }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let mut s = self.write()?;
            if s.by_email.contains_key(&new.email) {
                return Err(RepoError::Conflict);
            }
            s.next_id += 1;
            let id = s.next_id;
            let now = Utc::now();
            let user = User {
                id,
                name: new.name,
                age: new.age,
                email: new.email,
                password_hash: new.password_hash,
                searches_this_week: 0,
                last_search_reset: now,
                subscription: Subscription::Free,
                created_at: now,
                updated_at: now,
            };
            s.by_email.insert(user.email.clone(), id);
            s.users.insert(id, user.clone());
            drop(s);                       // release lock before persisting
            self.persist();
            Ok(user)
        }

        async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
            let s = self.read()?;
            Ok(s.by_email.get(email).and_then(|id| s.users.get(id)).cloned())
        }

        async fn find_by_id(&self, id: Id) -> RepoResult<Option<User>> {
            let s = self.read()?;
            Ok(s.users.get(&id).cloned())
        }

        async fn update_search_count(&self, id: Id, count: u32) -> RepoResult<()> {
            self.mutate(id, |u| u.searches_this_week = count).map(|_| ())
        }

        async fn reset_search_window(&self, id: Id, at: DateTime<Utc>) -> RepoResult<User> {
            self.mutate(id, |u| {
                u.searches_this_week = 0;
                u.last_search_reset = at;
            })
        }

        async fn set_subscription(&self, id: Id, tier: Subscription) -> RepoResult<User> {
            self.mutate(id, |u| u.subscription = tier)
        }
    }

}

#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{FromRow, Pool, Postgres};

    const USER_COLUMNS: &str = "id, name, age, email, password_hash, searches_this_week, \
        last_search_reset, subscription, created_at, updated_at";

    #[derive(FromRow)]
    struct UserRow {
        id: i64,
        name: String,
        age: i32,
        email: String,
        password_hash: String,
        searches_this_week: i32,
        last_search_reset: DateTime<Utc>,
        subscription: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    impl TryFrom<UserRow> for User {
        type Error = RepoError;

        fn try_from(row: UserRow) -> Result<Self, Self::Error> {
            let searches_this_week = u32::try_from(row.searches_this_week)
                .map_err(|_| RepoError::Internal(format!("negative search count for user {}", row.id)))?;
            let subscription = row.subscription.parse().map_err(RepoError::Internal)?;
            Ok(User {
                id: row.id,
                name: row.name,
                age: row.age,
                email: row.email,
                password_hash: row.password_hash,
                searches_this_week,
                last_search_reset: row.last_search_reset,
                subscription,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        }
    }

    fn map_sqlx(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RepoError::Conflict,
            other => RepoError::Internal(other.to_string()),
        }
    }

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        /// Apply the bundled schema migrations.
        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }

    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let sql = format!(
                "INSERT INTO users (name, age, email, password_hash) VALUES ($1,$2,$3,$4) RETURNING {USER_COLUMNS}"
            );
            let row = sqlx::query_as::<_, UserRow>(&sql)
                .bind(&new.name)
                .bind(new.age)
                .bind(&new.email)
                .bind(&new.password_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
            User::try_from(row)
        }

        async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
            let row = sqlx::query_as::<_, UserRow>(&sql)
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
            row.map(User::try_from).transpose()
        }

        async fn find_by_id(&self, id: Id) -> RepoResult<Option<User>> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
            let row = sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
            row.map(User::try_from).transpose()
        }

        async fn update_search_count(&self, id: Id, count: u32) -> RepoResult<()> {
            let count = i32::try_from(count)
                .map_err(|_| RepoError::Internal(format!("search count {count} out of range")))?;
            let res = sqlx::query("UPDATE users SET searches_this_week = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(count)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn reset_search_window(&self, id: Id, at: DateTime<Utc>) -> RepoResult<User> {
            let sql = format!(
                "UPDATE users SET searches_this_week = 0, last_search_reset = $2, updated_at = now() \
                 WHERE id = $1 RETURNING {USER_COLUMNS}"
            );
            let row = sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .bind(at)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
            User::try_from(row)
        }

        async fn set_subscription(&self, id: Id, tier: Subscription) -> RepoResult<User> {
            let sql = format!(
                "UPDATE users SET subscription = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
            );
            let row = sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .bind(tier.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
            User::try_from(row)
        }
    }
}
