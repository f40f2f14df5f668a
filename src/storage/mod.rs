// src/storage/mod.rs
//! Persistence boundary. Handlers and the reward ledger talk to `dyn Store`;
//! the scoring engine never sees it.

pub mod file;
pub mod memory;
pub mod models;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::scoring::VoteTally;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use models::{article_id_for, sha256_hex, ArticleRecord, UserProfile, UserRecord, VoteRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Insert or overwrite (last write wins).
    async fn save_article(&self, article: ArticleRecord) -> Result<(), StoreError>;
    async fn get_article(&self, article_id: &str) -> Result<Option<ArticleRecord>, StoreError>;

    /// Append-only.
    async fn save_vote(&self, vote: VoteRecord) -> Result<(), StoreError>;
    /// Counted from the full vote log on every call.
    async fn get_votes(&self, article_id: &str) -> Result<VoteTally, StoreError>;
    async fn votes_by_user(&self, user_id: &str) -> Result<Vec<VoteRecord>, StoreError>;
    async fn get_user_vote_count(&self, user_id: &str) -> Result<u32, StoreError>;

    /// Fails with `Conflict` when the email or username is taken (case-insensitive).
    async fn create_user(&self, user: UserRecord) -> Result<(), StoreError>;
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    /// Replace an existing user document.
    async fn update_user(&self, user: UserRecord) -> Result<(), StoreError>;
}

pub type DynStore = Arc<dyn Store>;

/// File store when a data path is configured, otherwise the in-memory store.
pub fn open_store(cfg: &AppConfig) -> anyhow::Result<DynStore> {
    match &cfg.data_path {
        Some(path) => {
            let store = FileStore::open(path)
                .with_context(|| format!("opening document store at {}", path.display()))?;
            info!(path = %path.display(), "using file document store");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

/// The document set both backends operate on.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Documents {
    #[serde(default)]
    pub articles: HashMap<String, ArticleRecord>,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
    #[serde(default)]
    pub users: HashMap<String, UserRecord>,
}

impl Documents {
    pub fn tally(&self, article_id: &str) -> VoteTally {
        VoteTally::from_votes(
            self.votes
                .iter()
                .filter(|v| v.article_id == article_id)
                .map(|v| v.vote),
        )
    }

    pub fn votes_by_user(&self, user_id: &str) -> Vec<VoteRecord> {
        self.votes
            .iter()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn user_vote_count(&self, user_id: &str) -> u32 {
        self.votes.iter().filter(|v| v.user_id == user_id).count() as u32
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
    }

    fn check_unique(&self, user: &UserRecord) -> Result<(), StoreError> {
        for other in self.users.values().filter(|o| o.user_id != user.user_id) {
            if other.email.eq_ignore_ascii_case(&user.email) {
                return Err(StoreError::Conflict(format!("email `{}`", user.email)));
            }
            if other.username.eq_ignore_ascii_case(&user.username) {
                return Err(StoreError::Conflict(format!("username `{}`", user.username)));
            }
        }
        Ok(())
    }

    pub fn insert_user(&mut self, user: UserRecord) -> Result<(), StoreError> {
        if self.users.contains_key(&user.user_id) {
            return Err(StoreError::Conflict(format!("user `{}`", user.user_id)));
        }
        self.check_unique(&user)?;
        self.users.insert(user.user_id.clone(), user);
        Ok(())
    }

    pub fn replace_user(&mut self, user: UserRecord) -> Result<(), StoreError> {
        if !self.users.contains_key(&user.user_id) {
            return Err(StoreError::NotFound(format!("user `{}`", user.user_id)));
        }
        self.check_unique(&user)?;
        self.users.insert(user.user_id.clone(), user);
        Ok(())
    }
}
