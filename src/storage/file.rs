//! JSON document store on local disk.
//!
//! The whole document set lives in memory and is rewritten to one JSON file
//! after every mutation (temp file + rename). Fine for the volumes this
//! service sees; writers are serialized by the lock. A mutation becomes
//! visible in memory only once its snapshot is on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::debug;

use super::{ArticleRecord, Documents, Store, StoreError, UserRecord, VoteRecord};
use crate::scoring::VoteTally;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    docs: RwLock<Documents>,
}

impl FileStore {
    /// Load `path` if it exists, otherwise start empty (parent dirs are created).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let docs = match fs::read_to_string(&path) {
            Ok(s) if !s.trim().is_empty() => serde_json::from_str(&s)?,
            Ok(_) => Documents::default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Documents::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            docs: RwLock::new(docs),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, docs: &Documents) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(docs)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "document store flushed");
        Ok(())
    }

    /// Apply `change` to a copy, flush the copy, then swap it in.
    async fn commit<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Documents) -> Result<(), StoreError> + Send,
    {
        let mut docs = self.docs.write().await;
        let mut next = docs.clone();
        change(&mut next)?;
        self.persist(&next).await?;
        *docs = next;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for FileStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn save_article(&self, article: ArticleRecord) -> Result<(), StoreError> {
        self.commit(|d| {
            d.articles.insert(article.article_id.clone(), article);
            Ok(())
        })
        .await
    }

    async fn get_article(&self, article_id: &str) -> Result<Option<ArticleRecord>, StoreError> {
        Ok(self.docs.read().await.articles.get(article_id).cloned())
    }

    async fn save_vote(&self, vote: VoteRecord) -> Result<(), StoreError> {
        self.commit(|d| {
            d.votes.push(vote);
            Ok(())
        })
        .await
    }

    async fn get_votes(&self, article_id: &str) -> Result<VoteTally, StoreError> {
        Ok(self.docs.read().await.tally(article_id))
    }

    async fn votes_by_user(&self, user_id: &str) -> Result<Vec<VoteRecord>, StoreError> {
        Ok(self.docs.read().await.votes_by_user(user_id))
    }

    async fn get_user_vote_count(&self, user_id: &str) -> Result<u32, StoreError> {
        Ok(self.docs.read().await.user_vote_count(user_id))
    }

    async fn create_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.commit(|d| d.insert_user(user)).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.docs.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.docs.read().await.find_user_by_email(email).cloned())
    }

    async fn update_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.commit(|d| d.replace_user(user)).await
    }
}
