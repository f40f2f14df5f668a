//! In-process store. Nothing survives a restart; used when no data path is
//! configured and throughout the tests.

use tokio::sync::RwLock;

use super::{ArticleRecord, Documents, Store, StoreError, UserRecord, VoteRecord};
use crate::scoring::VoteTally;

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn save_article(&self, article: ArticleRecord) -> Result<(), StoreError> {
        let mut d = self.docs.write().await;
        d.articles.insert(article.article_id.clone(), article);
        Ok(())
    }

    async fn get_article(&self, article_id: &str) -> Result<Option<ArticleRecord>, StoreError> {
        Ok(self.docs.read().await.articles.get(article_id).cloned())
    }

    async fn save_vote(&self, vote: VoteRecord) -> Result<(), StoreError> {
        self.docs.write().await.votes.push(vote);
        Ok(())
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
        self.docs.write().await.insert_user(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.docs.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.docs.read().await.find_user_by_email(email).cloned())
    }

    async fn update_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.docs.write().await.replace_user(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_or_username_conflicts() {
        let store = MemoryStore::new();
        store
            .create_user(UserRecord::new("ana", "ana@example.com", "h"))
            .await
            .unwrap();

        let dup_email = UserRecord::new("other", "ANA@example.com", "h");
        assert!(matches!(
            store.create_user(dup_email).await,
            Err(StoreError::Conflict(_))
        ));
        let dup_name = UserRecord::new("Ana", "x@example.com", "h");
        assert!(matches!(
            store.create_user(dup_name).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn tally_counts_only_the_article() {
        let store = MemoryStore::new();
        for (a, v) in [("a1", 1), ("a1", 1), ("a1", -1), ("a2", -1)] {
            store.save_vote(VoteRecord::new(a, "u", v)).await.unwrap();
        }
        assert_eq!(store.get_votes("a1").await.unwrap(), VoteTally::new(2, 1));
        assert_eq!(store.get_votes("nope").await.unwrap(), VoteTally::default());
        assert_eq!(store.get_user_vote_count("u").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let ghost = UserRecord::new("ghost", "g@example.com", "h");
        assert!(matches!(
            store.update_user(ghost).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
