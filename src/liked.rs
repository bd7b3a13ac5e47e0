//! Persistent set of liked articles, keyed by title.
//!
//! Stored as one JSON array under [`LIKED_KEY`] in the local key-value store.
//! Every mutation rewrites the whole array, and the in-memory set only
//! changes once that write succeeds.

use anyhow::{Context, Result};
use std::path::Path;

use crate::content::Article;
use crate::storage::Database;
use crate::util::atomic_write;

pub const LIKED_KEY: &str = "likedArticles";

pub struct LikedStore {
    db: Database,
    articles: Vec<Article>,
}

impl LikedStore {
    /// Load the liked set. A missing value is initialised to `[]`; a value
    /// that does not parse is logged and treated as empty.
    pub async fn load(db: Database) -> Result<Self> {
        let articles = match db.get_value(LIKED_KEY).await? {
            None => {
                db.set_value(LIKED_KEY, "[]").await?;
                Vec::new()
            }
            Some(raw) => match serde_json::from_str::<Vec<Article>>(&raw) {
                Ok(articles) => articles,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored liked articles are corrupt, starting empty");
                    Vec::new()
                }
            },
        };
        tracing::debug!(count = articles.len(), "Liked articles loaded");
        Ok(Self { db, articles })
    }

    pub fn list(&self) -> &[Article] {
        &self.articles
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.articles.iter().any(|a| a.title == title)
    }

    /// Add `article` unless its title is already present.
    pub async fn add(&mut self, article: &Article) -> Result<bool> {
        if self.contains(&article.title) {
            return Ok(false);
        }
        let mut next = self.articles.clone();
        next.push(article.clone());
        self.commit(next).await?;
        Ok(true)
    }

    /// Remove by title. Absent titles are a no-op.
    pub async fn remove(&mut self, title: &str) -> Result<bool> {
        if !self.contains(title) {
            return Ok(false);
        }
        let next = self
            .articles
            .iter()
            .filter(|a| a.title != title)
            .cloned()
            .collect();
        self.commit(next).await?;
        Ok(true)
    }

    /// Flip membership. Returns whether the article is liked afterwards.
    pub async fn toggle(&mut self, article: &Article) -> Result<bool> {
        if self.contains(&article.title) {
            self.remove(&article.title).await?;
            Ok(false)
        } else {
            self.add(article).await?;
            Ok(true)
        }
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.commit(Vec::new()).await
    }

    /// Markdown list, one `- [Title](url)` line per liked article.
    pub fn export(&self) -> String {
        self.articles
            .iter()
            .map(|a| format!("- [{}]({})\n", a.title, a.page_url))
            .collect()
    }

    pub fn export_to_file(&self, path: &Path) -> Result<()> {
        atomic_write(path, self.export().as_bytes())
            .with_context(|| format!("Failed to export liked articles to '{}'", path.display()))
    }

    /// Write `next` to the store, then adopt it.
    async fn commit(&mut self, next: Vec<Article>) -> Result<()> {
        let raw = serde_json::to_string(&next)?;
        self.db
            .set_value(LIKED_KEY, &raw)
            .await
            .context("Failed to save liked articles")?;
        self.articles = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            extract: format!("{title} is a thing."),
            thumbnail_url: None,
            original_image_url: None,
            page_url: format!("https://en.wikipedia.org/wiki/{title}"),
        }
    }

    async fn store() -> LikedStore {
        LikedStore::load(Database::open(":memory:").await.unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_initialises_empty_array() {
        let db = Database::open(":memory:").await.unwrap();
        let liked = LikedStore::load(db.clone()).await.unwrap();
        assert!(liked.is_empty());
        assert_eq!(db.get_value(LIKED_KEY).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_corrupt_value_treated_as_empty() {
        let db = Database::open(":memory:").await.unwrap();
        db.set_value(LIKED_KEY, "{not json").await.unwrap();
        let liked = LikedStore::load(db).await.unwrap();
        assert!(liked.is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let mut liked = store().await;
        assert!(liked.add(&article("Foo")).await.unwrap());
        assert!(!liked.add(&article("Foo")).await.unwrap());
        assert_eq!(liked.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let mut liked = store().await;
        liked.add(&article("Foo")).await.unwrap();
        assert!(!liked.remove("Nope").await.unwrap());
        assert!(liked.remove("Foo").await.unwrap());
        assert!(liked.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_persists_across_reload() {
        let db = Database::open(":memory:").await.unwrap();
        let mut liked = LikedStore::load(db.clone()).await.unwrap();
        assert!(liked.toggle(&article("Foo")).await.unwrap());
        assert!(liked.toggle(&article("Baz")).await.unwrap());
        assert!(!liked.toggle(&article("Foo")).await.unwrap());

        let reloaded = LikedStore::load(db).await.unwrap();
        let titles: Vec<_> = reloaded.list().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Baz"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let mut liked = store().await;
        liked.add(&article("Foo")).await.unwrap();
        liked.clear().await.unwrap();
        assert!(liked.is_empty());
        assert!(!liked.contains("Foo"));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_set_unchanged() {
        let mut liked = store().await;
        liked.add(&article("Baz")).await.unwrap();
        liked.db.pool.close().await;

        assert!(liked.add(&article("Foo")).await.is_err());
        assert!(!liked.contains("Foo"));

        assert!(liked.remove("Baz").await.is_err());
        assert!(liked.contains("Baz"));

        assert!(liked.clear().await.is_err());
        assert_eq!(liked.len(), 1);
        assert_eq!(liked.export(), "- [Baz](https://en.wikipedia.org/wiki/Baz)\n");
    }

    #[tokio::test]
    async fn test_export_markdown() {
        let mut liked = store().await;
        assert_eq!(liked.export(), "");
        liked.add(&article("Foo")).await.unwrap();
        assert_eq!(liked.export(), "- [Foo](https://en.wikipedia.org/wiki/Foo)\n");
    }
}
