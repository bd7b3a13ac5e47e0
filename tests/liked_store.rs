//! Integration tests for the liked set: persistence across reopen and export.
//!
//! Each test gets its own database file under the system temp directory.

use pretty_assertions::assert_eq;
use std::path::PathBuf;

use wikiscroll::content::Article;
use wikiscroll::liked::{LikedStore, LIKED_KEY};
use wikiscroll::storage::Database;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wikiscroll_liked_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn article(title: &str) -> Article {
    Article {
        title: title.to_string(),
        extract: format!("{title} is an article."),
        thumbnail_url: None,
        original_image_url: None,
        page_url: format!("https://en.wikipedia.org/wiki/{title}"),
    }
}

async fn open(dir: &std::path::Path) -> Database {
    let path = dir.join("wikiscroll.db");
    Database::open(path.to_str().unwrap()).await.unwrap()
}

#[tokio::test]
async fn test_liked_set_survives_reopen() {
    let dir = temp_dir("reopen");
    {
        let mut liked = LikedStore::load(open(&dir).await).await.unwrap();
        liked.add(&article("Foo")).await.unwrap();
        liked.add(&article("Baz")).await.unwrap();
    }

    let liked = LikedStore::load(open(&dir).await).await.unwrap();
    let titles: Vec<_> = liked.list().iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Foo", "Baz"]);
}

#[tokio::test]
async fn test_export_writes_one_line_per_article() {
    let dir = temp_dir("export");
    let mut liked = LikedStore::load(open(&dir).await).await.unwrap();
    liked.add(&article("Foo")).await.unwrap();
    liked.add(&article("Baz")).await.unwrap();

    let out = dir.join("liked.md");
    liked.export_to_file(&out).unwrap();
    let exported = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        exported.lines().collect::<Vec<_>>(),
        vec![
            "- [Foo](https://en.wikipedia.org/wiki/Foo)",
            "- [Baz](https://en.wikipedia.org/wiki/Baz)",
        ]
    );
}

#[tokio::test]
async fn test_stored_value_is_a_json_array() {
    let dir = temp_dir("json");
    let db = open(&dir).await;
    let mut liked = LikedStore::load(db.clone()).await.unwrap();
    liked.add(&article("Foo")).await.unwrap();

    let raw = db.get_value(LIKED_KEY).await.unwrap().unwrap();
    let parsed: Vec<Article> = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, vec![article("Foo")]);

    liked.clear().await.unwrap();
    assert_eq!(db.get_value(LIKED_KEY).await.unwrap().as_deref(), Some("[]"));
}
