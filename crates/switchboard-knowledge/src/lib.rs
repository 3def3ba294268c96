//! Support-document retrieval layer for switchboard
//!
//! This crate provides:
//! - SQLite storage for support documents with embedding vectors
//! - Cosine-similarity search with a plain-text fallback
//! - An embedding client trait plus an HTTP implementation

pub mod embedding;
pub mod store;

// Re-export main types
pub use embedding::{cosine_similarity, Embedder, HttpEmbedder};
pub use store::{SupportDocument, SupportStore};

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn test_basic_integration() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SupportStore::new(dir.path().join("support.db"))?;

        store.populate_sample_data().await?;
        assert!(store.document_count().await? > 0);

        // No embedder configured, so this exercises the text fallback
        let results = store.search("password reset", 3).await?;
        assert!(!results.is_empty());
        assert!(results[0].0.content.to_lowercase().contains("password"));

        Ok(())
    }
}
