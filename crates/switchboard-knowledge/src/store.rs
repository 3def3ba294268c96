//! SQLite storage for support documents with vector search

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::embedding::{
    cosine_similarity, deserialize_embedding, serialize_embedding, Embedder,
};

/// A customer support knowledge-base document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub priority: String,
    pub last_updated: DateTime<Utc>,
}

/// SQLite-backed document store (thread-safe via Arc<Mutex>).
///
/// Search is vector-based when an embedder is configured, with a plain
/// text fallback when one is missing or the embedding call fails.
pub struct SupportStore {
    conn: Arc<Mutex<Connection>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl SupportStore {
    /// Open (or create) the store at the given path and initialize the schema
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .context("Failed to open support document database")?;

        info!("Initializing support store at {:?}", path.as_ref());

        conn.execute(
            "CREATE TABLE IF NOT EXISTS support_documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL,
                tags TEXT NOT NULL,
                priority TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                embedding BLOB
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_category
             ON support_documents(category)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedder: None,
        })
    }

    /// Attach an embedding client. Without one, search falls back to text matching.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Add (or replace) a document, embedding title + content when possible
    pub async fn add_document(&self, document: &SupportDocument) -> Result<()> {
        let embedding_blob = match &self.embedder {
            Some(embedder) => {
                let text = format!("{}\n\n{}", document.title, document.content);
                match embedder.embed(&text).await {
                    Ok(vector) => Some(serialize_embedding(&vector)),
                    Err(e) => {
                        warn!("Embedding failed for document {}: {}", document.id, e);
                        None
                    }
                }
            }
            None => None,
        };

        let conn = Arc::clone(&self.conn);
        let doc = document.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| {
                warn!("Store mutex was poisoned, recovering");
                poisoned.into_inner()
            });

            conn.execute(
                "INSERT OR REPLACE INTO support_documents
                 (id, title, content, category, tags, priority, last_updated, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    &doc.id,
                    &doc.title,
                    &doc.content,
                    &doc.category,
                    serde_json::to_string(&doc.tags)?,
                    &doc.priority,
                    doc.last_updated.to_rfc3339(),
                    embedding_blob,
                ],
            )?;

            debug!("Stored document: {} ({})", doc.title, doc.id);
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Search for the top_k most relevant documents.
    ///
    /// Scores are cosine similarities in roughly [-1, 1] on the vector
    /// path; the text fallback uses occurrence-count scores instead.
    /// An empty result is not an error.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(SupportDocument, f32)>> {
        let query_embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(query).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!("Query embedding failed, falling back to text search: {}", e);
                    None
                }
            },
            None => None,
        };

        match query_embedding {
            Some(vector) => self.vector_search(vector, top_k).await,
            None => self.text_search(query, top_k).await,
        }
    }

    async fn vector_search(
        &self,
        query_embedding: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<(SupportDocument, f32)>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| {
                warn!("Store mutex was poisoned, recovering");
                poisoned.into_inner()
            });

            let mut stmt = conn.prepare(
                "SELECT id, title, content, category, tags, priority, last_updated, embedding
                 FROM support_documents WHERE embedding IS NOT NULL",
            )?;

            let mut results: Vec<(SupportDocument, f32)> = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let blob: Vec<u8> = row.get(7)?;
                let doc_embedding = deserialize_embedding(&blob);
                let similarity = cosine_similarity(&query_embedding, &doc_embedding);
                results.push((row_to_document(row)?, similarity));
            }

            results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            results.truncate(top_k);

            debug!("Vector search returned {} documents", results.len());
            Ok(results)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Fallback text search: LIKE on title/content, scored by occurrence
    /// count with title hits weighted double.
    async fn text_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(SupportDocument, f32)>> {
        let conn = Arc::clone(&self.conn);
        let query = query.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| {
                warn!("Store mutex was poisoned, recovering");
                poisoned.into_inner()
            });

            let pattern = format!("%{}%", query);
            let mut stmt = conn.prepare(
                "SELECT id, title, content, category, tags, priority, last_updated, embedding
                 FROM support_documents
                 WHERE title LIKE ?1 OR content LIKE ?1",
            )?;

            let query_lower = query.to_lowercase();
            let mut results: Vec<(SupportDocument, f32)> = Vec::new();
            let mut rows = stmt.query(params![pattern])?;
            while let Some(row) = rows.next()? {
                let doc = row_to_document(row)?;
                let title_matches = count_occurrences(&doc.title.to_lowercase(), &query_lower);
                let content_matches =
                    count_occurrences(&doc.content.to_lowercase(), &query_lower);
                let score =
                    (title_matches * 2 + content_matches) as f32 / query.len().max(1) as f32;
                results.push((doc, score));
            }

            results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            results.truncate(top_k);

            debug!("Text search returned {} documents", results.len());
            Ok(results)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Number of stored documents
    pub async fn document_count(&self) -> Result<usize> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| {
                warn!("Store mutex was poisoned, recovering");
                poisoned.into_inner()
            });

            let count: usize =
                conn.query_row("SELECT COUNT(*) FROM support_documents", [], |row| {
                    row.get(0)
                })?;
            Ok(count)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Distinct document categories
    pub async fn categories(&self) -> Result<Vec<String>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| {
                warn!("Store mutex was poisoned, recovering");
                poisoned.into_inner()
            });

            let mut stmt = conn.prepare(
                "SELECT DISTINCT category FROM support_documents ORDER BY category",
            )?;
            let categories = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(categories)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Seed the store with the sample customer support corpus
    pub async fn populate_sample_data(&self) -> Result<()> {
        info!("Populating support store with sample documents");
        for doc in sample_documents() {
            self.add_document(&doc).await?;
        }
        Ok(())
    }
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<SupportDocument> {
    let tags_json: String = row.get(4)?;
    let last_updated: String = row.get(6)?;
    Ok(SupportDocument {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        priority: row.get(5)?,
        last_updated: DateTime::parse_from_rfc3339(&last_updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

fn sample_document(
    id: &str,
    title: &str,
    content: &str,
    category: &str,
    tags: &[&str],
    priority: &str,
) -> SupportDocument {
    SupportDocument {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        category: category.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        priority: priority.to_string(),
        last_updated: Utc::now(),
    }
}

fn sample_documents() -> Vec<SupportDocument> {
    vec![
        sample_document(
            "billing-001",
            "How to Update Your Billing Information",
            "To update your billing information, navigate to Account Settings > Billing > \
             Payment Methods. Click 'Update Payment Method' and enter your new credit card \
             details. Changes take effect immediately for future billing cycles. If you \
             encounter any issues, please contact our billing support team.",
            "billing",
            &["billing", "payment", "account", "credit-card"],
            "medium",
        ),
        sample_document(
            "account-001",
            "Password Reset Instructions",
            "If you've forgotten your password, go to the login page and click 'Forgot \
             Password'. Enter your email address and we'll send you a reset link. Check your \
             spam folder if you don't see the email within 5 minutes. The reset link expires \
             after 24 hours for security reasons.",
            "account",
            &["password", "reset", "login", "security"],
            "high",
        ),
        sample_document(
            "technical-001",
            "Application Performance Issues",
            "If you're experiencing slow loading times or timeouts, try these steps: 1) Clear \
             your browser cache and cookies 2) Disable browser extensions 3) Try a different \
             browser 4) Check your internet connection speed. If issues persist, please \
             provide your browser version and operating system when contacting support.",
            "technical",
            &["performance", "browser", "troubleshooting", "speed"],
            "high",
        ),
        sample_document(
            "features-001",
            "How to Export Your Data",
            "You can export your data in multiple formats: CSV, JSON, or PDF. Go to Settings > \
             Data Export, select your preferred format and date range. Large exports may take \
             several minutes to process. You'll receive an email notification when your export \
             is ready for download. Downloads expire after 7 days.",
            "features",
            &["export", "data", "download", "backup"],
            "low",
        ),
        sample_document(
            "billing-002",
            "Understanding Your Invoice",
            "Your monthly invoice includes subscription fees, usage charges, and any applicable \
             taxes. The billing period is shown at the top. Usage charges are calculated based \
             on your plan limits. Taxes are applied according to your billing address. For \
             detailed breakdowns, expand each line item in your invoice.",
            "billing",
            &["invoice", "charges", "taxes", "subscription"],
            "medium",
        ),
        sample_document(
            "account-002",
            "Two-Factor Authentication Setup",
            "Secure your account with two-factor authentication (2FA). Go to Security Settings \
             > Two-Factor Authentication. You can use an authenticator app like Google \
             Authenticator or receive SMS codes. We recommend using an authenticator app for \
             better security. Save your backup codes in a secure location.",
            "account",
            &["2fa", "security", "authentication", "setup"],
            "medium",
        ),
        sample_document(
            "technical-002",
            "API Rate Limiting Guidelines",
            "Our API has rate limits to ensure fair usage: 1000 requests per hour for basic \
             plans, 5000 for premium plans. If you exceed the limit, you'll receive a 429 \
             status code. Implement exponential backoff in your applications. Rate limits \
             reset every hour. Contact us for enterprise plans with higher limits.",
            "technical",
            &["api", "rate-limit", "development", "integration"],
            "medium",
        ),
        sample_document(
            "features-002",
            "Collaboration and Sharing Features",
            "Invite team members by going to Team Settings > Add Members. Set permissions for \
             each member: Viewer, Editor, or Admin. Share individual projects using the Share \
             button - you can create view-only or edit links. Links can be password-protected \
             and set to expire. Track who accessed your shared content in the Activity Log.",
            "features",
            &["collaboration", "sharing", "team", "permissions"],
            "low",
        ),
    ]
}
