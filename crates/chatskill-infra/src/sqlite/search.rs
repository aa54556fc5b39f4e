//! FTS5 lexical search engine.
//!
//! Every named index owns an FTS5 table (`search_fts_{id}`), so BM25
//! statistics are computed per index and one index's content never shifts
//! another's scores. The tables use the trigram tokenizer: a query is the OR
//! of the question's quoted trigrams, and partial or misspelled words still
//! match. Terms shorter than three characters never match.
//!
//! A hit's score is its BM25 relevance divided by the number of query
//! trigrams, i.e. the mean contribution per trigram. Summed trigram scores
//! grow with the question length; the mean stays on the scale of one term's
//! IDF, which is what the lexical normalization ceiling is calibrated to.

use std::cmp::Ordering;

use chatskill_core::capability::search::SearchEngine;
use chatskill_types::error::RepositoryError;
use chatskill_types::retrieval::{CandidateKey, IndexEntry, LexicalHit};
use chrono::Utc;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, query_err};

/// SQLite FTS5-backed implementation of `SearchEngine`.
pub struct SqliteSearchEngine {
    pool: DatabasePool,
}

fn fts_table(id: i64) -> String {
    format!("search_fts_{id}")
}

impl SqliteSearchEngine {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// FTS table backing `name`, if the index exists.
    async fn table_of(&self, name: &str) -> Result<Option<String>, RepositoryError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM search_indices WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(row.map(|(id,)| fts_table(id)))
    }

    async fn query_table(
        &self,
        table: &str,
        expression: &str,
        trigram_count: usize,
        top_n: usize,
    ) -> Result<Vec<LexicalHit>, RepositoryError> {
        // bm25() is lower-is-better; negate it so higher is better.
        let sql = format!(
            "SELECT document_id, sentence, text, -bm25({table}) AS score
             FROM {table}
             WHERE {table} MATCH ?
             ORDER BY score DESC, document_id ASC, sentence ASC
             LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(expression)
            .bind(top_n as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let scale = trigram_count.max(1) as f64;
        rows.iter()
            .map(|row| {
                let document_id: i64 = row.try_get("document_id").map_err(query_err)?;
                let sentence: Option<i64> = row.try_get("sentence").map_err(query_err)?;
                let text: String = row.try_get("text").map_err(query_err)?;
                let score: f64 = row.try_get("score").map_err(query_err)?;
                let key = match sentence {
                    Some(position) => CandidateKey::sentence(document_id, position as u32),
                    None => CandidateKey::document(document_id),
                };
                Ok(LexicalHit {
                    key,
                    text,
                    score: (score / scale) as f32,
                })
            })
            .collect()
    }
}

/// Distinct lowercase trigrams of `text`, skipping those spanning whitespace.
pub(crate) fn query_trigrams(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut grams: Vec<String> = Vec::new();
    for window in chars.windows(3) {
        if window.iter().any(|c| c.is_whitespace()) {
            continue;
        }
        let gram: String = window.iter().collect();
        if !grams.contains(&gram) {
            grams.push(gram);
        }
    }
    grams
}

/// FTS5 MATCH expression OR-ing the quoted `grams`. `None` when empty.
pub(crate) fn match_expression(grams: &[String]) -> Option<String> {
    if grams.is_empty() {
        return None;
    }
    Some(
        grams
            .iter()
            .map(|g| format!("\"{}\"", g.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

impl SearchEngine for SqliteSearchEngine {
    async fn create_index(&self, name: &str) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let id = sqlx::query("INSERT INTO search_indices (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(format_datetime(&Utc::now()))
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    RepositoryError::Conflict(format!("index {name} already exists"))
                }
                _ => query_err(e),
            })?
            .last_insert_rowid();

        let table = fts_table(id);
        sqlx::query(&format!(
            "CREATE VIRTUAL TABLE {table} USING fts5(
                document_id UNINDEXED,
                sentence UNINDEXED,
                text,
                tokenize = 'trigram'
            )"
        ))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;

        tracing::debug!(index = %name, table = %table, "created lexical index");
        Ok(())
    }

    async fn index_entries(&self, name: &str, entries: &[IndexEntry]) -> Result<(), RepositoryError> {
        let table = self.table_of(name).await?.ok_or(RepositoryError::NotFound)?;

        let sql = format!("INSERT INTO {table} (document_id, sentence, text) VALUES (?, ?, ?)");
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        for entry in entries {
            sqlx::query(&sql)
                .bind(entry.key.document_id)
                .bind(entry.key.sentence.map(i64::from))
                .bind(&entry.text)
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
        }
        tx.commit().await.map_err(query_err)
    }

    async fn lexical_query(
        &self,
        indices: &[String],
        text: &str,
        top_n: usize,
    ) -> Result<Vec<LexicalHit>, RepositoryError> {
        if indices.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        let grams = query_trigrams(text);
        let Some(expression) = match_expression(&grams) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for name in indices {
            // Unknown indices contribute nothing.
            if let Some(table) = self.table_of(name).await? {
                hits.extend(self.query_table(&table, &expression, grams.len(), top_n).await?);
            }
        }
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        hits.truncate(top_n);
        Ok(hits)
    }

    async fn index_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.table_of(name).await?.is_some())
    }

    async fn delete_index(&self, name: &str) -> Result<(), RepositoryError> {
        let Some(table) = self.table_of(name).await? else {
            return Ok(());
        };
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        sqlx::query("DELETE FROM search_indices WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;
        tracing::debug!(index = %name, "deleted lexical index");
        Ok(())
    }
}
