//! Publication repository
//!
//! Publications and their author links (`publication_authors`). The author
//! set is replaced wholesale inside the same transaction as the row write.

use crate::config::DatabaseDriver;
use crate::db::repositories::user::{row_to_user_mysql, row_to_user_sqlite, USER_COLUMNS};
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{AuthorSummary, Publication, PublicationRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;

const PUBLICATION_COLUMNS: &str = "id, title, publication_date, journal_name, doi, url, abstract, \
     keywords, created_at, updated_at";

#[async_trait]
pub trait PublicationRepository: Send + Sync {
    async fn create(&self, record: &PublicationRecord) -> Result<Publication>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Publication>>;

    /// All publications, most recent publication date first
    async fn list(&self) -> Result<Vec<Publication>>;

    /// Publications listing `user_id` among their authors
    async fn list_by_author(&self, user_id: i64) -> Result<Vec<Publication>>;

    async fn update(&self, id: i64, record: &PublicationRecord) -> Result<Publication>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxPublicationRepository {
    pool: DynDatabasePool,
}

impl SqlxPublicationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PublicationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PublicationRepository for SqlxPublicationRepository {
    async fn create(&self, record: &PublicationRecord) -> Result<Publication> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_publication_sqlite(sqlite_pool(&self.pool)?, record).await
            }
            DatabaseDriver::Mysql => create_publication_mysql(mysql_pool(&self.pool)?, record).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Publication>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_publication_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_publication_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Publication>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_publications_sqlite(sqlite_pool(&self.pool)?, None).await,
            DatabaseDriver::Mysql => list_publications_mysql(mysql_pool(&self.pool)?, None).await,
        }
    }

    async fn list_by_author(&self, user_id: i64) -> Result<Vec<Publication>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_publications_sqlite(sqlite_pool(&self.pool)?, Some(user_id)).await
            }
            DatabaseDriver::Mysql => {
                list_publications_mysql(mysql_pool(&self.pool)?, Some(user_id)).await
            }
        }
    }

    async fn update(&self, id: i64, record: &PublicationRecord) -> Result<Publication> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_publication_sqlite(sqlite_pool(&self.pool)?, id, record).await
            }
            DatabaseDriver::Mysql => {
                update_publication_mysql(mysql_pool(&self.pool)?, id, record).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM publications WHERE id = ?")
                .bind(id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete publication")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM publications WHERE id = ?")
                .bind(id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete publication")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_publication_sqlite(
    pool: &SqlitePool,
    record: &PublicationRecord,
) -> Result<Publication> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO publications (title, publication_date, journal_name, doi, url, abstract,
                                  keywords, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.title)
    .bind(record.publication_date)
    .bind(&record.journal_name)
    .bind(&record.doi)
    .bind(&record.url)
    .bind(&record.abstract_text)
    .bind(&record.keywords)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create publication")?
    .last_insert_rowid();

    replace_authors_sqlite(&mut tx, id, &record.author_ids).await?;
    tx.commit().await.context("Failed to commit publication")?;

    get_publication_sqlite(pool, id)
        .await?
        .context("Publication not found after creation")
}

async fn update_publication_sqlite(
    pool: &SqlitePool,
    id: i64,
    record: &PublicationRecord,
) -> Result<Publication> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        r#"
        UPDATE publications
        SET title = ?, publication_date = ?, journal_name = ?, doi = ?, url = ?, abstract = ?,
            keywords = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.title)
    .bind(record.publication_date)
    .bind(&record.journal_name)
    .bind(&record.doi)
    .bind(&record.url)
    .bind(&record.abstract_text)
    .bind(&record.keywords)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update publication")?;

    replace_authors_sqlite(&mut tx, id, &record.author_ids).await?;
    tx.commit().await.context("Failed to commit publication")?;

    get_publication_sqlite(pool, id)
        .await?
        .context("Publication not found after update")
}

async fn replace_authors_sqlite(
    tx: &mut Transaction<'_, Sqlite>,
    publication_id: i64,
    author_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM publication_authors WHERE publication_id = ?")
        .bind(publication_id)
        .execute(&mut **tx)
        .await
        .context("Failed to clear publication authors")?;

    for author_id in author_ids {
        sqlx::query("INSERT INTO publication_authors (publication_id, user_id) VALUES (?, ?)")
            .bind(publication_id)
            .bind(author_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link publication author")?;
    }
    Ok(())
}

async fn get_publication_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Publication>> {
    let sql = format!("SELECT {} FROM publications WHERE id = ?", PUBLICATION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get publication by ID")?;

    match row {
        Some(row) => {
            let authors = authors_sqlite(pool, id).await?;
            Ok(Some(row_to_publication_sqlite(&row, authors)))
        }
        None => Ok(None),
    }
}

async fn list_publications_sqlite(
    pool: &SqlitePool,
    author_id: Option<i64>,
) -> Result<Vec<Publication>> {
    let rows = match author_id {
        Some(author_id) => {
            let sql = format!(
                "SELECT {} FROM publications WHERE id IN \
                 (SELECT publication_id FROM publication_authors WHERE user_id = ?) \
                 ORDER BY publication_date DESC, id DESC",
                PUBLICATION_COLUMNS
            );
            sqlx::query(&sql).bind(author_id).fetch_all(pool).await
        }
        None => {
            let sql = format!(
                "SELECT {} FROM publications ORDER BY publication_date DESC, id DESC",
                PUBLICATION_COLUMNS
            );
            sqlx::query(&sql).fetch_all(pool).await
        }
    }
    .context("Failed to list publications")?;

    let mut publications = Vec::with_capacity(rows.len());
    for row in &rows {
        let authors = authors_sqlite(pool, row.get("id")).await?;
        publications.push(row_to_publication_sqlite(row, authors));
    }
    Ok(publications)
}

async fn authors_sqlite(pool: &SqlitePool, publication_id: i64) -> Result<Vec<AuthorSummary>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id IN \
         (SELECT user_id FROM publication_authors WHERE publication_id = ?) ORDER BY id",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(publication_id)
        .fetch_all(pool)
        .await
        .context("Failed to load publication authors")?;

    rows.iter()
        .map(|row| row_to_user_sqlite(row).map(|user| AuthorSummary::from(&user)))
        .collect()
}

fn row_to_publication_sqlite(
    row: &sqlx::sqlite::SqliteRow,
    authors: Vec<AuthorSummary>,
) -> Publication {
    Publication {
        id: row.get("id"),
        title: row.get("title"),
        authors,
        publication_date: row.get("publication_date"),
        journal_name: row.get("journal_name"),
        doi: row.get("doi"),
        url: row.get("url"),
        abstract_text: row.get("abstract"),
        keywords: row.get("keywords"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_publication_mysql(
    pool: &MySqlPool,
    record: &PublicationRecord,
) -> Result<Publication> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO publications (title, publication_date, journal_name, doi, url, abstract,
                                  keywords, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.title)
    .bind(record.publication_date)
    .bind(&record.journal_name)
    .bind(&record.doi)
    .bind(&record.url)
    .bind(&record.abstract_text)
    .bind(&record.keywords)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create publication")?
    .last_insert_id() as i64;

    replace_authors_mysql(&mut tx, id, &record.author_ids).await?;
    tx.commit().await.context("Failed to commit publication")?;

    get_publication_mysql(pool, id)
        .await?
        .context("Publication not found after creation")
}

async fn update_publication_mysql(
    pool: &MySqlPool,
    id: i64,
    record: &PublicationRecord,
) -> Result<Publication> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        r#"
        UPDATE publications
        SET title = ?, publication_date = ?, journal_name = ?, doi = ?, url = ?, abstract = ?,
            keywords = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.title)
    .bind(record.publication_date)
    .bind(&record.journal_name)
    .bind(&record.doi)
    .bind(&record.url)
    .bind(&record.abstract_text)
    .bind(&record.keywords)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update publication")?;

    replace_authors_mysql(&mut tx, id, &record.author_ids).await?;
    tx.commit().await.context("Failed to commit publication")?;

    get_publication_mysql(pool, id)
        .await?
        .context("Publication not found after update")
}

async fn replace_authors_mysql(
    tx: &mut Transaction<'_, MySql>,
    publication_id: i64,
    author_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM publication_authors WHERE publication_id = ?")
        .bind(publication_id)
        .execute(&mut **tx)
        .await
        .context("Failed to clear publication authors")?;

    for author_id in author_ids {
        sqlx::query("INSERT INTO publication_authors (publication_id, user_id) VALUES (?, ?)")
            .bind(publication_id)
            .bind(author_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link publication author")?;
    }
    Ok(())
}

async fn get_publication_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Publication>> {
    let sql = format!("SELECT {} FROM publications WHERE id = ?", PUBLICATION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get publication by ID")?;

    match row {
        Some(row) => {
            let authors = authors_mysql(pool, id).await?;
            Ok(Some(row_to_publication_mysql(&row, authors)))
        }
        None => Ok(None),
    }
}

async fn list_publications_mysql(
    pool: &MySqlPool,
    author_id: Option<i64>,
) -> Result<Vec<Publication>> {
    let rows = match author_id {
        Some(author_id) => {
            let sql = format!(
                "SELECT {} FROM publications WHERE id IN \
                 (SELECT publication_id FROM publication_authors WHERE user_id = ?) \
                 ORDER BY publication_date DESC, id DESC",
                PUBLICATION_COLUMNS
            );
            sqlx::query(&sql).bind(author_id).fetch_all(pool).await
        }
        None => {
            let sql = format!(
                "SELECT {} FROM publications ORDER BY publication_date DESC, id DESC",
                PUBLICATION_COLUMNS
            );
            sqlx::query(&sql).fetch_all(pool).await
        }
    }
    .context("Failed to list publications")?;

    let mut publications = Vec::with_capacity(rows.len());
    for row in &rows {
        let authors = authors_mysql(pool, row.get("id")).await?;
        publications.push(row_to_publication_mysql(row, authors));
    }
    Ok(publications)
}

async fn authors_mysql(pool: &MySqlPool, publication_id: i64) -> Result<Vec<AuthorSummary>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id IN \
         (SELECT user_id FROM publication_authors WHERE publication_id = ?) ORDER BY id",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(publication_id)
        .fetch_all(pool)
        .await
        .context("Failed to load publication authors")?;

    rows.iter()
        .map(|row| row_to_user_mysql(row).map(|user| AuthorSummary::from(&user)))
        .collect()
}

fn row_to_publication_mysql(
    row: &sqlx::mysql::MySqlRow,
    authors: Vec<AuthorSummary>,
) -> Publication {
    Publication {
        id: row.get("id"),
        title: row.get("title"),
        authors,
        publication_date: row.get("publication_date"),
        journal_name: row.get("journal_name"),
        doi: row.get("doi"),
        url: row.get("url"),
        abstract_text: row.get("abstract"),
        keywords: row.get("keywords"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
