//! SQLite book catalog.
//!
//! Books carry precomputed `title_key` / `author_key` columns so exact
//! matching is an indexed equality lookup.

use readzone_core::repository::book::BookCatalog;
use readzone_types::book::{Book, BookId, NewBook, match_key};
use readzone_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error, write_error};

/// SQLite-backed implementation of `BookCatalog`.
#[derive(Clone)]
pub struct SqliteBookCatalog {
    pool: DatabasePool,
}

impl SqliteBookCatalog {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn row_to_book(row: &sqlx::sqlite::SqliteRow) -> Result<Book, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let authors: String = row
        .try_get("authors")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(Book {
        id: id
            .parse::<BookId>()
            .map_err(|e| RepositoryError::Query(format!("invalid book id: {e}")))?,
        title: row
            .try_get("title")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        authors: serde_json::from_str(&authors)
            .map_err(|e| RepositoryError::Query(format!("invalid authors JSON: {e}")))?,
        isbn13: row
            .try_get("isbn13")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        publisher: row
            .try_get("publisher")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        thumbnail: row
            .try_get("thumbnail")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl BookCatalog for SqliteBookCatalog {
    async fn find_exact(&self, title_key: &str, author_key: &str) -> Result<Vec<Book>, RepositoryError> {
        let rows = self
            .pool
            .timed(
                "book.find_exact",
                sqlx::query("SELECT * FROM books WHERE title_key = ? AND author_key = ? ORDER BY created_at ASC")
                    .bind(title_key)
                    .bind(author_key)
                    .fetch_all(&self.pool.reader),
            )
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_book).collect()
    }

    async fn get(&self, id: &BookId) -> Result<Option<Book>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM books WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.as_ref().map(row_to_book).transpose()
    }

    async fn create(&self, book: &NewBook) -> Result<Book, RepositoryError> {
        let created = Book {
            id: BookId::new(),
            title: book.title.clone(),
            authors: book.authors.clone(),
            isbn13: book.isbn13.clone(),
            publisher: book.publisher.clone(),
            thumbnail: book.thumbnail.clone(),
            created_at: chrono::Utc::now(),
        };
        let authors =
            serde_json::to_string(&created.authors).map_err(|e| RepositoryError::Query(e.to_string()))?;
        let author_key = created.authors.first().map(|a| match_key(a)).unwrap_or_default();

        sqlx::query(
            "INSERT INTO books (id, title, authors, title_key, author_key, isbn13, publisher, thumbnail, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(created.id.to_string())
        .bind(&created.title)
        .bind(&authors)
        .bind(match_key(&created.title))
        .bind(&author_key)
        .bind(&created.isbn13)
        .bind(&created.publisher)
        .bind(&created.thumbnail)
        .bind(format_datetime(&created.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| write_error(e, || format!("book '{}' already exists", created.title)))?;

        tracing::info!(book_id = %created.id, title = %created.title, "created canonical book");
        Ok(created)
    }
}
