use koach_core::model::{Book, BookId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{book_id_from_i64, conn, id_i64, ser};
use crate::repository::{BookRepository, StorageError};

#[async_trait::async_trait]
impl BookRepository for SqliteRepository {
    async fn upsert_book(&self, book: &Book) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO books (id, title, total_pages)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                total_pages = excluded.total_pages
            ",
        )
        .bind(id_i64("book_id", book.id().value())?)
        .bind(book.title().to_owned())
        .bind(i64::from(book.total_pages()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_book(&self, id: BookId) -> Result<Option<Book>, StorageError> {
        let row = sqlx::query("SELECT id, title, total_pages FROM books WHERE id = ?1")
            .bind(id_i64("book_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let total_pages: i64 = row.try_get("total_pages").map_err(ser)?;
        Book::new(
            book_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
            row.try_get::<String, _>("title").map_err(ser)?,
            u32::try_from(total_pages)
                .map_err(|_| StorageError::Serialization(format!("invalid total_pages: {total_pages}")))?,
        )
        .map(Some)
        .map_err(ser)
    }
}
