use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::BookId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BookError {
    #[error("book title cannot be empty")]
    EmptyTitle,
}

/// Catalogue entry for a book.
///
/// Only `total_pages` feeds the plan engine; it is snapshotted onto a plan when
/// the plan is created. Zero means the page count is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    id: BookId,
    title: String,
    total_pages: u32,
}

impl Book {
    /// # Errors
    ///
    /// Returns `BookError::EmptyTitle` if the title is blank.
    pub fn new(id: BookId, title: impl Into<String>, total_pages: u32) -> Result<Self, BookError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(BookError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            total_pages,
        })
    }

    #[must_use]
    pub fn id(&self) -> BookId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_is_rejected() {
        let err = Book::new(BookId::new(1), "   ", 120).unwrap_err();
        assert_eq!(err, BookError::EmptyTitle);
    }

    #[test]
    fn title_is_trimmed() {
        let book = Book::new(BookId::new(1), "  Dune ", 412).unwrap();
        assert_eq!(book.title(), "Dune");
        assert_eq!(book.total_pages(), 412);
    }
}
