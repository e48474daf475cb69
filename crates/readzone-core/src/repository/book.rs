//! Book catalog port.
//!
//! The catalog itself belongs to the surrounding CRUD layer. Sync only needs
//! exact lookup by normalized keys and creation of new canonical books.

use readzone_types::book::{Book, BookId, NewBook};
use readzone_types::error::RepositoryError;

pub trait BookCatalog: Send + Sync {
    /// Books whose normalized title and first-author keys equal the given ones.
    ///
    /// Keys are produced by `readzone_types::book::match_key`.
    fn find_exact(
        &self,
        title_key: &str,
        author_key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Book>, RepositoryError>> + Send;

    fn get(
        &self,
        id: &BookId,
    ) -> impl std::future::Future<Output = Result<Option<Book>, RepositoryError>> + Send;

    fn create(
        &self,
        book: &NewBook,
    ) -> impl std::future::Future<Output = Result<Book, RepositoryError>> + Send;
}
