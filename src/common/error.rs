//! Error types for sharddb.

use thiserror::Error;

use super::PageId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the buffer pool and the disk layer.
///
/// Every variant is recoverable at the buffer pool boundary. None of them
/// should ever terminate the process.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    ///
    /// Fatal to the current operation, but the pool bookkeeping is left
    /// consistent.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("{0} not found on disk")]
    PageNotFound(PageId),

    /// No frame can be obtained: the free list is empty and every frame is
    /// pinned, so the replacer has no victim.
    #[error("buffer pool exhausted, all frames are pinned")]
    PoolExhausted,

    /// Unpin or flush of a page that is not cached.
    #[error("{0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    /// Unpin of a page whose pin count is already 0.
    ///
    /// This indicates a caller bookkeeping bug - unpins must match pins.
    #[error("{0} is not pinned")]
    PageNotPinned(PageId),

    /// Delete of a page that is still in use. Retry after releasing it.
    #[error("{0} is still pinned ({1} pins)")]
    PagePinned(PageId, u32),

    /// The sentinel page id was passed where a real page was required.
    #[error("invalid page id: {0}")]
    InvalidPageId(PageId),

    /// Buffer pool configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(42));
        assert_eq!(format!("{}", err), "Page(42) not found on disk");

        let err = Error::PoolExhausted;
        assert_eq!(
            format!("{}", err),
            "buffer pool exhausted, all frames are pinned"
        );

        let err = Error::PagePinned(PageId::new(3), 2);
        assert_eq!(format!("{}", err), "Page(3) is still pinned (2 pins)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail(fail: bool) -> Result<u32> {
            if fail {
                return Err(Error::PageNotResident(PageId::new(7)));
            }
            Ok(42)
        }

        assert_eq!(might_fail(false).unwrap(), 42);
        assert!(matches!(might_fail(true), Err(Error::PageNotResident(_))));
    }
}
