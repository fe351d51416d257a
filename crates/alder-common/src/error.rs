//! Error types for AlderDB.

use crate::page::PageId;
use thiserror::Error;

/// Result type alias using AlderError.
pub type Result<T> = std::result::Result<T, AlderError>;

/// Errors that can occur in AlderDB operations.
#[derive(Debug, Error)]
pub enum AlderError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Buffer manager errors
    #[error("Page not found: {page}")]
    PageNotFound { page: PageId },

    #[error("Buffer pool full, unable to allocate frame")]
    BufferPoolFull,

    #[error("Page {page} is pinned")]
    PagePinned { page: PageId },

    #[error("Page {page} is not pinned")]
    PageNotPinned { page: PageId },

    // Storage errors
    #[error("Page full, unable to insert record")]
    PageFull,

    #[error("Record of {len} bytes cannot hold key at offset {offset}")]
    RecordTooShort { len: usize, offset: usize },

    // Index errors
    #[error("Index info not matched: {0}")]
    BadIndexInfo(String),

    #[error("Bad scan opcodes: lower bound must be GT/GTE, upper bound LT/LTE")]
    BadOpcodes,

    #[error("Bad scan range: low bound exceeds high bound")]
    BadScanRange,

    #[error("Scan not initialized")]
    ScanNotInitialized,

    #[error("Index scan completed")]
    IndexScanCompleted,

    #[error("No such key found")]
    NoSuchKeyFound,

    #[error("Key type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: AlderError = io_err.into();
        assert!(matches!(err, AlderError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_page_not_found_display() {
        let err = AlderError::PageNotFound {
            page: PageId::new(1, 42),
        };
        assert_eq!(err.to_string(), "Page not found: 1#42");
    }

    #[test]
    fn test_buffer_pool_full_display() {
        let err = AlderError::BufferPoolFull;
        assert_eq!(err.to_string(), "Buffer pool full, unable to allocate frame");
    }

    #[test]
    fn test_pin_errors_display() {
        let err = AlderError::PagePinned {
            page: PageId::new(2, 7),
        };
        assert_eq!(err.to_string(), "Page 2#7 is pinned");

        let err = AlderError::PageNotPinned {
            page: PageId::new(2, 7),
        };
        assert_eq!(err.to_string(), "Page 2#7 is not pinned");
    }

    #[test]
    fn test_record_too_short_display() {
        let err = AlderError::RecordTooShort { len: 8, offset: 12 };
        assert_eq!(
            err.to_string(),
            "Record of 8 bytes cannot hold key at offset 12"
        );
    }

    #[test]
    fn test_index_errors_display() {
        let err = AlderError::BadIndexInfo("attribute offset 4 != 8".to_string());
        assert_eq!(err.to_string(), "Index info not matched: attribute offset 4 != 8");

        assert_eq!(
            AlderError::BadOpcodes.to_string(),
            "Bad scan opcodes: lower bound must be GT/GTE, upper bound LT/LTE"
        );
        assert_eq!(
            AlderError::BadScanRange.to_string(),
            "Bad scan range: low bound exceeds high bound"
        );
        assert_eq!(
            AlderError::ScanNotInitialized.to_string(),
            "Scan not initialized"
        );
        assert_eq!(
            AlderError::IndexScanCompleted.to_string(),
            "Index scan completed"
        );
        assert_eq!(AlderError::NoSuchKeyFound.to_string(), "No such key found");
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = AlderError::TypeMismatch {
            expected: "INT".to_string(),
            actual: "DOUBLE".to_string(),
        };
        assert_eq!(err.to_string(), "Key type mismatch: expected INT, got DOUBLE");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(AlderError::BadOpcodes)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AlderError>();
    }
}
