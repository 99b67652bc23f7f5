//! RPC Error Types
//!
//! Maps classified query failures to JSON-RPC error codes. Every error kind
//! gets its own code so clients can tell "try again later" from "fix the
//! query" without parsing messages.

use dbguard_core::domain::{ClassifiedError, ErrorKind};
use dbguard_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const QUERY_FATAL: i32 = 4100;
    pub const QUERY_TIMEOUT: i32 = 4101;
    pub const QUERY_CANCELLED: i32 = 4102;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const TRANSIENT_CONNECTION: i32 = 5030;
    pub const TRANSIENT_RESOURCE: i32 = 5031;
    pub const POOL_CLOSED: i32 = 5032;
}

pub fn code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::TransientConnection => code::TRANSIENT_CONNECTION,
        ErrorKind::TransientResource => code::TRANSIENT_RESOURCE,
        ErrorKind::Timeout => code::QUERY_TIMEOUT,
        ErrorKind::Fatal => code::QUERY_FATAL,
        ErrorKind::PoolClosed => code::POOL_CLOSED,
        ErrorKind::Cancelled => code::QUERY_CANCELLED,
    }
}

/// Convert a classified failure; the full error rides along as `data`
pub fn to_rpc_error(err: ClassifiedError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code_for(err.kind), err.message.clone(), Some(err))
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn app_to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Query(e) => to_rpc_error(e),
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Serialization(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Io(e) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, e.to_string(), None::<()>),
        AppError::Config(msg) | AppError::Internal(msg) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_kind_has_distinct_code() {
        let kinds = [
            ErrorKind::TransientConnection,
            ErrorKind::TransientResource,
            ErrorKind::Timeout,
            ErrorKind::Fatal,
            ErrorKind::PoolClosed,
            ErrorKind::Cancelled,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| code_for(*k)).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_classified_error_travels_as_data() {
        let err = ClassifiedError::new(ErrorKind::Timeout, "statement exceeded timeout of 100ms")
            .with_retries(0);
        let obj = to_rpc_error(err);

        assert_eq!(obj.code(), code::QUERY_TIMEOUT);
        assert_eq!(obj.message(), "statement exceeded timeout of 100ms");
        let data: serde_json::Value = serde_json::from_str(obj.data().unwrap().get()).unwrap();
        assert_eq!(data["kind"], "timeout");
        assert_eq!(data["retriesAttempted"], 0);
    }
}
