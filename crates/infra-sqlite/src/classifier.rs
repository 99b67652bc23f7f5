// sqlx error classification
// SQLite result codes: https://www.sqlite.org/rescode.html

use dbguard_core::domain::ErrorKind;
use dbguard_core::port::{DriverError, ErrorClassifier};
use sqlx::error::{DatabaseError, ErrorKind as SqlxErrorKind};

const SQLITE_PERM: i32 = 3;
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_NOMEM: i32 = 7;
const SQLITE_INTERRUPT: i32 = 9;
const SQLITE_IOERR: i32 = 10;
const SQLITE_FULL: i32 = 13;
const SQLITE_CANTOPEN: i32 = 14;
const SQLITE_AUTH: i32 = 23;

/// Maps `sqlx::Error` onto the closed error taxonomy
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlxErrorClassifier;

impl ErrorClassifier<sqlx::Error> for SqlxErrorClassifier {
    fn classify(&self, err: &sqlx::Error) -> DriverError {
        match err {
            sqlx::Error::Database(db_err) => classify_database(db_err.as_ref()),
            sqlx::Error::Io(io_err) => {
                DriverError::new(ErrorKind::TransientConnection, io_err.to_string())
                    .with_code(format!("{:?}", io_err.kind()))
                    .broken()
            }
            sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed => {
                DriverError::new(ErrorKind::TransientConnection, err.to_string()).broken()
            }
            sqlx::Error::PoolTimedOut => {
                DriverError::new(ErrorKind::TransientResource, err.to_string())
            }
            sqlx::Error::PoolClosed => {
                DriverError::new(ErrorKind::TransientConnection, err.to_string()).broken()
            }
            // Configuration, decode, type and row errors: retrying cannot help
            _ => DriverError::new(ErrorKind::Fatal, err.to_string()),
        }
    }
}

fn classify_database(db_err: &dyn DatabaseError) -> DriverError {
    let code = db_err.code().map(|c| c.into_owned());
    let message = db_err.message().to_string();

    let driver_err = |kind: ErrorKind| {
        let err = DriverError::new(kind, message.clone());
        match &code {
            Some(code) => err.with_code(code.clone()),
            None => err,
        }
    };

    // Constraint family (1555/2067 unique, 787 foreign key, 1299 not null,
    // 275 check) is reported through the portable kind
    match db_err.kind() {
        SqlxErrorKind::UniqueViolation
        | SqlxErrorKind::ForeignKeyViolation
        | SqlxErrorKind::NotNullViolation
        | SqlxErrorKind::CheckViolation => return driver_err(ErrorKind::Fatal),
        _ => {}
    }

    let Some(extended) = code.as_deref().and_then(|c| c.parse::<i32>().ok()) else {
        return driver_err(ErrorKind::Fatal);
    };

    match extended & 0xFF {
        SQLITE_BUSY | SQLITE_LOCKED | SQLITE_NOMEM | SQLITE_FULL => {
            driver_err(ErrorKind::TransientResource)
        }
        SQLITE_INTERRUPT => driver_err(ErrorKind::Timeout),
        SQLITE_IOERR | SQLITE_CANTOPEN => driver_err(ErrorKind::TransientConnection).broken(),
        SQLITE_PERM | SQLITE_AUTH => driver_err(ErrorKind::Fatal),
        _ => driver_err(ErrorKind::Fatal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Connection, SqliteConnection};
    use std::io;

    async fn classify_sql(conn: &mut SqliteConnection, sql: &str) -> DriverError {
        let err = sqlx::query(sql).execute(&mut *conn).await.unwrap_err();
        SqlxErrorClassifier.classify(&err)
    }

    #[tokio::test]
    async fn test_unique_violation_is_fatal() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE users (email TEXT UNIQUE)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO users VALUES ('a@b.c')")
            .execute(&mut conn)
            .await
            .unwrap();

        let err = classify_sql(&mut conn, "INSERT INTO users VALUES ('a@b.c')").await;
        assert_eq!(err.kind, ErrorKind::Fatal);
        assert_eq!(err.code.as_deref(), Some("2067"));
        assert!(!err.transport_broken);
    }

    #[tokio::test]
    async fn test_syntax_error_is_fatal() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        let err = classify_sql(&mut conn, "SELEC 1").await;
        assert_eq!(err.kind, ErrorKind::Fatal);
    }

    #[test]
    fn test_connection_reset_is_transient_and_broken() {
        let err = sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        let classified = SqlxErrorClassifier.classify(&err);
        assert_eq!(classified.kind, ErrorKind::TransientConnection);
        assert!(classified.transport_broken);
        assert_eq!(classified.code.as_deref(), Some("ConnectionReset"));
    }

    #[test]
    fn test_pool_timeout_is_resource() {
        let classified = SqlxErrorClassifier.classify(&sqlx::Error::PoolTimedOut);
        assert_eq!(classified.kind, ErrorKind::TransientResource);
        assert!(!classified.transport_broken);
    }

    #[test]
    fn test_decode_problems_are_fatal() {
        let err = sqlx::Error::ColumnNotFound("missing".to_string());
        assert_eq!(SqlxErrorClassifier.classify(&err).kind, ErrorKind::Fatal);
    }
}
