//! Sorting remote failures into transient and fatal.

use super::{BackendError, TransientClass};
use roster_engine::Error;

/// Message fragments resolvers use when a host name cannot be resolved.
const NAME_RESOLUTION_HINTS: [&str; 6] = [
    "failed to lookup address",
    "name or service not known",
    "no such host",
    "nodename nor servname",
    "temporary failure in name resolution",
    "could not resolve",
];

/// Classify a database error.
///
/// Transient: connection-level IO failures, pool acquisition timeouts, a
/// closed pool, crashed workers, and server-side connection exceptions
/// (SQLSTATE class 08, 57P0x). Data exceptions and integrity violations
/// (classes 22 and 23) become `ValidationFailed`. Everything else is a fatal
/// storage error.
pub fn classify(err: &sqlx::Error) -> BackendError {
    match err {
        sqlx::Error::Io(io) => BackendError::transient(io_class(io), err.to_string()),
        sqlx::Error::PoolTimedOut => BackendError::transient(TransientClass::Timeout, err.to_string()),
        sqlx::Error::PoolClosed => BackendError::transient(TransientClass::Closed, err.to_string()),
        sqlx::Error::WorkerCrashed => {
            BackendError::transient(TransientClass::Network, err.to_string())
        }
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            if code.starts_with("08") || code.starts_with("57P0") {
                BackendError::transient(TransientClass::Network, db.message())
            } else if code.starts_with("22") || code.starts_with("23") {
                Error::ValidationFailed(db.message().to_string()).into()
            } else {
                Error::Storage(err.to_string()).into()
            }
        }
        _ => Error::Storage(err.to_string()).into(),
    }
}

fn io_class(io: &std::io::Error) -> TransientClass {
    if is_name_resolution(&io.to_string()) {
        TransientClass::NameResolution
    } else if io.kind() == std::io::ErrorKind::TimedOut {
        TransientClass::Timeout
    } else {
        TransientClass::Network
    }
}

fn is_name_resolution(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    NAME_RESOLUTION_HINTS
        .iter()
        .any(|hint| message.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn class_of(err: sqlx::Error) -> Option<TransientClass> {
        match classify(&err) {
            BackendError::Transient { class, .. } => Some(class),
            BackendError::Fatal(_) => None,
        }
    }

    #[test]
    fn connection_failures_are_transient() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof,
        ] {
            let err = sqlx::Error::Io(io::Error::new(kind, "boom"));
            assert_eq!(class_of(err), Some(TransientClass::Network), "{:?}", kind);
        }
    }

    #[test]
    fn timeouts_are_transient() {
        assert_eq!(
            class_of(sqlx::Error::PoolTimedOut),
            Some(TransientClass::Timeout)
        );
        let err = sqlx::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(class_of(err), Some(TransientClass::Timeout));
    }

    #[test]
    fn closed_pool_is_transient() {
        assert_eq!(
            class_of(sqlx::Error::PoolClosed),
            Some(TransientClass::Closed)
        );
    }

    #[test]
    fn lookup_failures_are_name_resolution() {
        let err = sqlx::Error::Io(io::Error::other(
            "failed to lookup address information: Name or service not known",
        ));
        assert_eq!(class_of(err), Some(TransientClass::NameResolution));

        let err = sqlx::Error::Io(io::Error::other("No such host is known. (os error 11001)"));
        assert_eq!(class_of(err), Some(TransientClass::NameResolution));
    }

    #[test]
    fn everything_else_is_fatal() {
        assert!(matches!(
            classify(&sqlx::Error::RowNotFound),
            BackendError::Fatal(Error::Storage(_))
        ));
        assert!(matches!(
            classify(&sqlx::Error::Protocol("unexpected message".into())),
            BackendError::Fatal(Error::Storage(_))
        ));
    }
}
