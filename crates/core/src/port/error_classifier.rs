// Error Classifier Port
// Maps driver-native errors onto the closed ErrorKind taxonomy

use super::connector::DriverError;

/// Adapter that translates a driver's native error vocabulary
/// (numeric codes, SQLSTATEs, I/O errors) into a `DriverError`.
///
/// Implemented per driver in the infra crates so that retry logic in
/// core never branches on driver-specific codes.
pub trait ErrorClassifier<E>: Send + Sync {
    fn classify(&self, err: &E) -> DriverError;
}
