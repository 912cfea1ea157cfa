//! Error types and result definitions for migration operations.
//!
//! [`MigrateError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, an optional source error and the location where it was created. Several errors
//! can be aggregated into one, which is how failures of multiple workers are reported together.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used throughout the crate.
pub type MigrateResult<T> = Result<T, MigrateError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for migration operations.
#[derive(Debug, Clone)]
pub struct MigrateError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Multiple aggregated errors, mainly used to report several worker failures at once.
    Many {
        errors: Vec<MigrateError>,
        location: &'static Location<'static>,
    },
}

/// Classification of migration errors.
///
/// The producer only retries the source kinds for which [`ErrorKind::is_retryable`] is true.
/// Every other source kind is fatal for the run.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Transient source errors
    SourceTimeout,
    SourceUnavailable,
    SourceThrottled,

    // Fatal source errors
    SourceQueryFailed,
    SourceRetriesExhausted,

    // Sink errors
    SinkConnectionFailed,
    SinkQueryFailed,
    SinkConstraintViolation,

    // Data & Transformation Errors
    ConversionError,
    DeserializationError,

    // Security Errors
    EncryptionError,
    AuthenticationError,

    // IO Errors
    IoError,
    /// The resume checkpoint could not be read, written or removed.
    CheckpointFailed,

    // State & Workflow Errors
    InvalidState,
    ProducerPanic,
    WorkerPanic,
    AggregatorPanic,

    Unknown,
}

impl ErrorKind {
    /// Returns `true` for source failures that are worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::SourceTimeout | ErrorKind::SourceUnavailable | ErrorKind::SourceThrottled
        )
    }
}

impl MigrateError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`] when
    /// there are none.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the dynamic detail, or the first available detail of an aggregate.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating error. Has no effect on aggregates.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        MigrateError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn from_source<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        MigrateError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for MigrateError {
    fn eq(&self, other: &MigrateError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for MigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_block("Detail", payload.detail.as_deref(), f)?;

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() && !backtrace.contains("disabled backtrace") {
                    write_block("Backtrace", Some(&backtrace), f)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for MigrateError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes an indented, titled block of lines.
fn write_block(title: &str, body: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(body) = body else {
        return Ok(());
    };

    if body.trim().is_empty() {
        return write!(f, "\n  {title}: <empty>");
    }

    write!(f, "\n  {title}:")?;
    for line in body.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

impl From<(ErrorKind, &'static str)> for MigrateError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> MigrateError {
        MigrateError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for MigrateError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> MigrateError {
        MigrateError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is instead of being wrapped.
impl<E> From<Vec<E>> for MigrateError
where
    E: Into<MigrateError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> MigrateError {
        let location = Location::caller();
        let mut errors: Vec<MigrateError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        MigrateError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for MigrateError {
    #[track_caller]
    fn from(err: std::io::Error) -> MigrateError {
        MigrateError::from_source(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<serde_json::Error> for MigrateError {
    #[track_caller]
    fn from(err: serde_json::Error) -> MigrateError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        MigrateError::from_source(kind, description, err)
    }
}

impl From<rustls::Error> for MigrateError {
    #[track_caller]
    fn from(err: rustls::Error) -> MigrateError {
        MigrateError::from_source(ErrorKind::EncryptionError, "TLS configuration failed", err)
    }
}

/// Converts source-side [`sqlx::Error`]s, separating transient failures from fatal ones.
///
/// Timeouts, lost connections and resource exhaustion on the server map to the retryable kinds.
impl From<sqlx::Error> for MigrateError {
    #[track_caller]
    fn from(err: sqlx::Error) -> MigrateError {
        let (kind, description) = match &err {
            sqlx::Error::PoolTimedOut => (
                ErrorKind::SourceTimeout,
                "Timed out acquiring a source connection",
            ),
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => (
                ErrorKind::SourceUnavailable,
                "Source database is unavailable",
            ),
            sqlx::Error::Tls(_) => (ErrorKind::EncryptionError, "Source TLS handshake failed"),
            sqlx::Error::Database(db_err) => {
                classify_source_sqlstate(db_err.code().as_deref().unwrap_or_default())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => (
                ErrorKind::ConversionError,
                "Failed to decode a source row",
            ),
            _ => (ErrorKind::SourceQueryFailed, "Source query failed"),
        };

        MigrateError::from_source(kind, description, err)
    }
}

fn classify_source_sqlstate(code: &str) -> (ErrorKind, &'static str) {
    match code {
        // query_canceled, raised by statement_timeout
        "57014" => (ErrorKind::SourceTimeout, "Source query timed out"),
        // admin_shutdown, crash_shutdown, cannot_connect_now
        "57P01" | "57P02" | "57P03" => (
            ErrorKind::SourceUnavailable,
            "Source database is shutting down or starting up",
        ),
        // insufficient_resources, too_many_connections
        "53000" | "53300" => (
            ErrorKind::SourceThrottled,
            "Source database is out of resources",
        ),
        code if code.starts_with("08") => (
            ErrorKind::SourceUnavailable,
            "Source connection failed",
        ),
        code if code.starts_with("28") => (
            ErrorKind::AuthenticationError,
            "Source authentication failed",
        ),
        _ => (ErrorKind::SourceQueryFailed, "Source query failed"),
    }
}

/// Converts sink-side [`tokio_postgres::Error`]s based on their SQLSTATE.
impl From<tokio_postgres::Error> for MigrateError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> MigrateError {
        use tokio_postgres::error::SqlState;

        let (kind, description) = match err.code() {
            Some(sqlstate) => match *sqlstate {
                SqlState::INTEGRITY_CONSTRAINT_VIOLATION
                | SqlState::NOT_NULL_VIOLATION
                | SqlState::FOREIGN_KEY_VIOLATION
                | SqlState::UNIQUE_VIOLATION
                | SqlState::CHECK_VIOLATION
                | SqlState::EXCLUSION_VIOLATION => (
                    ErrorKind::SinkConstraintViolation,
                    "Sink constraint violation",
                ),

                SqlState::DATA_EXCEPTION
                | SqlState::INVALID_TEXT_REPRESENTATION
                | SqlState::NUMERIC_VALUE_OUT_OF_RANGE
                | SqlState::STRING_DATA_RIGHT_TRUNCATION
                | SqlState::DATATYPE_MISMATCH
                | SqlState::CANNOT_COERCE => (
                    ErrorKind::ConversionError,
                    "Sink rejected a value conversion",
                ),

                SqlState::CONNECTION_EXCEPTION
                | SqlState::CONNECTION_DOES_NOT_EXIST
                | SqlState::CONNECTION_FAILURE
                | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
                | SqlState::ADMIN_SHUTDOWN
                | SqlState::CRASH_SHUTDOWN
                | SqlState::CANNOT_CONNECT_NOW
                | SqlState::TOO_MANY_CONNECTIONS => {
                    (ErrorKind::SinkConnectionFailed, "Sink connection failed")
                }

                SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                    ErrorKind::AuthenticationError,
                    "Sink authentication failed",
                ),

                _ => (ErrorKind::SinkQueryFailed, "Sink query failed"),
            },
            // No SQLSTATE means the error did not come from the server.
            None if err.is_closed() => (ErrorKind::SinkConnectionFailed, "Sink connection closed"),
            None => (ErrorKind::SinkConnectionFailed, "Sink connection failed"),
        };

        MigrateError::from_source(kind, description, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate_error;

    #[test]
    fn only_transient_source_kinds_are_retryable() {
        assert!(ErrorKind::SourceTimeout.is_retryable());
        assert!(ErrorKind::SourceUnavailable.is_retryable());
        assert!(ErrorKind::SourceThrottled.is_retryable());
        assert!(!ErrorKind::SourceQueryFailed.is_retryable());
        assert!(!ErrorKind::SinkConnectionFailed.is_retryable());
    }

    #[test]
    fn display_includes_kind_description_and_detail() {
        let err = migrate_error!(
            ErrorKind::ConversionError,
            "Record could not be decoded",
            "key companies/42"
        );

        let rendered = err.to_string();
        assert!(rendered.starts_with("[ConversionError] Record could not be decoded @ "));
        assert!(rendered.contains("Detail:\n    key companies/42"));
        assert_eq!(err.detail(), Some("key companies/42"));
    }

    #[test]
    fn single_error_vector_is_not_wrapped() {
        let err: MigrateError = vec![MigrateError::from((ErrorKind::WorkerPanic, "panic"))].into();

        assert_eq!(err.kind(), ErrorKind::WorkerPanic);
        assert!(!err.to_string().starts_with("[Many]"));
    }

    #[test]
    fn aggregated_errors_expose_all_kinds() {
        let err: MigrateError = vec![
            MigrateError::from((ErrorKind::WorkerPanic, "first")),
            MigrateError::from((ErrorKind::SourceQueryFailed, "second")),
        ]
        .into();

        assert_eq!(err.kind(), ErrorKind::WorkerPanic);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::WorkerPanic, ErrorKind::SourceQueryFailed]
        );
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn source_sqlstates_are_classified() {
        assert_eq!(classify_source_sqlstate("57014").0, ErrorKind::SourceTimeout);
        assert_eq!(classify_source_sqlstate("53300").0, ErrorKind::SourceThrottled);
        assert_eq!(
            classify_source_sqlstate("08006").0,
            ErrorKind::SourceUnavailable
        );
        assert_eq!(
            classify_source_sqlstate("42P01").0,
            ErrorKind::SourceQueryFailed
        );
    }

    #[test]
    fn io_errors_keep_their_source() {
        let err = MigrateError::from(std::io::Error::other("disk gone"));

        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(error::Error::source(&err).is_some());
    }
}
