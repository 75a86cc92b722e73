use crate::driver::DriverError;

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

/// Error codes that always mean "try again later".
pub const TRANSIENT_CODES: &[&str] = &[
    // sockets
    "ECONNRESET",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "EPIPE",
    "EHOSTUNREACH",
    "ENETUNREACH",
    "EAI_AGAIN",
    // MySQL
    "PROTOCOL_CONNECTION_LOST",
    "ER_LOCK_DEADLOCK",
    "ER_LOCK_WAIT_TIMEOUT",
    "ER_CON_COUNT_ERROR",
    // PostgreSQL SQLSTATE
    "40001",
    "40P01",
    "55P03",
    "53300",
    "57P01",
    // wide-column
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
    "LimitExceededException",
];

/// Message fragments matched case-insensitively when no code matches.
pub const TRANSIENT_VOCABULARY: &[&str] = &[
    "connection",
    "timeout",
    "deadlock",
    "lock wait",
    "too many connections",
    "connection refused",
];

fn is_transient_code(code: &str) -> bool {
    let code = code.trim();
    // SQLSTATE class 08: connection exception
    if code.len() == 5 && code.starts_with("08") {
        return true;
    }
    TRANSIENT_CODES.iter().any(|c| c.eq_ignore_ascii_case(code))
}

/// Classify a driver error. Engines report the same failure either as a
/// code or as free text, so both are checked.
pub fn classify(error: &DriverError) -> ErrorClass {
    if error.code.as_deref().is_some_and(is_transient_code) {
        return ErrorClass::Transient;
    }
    let lower = error.message.to_ascii_lowercase();
    if TRANSIENT_VOCABULARY.iter().any(|word| lower.contains(word)) {
        return ErrorClass::Transient;
    }
    ErrorClass::Fatal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_classify_transient() {
        assert_eq!(
            classify(&DriverError::with_code("ECONNRESET", "socket hang up")),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&DriverError::with_code("08006", "server closed")),
            ErrorClass::Transient
        );
        assert_eq!(classify(&DriverError::with_code("40P01", "")), ErrorClass::Transient);
        assert_eq!(
            classify(&DriverError::with_code(
                "ProvisionedThroughputExceededException",
                "slow down"
            )),
            ErrorClass::Transient
        );
    }

    #[test]
    fn test_vocabulary_classifies_transient() {
        assert_eq!(
            classify(&DriverError::new("Lock wait timeout exceeded")),
            ErrorClass::Transient
        );
        assert_eq!(classify(&DriverError::new("Too many connections")), ErrorClass::Transient);
        assert_eq!(classify(&DriverError::new("DEADLOCK detected")), ErrorClass::Transient);
    }

    #[test]
    fn test_everything_else_is_fatal() {
        assert_eq!(classify(&DriverError::new("Invalid SQL syntax")), ErrorClass::Fatal);
        assert_eq!(
            classify(&DriverError::with_code("42601", "syntax error at or near")),
            ErrorClass::Fatal
        );
        assert_eq!(
            classify(&DriverError::with_code("ValidationException", "bad key schema")),
            ErrorClass::Fatal
        );
    }
}
