use crate::driver::DriverError;
use crate::error::ErrorContext;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Frames kept from a driver stack trace.
pub const MAX_TRACE_FRAMES: usize = 10;

static CREDENTIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b((?:[a-z0-9]+_)*(?:api_?key|access_?key|secret_?key|password|passwd|secret|token))(\s*[=:]\s*)[^\s,;&'"]+"#,
    )
    .expect("static regex")
});

static ABSOLUTE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[\s(@])/(?:[^/\s:()]+/)*([^/\s:()]+)").expect("static regex")
});

/// A driver error that is safe to log and return: context-tagged, with
/// credentials redacted and the trace trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedError {
    /// `[engine=..][op=..]` tags followed by the redacted driver message.
    pub message: String,
    pub code: Option<String>,
    pub trace: Vec<String>,
    /// Attempts made before giving up; `0` when not produced by a retry loop.
    pub attempts: u32,
}

impl SanitizedError {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

impl fmt::Display for SanitizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code {code})")?;
        }
        if self.attempts > 0 {
            write!(f, " after {} attempt(s)", self.attempts)?;
        }
        Ok(())
    }
}

fn redact(text: &str) -> String {
    CREDENTIAL.replace_all(text, "${1}${2}***").into_owned()
}

fn relativize(line: &str, cwd: Option<&str>) -> String {
    let line = match cwd {
        Some(cwd) if !cwd.is_empty() && cwd != "/" => line.replace(&format!("{cwd}/"), ""),
        _ => line.to_string(),
    };
    ABSOLUTE_PATH.replace_all(&line, "${1}${2}").into_owned()
}

fn trim_trace(trace: &str) -> Vec<String> {
    let cwd = std::env::current_dir()
        .ok()
        .map(|p| p.to_string_lossy().into_owned());
    trace
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MAX_TRACE_FRAMES)
        .map(|line| redact(&relativize(line, cwd.as_deref())))
        .collect()
}

/// Sanitize a driver error for the boundary.
pub fn sanitize(error: &DriverError, context: &ErrorContext) -> SanitizedError {
    let tags = context.tags();
    let message = redact(error.message.trim());
    SanitizedError {
        message: if tags.is_empty() {
            message
        } else {
            format!("{tags} {message}")
        },
        code: error.code.clone(),
        trace: error.trace.as_deref().map(trim_trace).unwrap_or_default(),
        attempts: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn test_sanitize_tags_and_redacts() {
        let err = DriverError::with_code(
            "28P01",
            "auth failed for url postgres://app?password=hunter2&sslmode=require, API_KEY=abc123",
        );
        let ctx = ErrorContext::new(Engine::Postgres, "exists_table").table("users");
        let sanitized = sanitize(&err, &ctx);
        assert!(sanitized.message.starts_with("[engine=postgres][op=exists_table][table=users] "));
        assert!(!sanitized.message.contains("hunter2"));
        assert!(!sanitized.message.contains("abc123"));
        assert!(sanitized.message.contains("password=***"));
        assert!(sanitized.message.contains("API_KEY=***"));
    }

    #[test]
    fn test_constraint_details_survive_redaction() {
        let err = DriverError::with_code(
            "23505",
            "duplicate key value violates unique constraint \"users_email_key\": Key (email)=(a@example.com) already exists",
        );
        let sanitized = sanitize(&err, &ErrorContext::default());
        assert!(sanitized.message.contains("Key (email)=(a@example.com)"));

        let err =
            DriverError::new("duplicate key: (email)=dup, db_password=s3cret accessKey: AKIA1");
        let message = sanitize(&err, &ErrorContext::default()).message;
        assert!(message.contains("duplicate key: (email)=dup"));
        assert!(message.contains("db_password=***"));
        assert!(message.contains("accessKey: ***"));
    }

    #[test]
    fn test_trace_is_trimmed_and_relative() {
        let trace: String = (0..25)
            .map(|i| format!("    at frame{i} (/opt/service/app/src/file{i}.rs:10:5)\n"))
            .collect();
        let err = DriverError::new("boom").trace(trace);
        let sanitized = sanitize(&err, &ErrorContext::default());
        assert_eq!(sanitized.trace.len(), MAX_TRACE_FRAMES);
        assert_eq!(sanitized.trace[0], "at frame0 (file0.rs:10:5)");
        assert!(sanitized.trace.iter().all(|frame| !frame.contains("/opt/")));
        assert_eq!(sanitized.message, "boom");
    }

    #[test]
    fn test_display_mentions_attempts() {
        let sanitized = sanitize(
            &DriverError::with_code("ECONNRESET", "reset"),
            &ErrorContext::new(Engine::Mysql, "execute"),
        )
        .with_attempts(3);
        assert_eq!(
            sanitized.to_string(),
            "[engine=mysql][op=execute] reset (code ECONNRESET) after 3 attempt(s)"
        );
    }
}
