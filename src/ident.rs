//! Identifier helpers shared by the engine adapters.

use crate::engine::Engine;
use crate::error::{MigrateError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Longest identifier PostgreSQL keeps without silently truncating.
pub const MAX_IDENTIFIER_LEN: usize = 63;

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"));

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("static regex"));

static FUNCTION_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*\s*\(.*\)$").expect("static regex"));

static INDEX_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(lower|upper|trim|date)\s*\(\s*([A-Za-z_][A-Za-z0-9_$]*)\s*\)$")
        .expect("static regex")
});

static INDEX_ORDERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_$]*)\s+(?i)(asc|desc)$").expect("static regex")
});

/// Keywords accepted verbatim as column defaults.
const DEFAULT_KEYWORDS: &[&str] = &[
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "LOCALTIMESTAMP",
    "NULL",
];

/// Quote an identifier for `engine`, doubling any embedded quote character.
///
/// The wide-column engine addresses attributes by API field name, so names
/// are returned untouched.
pub fn quote_identifier(engine: Engine, name: &str) -> String {
    match engine {
        Engine::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        Engine::Mysql => format!("`{}`", name.replace('`', "``")),
        Engine::Dynamodb => name.to_string(),
    }
}

/// Whether `name` is a plain SQL identifier.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Collapse runs of non-alphanumeric characters into `_` and upper-case.
///
/// `user-profiles.v2` → `USER_PROFILES_V2`.
pub fn normalize_key(raw: &str) -> String {
    NON_ALNUM
        .replace_all(raw, "_")
        .trim_matches('_')
        .to_ascii_uppercase()
}

/// Sanitize a name for use inside a generated identifier.
fn sanitize_fragment(name: &str) -> String {
    NON_ALNUM
        .replace_all(name, "_")
        .trim_matches('_')
        .to_lowercase()
}

/// Default name for an unnamed index: `<table>_<col>_<col>_idx`.
///
/// Names longer than [`MAX_IDENTIFIER_LEN`] keep a readable prefix and get a
/// short hash suffix so distinct column lists never collide after truncation.
pub fn default_index_name(table: &str, columns: &[String]) -> String {
    let mut parts = vec![sanitize_fragment(table)];
    parts.extend(columns.iter().map(|c| sanitize_fragment(c)));
    parts.push("idx".to_string());
    let name = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if name.len() <= MAX_IDENTIFIER_LEN {
        return name;
    }

    let digest = Sha256::digest(name.as_bytes());
    let suffix = format!("{:x}", digest);
    let keep = MAX_IDENTIFIER_LEN - 9;
    format!("{}_{}", name[..keep].trim_end_matches('_'), &suffix[..8])
}

/// Whether a default literal is function-call shaped (`now()`,
/// `gen_random_uuid()`) or an allowlisted SQL keyword, and can therefore be
/// emitted verbatim.
pub fn is_verbatim_default(literal: &str) -> bool {
    let trimmed = literal.trim();
    FUNCTION_CALL.is_match(trimmed)
        || DEFAULT_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(trimmed))
}

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    Asc,
    Desc,
}

/// One allowlisted index column expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexColumn {
    /// A plain column, optionally ordered.
    Column { name: String, order: Option<IndexOrder> },
    /// An allowlisted function applied to one column, e.g. `lower(email)`.
    Function { function: String, column: String },
}

impl IndexColumn {
    /// Parse a raw index column entry, rejecting anything outside the allowlist.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if is_identifier(trimmed) {
            return Ok(IndexColumn::Column {
                name: trimmed.to_string(),
                order: None,
            });
        }
        if let Some(caps) = INDEX_ORDERED.captures(trimmed) {
            let order = if caps[2].eq_ignore_ascii_case("desc") {
                IndexOrder::Desc
            } else {
                IndexOrder::Asc
            };
            return Ok(IndexColumn::Column {
                name: caps[1].to_string(),
                order: Some(order),
            });
        }
        if let Some(caps) = INDEX_FUNCTION.captures(trimmed) {
            return Ok(IndexColumn::Function {
                function: caps[1].to_ascii_lowercase(),
                column: caps[2].to_string(),
            });
        }
        Err(MigrateError::configuration(format!(
            "index column expression {raw:?} is not allowed; use a column name, \
             `column ASC|DESC`, or lower/upper/trim/date(column)"
        )))
    }

    /// Render a function expression with the column quoted for `engine`.
    pub fn render_expression(&self, engine: Engine) -> String {
        match self {
            IndexColumn::Column { name, .. } => quote_identifier(engine, name),
            IndexColumn::Function { function, column } => {
                format!("{function}({})", quote_identifier(engine, column))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier_doubles_embedded_quotes() {
        assert_eq!(quote_identifier(Engine::Postgres, "we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_identifier(Engine::Mysql, "we`ird"), "`we``ird`");
        assert_eq!(quote_identifier(Engine::Dynamodb, "userId"), "userId");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("user-profiles"), "USER_PROFILES");
        assert_eq!(normalize_key("--a..b__c--"), "A_B_C");
        assert_eq!(normalize_key("token ledger"), "TOKEN_LEDGER");
    }

    #[test]
    fn test_default_index_name() {
        assert_eq!(
            default_index_name("users", &["email".to_string()]),
            "users_email_idx"
        );
        assert_eq!(
            default_index_name(
                "Users",
                &["lower(email)".to_string(), "created_at DESC".to_string()]
            ),
            "users_lower_email_created_at_desc_idx"
        );
    }

    #[test]
    fn test_default_index_name_truncates_with_hash() {
        let columns: Vec<String> = (0..10).map(|i| format!("very_long_column_{i}")).collect();
        let name = default_index_name("a_table_with_a_long_name", &columns);
        assert!(name.len() <= MAX_IDENTIFIER_LEN);
        let other: Vec<String> = (0..10).map(|i| format!("very_long_column_{}", i + 1)).collect();
        assert_ne!(name, default_index_name("a_table_with_a_long_name", &other));
    }

    #[test]
    fn test_verbatim_defaults() {
        assert!(is_verbatim_default("now()"));
        assert!(is_verbatim_default("gen_random_uuid()"));
        assert!(is_verbatim_default("current_timestamp"));
        assert!(!is_verbatim_default("hello"));
        assert!(!is_verbatim_default("it's"));
    }

    #[test]
    fn test_index_column_allowlist() {
        assert_eq!(
            IndexColumn::parse("email").unwrap(),
            IndexColumn::Column { name: "email".into(), order: None }
        );
        assert_eq!(
            IndexColumn::parse("created_at DESC").unwrap(),
            IndexColumn::Column { name: "created_at".into(), order: Some(IndexOrder::Desc) }
        );
        let func = IndexColumn::parse("LOWER(email)").unwrap();
        assert_eq!(func.render_expression(Engine::Postgres), "lower(\"email\")");
        assert!(IndexColumn::parse("email); DROP TABLE users; --").is_err());
        assert!(IndexColumn::parse("md5(email)").is_err());
    }
}
