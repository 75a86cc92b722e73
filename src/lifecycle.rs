//! Version-gated lifecycle of schema elements.
//!
//! Every table, column, index and secondary index may carry a `since` and a
//! `removed_in` marker. Against the current table version an element is
//! exactly one of *future*, *active* or *remove-now*:
//!
//! | condition | phase |
//! |---|---|
//! | `since` set and `version < since` | future |
//! | `removed_in` set and `version >= removed_in` | remove-now |
//! | otherwise | active |
//!
//! Remove-now elements are only ever reported, never dropped.

use crate::engine::Engine;
use crate::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A lifecycle marker exactly as it appears in the schema document.
///
/// Documents written by hand or generated from environment files carry both
/// numbers and numeric strings, so both are accepted and parsed fallibly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawVersion {
    Number(f64),
    Text(String),
}

impl From<f64> for RawVersion {
    fn from(value: f64) -> Self {
        RawVersion::Number(value)
    }
}

impl From<&str> for RawVersion {
    fn from(value: &str) -> Self {
        RawVersion::Text(value.to_string())
    }
}

impl fmt::Display for RawVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawVersion::Number(n) => write!(f, "{n}"),
            RawVersion::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Borrowed view of an element's `since` / `removed_in` pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct Markers<'a> {
    pub since: Option<&'a RawVersion>,
    pub removed_in: Option<&'a RawVersion>,
}

impl<'a> Markers<'a> {
    pub fn new(since: Option<&'a RawVersion>, removed_in: Option<&'a RawVersion>) -> Self {
        Self { since, removed_in }
    }
}

/// Anything in a schema document that carries lifecycle markers.
pub trait HasLifecycle {
    fn markers(&self) -> Markers<'_>;

    /// Name used in configuration error messages.
    fn lifecycle_label(&self) -> String;
}

/// Where a classification happens; only used to build error messages.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleContext<'a> {
    pub engine: Option<Engine>,
    pub table: Option<&'a str>,
    pub element: &'a str,
    pub version: f64,
}

impl<'a> LifecycleContext<'a> {
    pub fn new(engine: Engine, table: &'a str, element: &'a str, version: f64) -> Self {
        Self {
            engine: Some(engine),
            table: Some(table),
            element,
            version,
        }
    }

    fn describe(&self) -> String {
        match (self.engine, self.table) {
            (Some(engine), Some(table)) if table != self.element => {
                format!("{engine} {table}.{}", self.element)
            }
            (Some(engine), _) => format!("{engine} {}", self.element),
            (None, _) => self.element.to_string(),
        }
    }
}

/// Which of the three mutually exclusive states an element is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Future,
    Active,
    RemoveNow,
}

/// Result of classifying one element against a table version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub since: Option<f64>,
    pub removed: Option<f64>,
    pub future: bool,
    pub remove_now: bool,
    pub active: bool,
}

impl Classification {
    pub fn phase(&self) -> Phase {
        if self.future {
            Phase::Future
        } else if self.remove_now {
            Phase::RemoveNow
        } else {
            Phase::Active
        }
    }

    /// Reason recorded on plan entries: `since=2.0` for future elements,
    /// `removed_in=3.0` for remove-now elements.
    pub fn reason(&self) -> Option<String> {
        match self.phase() {
            Phase::Future => self.since.map(|v| format!("since={}", format_version(v))),
            Phase::RemoveNow => self
                .removed
                .map(|v| format!("removed_in={}", format_version(v))),
            Phase::Active => None,
        }
    }
}

/// Render a version with at least one decimal (`3` → `3.0`, `2.5` → `2.5`).
pub fn format_version(version: f64) -> String {
    if version.is_finite() && version.fract() == 0.0 && version.abs() < 1e15 {
        format!("{version:.1}")
    } else {
        format!("{version}")
    }
}

/// Parse a single marker. Absent and empty markers are `None`; anything that
/// is not a finite, non-negative number is a configuration error.
pub fn parse_marker(
    raw: Option<&RawVersion>,
    field: &str,
    ctx: &LifecycleContext<'_>,
) -> Result<Option<f64>> {
    let value = match raw {
        None => return Ok(None),
        Some(RawVersion::Number(n)) => *n,
        Some(RawVersion::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<f64>().map_err(|_| {
                MigrateError::configuration(format!(
                    "{}: {field} value {text:?} is not a number",
                    ctx.describe()
                ))
            })?
        }
    };

    if !value.is_finite() {
        return Err(MigrateError::configuration(format!(
            "{}: {field} must be finite, got {value}",
            ctx.describe()
        )));
    }
    if value < 0.0 {
        return Err(MigrateError::configuration(format!(
            "{}: {field} must not be negative, got {value}",
            ctx.describe()
        )));
    }
    Ok(Some(value))
}

/// Classify an element's markers against `ctx.version`.
pub fn classify(markers: Markers<'_>, ctx: &LifecycleContext<'_>) -> Result<Classification> {
    let since = parse_marker(markers.since, "since", ctx)?;
    let removed = parse_marker(markers.removed_in, "removed_in", ctx)?;

    if let (Some(s), Some(r)) = (since, removed) {
        if r <= s {
            return Err(MigrateError::configuration(format!(
                "{}: removed_in ({}) must be greater than since ({})",
                ctx.describe(),
                format_version(r),
                format_version(s)
            )));
        }
    }

    let future = since.is_some_and(|s| ctx.version < s);
    let remove_now = removed.is_some_and(|r| ctx.version >= r);

    Ok(Classification {
        since,
        removed,
        future,
        remove_now,
        active: !future && !remove_now,
    })
}

/// Items bucketed by phase, input order preserved within each bucket.
#[derive(Debug)]
pub struct Partitioned<'a, T> {
    pub active: Vec<&'a T>,
    pub future: Vec<&'a T>,
    pub removed: Vec<&'a T>,
}

impl<'a, T> Default for Partitioned<'a, T> {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            future: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Bucket `items` into active / future / removed for `version`.
pub fn partition<'a, T, I>(items: I, version: f64) -> Result<Partitioned<'a, T>>
where
    T: HasLifecycle + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut buckets = Partitioned::default();
    for item in items {
        let label = item.lifecycle_label();
        let ctx = LifecycleContext {
            engine: None,
            table: None,
            element: &label,
            version,
        };
        match classify(item.markers(), &ctx)?.phase() {
            Phase::Active => buckets.active.push(item),
            Phase::Future => buckets.future.push(item),
            Phase::RemoveNow => buckets.removed.push(item),
        }
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(version: f64) -> LifecycleContext<'static> {
        LifecycleContext::new(Engine::Postgres, "users", "email", version)
    }

    fn classify_at(
        since: Option<RawVersion>,
        removed: Option<RawVersion>,
        version: f64,
    ) -> Result<Classification> {
        classify(Markers::new(since.as_ref(), removed.as_ref()), &ctx(version))
    }

    #[test]
    fn test_no_markers_is_active() {
        let c = classify_at(None, None, 1.0).unwrap();
        assert!(c.active);
        assert_eq!(c.phase(), Phase::Active);
        assert_eq!(c.reason(), None);
    }

    #[test]
    fn test_since_in_future() {
        let c = classify_at(Some(2.0.into()), None, 1.0).unwrap();
        assert!(c.future);
        assert!(!c.active);
        assert_eq!(c.reason().as_deref(), Some("since=2.0"));
    }

    #[test]
    fn test_removed_in_reached() {
        let c = classify_at(None, Some(3.0.into()), 3.0).unwrap();
        assert!(c.remove_now);
        assert!(!c.active);
        assert_eq!(c.reason().as_deref(), Some("removed_in=3.0"));
    }

    #[test]
    fn test_window_boundaries() {
        // active <=> since <= v < removed
        for (v, expected) in [(0.9, false), (1.0, true), (1.5, true), (2.0, false), (2.1, false)] {
            let c = classify_at(Some(1.0.into()), Some(2.0.into()), v).unwrap();
            assert_eq!(c.active, expected, "version {v}");
            let exactly_one = [c.future, c.active, c.remove_now].iter().filter(|b| **b).count();
            assert_eq!(exactly_one, 1);
        }
    }

    #[test]
    fn test_string_markers_are_parsed() {
        let c = classify_at(Some(" 1.5 ".into()), Some("".into()), 1.5).unwrap();
        assert!(c.active);
        assert_eq!(c.since, Some(1.5));
        assert_eq!(c.removed, None);
    }

    #[test]
    fn test_invalid_markers_are_configuration_errors() {
        let bad = [
            (Some(RawVersion::from("abc")), None),
            (Some(RawVersion::from("NaN")), None),
            (None, Some(RawVersion::from("inf"))),
            (Some(RawVersion::Number(-1.0)), None),
            (Some(RawVersion::Number(2.0)), Some(RawVersion::Number(2.0))),
            (Some(RawVersion::Number(3.0)), Some(RawVersion::Number(2.0))),
        ];
        for (since, removed) in bad {
            let err = classify_at(since.clone(), removed.clone(), 1.0).unwrap_err();
            assert!(
                matches!(err, MigrateError::Configuration(_)),
                "{since:?}/{removed:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_classify_is_idempotent() {
        let since = RawVersion::from(1.0);
        let removed = RawVersion::from(4.0);
        let first = classify(Markers::new(Some(&since), Some(&removed)), &ctx(2.0)).unwrap();
        let second = classify(Markers::new(Some(&since), Some(&removed)), &ctx(2.0)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(3.0), "3.0");
        assert_eq!(format_version(2.5), "2.5");
        assert_eq!(format_version(10.0), "10.0");
    }

    struct Item {
        name: &'static str,
        since: Option<RawVersion>,
        removed_in: Option<RawVersion>,
    }

    impl HasLifecycle for Item {
        fn markers(&self) -> Markers<'_> {
            Markers::new(self.since.as_ref(), self.removed_in.as_ref())
        }

        fn lifecycle_label(&self) -> String {
            self.name.to_string()
        }
    }

    fn item(name: &'static str, since: Option<f64>, removed_in: Option<f64>) -> Item {
        Item {
            name,
            since: since.map(RawVersion::from),
            removed_in: removed_in.map(RawVersion::from),
        }
    }

    #[test]
    fn test_partition_preserves_order() {
        let items = vec![
            item("a", None, None),
            item("b", Some(5.0), None),
            item("c", None, Some(2.0)),
            item("d", Some(1.0), None),
            item("e", Some(9.0), None),
        ];
        let parts = partition(&items, 2.0).unwrap();
        let names = |v: &Vec<&Item>| v.iter().map(|i| i.name).collect::<Vec<_>>();
        assert_eq!(names(&parts.active), vec!["a", "d"]);
        assert_eq!(names(&parts.future), vec!["b", "e"]);
        assert_eq!(names(&parts.removed), vec!["c"]);
    }
}
