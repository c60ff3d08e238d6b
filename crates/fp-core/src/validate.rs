//! Per-field value validation.
//!
//! Validation is a presentation concern: issues mark a field invalid so the
//! rendering layer can block save and show messages, but they never stop
//! the binder from writing what the user typed. Every rule carries an
//! optional author message overriding its default.
//!
//! Apart from `Required`, rules skip empty values — absence is `Required`'s
//! business, a pattern has nothing to say about a field nobody filled in.

use crate::condition::is_empty_value;
use crate::key::PropKey;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

// ─── Rules ───────────────────────────────────────────────────────────────

/// Email/URL presets for the `format` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueFormat {
    Email,
    Url,
}

pub type CustomCheckFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// Author-supplied check; the name shows up in diagnostics.
#[derive(Clone)]
pub struct CustomRule {
    pub name: String,
    pub check: Arc<CustomCheckFn>,
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomRule({})", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum RuleKind {
    Required,
    Min(f64),
    Max(f64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
    Format(ValueFormat),
    /// Checked against the caller-supplied taken-value set; passes when no
    /// set is provided.
    Unique,
    Custom(CustomRule),
}

#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub kind: RuleKind,
    pub message: Option<String>,
}

impl ValidationRule {
    pub fn required() -> Self {
        Self::of(RuleKind::Required)
    }

    pub fn min(min: f64) -> Self {
        Self::of(RuleKind::Min(min))
    }

    pub fn max(max: f64) -> Self {
        Self::of(RuleKind::Max(max))
    }

    pub fn min_length(len: usize) -> Self {
        Self::of(RuleKind::MinLength(len))
    }

    pub fn max_length(len: usize) -> Self {
        Self::of(RuleKind::MaxLength(len))
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::of(RuleKind::Pattern(pattern.into()))
    }

    pub fn format(format: ValueFormat) -> Self {
        Self::of(RuleKind::Format(format))
    }

    pub fn unique() -> Self {
        Self::of(RuleKind::Unique)
    }

    pub fn custom(
        name: impl Into<String>,
        check: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self::of(RuleKind::Custom(CustomRule {
            name: name.into(),
            check: Arc::new(check),
        }))
    }

    fn of(kind: RuleKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Override the default human-readable message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ─── Checking ────────────────────────────────────────────────────────────

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub key: PropKey,
    pub message: String,
    pub rule: &'static str,
}

/// Cross-field inputs some rules need. `Unique` compares the value's
/// display form against `taken`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationCtx<'a> {
    pub taken: Option<&'a HashSet<String>>,
}

/// Run every rule for one field against its current value.
pub fn validate_value(
    key: PropKey,
    rules: &[ValidationRule],
    value: Option<&Value>,
    ctx: &ValidationCtx<'_>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for rule in rules {
        if let Some((message, name)) = check_rule(rule, value, ctx) {
            issues.push(ValidationIssue {
                key,
                message: rule.message.clone().unwrap_or(message),
                rule: name,
            });
        }
    }
    issues
}

/// `Some((default message, rule name))` when the rule fails.
fn check_rule(
    rule: &ValidationRule,
    value: Option<&Value>,
    ctx: &ValidationCtx<'_>,
) -> Option<(String, &'static str)> {
    if let RuleKind::Required = rule.kind {
        return is_empty_value(value).then(|| ("This field is required".to_string(), "required"));
    }
    if is_empty_value(value) {
        return None;
    }
    let value = value?;

    match &rule.kind {
        RuleKind::Required => unreachable!("handled above"),
        RuleKind::Min(min) => {
            let n = value.as_f64()?;
            (n < *min).then(|| (format!("Must be at least {min}"), "min"))
        }
        RuleKind::Max(max) => {
            let n = value.as_f64()?;
            (n > *max).then(|| (format!("Must be at most {max}"), "max"))
        }
        RuleKind::MinLength(len) => {
            let actual = length_of(value)?;
            (actual < *len).then(|| (format!("Must have at least {len} characters"), "min-length"))
        }
        RuleKind::MaxLength(len) => {
            let actual = length_of(value)?;
            (actual > *len).then(|| (format!("Must have at most {len} characters"), "max-length"))
        }
        RuleKind::Pattern(pattern) => {
            let s = value.as_str()?;
            match regex::Regex::new(pattern) {
                Ok(re) => (!re.is_match(s)).then(|| ("Invalid format".to_string(), "pattern")),
                Err(err) => {
                    log::warn!("invalid validation pattern '{pattern}': {err}");
                    None
                }
            }
        }
        RuleKind::Format(format) => {
            let s = value.as_str()?;
            let ok = match format {
                ValueFormat::Email => s.split_once('@').is_some_and(|(local, domain)| {
                    !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                }),
                ValueFormat::Url => s.starts_with("http://") || s.starts_with("https://"),
            };
            (!ok).then(|| {
                let what = match format {
                    ValueFormat::Email => "email address",
                    ValueFormat::Url => "URL",
                };
                (format!("Must be a valid {what}"), "format")
            })
        }
        RuleKind::Unique => {
            let taken = ctx.taken?;
            let display = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            taken
                .contains(&display)
                .then(|| ("Must be unique".to_string(), "unique"))
        }
        RuleKind::Custom(custom) => match (custom.check)(value) {
            Ok(()) => None,
            Err(message) => Some((message, "custom")),
        },
    }
}

/// Character count for strings, element count for arrays.
fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}
