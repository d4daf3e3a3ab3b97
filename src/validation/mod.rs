//! Declarative request validation.
//!
//! A rule set lists each accepted field with its rules. [`validate`] checks
//! every field (no fail-fast across fields), reports all failures keyed by
//! field, and returns only the declared fields.

pub mod rules;

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::database::models::TaxonomyKind;
use crate::database::TaxonomyStore;
use crate::error::{ApiError, FieldErrors};
use crate::storage::UploadedFile;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// Must be present and non-empty.
    Required,
    /// Optional on update; only checked when present.
    Sometimes,
    /// `null` is accepted and skips the remaining rules.
    Nullable,
    String,
    /// Characters for strings, items for arrays.
    Max(usize),
    Min(usize),
    In(&'static [&'static str]),
    Array,
    /// Every element must be the id of an existing term.
    EachExists(TaxonomyKind),
    Image,
    Mimes(&'static [&'static str]),
    MaxKilobytes(u64),
    Email,
    /// `<field>_confirmation` must carry the same value.
    Confirmed,
}

pub type RuleSet = &'static [(&'static str, &'static [Rule])];

/// Request payload before validation: scalar/array fields plus uploaded files.
#[derive(Debug, Default, Clone)]
pub struct RawInput {
    pub fields: Map<String, Value>,
    pub files: HashMap<String, UploadedFile>,
}

impl RawInput {
    pub fn from_json(value: Value) -> Result<Self, ApiError> {
        match value {
            Value::Object(fields) => Ok(Self {
                fields,
                files: HashMap::new(),
            }),
            Value::Null => Ok(Self::default()),
            _ => Err(ApiError::invalid_payload("Request body must be a JSON object")),
        }
    }

    fn get(&self, field: &str) -> Option<Input<'_>> {
        if let Some(file) = self.files.get(field) {
            return Some(Input::File(file));
        }
        self.fields.get(field).map(Input::Value)
    }
}

enum Input<'a> {
    Value(&'a Value),
    File(&'a UploadedFile),
}

impl Input<'_> {
    fn is_null(&self) -> bool {
        matches!(self, Input::Value(Value::Null))
    }

    fn is_empty(&self) -> bool {
        match self {
            Input::Value(Value::Null) => true,
            Input::Value(Value::String(s)) => s.trim().is_empty(),
            Input::Value(Value::Array(a)) => a.is_empty(),
            Input::Value(_) => false,
            Input::File(f) => f.bytes.is_empty(),
        }
    }
}

/// Output of a successful validation: only declared, present fields.
#[derive(Debug, Default, Clone)]
pub struct Validated {
    values: Map<String, Value>,
    files: HashMap<String, UploadedFile>,
}

impl Validated {
    pub fn has(&self, field: &str) -> bool {
        self.values.contains_key(field) || self.files.contains_key(field)
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    pub fn string(&self, field: &str) -> Option<String> {
        self.str(field).map(str::to_string)
    }

    /// Ids of an array field; `None` when the field was not supplied.
    pub fn ids(&self, field: &str) -> Option<Vec<i64>> {
        let items = self.values.get(field)?.as_array()?;
        Some(items.iter().filter_map(as_id).collect())
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        self.files.remove(field)
    }
}

/// Integers and integer strings (multipart sends everything as text).
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// "featured_image" -> "featured image"
fn attribute(field: &str) -> String {
    field.replace('_', " ")
}

/// Fields whose strings are compared verbatim.
const UNTRIMMED: &[&str] = &["password", "password_confirmation"];

/// Trims strings and turns blank ones into `null`, so `{"title": ""}` is
/// checked like a missing value rather than skipped.
fn normalize_strings(fields: &mut Map<String, Value>) {
    for (name, value) in fields.iter_mut() {
        if !UNTRIMMED.contains(&name.as_str()) {
            normalize_value(value);
        }
    }
}

fn normalize_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                *value = Value::Null;
            } else if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_value),
        _ => {}
    }
}

/// Checks `input` against `rules`. `lookup` is only read from.
pub async fn validate<L>(rules: RuleSet, mut input: RawInput, lookup: &L) -> Result<Validated, ApiError>
where
    L: TaxonomyStore + ?Sized,
{
    normalize_strings(&mut input.fields);

    let mut errors = FieldErrors::new();
    let mut validated = Validated::default();

    for (field, field_rules) in rules {
        let mut failures = Vec::new();
        let value = input.get(field);
        check_field(field, field_rules, value.as_ref(), &input, lookup, &mut failures, &mut errors).await?;

        if !failures.is_empty() {
            errors.entry(field.to_string()).or_default().extend(failures);
            continue;
        }

        match value {
            Some(Input::File(file)) => {
                validated.files.insert(field.to_string(), file.clone());
            }
            Some(Input::Value(v)) => {
                validated.values.insert(field.to_string(), v.clone());
            }
            None => {}
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        tracing::debug!(fields = ?errors.keys().collect::<Vec<_>>(), "validation failed");
        Err(ApiError::validation(errors))
    }
}

async fn check_field<L>(
    field: &str,
    rules: &[Rule],
    value: Option<&Input<'_>>,
    input: &RawInput,
    lookup: &L,
    failures: &mut Vec<String>,
    errors: &mut FieldErrors,
) -> Result<(), ApiError>
where
    L: TaxonomyStore + ?Sized,
{
    let name = attribute(field);

    let Some(value) = value else {
        if rules.contains(&Rule::Required) {
            failures.push(format!("The {} field is required.", name));
        }
        return Ok(());
    };

    if rules.contains(&Rule::Nullable) && value.is_null() {
        return Ok(());
    }
    if value.is_empty() {
        if rules.contains(&Rule::Required) {
            failures.push(format!("The {} field is required.", name));
        }
        // Empty non-required values skip the remaining rules
        if !value.is_null() || rules.contains(&Rule::Required) {
            return Ok(());
        }
    }

    for rule in rules {
        match (rule, value) {
            (Rule::Required | Rule::Sometimes | Rule::Nullable, _) => {}

            (Rule::String, Input::Value(Value::String(_))) => {}
            (Rule::String, _) => failures.push(format!("The {} field must be a string.", name)),

            (Rule::Max(n), Input::Value(Value::String(s))) if s.chars().count() > *n => {
                failures.push(format!("The {} field must not be greater than {} characters.", name, n))
            }
            (Rule::Max(n), Input::Value(Value::Array(a))) if a.len() > *n => {
                failures.push(format!("The {} field must not have more than {} items.", name, n))
            }
            (Rule::Max(_), _) => {}

            (Rule::Min(n), Input::Value(Value::String(s))) if s.chars().count() < *n => {
                failures.push(format!("The {} field must be at least {} characters.", name, n))
            }
            (Rule::Min(_), _) => {}

            (Rule::In(allowed), Input::Value(Value::String(s))) if allowed.contains(&s.as_str()) => {}
            (Rule::In(_), _) => failures.push(format!("The selected {} is invalid.", name)),

            (Rule::Array, Input::Value(Value::Array(_))) => {}
            (Rule::Array, _) => failures.push(format!("The {} field must be an array.", name)),

            (Rule::EachExists(kind), Input::Value(Value::Array(items))) => {
                let ids: Vec<i64> = items.iter().filter_map(as_id).collect();
                let found = lookup.existing_term_ids(*kind, &ids).await?;
                for (index, item) in items.iter().enumerate() {
                    let exists = as_id(item).map(|id| found.contains(&id)).unwrap_or(false);
                    if !exists {
                        let key = format!("{}.{}", field, index);
                        let reason = format!("The selected {} is invalid.", key);
                        errors.entry(key).or_default().push(reason);
                    }
                }
            }
            (Rule::EachExists(_), _) => {}

            (Rule::Image, Input::File(file)) if file.is_image() => {}
            (Rule::Image, _) => failures.push(format!("The {} field must be an image.", name)),

            (Rule::Mimes(allowed), Input::File(file))
                if file.guess_extension().map(|ext| allowed.contains(&ext)).unwrap_or(false) => {}
            (Rule::Mimes(allowed), _) => failures.push(format!(
                "The {} field must be a file of type: {}.",
                name,
                allowed.join(", ")
            )),

            (Rule::MaxKilobytes(n), Input::File(file)) if file.size_kilobytes() > *n as f64 => {
                failures.push(format!("The {} field must not be greater than {} kilobytes.", name, n))
            }
            (Rule::MaxKilobytes(_), _) => {}

            (Rule::Email, Input::Value(Value::String(s))) if is_email(s) => {}
            (Rule::Email, _) => failures.push(format!("The {} field must be a valid email address.", name)),

            (Rule::Confirmed, Input::Value(v)) => {
                let confirmation = input.fields.get(&format!("{}_confirmation", field));
                if confirmation != Some(*v) {
                    failures.push(format!("The {} field confirmation does not match.", name));
                }
            }
            (Rule::Confirmed, Input::File(_)) => {
                failures.push(format!("The {} field confirmation does not match.", name))
            }
        }
    }

    Ok(())
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain.split('.').all(|part| !part.is_empty())
}
