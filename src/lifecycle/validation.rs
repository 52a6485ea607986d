//! Field validation for drafts, submissions and published edits.

use serde_json::{Map, Value};

use super::field_filter::is_cleared;
use crate::errors::AppError;
use crate::models::{ProjectFields, FIELD_NAMES};

/// Fields a project needs before it can be submitted or stay published.
pub const REQUIRED_FOR_SUBMISSION: &[&str] = &[
    "title",
    "goal",
    "summary",
    "description",
    "category",
    "talentsNeeded",
];

/// Apply filtered updates on top of `current`, checking field names and types.
pub fn apply_updates(
    current: &ProjectFields,
    updates: &Map<String, Value>,
) -> Result<ProjectFields, AppError> {
    let unknown: Vec<&str> = updates
        .keys()
        .map(String::as_str)
        .filter(|key| !FIELD_NAMES.contains(key))
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::Validation(format!(
            "Unknown fields: {}",
            unknown.join(", ")
        )));
    }

    let mut merged = match serde_json::to_value(current)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in updates {
        if is_cleared(key, value) {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }

    serde_json::from_value(Value::Object(merged))
        .map_err(|e| AppError::Validation(format!("Invalid field value: {}", e)))
}

/// Checks that hold at every stage: lengths and non-blank values.
pub fn validate_field_shapes(
    fields: &ProjectFields,
    max_title_length: usize,
) -> Result<(), AppError> {
    if let Some(title) = &fields.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be blank".to_string()));
        }
        if title.chars().count() > max_title_length {
            return Err(AppError::Validation(format!(
                "Title must be at most {} characters",
                max_title_length
            )));
        }
    }

    let lists = [
        ("tags", &fields.tags),
        ("talentsNeeded", &fields.talents_needed),
        ("objectives", &fields.objectives),
    ];
    for (name, items) in lists {
        if items.iter().any(|item| item.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "Entries of {} must not be blank",
                name
            )));
        }
    }

    if fields.sub_category.is_some() && fields.category.is_none() {
        return Err(AppError::Validation(
            "A sub-category requires a category".to_string(),
        ));
    }

    Ok(())
}

/// Names of required fields that are not populated.
pub fn missing_required(fields: &ProjectFields) -> Vec<&'static str> {
    let blank = |value: &Option<String>| value.as_deref().map_or(true, |v| v.trim().is_empty());
    REQUIRED_FOR_SUBMISSION
        .iter()
        .copied()
        .filter(|name| match *name {
            "title" => blank(&fields.title),
            "goal" => blank(&fields.goal),
            "summary" => blank(&fields.summary),
            "description" => blank(&fields.description),
            "category" => blank(&fields.category),
            "talentsNeeded" => fields.talents_needed.is_empty(),
            _ => false,
        })
        .collect()
}

/// The stricter check applied at submission and to published projects.
pub fn validate_submission_ready(fields: &ProjectFields) -> Result<(), AppError> {
    let missing = missing_required(fields);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}
