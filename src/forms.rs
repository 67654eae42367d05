//! Menu form binding and validation.
//!
//! Validation is a pure function of the submitted fields, the set of item ids
//! that exist and the current date, so it can be exercised without a request.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Menu;

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const INVALID_DATE: &str = "Enter a valid date.";
pub(crate) const SEASON_PUNCTUATION: &str =
    "Season must not contain punctuation other than apostrophes.";
pub(crate) const HONEYPOT_FILLED: &str = "Hidden field must be left empty.";

/// Days added to today when no expiration date is submitted.
pub(crate) const DEFAULT_EXPIRATION_DAYS: i64 = 730;

// Two-digit years are tried before four-digit ones; `%Y` would read "27" as year 27.
const DATE_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];
const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";

/// Raw, unvalidated menu form fields as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MenuFormData {
    pub season: String,
    pub items: Vec<String>,
    pub expiration_date: String,
    #[serde(skip_serializing)]
    pub hidden_field: String,
}

impl MenuFormData {
    /// Binds urlencoded pairs. `items` may repeat, unknown keys are ignored.
    pub(crate) fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = MenuFormData::default();
        for (key, value) in pairs {
            match key.as_str() {
                "season" => form.season = value,
                "items" => form.items.push(value),
                "expiration_date" => form.expiration_date = value,
                "hidden_field" => form.hidden_field = value,
                _ => {}
            }
        }
        form
    }

    /// Unbound form for a new menu, showing the default expiration.
    pub(crate) fn initial(today: NaiveDate) -> Self {
        MenuFormData {
            expiration_date: default_expiration(today).format(DATE_OUTPUT_FORMAT).to_string(),
            ..MenuFormData::default()
        }
    }

    /// Form pre-filled from an existing menu.
    pub(crate) fn from_menu(menu: &Menu) -> Self {
        MenuFormData {
            season: menu.season.clone(),
            items: menu.item_ids().iter().map(ToString::to_string).collect(),
            expiration_date: menu
                .expiration_date
                .map(|date| date.format(DATE_OUTPUT_FORMAT).to_string())
                .unwrap_or_default(),
            hidden_field: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldError {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedMenu {
    pub season: String,
    pub item_ids: Vec<i32>,
    pub expiration_date: NaiveDate,
}

pub(crate) fn default_expiration(today: NaiveDate) -> NaiveDate {
    today + Duration::days(DEFAULT_EXPIRATION_DAYS)
}

/// Validates a submitted menu form. Errors come back in field order.
pub(crate) fn validate(
    raw: &MenuFormData,
    known_items: &BTreeSet<i32>,
    today: NaiveDate,
) -> Result<ValidatedMenu, Vec<FieldError>> {
    let mut errors = Vec::new();

    let season = clean_season(&raw.season).map_err(|e| errors.push(e)).ok();
    let item_ids = clean_items(&raw.items, known_items)
        .map_err(|e| errors.push(e))
        .ok();
    let expiration_date = clean_expiration_date(&raw.expiration_date, today)
        .map_err(|e| errors.push(e))
        .ok();
    if let Err(e) = clean_hidden_field(&raw.hidden_field) {
        errors.push(e);
    }

    match (season, item_ids, expiration_date) {
        (Some(season), Some(item_ids), Some(expiration_date)) if errors.is_empty() => {
            Ok(ValidatedMenu {
                season,
                item_ids,
                expiration_date,
            })
        }
        _ => Err(errors),
    }
}

fn clean_season(value: &str) -> Result<String, FieldError> {
    let season = value.trim();
    if season.is_empty() {
        return Err(FieldError::new("season", REQUIRED));
    }
    if season.chars().any(|c| c.is_ascii_punctuation() && c != '\'') {
        return Err(FieldError::new("season", SEASON_PUNCTUATION));
    }
    Ok(season.to_string())
}

fn clean_items(values: &[String], known_items: &BTreeSet<i32>) -> Result<Vec<i32>, FieldError> {
    let values: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(FieldError::new("items", REQUIRED));
    }

    let mut ids = Vec::with_capacity(values.len());
    for value in values {
        let id: i32 = value
            .parse()
            .map_err(|_| FieldError::new("items", format!("“{}” is not a valid value.", value)))?;
        if !known_items.contains(&id) {
            return Err(FieldError::new(
                "items",
                format!("Select a valid choice. {} is not one of the available choices.", id),
            ));
        }
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn clean_expiration_date(value: &str, today: NaiveDate) -> Result<NaiveDate, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(default_expiration(today));
    }
    parse_date(value).ok_or_else(|| FieldError::new("expiration_date", INVALID_DATE))
}

fn clean_hidden_field(value: &str) -> Result<(), FieldError> {
    if value.is_empty() {
        Ok(())
    } else {
        Err(FieldError::new("hidden_field", HONEYPOT_FILLED))
    }
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}
