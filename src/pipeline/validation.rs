use std::collections::BTreeSet;

use regex::Regex;
use serde_json::Value;

use crate::error::{CommandResult, EnricherError};
use crate::pipeline::models::{Category, ValidatedResponse};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
pub const DESCRIPTION_WORD_LIMIT: usize = 25;

/// Normalizes the JSON object returned by the model.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    description_word_limit: usize,
    email: Regex,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new(DESCRIPTION_WORD_LIMIT)
    }
}

impl ResponseValidator {
    /// A limit of zero disables description truncation.
    pub fn new(description_word_limit: usize) -> Self {
        Self {
            description_word_limit,
            email: Regex::new(EMAIL_PATTERN).expect("email pattern compiles"),
        }
    }

    pub fn validate(&self, response: &Value) -> CommandResult<ValidatedResponse> {
        Ok(ValidatedResponse {
            category: category(response)?,
            description: self.description(response),
            emails: self.emails(response),
        })
    }

    fn description(&self, response: &Value) -> String {
        let text = match response.get("description") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => return String::new(),
            Some(Value::String(text)) => text.trim().to_owned(),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => return String::new(),
            Some(Value::Array(items)) if items.is_empty() => return String::new(),
            Some(Value::Object(fields)) if fields.is_empty() => return String::new(),
            Some(other) => other.to_string(),
        };

        let words: Vec<&str> = text.split_whitespace().collect();
        if self.description_word_limit > 0 && words.len() > self.description_word_limit {
            words[..self.description_word_limit].join(" ")
        } else {
            text
        }
    }

    /// Lowercased, valid, unique and sorted.
    fn emails(&self, response: &Value) -> Vec<String> {
        let Some(Value::Array(items)) = response.get("emails") else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(Value::as_str)
            .map(|item| item.trim().to_lowercase())
            .filter(|email| self.is_valid_email(email))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_valid_email(&self, email: &str) -> bool {
        self.email.is_match(email) && !email.contains("@@") && !email.contains("..")
    }
}

fn category(response: &Value) -> CommandResult<Category> {
    match response.get("category") {
        Some(Value::String(raw)) => raw.trim().to_lowercase().parse(),
        None => "".parse(),
        Some(other) => Err(EnricherError::Validation(format!(
            "category must be a string, got {other}"
        ))),
    }
}
