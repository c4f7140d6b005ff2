use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{CommandResult, EnricherError};

pub const MAX_TEXT_CHARS: usize = 10_000;

/// A single input message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub text: String,
}

impl Message {
    /// Builds a message, enforcing a positive id and 1..=10000 characters of text.
    pub fn new(id: u64, text: impl Into<String>) -> CommandResult<Self> {
        let text = text.into();
        if id == 0 {
            return Err(EnricherError::ZeroMessageId);
        }
        let len = text.chars().count();
        if len == 0 || len > MAX_TEXT_CHARS {
            return Err(EnricherError::MessageTextLength {
                len,
                max: MAX_TEXT_CHARS,
            });
        }
        Ok(Self { id, text })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Phishing,
    Newsletter,
    Internal,
}

impl Category {
    pub const ALL: [Category; 3] = [Self::Phishing, Self::Newsletter, Self::Internal];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phishing => "phishing",
            Self::Newsletter => "newsletter",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EnricherError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| {
                let allowed: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                EnricherError::Validation(format!(
                    "invalid category '{value}', must be one of {allowed:?}"
                ))
            })
    }
}

/// Normalized fields extracted from an LLM answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedResponse {
    pub category: Category,
    pub description: String,
    pub emails: Vec<String>,
}

/// Outcome of enriching one message, as written to the results file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichmentResult {
    pub fn succeeded(id: u64, response: ValidatedResponse) -> Self {
        Self {
            id,
            success: true,
            category: Some(response.category),
            description: Some(response.description),
            emails: Some(response.emails),
            error: None,
        }
    }

    pub fn failed(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            category: None,
            description: None,
            emails: None,
            error: Some(error.into()),
        }
    }
}
