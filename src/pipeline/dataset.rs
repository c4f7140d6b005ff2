use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{CommandResult, EnricherError};
use crate::pipeline::models::Message;

/// Reads the input dataset from disk.
pub async fn load(path: &Path) -> CommandResult<Vec<Message>> {
    tracing::info!(path = %path.display(), "loading dataset");

    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(EnricherError::DatasetNotFound(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };

    let messages = parse(&serde_json::from_str(&raw)?)?;
    tracing::info!(count = messages.len(), "loaded messages from dataset");
    Ok(messages)
}

/// Accepts an array of objects or strings, an object with a `messages` array,
/// or a single message object. Ids default to the 1-based position.
pub fn parse(data: &Value) -> CommandResult<Vec<Message>> {
    match data {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Value::Object(fields) => Some(from_object(index, fields)),
                Value::String(text) => Some(build(index, None, text)),
                _ => None,
            })
            .collect(),
        Value::Object(fields) => match fields.get("messages") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(fields) => from_object(index, fields),
                    _ => Err(invalid(index, "expected a message object")),
                })
                .collect(),
            Some(_) => Err(invalid(0, "`messages` must be an array")),
            None => from_object(0, fields).map(|message| vec![message]),
        },
        _ => Ok(Vec::new()),
    }
}

fn from_object(index: usize, fields: &Map<String, Value>) -> CommandResult<Message> {
    let id = match fields.get("id") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_u64()
                .ok_or_else(|| invalid(index, "id must be a positive integer"))?,
        ),
    };

    let text = fields
        .get("text")
        .or_else(|| fields.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    build(index, id, text)
}

fn build(index: usize, id: Option<u64>, text: &str) -> CommandResult<Message> {
    let id = id.unwrap_or(index as u64 + 1);
    Message::new(id, text).map_err(|err| invalid(index, &err.to_string()))
}

fn invalid(index: usize, reason: &str) -> EnricherError {
    EnricherError::InvalidMessage {
        position: index + 1,
        reason: reason.to_owned(),
    }
}
