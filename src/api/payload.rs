//! Request body extraction: JSON, urlencoded forms and multipart uploads all
//! become a [`RawInput`] for the validation stage.

use axum::{
    async_trait,
    body::Bytes,
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::storage::UploadedFile;
use crate::validation::RawInput;

/// Extractor for create/update payloads.
#[derive(Debug, Default)]
pub struct Payload(pub RawInput);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for Payload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::invalid_payload(e.body_text()))?;
            return read_multipart(multipart).await.map(Payload);
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::payload_too_large("Request body too large")
            } else {
                ApiError::invalid_payload(e.body_text())
            }
        })?;

        if content_type.starts_with("application/x-www-form-urlencoded") {
            return read_form(&bytes).map(Payload);
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload(RawInput::default()));
        }
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::invalid_payload(format!("Malformed JSON body: {}", e)))?;
        RawInput::from_json(value).map(Payload)
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body too large")
    } else {
        ApiError::invalid_payload(err.body_text())
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<RawInput, ApiError> {
    let mut input = RawInput::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        match filename {
            // Browsers send an empty part when no file was chosen
            Some(filename) if filename.is_empty() && bytes.is_empty() => {}
            Some(filename) => {
                input.files.insert(
                    name.clone(),
                    UploadedFile {
                        field: name,
                        filename: Some(filename),
                        content_type,
                        bytes,
                    },
                );
            }
            None => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| ApiError::invalid_payload(format!("Field {} is not valid UTF-8", name)))?;
                insert_form_value(&mut input.fields, &name, text);
            }
        }
    }

    Ok(input)
}

fn read_form(bytes: &[u8]) -> Result<RawInput, ApiError> {
    let mut input = RawInput::default();
    for (name, value) in url::form_urlencoded::parse(bytes) {
        insert_form_value(&mut input.fields, &name, value.into_owned());
    }
    Ok(input)
}

/// `tags[]=1&tags[]=2` (or `tags[0]=1`) collects into an array, anything else
/// is a plain string field.
fn insert_form_value(fields: &mut Map<String, Value>, name: &str, value: String) {
    let array_key = name.strip_suffix(']').and_then(|rest| {
        let (key, index) = rest.split_once('[')?;
        index.chars().all(|c| c.is_ascii_digit()).then_some(key)
    });

    match array_key {
        Some(key) => {
            let entry = fields.entry(key.to_string()).or_insert_with(|| Value::Array(vec![]));
            match entry {
                Value::Array(items) => items.push(Value::String(value)),
                other => *other = Value::Array(vec![Value::String(value)]),
            }
        }
        None => {
            fields.insert(name.to_string(), Value::String(value));
        }
    }
}
