//! Multipart file uploads.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};

use crate::client::error::{ApiError, ErrorCode};

/// Size of the chunks the file body is streamed in.
const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes sent so far out of the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// A single file plus a flat map of extra form fields.
///
/// Cheap to clone; the form is rebuilt for every attempt so retries send
/// the exact same content.
#[derive(Clone)]
pub struct Upload {
    field_name: String,
    file_name: String,
    mime: Option<String>,
    content: Arc<Vec<u8>>,
    fields: Map<String, Value>,
    progress: Option<ProgressCallback>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            field_name: "file".to_string(),
            file_name: file_name.into(),
            mime: None,
            content: Arc::new(content),
            fields: Map::new(),
            progress: None,
        }
    }

    /// Form field the file is sent under (default `file`).
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Build the multipart form for one attempt.
    pub(crate) fn to_form(&self) -> Result<Form, ApiError> {
        let total = self.len();
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = self
            .content
            .chunks(CHUNK_SIZE)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();

        let progress = self.progress.clone();
        let mut loaded = 0u64;
        let stream = futures_util::stream::iter(chunks).inspect(move |chunk| {
            if let (Ok(chunk), Some(callback)) = (chunk, &progress) {
                loaded += chunk.len() as u64;
                callback(UploadProgress { loaded, total });
            }
        });

        let mut part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(self.file_name.clone());
        if let Some(mime) = &self.mime {
            part = part.mime_str(mime).map_err(|e| {
                ApiError::new(ErrorCode::Unknown, format!("Invalid upload content type '{}'", mime))
                    .with_source(e)
            })?;
        }

        let mut form = Form::new().part(self.field_name.clone(), part);
        for (name, value) in &self.fields {
            form = form.text(name.clone(), form_field_value(value));
        }
        Ok(form)
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.content.len())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Strings are sent as-is, objects and arrays as JSON, other scalars as
/// their JSON text (`true`, `42`, `null`).
pub fn form_field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_field_values() {
        assert_eq!(form_field_value(&json!("Summer sale")), "Summer sale");
        assert_eq!(form_field_value(&json!(12)), "12");
        assert_eq!(form_field_value(&json!(true)), "true");
        assert_eq!(form_field_value(&json!({"w": 800, "h": 600})), r#"{"h":600,"w":800}"#);
        assert_eq!(form_field_value(&json!(["a", "b"])), r#"["a","b"]"#);
    }

    #[test]
    fn test_builder() {
        let upload = Upload::new("banner.png", vec![0u8; 10])
            .field_name("image")
            .mime("image/png")
            .field("product_id", 7);
        assert_eq!(upload.len(), 10);
        assert!(upload.to_form().is_ok());

        let bad = Upload::new("x.bin", vec![1]).mime("not a mime");
        assert!(bad.to_form().is_err());
    }
}
