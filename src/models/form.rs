use serde_json::Value;

use super::record::Record;

#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

/// A multipart body. The transport owns the boundary and the
/// `Content-Type` header for it.
#[derive(Debug, Clone, Default)]
pub struct FormPayload {
    pub fields: Vec<FormField>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push(FormField {
            name: name.to_string(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        self.fields.push(FormField {
            name: name.to_string(),
            value: FormValue::File {
                file_name: file_name.to_string(),
                content_type: content_type.to_string(),
                bytes,
            },
        });
        self
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        for field in &self.fields {
            let value = match &field.value {
                FormValue::Text(text) => Value::String(text.clone()),
                FormValue::File { file_name, .. } => Value::String(file_name.clone()),
            };
            record.set(&field.name, value);
        }
        record
    }

    /// Stable description used for request keys. File contents are
    /// reduced to name and size.
    pub fn signature(&self) -> String {
        self.fields
            .iter()
            .map(|f| match &f.value {
                FormValue::Text(text) => format!("{}={}", f.name, text),
                FormValue::File { file_name, bytes, .. } => {
                    format!("{}=@{}:{}", f.name, file_name, bytes.len())
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}
