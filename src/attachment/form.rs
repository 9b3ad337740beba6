use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use axum::extract::multipart::Field;
use bytes::{Bytes, BytesMut};
use log::debug;

use super::Limits;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A file received in a multipart request, fully validated and buffered.
#[derive(Clone, Debug)]
pub struct Upload {
    file_name: String,
    mime_type: String,
    bytes: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Text fields and uploads of a multipart request.
#[derive(Default, Debug)]
pub struct Form {
    fields: HashMap<String, Vec<String>>,
    uploads: Vec<Upload>,
}

impl Form {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a repeated field, `name` and `name[]` alike.
    pub fn texts(&self, name: &str) -> Vec<String> {
        let mut values = self.fields.get(name).cloned().unwrap_or_default();
        if let Some(more) = self.fields.get(&format!("{name}[]")) {
            values.extend(more.iter().cloned());
        }
        values
    }

    /// Parses an optional field, treating an empty value as absent.
    pub fn parse<T: FromStr>(&self, name: &str) -> super::Result<Option<T>> {
        match self.text(name).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| super::Error::MalformedField(name.to_owned())),
        }
    }

    pub fn into_uploads(self) -> Vec<Upload> {
        self.uploads
    }
}

/// Drains the multipart stream, failing as soon as a limit is crossed:
/// the file count and MIME type before a file is read, its size per chunk.
pub async fn read(mut multipart: Multipart, limits: &Limits) -> super::Result<Form> {
    let mut form = Form::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        let file_name = field.file_name().map(str::to_owned);
        match file_name {
            Some(file_name) => {
                limits.check_count(form.uploads.len() + 1)?;
                let upload = read_file(field, file_name, limits).await?;
                debug!("received {} ({} bytes)", upload.file_name, upload.size());
                form.uploads.push(upload);
            }
            None => {
                let value = field.text().await?;
                form.fields.entry(name).or_default().push(value);
            }
        }
    }

    Ok(form)
}

async fn read_file(
    mut field: Field<'_>,
    file_name: String,
    limits: &Limits,
) -> super::Result<Upload> {
    let mime_type = super::essence(field.content_type().unwrap_or(FALLBACK_MIME_TYPE));
    limits.check_mime(&mime_type)?;

    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        limits.check_size(&file_name, buf.len() + chunk.len())?;
        buf.extend_from_slice(&chunk);
    }

    Ok(Upload::new(file_name, mime_type, buf.freeze()))
}
