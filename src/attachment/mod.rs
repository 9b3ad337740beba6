use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use diesel::{deserialize::FromSqlRow, expression::AsExpression};
use serde::{Deserialize, Serialize};

use crate::id::text_enum;

pub mod form;
pub mod ingest;
pub mod storage;

type Result<T> = std::result::Result<T, Error>;
pub type Storage = Arc<dyn storage::FileStorage + Send + Sync>;

pub use ingest::Ingestor;

const MB: usize = 1024 * 1024;

/// Accepted upload types. Anything else rejects the whole request.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "video/mp4",
    "video/webm",
    "video/quicktime",
    "audio/mpeg",
    "audio/mp4",
    "audio/ogg",
    "audio/wav",
    "audio/webm",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/zip",
    "text/plain",
    "text/csv",
];

/// Media type without parameters, lowercased: `Text/Plain; charset=utf-8` is `text/plain`.
pub fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    max_files: usize,
    max_file_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_file_size: 15 * MB,
        }
    }
}

impl Limits {
    pub const fn new(max_files: usize, max_file_size: usize) -> Self {
        Self {
            max_files,
            max_file_size,
        }
    }

    pub const fn max_files(&self) -> usize {
        self.max_files
    }

    pub const fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Request body ceiling: every file at its limit plus room for text fields.
    pub const fn body_limit(&self) -> usize {
        self.max_files * self.max_file_size + MB
    }

    pub fn check_mime(&self, mime_type: &str) -> Result<()> {
        if ALLOWED_MIME_TYPES.contains(&essence(mime_type).as_str()) {
            Ok(())
        } else {
            Err(Error::UnsupportedMediaType(mime_type.to_owned()))
        }
    }

    pub fn check_size(&self, file_name: &str, size: usize) -> Result<()> {
        if size > self.max_file_size {
            Err(Error::FileTooLarge(file_name.to_owned(), self.max_file_size / MB))
        } else {
            Ok(())
        }
    }

    pub fn check_count(&self, count: usize) -> Result<()> {
        if count > self.max_files {
            Err(Error::TooManyFiles(count))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Image,
    Video,
    Audio,
    File,
}

impl Kind {
    pub fn of(mime_type: &str) -> Self {
        match mime_type.split('/').next() {
            Some("image") => Self::Image,
            Some("video") => Self::Video,
            Some("audio") => Self::Audio,
            _ => Self::File,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }
}

impl TryFrom<&str> for Kind {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "file" => Ok(Self::File),
            other => Err(format!("unsupported attachment kind: {other}")),
        }
    }
}

text_enum!(Kind);

/// Stored file described for a message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    kind: Kind,
    url: String,
    file_name: String,
    file_size: i64,
    mime_type: String,
}

impl Attachment {
    pub fn new(
        url: impl Into<String>,
        file_name: impl Into<String>,
        file_size: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        let mime_type = mime_type.into();
        Self {
            kind: Kind::of(&mime_type),
            url: url.into(),
            file_name: file_name.into(),
            file_size,
            mime_type,
        }
    }

    pub(crate) fn from_parts(
        kind: Kind,
        url: String,
        file_name: String,
        file_size: i64,
        mime_type: String,
    ) -> Self {
        Self {
            kind,
            url,
            file_name,
            file_size,
            mime_type,
        }
    }

    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub const fn file_size(&self) -> i64 {
        self.file_size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("too many attachments: {0}")]
    TooManyFiles(usize),
    #[error("attachment {0} exceeds {1} MB")]
    FileTooLarge(String, usize),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("malformed multipart field: {0}")]
    MalformedField(String),

    #[error(transparent)]
    _Multipart(#[from] MultipartError),
    #[error(transparent)]
    _Io(#[from] std::io::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::TooManyFiles(_) | Error::FileTooLarge(..) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::MalformedField(_) => StatusCode::BAD_REQUEST,
            Error::_Multipart(e) => e.status(),
            Error::_Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
