use log::{debug, error};

use super::form::Upload;
use super::{Attachment, Limits, Storage};

/// Turns validated uploads into stored attachment descriptors.
#[derive(Clone)]
pub struct Ingestor {
    storage: Storage,
    limits: Limits,
}

impl Ingestor {
    pub fn new(storage: Storage, limits: Limits) -> Self {
        Self { storage, limits }
    }

    /// Validates every upload before storing any of them. If storing fails
    /// midway the files stored so far are removed again.
    pub async fn ingest(&self, uploads: &[Upload]) -> super::Result<Vec<Attachment>> {
        self.validate(uploads)?;

        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.storage.put(upload.file_name(), upload.bytes()).await {
                Ok(key) => stored.push((key, upload)),
                Err(e) => {
                    self.discard(stored.iter().map(|(key, _)| key.as_str())).await;
                    return Err(e);
                }
            }
        }

        let attachments = stored
            .into_iter()
            .map(|(key, upload)| {
                Attachment::new(
                    self.storage.url(&key),
                    upload.file_name(),
                    upload.size() as i64,
                    upload.mime_type(),
                )
            })
            .collect();

        Ok(attachments)
    }

    pub fn validate(&self, uploads: &[Upload]) -> super::Result<()> {
        self.limits.check_count(uploads.len())?;
        for upload in uploads {
            self.limits.check_mime(upload.mime_type())?;
            self.limits.check_size(upload.file_name(), upload.size())?;
        }
        Ok(())
    }

    /// Best-effort removal of files addressed by their URLs.
    pub async fn discard_urls(&self, urls: &[String]) {
        let keys: Vec<&str> = urls
            .iter()
            .filter_map(|url| url.rsplit('/').next())
            .collect();
        self.discard(keys.into_iter()).await;
    }

    async fn discard<'a>(&self, keys: impl Iterator<Item = &'a str>) {
        for key in keys {
            match self.storage.remove(key).await {
                Ok(()) => debug!("removed stored file {key}"),
                Err(e) => error!("failed to remove stored file {key}: {e}"),
            }
        }
    }
}
