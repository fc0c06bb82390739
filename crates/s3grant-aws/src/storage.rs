use crate::error::from_sdk;

use s3grant::backend::{ChunkObserver, ListingEntry, ReadOutcome};
use s3grant::{BackendError, BackendResult, StorageBackend};

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types_convert::date_time::DateTimeExt;
use bytes::Bytes;
use tracing::debug;

/// A [`StorageBackend`] backed by `aws-sdk-s3`.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl From<Client> for S3Storage {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

#[async_trait::async_trait]
impl StorageBackend for S3Storage {
    async fn list_children(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> BackendResult<Vec<ListingEntry>> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .delimiter(delimiter)
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX));
        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }

        let output = req.send().await.map_err(|e| from_sdk("ListObjectsV2", e))?;

        let mut entries = Vec::with_capacity(output.contents().len() + output.common_prefixes().len());
        for object in output.contents() {
            let Some(key) = object.key() else { continue };
            let last_modified = object.last_modified().and_then(|t| (*t).to_time().ok());
            entries.push(ListingEntry::File {
                key: key.to_owned(),
                last_modified,
            });
        }
        for common in output.common_prefixes() {
            if let Some(prefix) = common.prefix() {
                entries.push(ListingEntry::folder(prefix));
            }
        }

        debug!(bucket, prefix, entries = entries.len(), truncated = ?output.is_truncated(), "listed");
        Ok(entries)
    }

    async fn bucket_location(&self, bucket: &str) -> BackendResult<String> {
        let output = self
            .client
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| from_sdk("GetBucketLocation", e))?;

        let location = output
            .location_constraint()
            .map(|c| c.as_str().to_owned())
            .unwrap_or_default();
        debug!(bucket, %location, "bucket location");
        Ok(location)
    }

    async fn partial_read(
        &self,
        bucket: &str,
        key: &str,
        observer: &mut dyn ChunkObserver,
    ) -> BackendResult<ReadOutcome> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk("GetObject", e))?;

        let total = output.content_length().and_then(|n| u64::try_from(n).ok());
        let mut body = output.body;
        let mut bytes_read: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| BackendError::with_source(format!("GetObject {key}: reading body"), e))?;
            bytes_read += chunk.len() as u64;
            if observer.on_chunk(bytes_read, total).is_break() {
                // dropping the body aborts the transfer
                debug!(key, bytes_read, ?total, "stopped read");
                return Ok(ReadOutcome::Stopped { bytes_read });
            }
        }

        Ok(ReadOutcome::Completed { bytes_read })
    }

    async fn put_object(&self, bucket: &str, key: &str, content: Bytes) -> BackendResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| from_sdk("PutObject", e))?;
        Ok(())
    }
}
