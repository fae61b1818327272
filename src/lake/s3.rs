use std::path::Path;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Tag, Tagging};
use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;

use super::{ObjectStore, ObjectSummary, TagSet};
use crate::error::{LakeError, Result};

fn store_err<E: std::error::Error>(err: E) -> LakeError {
    LakeError::Store(DisplayErrorContext(err).to_string())
}

/// Files above this size go up in parts; a single PUT is capped at 5 GiB.
const MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;
const MIN_PART_SIZE: u64 = 64 * 1024 * 1024;
const MAX_PARTS: u64 = 10_000;

/// `(offset, length)` of each part of a `size`-byte file. Parts grow past
/// [`MIN_PART_SIZE`] when needed to stay within [`MAX_PARTS`].
fn part_ranges(size: u64) -> Vec<(u64, u64)> {
    let part_size = MIN_PART_SIZE.max(size.div_ceil(MAX_PARTS));
    (0..size)
        .step_by(part_size as usize)
        .map(|offset| (offset, part_size.min(size - offset)))
        .collect()
}

/// [`ObjectStore`] over one S3 bucket.
///
/// The SDK is async; the store owns a private current-thread runtime and
/// blocks on each call so the rest of the crate stays synchronous.
pub struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Connect with the default credential chain, optionally pinning a region.
    pub fn connect(bucket: impl Into<String>, region: Option<&str>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = runtime.block_on(loader.load());
        Ok(Self {
            client: Client::new(&sdk_config),
            runtime,
            bucket: bucket.into(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_single(&self, path: &Path, key: &str) -> Result<()> {
        let body = ByteStream::from_path(path).await.map_err(store_err)?;
        self.client
            .put_object()
            .bucket(self.bucket())
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn put_parts(&self, path: &Path, key: &str, upload_id: &str, size: u64) -> Result<()> {
        let mut completed = Vec::new();
        for (index, (offset, length)) in part_ranges(size).into_iter().enumerate() {
            let part_number = index as i32 + 1;
            let body = ByteStream::read_from()
                .path(path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await
                .map_err(store_err)?;
            let output = self
                .client
                .upload_part()
                .bucket(self.bucket())
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(store_err)?;
            log::debug!("Uploaded part {part_number} of {key}");
            completed.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .build(),
            );
        }

        self.client
            .complete_multipart_upload()
            .bucket(self.bucket())
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(completed)).build())
            .send()
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Multipart upload; an interrupted upload is aborted so no parts linger.
    async fn put_multipart(&self, path: &Path, key: &str, size: u64) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(self.bucket())
            .key(key)
            .send()
            .await
            .map_err(store_err)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| LakeError::Store(format!("no upload id returned for {key}")))?
            .to_string();

        let result = self.put_parts(path, key, &upload_id, size).await;
        if result.is_err() {
            let abort = self
                .client
                .abort_multipart_upload()
                .bucket(self.bucket())
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await;
            if let Err(e) = abort {
                log::warn!("Aborting upload of {key} failed: {}", DisplayErrorContext(e));
            }
        }
        result
    }
}

impl ObjectStore for S3Store {
    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        self.runtime.block_on(async {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .into_paginator()
                .send();

            let mut objects = Vec::new();
            while let Some(page) = pages.next().await {
                let page = page.map_err(store_err)?;
                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    objects.push(ObjectSummary {
                        key: key.to_string(),
                        size: object.size().unwrap_or(0).max(0) as u64,
                        last_modified: object
                            .last_modified()
                            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                    });
                }
            }
            Ok(objects)
        })
    }

    fn list_prefixes(&self, prefix: &str, delimiter: &str) -> Result<Vec<String>> {
        self.runtime.block_on(async {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter(delimiter)
                .into_paginator()
                .send();

            let mut prefixes = Vec::new();
            while let Some(page) = pages.next().await {
                let page = page.map_err(store_err)?;
                prefixes.extend(
                    page.common_prefixes()
                        .iter()
                        .filter_map(|p| p.prefix())
                        .map(str::to_string),
                );
            }
            Ok(prefixes)
        })
    }

    fn object_tags(&self, key: &str) -> Result<TagSet> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .get_object_tagging()
                    .bucket(&self.bucket)
                    .key(key)
                    .send(),
            )
            .map_err(store_err)?;
        Ok(output
            .tag_set()
            .iter()
            .map(|t| (t.key(), t.value()))
            .collect())
    }

    fn put_object_tags(&self, key: &str, tags: &TagSet) -> Result<()> {
        let tag_set = tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build().map_err(store_err))
            .collect::<Result<Vec<_>>>()?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(store_err)?;

        self.runtime
            .block_on(
                self.client
                    .put_object_tagging()
                    .bucket(&self.bucket)
                    .key(key)
                    .tagging(tagging)
                    .send(),
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn upload_file(&self, path: &Path, key: &str) -> Result<()> {
        let size = std::fs::metadata(path)?.len();
        self.runtime.block_on(async {
            if size > MULTIPART_THRESHOLD {
                self.put_multipart(path, key, size).await?;
            } else {
                self.put_single(path, key).await?;
            }
            log::info!("Uploaded {} to s3://{}/{key}", path.display(), self.bucket());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn parts_cover_the_file_with_a_short_tail() {
        let ranges = part_ranges(150 * MIB);
        assert_eq!(ranges, vec![(0, 64 * MIB), (64 * MIB, 64 * MIB), (128 * MIB, 22 * MIB)]);
    }

    #[test]
    fn huge_files_stay_within_the_part_limit() {
        let size = 1_000_000 * MIB;
        let ranges = part_ranges(size);
        assert!(ranges.len() as u64 <= MAX_PARTS);
        assert_eq!(ranges.iter().map(|(_, len)| len).sum::<u64>(), size);
        assert!(ranges.windows(2).all(|w| w[0].0 + w[0].1 == w[1].0));
    }

    #[test]
    fn empty_file_has_no_parts() {
        assert!(part_ranges(0).is_empty());
    }
}
