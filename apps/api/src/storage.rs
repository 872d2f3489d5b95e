//! Object storage — public uploads for generated avatars and base photos.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

/// Public object storage for generated avatars and base photos.
#[async_trait]
pub trait AvatarStorage: Send + Sync {
    /// Uploads `bytes` under `key`, marks the object publicly readable, and
    /// returns its public URL.
    async fn upload_public(
        &self,
        bytes: Bytes,
        key: &str,
        content_type: &str,
    ) -> Result<String, AppError>;
}

/// S3-compatible storage (MinIO locally, S3 in production).
pub struct S3AvatarStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    endpoint: String,
}

impl S3AvatarStorage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, endpoint: String) -> Self {
        Self {
            client,
            bucket,
            endpoint,
        }
    }
}

#[async_trait]
impl AvatarStorage for S3AvatarStorage {
    async fn upload_public(
        &self,
        bytes: Bytes,
        key: &str,
        content_type: &str,
    ) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

        let url = join_public_url(&self.endpoint, &self.bucket, key);
        info!("Uploaded public object to s3://{}/{}", self.bucket, key);
        Ok(url)
    }
}

/// Path-style public URL against an S3-compatible endpoint.
fn join_public_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
}

/// Object key for a generated avatar.
pub fn avatar_object_key(user_id: Uuid, image_id: Uuid) -> String {
    format!("avatars/{user_id}/{image_id}.png")
}

/// Fixed key for the baseline avatar, so regeneration overwrites in place.
pub fn initial_avatar_object_key(user_id: Uuid) -> String {
    format!("avatars/{user_id}/initial.png")
}

/// Fixed key for the user's uploaded base photo.
pub fn base_photo_key(user_id: Uuid, content_type: &str) -> String {
    let ext = match content_type {
        "image/jpeg" => "jpg",
        _ => "png",
    };
    format!("photos/{user_id}/base.{ext}")
}
