use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::ImageHostConfig;

/// File received from a client, ready to be pushed to the image host.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub body: Bytes,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store `file` under `folder` and return its durable public URL.
    async fn upload(&self, folder: &str, file: UploadedFile) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct S3ImageHost {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ImageHost {
    pub async fn new(cfg: &ImageHostConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageHost for S3ImageHost {
    async fn upload(&self, folder: &str, file: UploadedFile) -> anyhow::Result<String> {
        let key = object_key(folder, &file);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(file.body))
            .content_type(&file.content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// `<folder>/<uuid>.<ext>`, extension taken from the MIME type, then the
/// client file name, then `bin`.
pub(crate) fn object_key(folder: &str, file: &UploadedFile) -> String {
    let ext = ext_from_mime(&file.content_type)
        .map(str::to_string)
        .or_else(|| {
            file.file_name
                .as_deref()
                .and_then(|n| n.rsplit_once('.'))
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        })
        .unwrap_or_else(|| "bin".to_string());
    format!("{}/{}.{}", folder.trim_matches('/'), Uuid::new_v4(), ext)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) use fake::FakeImageHost;
