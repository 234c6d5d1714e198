use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported media payload: {0}")]
    Unsupported(String),
}

/// Object-storage collaborator turning a media payload into a durable URL
/// before the message is persisted. Real uploaders (CDN, S3) implement this
/// trait; the server core only ever sees the returned URL.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn put(&self, media: &str) -> Result<String, MediaError>;
}

/// Accepts payloads that are already durable URLs and rejects everything
/// else. The default when no external uploader is configured.
#[derive(Debug, Default)]
pub struct PassthroughMediaStorage;

#[async_trait]
impl MediaStorage for PassthroughMediaStorage {
    async fn put(&self, media: &str) -> Result<String, MediaError> {
        if media.starts_with("http://") || media.starts_with("https://") {
            Ok(media.to_string())
        } else {
            Err(MediaError::Unsupported(
                "expected a durable media URL".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn durable_urls_pass_through() {
        let storage = PassthroughMediaStorage;
        let url = storage
            .put("https://cdn.example/media/cat.png")
            .await
            .expect("url accepted");
        assert_eq!(url, "https://cdn.example/media/cat.png");
    }

    #[tokio::test]
    async fn raw_payloads_are_rejected() {
        let storage = PassthroughMediaStorage;
        let err = storage.put("data:image/png;base64,AAAA").await;
        assert!(matches!(err, Err(MediaError::Unsupported(_))));
    }
}
