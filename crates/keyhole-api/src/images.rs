//! Client for the external image-hosting collaborator. Messages carry
//! data-URL images; the host turns each into a publicly fetchable URL.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;

/// Width of each parallel upload batch, capping outbound concurrency
/// toward the image host.
const UPLOAD_BATCH: usize = 3;

/// Per-upload timeout, enforced at the HTTP client.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ImageHost {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UploadReply {
    url: String,
}

impl ImageHost {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("building image host client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Upload one data-URL image; returns the hosted URL.
    pub async fn upload(&self, data_url: &str) -> Result<String> {
        let reply: UploadReply = self
            .client
            .post(format!("{}/upload", self.base_url.trim_end_matches('/')))
            .json(&serde_json::json!({ "file": data_url }))
            .send()
            .await
            .context("image host unreachable")?
            .error_for_status()
            .context("image host rejected upload")?
            .json()
            .await
            .context("image host returned a malformed reply")?;

        Ok(reply.url)
    }
}

/// Upload images in fixed-width parallel batches. A failed upload does
/// not abort the rest: the caller proceeds with whichever URLs
/// succeeded, and only gets an error when every attempted upload
/// failed. Nothing is retried.
pub async fn upload_all<F, Fut>(images: &[String], upload: F) -> Result<Vec<String>, ApiError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut hosted = Vec::new();

    for batch in images.chunks(UPLOAD_BATCH) {
        let results = join_all(batch.iter().cloned().map(&upload)).await;
        for result in results {
            match result {
                Ok(url) => hosted.push(url),
                Err(e) => warn!("image upload failed: {e:#}"),
            }
        }
    }

    if hosted.is_empty() && !images.is_empty() {
        return Err(ApiError::Upstream(
            "Failed to upload images. Please try again.".into(),
        ));
    }

    Ok(hosted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn empty_input_uploads_nothing() {
        let urls = upload_all(&[], |_| async { Ok("never".to_string()) })
            .await
            .unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn failed_uploads_are_tolerated_while_any_succeed() {
        let images: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();

        let urls = upload_all(&images, |img| async move {
            if img == "b" || img == "d" {
                Err(anyhow::anyhow!("host rejected {img}"))
            } else {
                Ok(format!("https://img.example/{img}"))
            }
        })
        .await
        .unwrap();

        assert_eq!(
            urls,
            vec![
                "https://img.example/a".to_string(),
                "https://img.example/c".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn total_failure_is_an_upstream_error() {
        let images = vec!["a".to_string(), "b".to_string()];

        let result = upload_all(&images, |_| async { Err(anyhow::anyhow!("down")) }).await;

        assert!(matches!(result, Err(ApiError::Upstream(_))));
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_batch_width() {
        let images: Vec<String> = (0..7).map(|i| format!("img-{i}")).collect();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let urls = upload_all(&images, |img| {
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(format!("https://img.example/{img}"))
            }
        })
        .await
        .unwrap();

        assert_eq!(urls.len(), 7);
        assert!(max_in_flight.load(Ordering::SeqCst) <= UPLOAD_BATCH);
    }
}
