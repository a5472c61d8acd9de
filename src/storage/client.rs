use super::types::{extract_public_id, transform_url, DestroyResponse, ErrorResponse, UploadResponse, UploadedImage};
use crate::config::CloudinaryConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Anything that can remove a stored profile image given its public URL.
pub trait ImageStore: Send + Sync + 'static {
    fn delete_by_url(&self, image_url: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

impl CloudinaryClient {
    pub fn new(config: &CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            folder: config.folder.clone(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("https://api.cloudinary.com/v1_1/{}/image/{}", self.cloud_name, action)
    }

    /// SHA-256 over the alphabetically sorted `key=value` pairs followed by the secret
    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);

        let to_sign = sorted
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        format!("{:x}", Sha256::digest(format!("{}{}", to_sign, self.api_secret).as_bytes()))
    }

    /// Post a signed form and decode either the success body or the host's error message
    async fn signed_post<T: serde::de::DeserializeOwned>(
        &self,
        action: &str,
        mut params: Vec<(&str, String)>,
        unsigned: Vec<(&str, String)>,
    ) -> Result<T> {
        params.push(("timestamp", chrono::Utc::now().timestamp().to_string()));
        let signature = self.sign(&params);

        let mut form = params;
        form.extend(unsigned);
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let response = self
            .client
            .post(self.endpoint(action))
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Failed to reach image host for {}", action))?;

        let status = response.status();
        let json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let message = serde_json::from_value::<ErrorResponse>(json)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.to_string());
            anyhow::bail!("Image host error: {}", message);
        }

        serde_json::from_value(json).context("Unexpected response from image host")
    }

    /// Upload a base64 data URI and return its optimised delivery URL
    pub async fn upload(&self, data_uri: &str) -> Result<UploadedImage> {
        let uploaded: UploadResponse = self
            .signed_post(
                "upload",
                vec![("folder", self.folder.clone())],
                vec![("file", data_uri.to_string())],
            )
            .await?;

        tracing::info!("Uploaded image {}", uploaded.public_id);

        Ok(UploadedImage {
            url: transform_url(&uploaded.secure_url),
            public_id: uploaded.public_id,
        })
    }

    pub async fn destroy(&self, public_id: &str) -> Result<()> {
        let response: DestroyResponse = self
            .signed_post("destroy", vec![("public_id", public_id.to_string())], vec![])
            .await?;

        if response.result != "ok" {
            anyhow::bail!("Image {} was not deleted: {}", public_id, response.result);
        }
        tracing::info!("Deleted image {}", public_id);
        Ok(())
    }
}

impl ImageStore for CloudinaryClient {
    async fn delete_by_url(&self, image_url: &str) -> Result<()> {
        let public_id = extract_public_id(image_url)
            .with_context(|| format!("Could not extract public ID from {}", image_url))?;
        self.destroy(&public_id).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub attempted: usize,
    pub failed: usize,
}

/// Delete every image concurrently and wait for all of them to settle.
/// Failures are logged and counted, never returned.
pub async fn delete_images_settled<S: ImageStore>(store: &Arc<S>, urls: Vec<String>) -> DeletionReport {
    let mut set = JoinSet::new();
    let attempted = urls.len();

    for url in urls {
        let store = Arc::clone(store);
        set.spawn(async move {
            let result = store.delete_by_url(&url).await;
            (url, result)
        });
    }

    let mut failed = 0;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((url, Err(e))) => {
                failed += 1;
                tracing::warn!("Failed to delete image {}: {:#}", url, e);
            }
            Err(e) => {
                failed += 1;
                tracing::warn!("Image deletion task failed: {}", e);
            }
        }
    }

    DeletionReport { attempted, failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeStore {
        deleted: Mutex<Vec<String>>,
    }

    impl ImageStore for FakeStore {
        async fn delete_by_url(&self, image_url: &str) -> Result<()> {
            if image_url.contains("broken") {
                anyhow::bail!("storage unavailable");
            }
            self.deleted.lock().unwrap().push(image_url.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delete_images_settled_counts_failures() {
        let store = Arc::new(FakeStore {
            deleted: Mutex::new(Vec::new()),
        });
        let urls = vec![
            "https://img/upload/v1/K-1000/a.jpg".to_string(),
            "https://img/upload/v1/K-1000/broken.jpg".to_string(),
            "https://img/upload/v1/K-1000/c.jpg".to_string(),
        ];

        let report = delete_images_settled(&store, urls).await;
        assert_eq!(report, DeletionReport { attempted: 3, failed: 1 });

        let mut deleted = store.deleted.lock().unwrap().clone();
        deleted.sort();
        assert_eq!(deleted.len(), 2);
        assert!(deleted[0].ends_with("a.jpg"));
    }

    #[tokio::test]
    async fn test_delete_images_settled_with_nothing_to_do() {
        let store = Arc::new(FakeStore {
            deleted: Mutex::new(Vec::new()),
        });
        let report = delete_images_settled(&store, Vec::new()).await;
        assert_eq!(report, DeletionReport::default());
    }

    #[test]
    fn test_signature_is_order_independent() {
        let client = CloudinaryClient::new(&CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            folder: "K-1000".into(),
        });

        let a = client.sign(&[("timestamp", "1700000000".into()), ("folder", "K-1000".into())]);
        let b = client.sign(&[("folder", "K-1000".into()), ("timestamp", "1700000000".into())]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let expected = format!("{:x}", Sha256::digest(b"folder=K-1000&timestamp=1700000000secret"));
        assert_eq!(a, expected);
    }
}
