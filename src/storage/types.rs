use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static VERSIONED_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/v\d+/(.+)\.\w+$").unwrap());
static UPLOAD_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"upload/(?:v\d+/)?(.+)\.\w+$").unwrap());

const DELIVERY_TRANSFORM: &str = "/upload/w_1024,ar_1:1,c_auto,g_auto,f_auto/";

/// Successful upload response from the image host
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub secure_url: String,
    pub public_id: String,
}

/// Destroy response; `result` is "ok" or "not found"
#[derive(Debug, Clone, Deserialize)]
pub struct DestroyResponse {
    pub result: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

/// Rewrite a delivery URL so the image is served square-cropped at 1024px.
pub fn transform_url(url: &str) -> String {
    url.replacen("/upload/", DELIVERY_TRANSFORM, 1)
}

/// Public id of a stored image, derived from its delivery URL.
///
/// e.g. `https://res.cloudinary.com/demo/image/upload/v1712/K-1000/abc.jpg` -> `K-1000/abc`
pub fn extract_public_id(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    VERSIONED_ID
        .captures(url)
        .or_else(|| UPLOAD_ID.captures(url))
        .map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_url() {
        assert_eq!(
            transform_url("https://res.cloudinary.com/demo/image/upload/v1712/K-1000/abc.jpg"),
            "https://res.cloudinary.com/demo/image/upload/w_1024,ar_1:1,c_auto,g_auto,f_auto/v1712/K-1000/abc.jpg"
        );
        assert_eq!(transform_url("https://example.com/a.png"), "https://example.com/a.png");
    }

    #[test]
    fn test_extract_public_id() {
        assert_eq!(
            extract_public_id("https://res.cloudinary.com/demo/image/upload/v1712/K-1000/abc.jpg").as_deref(),
            Some("K-1000/abc")
        );
        assert_eq!(
            extract_public_id(
                "https://res.cloudinary.com/demo/image/upload/w_1024,ar_1:1,c_auto,g_auto,f_auto/v1712/K-1000/abc.jpg"
            )
            .as_deref(),
            Some("K-1000/abc")
        );
        assert_eq!(
            extract_public_id("https://res.cloudinary.com/demo/image/upload/K-1000/xyz.png").as_deref(),
            Some("K-1000/xyz")
        );
        assert_eq!(extract_public_id("https://lh3.googleusercontent.com/a/photo"), None);
        assert_eq!(extract_public_id(""), None);
    }
}
