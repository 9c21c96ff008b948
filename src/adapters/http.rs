use crate::utils::error::{DeckError, Result};
use reqwest::{Client, Response};
use serde_json::Value;
use std::io::Cursor;
use std::time::Duration;

const USER_AGENT: &str = concat!("card-forge/", env!("CARGO_PKG_VERSION"));

pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// 非 2xx 轉成 VendorError，成功則解析 JSON
pub async fn json_or_vendor_error(vendor: &str, response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DeckError::VendorError {
            vendor: vendor.to_string(),
            status: status.as_u16(),
            body: preview(&body, 500),
        });
    }

    Ok(response.json::<Value>().await?)
}

/// First `max_chars` characters of a response body.
pub fn preview(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Downloads an image and refuses payloads that do not decode as one.
pub async fn fetch_image(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await.map_err(|e| DeckError::DownloadError {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DeckError::DownloadError {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| DeckError::DownloadError {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let (width, height) = image_dimensions(&bytes)?;
    tracing::debug!(url, width, height, bytes = bytes.len(), "Verified downloaded image");

    Ok(bytes.to_vec())
}

pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let dimensions = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(dimensions)
}

// 1x1 transparent PNG
#[cfg(test)]
pub(crate) const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview("ééééé", 2), "éé...");
    }

    #[test]
    fn test_image_dimensions() {
        assert_eq!(image_dimensions(TINY_PNG).unwrap(), (1, 1));
        assert!(image_dimensions(b"<html>not an image</html>").is_err());
    }

    #[tokio::test]
    async fn test_fetch_image_rejects_html() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/img.png");
                then.status(200).body("<html>error page</html>");
            })
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let result = fetch_image(&client, &server.url("/img.png")).await;
        assert!(matches!(result, Err(DeckError::ImageError(_))));
    }

    #[tokio::test]
    async fn test_fetch_image_http_error() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/gone.png");
                then.status(404);
            })
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let err = fetch_image(&client, &server.url("/gone.png")).await.unwrap_err();
        assert!(matches!(err, DeckError::DownloadError { .. }));
        assert!(err.to_string().contains("404"));
    }
}
