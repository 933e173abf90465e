//! Durable signature storage.
//!
//! Narrow object-store contract: PUT the decoded image under a generated
//! key, get a publicly-fetchable URL back. Failures here are always
//! non-fatal for the caller — a lead with only an inline signature is still
//! a complete lead.

#[derive(Debug, Clone)]
pub struct SignatureStore {
    http: reqwest::Client,
    put_base: String,
    public_base: String,
    token: Option<String>,
}

impl SignatureStore {
    pub fn new(
        http: reqwest::Client,
        put_base: impl Into<String>,
        public_base: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        SignatureStore {
            http,
            put_base: put_base.into(),
            public_base: public_base.into(),
            token,
        }
    }

    /// Stores the image bytes under `key` and returns the public URL.
    pub async fn store(
        &self,
        key: &str,
        bytes: Vec<u8>,
        format: &str,
    ) -> Result<String, reqwest::Error> {
        let url = format!("{}/{}", self.put_base.trim_end_matches('/'), key);
        let mut request = self
            .http
            .put(&url)
            .header("content-type", format!("image/{format}"))
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request.send().await?.error_for_status()?;

        Ok(format!(
            "{}/{}",
            self.public_base.trim_end_matches('/'),
            key
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_store_puts_and_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/signature_f1_123.png"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = SignatureStore::new(
            reqwest::Client::new(),
            server.uri(),
            "https://files.example",
            None,
        );
        let url = store
            .store("signature_f1_123.png", b"imagedata".to_vec(), "png")
            .await
            .unwrap();
        assert_eq!(url, "https://files.example/signature_f1_123.png");
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = SignatureStore::new(
            reqwest::Client::new(),
            server.uri(),
            "https://files.example",
            None,
        );
        let result = store.store("key.png", vec![1, 2, 3], "png").await;
        assert!(result.is_err());
    }
}
