//! HTTP live API: frame polling and input fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{StatusCode, Url};
use tracing::trace;

use crate::error::MirrorError;
use crate::protocol::http::LiveFrameResponse;
use crate::protocol::input::InputPayload;

/// Result of a conditional frame fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// `304`: the frame has not changed since the given ETag.
    NotModified,
    Frame {
        response: LiveFrameResponse,
        etag: Option<String>,
    },
}

/// The two HTTP endpoints of the recording server.
#[async_trait]
pub trait LiveApi: Send + Sync {
    /// `GET /recordings/live/{session}/frame?quality=N`.
    async fn fetch_frame(
        &self,
        session_id: &str,
        quality: u8,
        etag: Option<&str>,
    ) -> Result<FetchOutcome, MirrorError>;

    /// `POST /recordings/live/{session}/input`.
    async fn send_input(&self, session_id: &str, input: &InputPayload) -> Result<(), MirrorError>;
}

// ── HttpLiveApi ──────────────────────────────────────────────────

/// [`LiveApi`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpLiveApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpLiveApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MirrorError> {
        let base = Url::parse(base_url).map_err(|e| MirrorError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(MirrorError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// `{base}/recordings/live/{session}/{leaf}`, session percent-encoded.
    fn endpoint(&self, session_id: &str, leaf: &str) -> Result<Url, MirrorError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| MirrorError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["recordings", "live", session_id, leaf]);
        Ok(url)
    }
}

#[async_trait]
impl LiveApi for HttpLiveApi {
    async fn fetch_frame(
        &self,
        session_id: &str,
        quality: u8,
        etag: Option<&str>,
    ) -> Result<FetchOutcome, MirrorError> {
        let mut url = self.endpoint(session_id, "frame")?;
        url.query_pairs_mut()
            .append_pair("quality", &quality.to_string());

        let mut req = self.client.get(url);
        if let Some(tag) = etag {
            req = req.header(IF_NONE_MATCH, tag);
        }
        let resp = req.send().await?;

        match resp.status() {
            StatusCode::NOT_MODIFIED => {
                trace!(session = session_id, "frame not modified");
                Ok(FetchOutcome::NotModified)
            }
            s if s.is_success() => {
                let etag = resp
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let response = resp.json::<LiveFrameResponse>().await?;
                Ok(FetchOutcome::Frame { response, etag })
            }
            s => Err(MirrorError::Status {
                status: s.as_u16(),
                endpoint: "frame",
            }),
        }
    }

    async fn send_input(&self, session_id: &str, input: &InputPayload) -> Result<(), MirrorError> {
        let url = self.endpoint(session_id, "input")?;
        let resp = self.client.post(url).json(input).send().await?;
        if !resp.status().is_success() {
            return Err(MirrorError::Status {
                status: resp.status().as_u16(),
                endpoint: "input",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_built_under_base() {
        let api = HttpLiveApi::new("http://localhost:8080/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.endpoint("abc", "frame").unwrap().as_str(),
            "http://localhost:8080/api/recordings/live/abc/frame"
        );

        let api = HttpLiveApi::new("http://localhost:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.endpoint("a/b", "input").unwrap().as_str(),
            "http://localhost:8080/recordings/live/a%2Fb/input"
        );
    }

    #[test]
    fn rejects_bad_base() {
        assert!(matches!(
            HttpLiveApi::new("not a url", Duration::from_secs(1)),
            Err(MirrorError::InvalidUrl(_))
        ));
        assert!(HttpLiveApi::new("mailto:x@y", Duration::from_secs(1)).is_err());
    }
}
