//! Streamed POST to the chat backend.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use crate::error::TransportError;
use crate::frame::{Frame, FrameDecoder, FrameParsing};

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// JSON body of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub parsing: FrameParsing,
    /// Longest wait for the response headers and between two reads of the body.
    pub idle_timeout: Duration,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `request` and return the decoded frames as they arrive.
    async fn open(
        &self,
        request: &ChatRequest,
        options: &RequestOptions,
    ) -> Result<FrameStream, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tutor-cli/0.1")
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(
        &self,
        request: &ChatRequest,
        options: &RequestOptions,
    ) -> Result<FrameStream, TransportError> {
        let mut builder = self.client.post(&options.endpoint).json(request);
        if let Some(key) = options.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = tokio::time::timeout(options.idle_timeout, builder.send())
            .await
            .map_err(|_| TransportError::Timeout(options.idle_timeout.as_secs()))??;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status { status, body });
        }

        tracing::debug!("Streaming response from {} ({})", options.endpoint, status);
        Ok(decode_frames(
            Box::pin(response.bytes_stream()),
            options.parsing,
            options.idle_timeout,
        ))
    }
}

struct Decoding<S> {
    bytes: S,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    idle_timeout: Duration,
    done: bool,
}

/// Turn a raw body stream into frames. A transport error or idle timeout is
/// yielded once and ends the stream.
pub fn decode_frames<S, B>(bytes: S, parsing: FrameParsing, idle_timeout: Duration) -> FrameStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = Decoding {
        bytes,
        decoder: FrameDecoder::new(parsing),
        pending: VecDeque::new(),
        idle_timeout,
        done: false,
    };

    let frames = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.pending.pop_front() {
                return Some((Ok(frame), st));
            }
            if st.done {
                return None;
            }
            match tokio::time::timeout(st.idle_timeout, st.bytes.next()).await {
                Ok(Some(Ok(chunk))) => {
                    let decoded = st.decoder.push(chunk.as_ref());
                    st.pending.extend(decoded);
                }
                Ok(Some(Err(e))) => {
                    st.done = true;
                    return Some((Err(TransportError::Http(e)), st));
                }
                Ok(None) => {
                    st.done = true;
                    let rest = st.decoder.finish();
                    st.pending.extend(rest);
                }
                Err(_) => {
                    st.done = true;
                    let secs = st.idle_timeout.as_secs();
                    return Some((Err(TransportError::Timeout(secs)), st));
                }
            }
        }
    });

    Box::pin(frames)
}
