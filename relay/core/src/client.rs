//! HTTP stream source
//!
//! Opens the chat and agent streaming endpoints and hands back their bodies
//! as [`ResponseBody`](crate::ResponseBody)s for the reader. Also requests
//! that a running agent stream be stopped.
//!
//! # Endpoints
//!
//! - `POST {chat_path}` - chat completion stream
//! - `POST {agent_path}` - agent session stream
//! - `POST {stop_path}/{conversation_id}` - stop a running agent stream
//!
//! There is no retry or reconnection here; a failed request is an error.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{EndpointConfig, RelayConfig};
use crate::conversation::{ConversationId, StreamKind};
use crate::reader::{ByteStream, TransportError};

/// Response body of an open stream
pub type HttpBody = ByteStream<BoxStream<'static, Result<Vec<u8>, TransportError>>>;

#[derive(Debug, Deserialize)]
struct StopResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the streaming server
#[derive(Clone, Debug)]
pub struct StreamClient {
    endpoint: EndpointConfig,
    http_client: reqwest::Client,
}

impl StreamClient {
    /// Create a client for `endpoint`
    pub fn new(endpoint: EndpointConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(endpoint.request_timeout)
            .build()?;
        Ok(Self {
            endpoint,
            http_client,
        })
    }

    /// Create a client from the loaded configuration
    pub fn from_config(config: &RelayConfig) -> anyhow::Result<Self> {
        Self::new(config.endpoint.clone())
    }

    /// Endpoint settings in use
    #[must_use]
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// Open a chat completion stream
    pub async fn open_chat(&self, payload: &Value) -> anyhow::Result<HttpBody> {
        self.open(StreamKind::Normal, payload).await
    }

    /// Open an agent session stream
    pub async fn open_agent(&self, payload: &Value) -> anyhow::Result<HttpBody> {
        self.open(StreamKind::Agent, payload).await
    }

    /// Open a stream of the given kind
    pub async fn open(&self, kind: StreamKind, payload: &Value) -> anyhow::Result<HttpBody> {
        let path = match kind {
            StreamKind::Normal => &self.endpoint.chat_path,
            StreamKind::Agent => &self.endpoint.agent_path,
        };
        let url = self.endpoint.url(path);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("server returned {status}: {body}");
        }

        tracing::debug!(url = %url, kind = %kind, "Stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from))
            .boxed();
        Ok(ByteStream::new(stream))
    }

    /// Ask the server to stop the agent stream of `conversation_id`
    ///
    /// Returns the server's verdict; `false` usually means nothing was
    /// streaming for that conversation.
    pub async fn request_stop(&self, conversation_id: &ConversationId) -> anyhow::Result<bool> {
        let url = format!(
            "{}/{}",
            self.endpoint.url(&self.endpoint.stop_path),
            conversation_id
        );

        let response = self.http_client.post(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("server returned {status}: {body}");
        }

        let stop: StopResponse = response.json().await?;
        tracing::info!(
            conversation_id = %conversation_id,
            success = stop.success,
            message = stop.message.as_deref().unwrap_or(""),
            "Stop requested"
        );
        Ok(stop.success)
    }
}
