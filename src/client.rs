//! HTTP client for the research backend.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, TryStreamExt};
use reqwest::{StatusCode, header};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::ApiConfig,
    error::{Error, Result},
    stream::{self, DecodedMessage, StreamUpdate},
    types::{AppConfiguration, ChatOptions, ChatRequest, ResearchReport, ResearchRequest},
};

/// Boxed stream of chat updates, as returned by [`ChatApi::stream`].
pub type UpdateStream = Pin<Box<dyn Stream<Item = Result<StreamUpdate>> + Send>>;

/// HTTP client for the backend API.
///
/// Cheap to clone; clones share one connection pool.
///
/// # Example
///
/// ```rust,no_run
/// use bulldozer_client::Client;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new("http://localhost:8000/api")?;
///
/// let reply = client.chat().send("Who owns Acme Corp?").await?;
/// println!("{}", reply.content);
///
/// if let Some(id) = reply.correlation_id {
///     let report = client.research().get(&id).await?;
///     println!("{}", report.summary);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    /// Whole-request limit for the JSON endpoints. Chat replies are exempt.
    request_timeout: Option<Duration>,
}

impl Client {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `http://localhost:8000/api`. Endpoint
    ///   paths are appended to it whether or not it ends with `/`.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }
        Ok(Self {
            base_url,
            http,
            request_timeout: None,
        })
    }

    /// Create a client from the `api` configuration section.
    ///
    /// `timeout_secs` bounds connecting and every silent gap while reading.
    /// It also bounds the research and configuration requests as a whole,
    /// but not a chat reply, which may keep streaming for as long as the
    /// backend keeps sending.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        let mut client = Self::with_client(&config.base_url, http)?;
        client.request_timeout = Some(timeout);
        Ok(client)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the Chat API.
    pub fn chat(&self) -> ChatApi<'_> {
        ChatApi { client: self }
    }

    /// Access the Research API.
    pub fn research(&self) -> ResearchApi<'_> {
        ResearchApi { client: self }
    }

    /// Access the Configuration API.
    pub fn configuration(&self) -> ConfigurationApi<'_> {
        ConfigurationApi { client: self }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Append path segments to the base URL. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Serialize `body` up front so encoding failures never reach the network.
    fn post_json<T: serde::Serialize>(
        &self,
        url: Url,
        body: &T,
    ) -> Result<reqwest::RequestBuilder> {
        let bytes = serde_json::to_vec(body).map_err(Error::Encoding)?;
        Ok(self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(bytes))
    }

    /// Apply the whole-request limit, if any.
    fn bounded(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());
        warn!(
            name: "api.response.error",
            status = status.as_u16(),
            "Server returned an error status"
        );
        Err(Error::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(Error::Decode)
    }
}

// =============================================================================
// Chat API
// =============================================================================

/// Chat API client.
#[derive(Debug)]
pub struct ChatApi<'a> {
    client: &'a Client,
}

impl ChatApi<'_> {
    /// Send a message with the default switches and decode the full reply.
    pub async fn send(&self, message: impl Into<String>) -> Result<DecodedMessage> {
        self.send_with_options(message, &ChatOptions::default())
            .await
    }

    /// Send a message and decode the reply once the body has been read.
    ///
    /// The decoder is only invoked for a `200 OK` response.
    pub async fn send_with_options(
        &self,
        message: impl Into<String>,
        options: &ChatOptions,
    ) -> Result<DecodedMessage> {
        let response = self.start(message, options).await?;
        let body = response.text().await?;
        let decoded = stream::decode(&body);

        debug!(
            name: "chat.response.decoded",
            chars = decoded.content.len(),
            research_id = ?decoded.correlation_id,
            complete = decoded.is_complete,
            "Chat response decoded"
        );
        Ok(decoded)
    }

    /// Send a message and return its reply as a stream of updates.
    ///
    /// Updates are produced as bytes arrive, so callers can render the
    /// answer token by token. Fold them with
    /// [`DecodedMessage::apply`] to obtain the final message.
    pub async fn stream(
        &self,
        message: impl Into<String>,
        options: &ChatOptions,
    ) -> Result<UpdateStream> {
        let response = self.start(message, options).await?;
        let bytes = response.bytes_stream().map_err(Error::from);
        Ok(Box::pin(stream::decode_stream(bytes)))
    }

    async fn start(
        &self,
        message: impl Into<String>,
        options: &ChatOptions,
    ) -> Result<reqwest::Response> {
        let req = ChatRequest::new(message, options);
        let url = self.client.endpoint(&["chat", "stream"])?;
        let builder = self.client.post_json(url, &req)?;

        info!(
            name: "chat.request.sent",
            deep_thinking = req.enable_deep_thinking,
            background_investigation = req.enable_background_investigation,
            report_style = %req.report_style,
            "Sending chat message"
        );

        let response = builder.send().await?;
        Client::check_status(response).await
    }
}

// =============================================================================
// Research API
// =============================================================================

/// Research API client.
#[derive(Debug)]
pub struct ResearchApi<'a> {
    client: &'a Client,
}

impl ResearchApi<'_> {
    /// Fetch a report by id.
    pub async fn get(&self, id: &str) -> Result<ResearchReport> {
        let url = self.client.endpoint(&["research", id])?;
        debug!(name: "research.fetch", research_id = %id, "Fetching research report");
        let response = self.client.bounded(self.client.http.get(url)).send().await?;
        Client::handle_response(response).await
    }

    /// Start a new research job.
    pub async fn create(&self, req: &ResearchRequest) -> Result<ResearchReport> {
        let url = self.client.endpoint(&["research"])?;
        let builder = self.client.post_json(url, req)?;
        info!(
            name: "research.create",
            company = ?req.company,
            focus_areas = req.focus_areas.len(),
            "Creating research"
        );
        let response = self.client.bounded(builder).send().await?;
        Client::handle_response(response).await
    }
}

// =============================================================================
// Configuration API
// =============================================================================

/// Configuration API client.
#[derive(Debug)]
pub struct ConfigurationApi<'a> {
    client: &'a Client,
}

impl ConfigurationApi<'_> {
    /// Fetch the backend's model and feature configuration.
    pub async fn get(&self) -> Result<AppConfiguration> {
        let url = self.client.endpoint(&["config"])?;
        let response = self.client.bounded(self.client.http.get(url)).send().await?;
        Client::handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_to_base_path() {
        let client = Client::new("https://example.com/api").unwrap();
        assert_eq!(
            client.endpoint(&["chat", "stream"]).unwrap().as_str(),
            "https://example.com/api/chat/stream"
        );

        let client = Client::new("https://example.com/api/").unwrap();
        assert_eq!(
            client.endpoint(&["config"]).unwrap().as_str(),
            "https://example.com/api/config"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let client = Client::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.endpoint(&["research", "a/b c"]).unwrap().as_str(),
            "http://localhost:8000/research/a%2Fb%20c"
        );
    }

    #[test]
    fn test_invalid_base_urls() {
        assert!(matches!(
            Client::new("not a url"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            Client::new("mailto:someone@example.com"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_timeout_only_from_config() {
        assert_eq!(Client::new("http://localhost:8000/api").unwrap().request_timeout, None);

        let client = Client::from_config(&ApiConfig {
            base_url: "http://localhost:8000/api".into(),
            timeout_secs: 7,
        })
        .unwrap();
        assert_eq!(client.request_timeout, Some(Duration::from_secs(7)));
    }
}
