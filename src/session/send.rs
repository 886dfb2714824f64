//! Send flow: transcript bookkeeping around a chat request.

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::state::{ChatSession, SessionEvent};
use crate::{
    Client,
    error::{Error, Result},
    stream::{DecodedMessage, StreamUpdate},
    types::{ChatMessage, ChatOptions, ResearchReport},
};

impl ChatSession {
    /// Send `text` and record the exchange.
    ///
    /// Appends the user message, raises the typing flag, waits for the full
    /// reply and appends it as an assistant message. On failure the error is
    /// recorded on the session, the flag is lowered and the error returned.
    /// Blank input is ignored and yields `Ok(None)`.
    pub async fn send(
        &self,
        client: &Client,
        text: &str,
        options: &ChatOptions,
    ) -> Result<Option<ChatMessage>> {
        if !self.begin(text) {
            return Ok(None);
        }
        let result = client.chat().send_with_options(text, options).await;
        self.complete(result).map(Some)
    }

    /// Like [`send`](Self::send), but consumes the reply as it streams in.
    ///
    /// `on_update` sees every update in order and each text delta is also
    /// broadcast as [`SessionEvent::AssistantDelta`]. A transport error
    /// mid-stream discards the partial reply.
    pub async fn send_streaming<F>(
        &self,
        client: &Client,
        text: &str,
        options: &ChatOptions,
        mut on_update: F,
    ) -> Result<Option<ChatMessage>>
    where
        F: FnMut(&StreamUpdate),
    {
        if !self.begin(text) {
            return Ok(None);
        }

        let result = async {
            let mut updates = client.chat().stream(text, options).await?;
            let mut reply = DecodedMessage::default();
            while let Some(update) = updates.next().await {
                let update = update?;
                on_update(&update);
                if let StreamUpdate::Delta(delta) = &update {
                    self.notify(SessionEvent::AssistantDelta(delta.clone()));
                }
                reply.apply(&update);
            }
            Ok::<_, Error>(reply)
        }
        .await;

        self.complete(result).map(Some)
    }

    /// Fetch report `id` and make it the session's current research.
    ///
    /// A failed fetch is recorded as the session error and leaves the
    /// current report unchanged.
    pub async fn open_research(&self, client: &Client, id: &str) -> Result<ResearchReport> {
        self.clear_error();
        match client.research().get(id).await {
            Ok(report) => {
                debug!(
                    name: "session.research.opened",
                    session_id = %self.id(),
                    research_id = %report.id,
                    "Research report opened"
                );
                self.set_current_research(Some(report.clone()));
                Ok(report)
            }
            Err(e) => {
                warn!(
                    name: "session.research.failed",
                    session_id = %self.id(),
                    research_id = %id,
                    error = %e,
                    "Failed to open research report"
                );
                self.set_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Returns `false` when there is nothing to send.
    fn begin(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.clear_error();
        self.add_message(ChatMessage::user(text));
        self.set_typing(true);
        true
    }

    fn complete(&self, result: Result<DecodedMessage>) -> Result<ChatMessage> {
        match result {
            Ok(reply) => {
                if !reply.is_complete {
                    warn!(
                        name: "chat.response.incomplete",
                        session_id = %self.id(),
                        "Chat stream ended without a completion marker"
                    );
                }
                info!(
                    name: "chat.response.received",
                    session_id = %self.id(),
                    research_id = ?reply.correlation_id,
                    "Assistant reply recorded"
                );
                let message = ChatMessage::assistant(reply.content, reply.correlation_id);
                self.add_message(message.clone());
                self.set_typing(false);
                Ok(message)
            }
            Err(e) => {
                warn!(
                    name: "chat.request.failed",
                    session_id = %self.id(),
                    error = %e,
                    "Chat request failed"
                );
                self.set_typing(false);
                self.set_error(e.to_string());
                Err(e)
            }
        }
    }
}
