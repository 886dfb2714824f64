//! Line-level framing of the chat stream.

use serde::Deserialize;

/// Prefix marking a significant line. Matched literally, space included.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One unit of the chat stream wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A text fragment to append, optionally tagged with a research id.
    Content {
        content: String,
        correlation_id: Option<String>,
    },
    /// End of stream.
    Done,
}

#[derive(Deserialize)]
struct ContentPayload {
    content: String,
    #[serde(rename = "researchId", default)]
    research_id: Option<String>,
}

impl StreamFrame {
    /// Parse a single line (without its terminator).
    ///
    /// Returns `None` for lines that carry no frame (anything not starting
    /// with [`DATA_PREFIX`]) and `Some(Err(_))` for a `data: ` line whose
    /// payload is not a JSON object with a string `content` field.
    pub fn parse_line(line: &str) -> Option<Result<Self, serde_json::Error>> {
        let payload = line.strip_prefix(DATA_PREFIX)?;
        if payload == DONE_SENTINEL {
            return Some(Ok(Self::Done));
        }
        Some(Self::parse_payload(payload))
    }

    fn parse_payload(payload: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("frame payload is not a JSON object"));
        }
        let parsed: ContentPayload = serde_json::from_value(value)?;
        Ok(Self::Content {
            content: parsed.content,
            correlation_id: parsed.research_id,
        })
    }

    /// Render this frame as a `data: ` line, terminator included.
    pub fn to_line(&self) -> String {
        match self {
            Self::Done => format!("{DATA_PREFIX}{DONE_SENTINEL}\n"),
            Self::Content {
                content,
                correlation_id,
            } => {
                let json = match correlation_id {
                    Some(id) => serde_json::json!({ "content": content, "researchId": id }),
                    None => serde_json::json!({ "content": content }),
                };
                format!("{DATA_PREFIX}{json}\n")
            }
        }
    }
}
