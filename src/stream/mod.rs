//! Decoding of the chat endpoint's Server-Sent-Events body.
//!
//! The backend answers `POST /chat/stream` with lines of the form
//!
//! ```text
//! data: {"content":"Hello ","researchId":"r1"}
//! data: [DONE]
//! ```
//!
//! Only `data: ` lines matter. Each JSON payload contributes its `content`
//! to the running message and may carry a `researchId` that identifies the
//! report produced by the exchange. `[DONE]` ends the stream.
//!
//! Malformed frames are skipped rather than reported: the stream is treated
//! as best effort and a single broken frame must not lose the whole answer.
//!
//! # Example
//!
//! ```rust
//! use bulldozer_client::stream::decode;
//!
//! let msg = decode("data: {\"content\":\"Hi\",\"researchId\":\"r1\"}\ndata: [DONE]\n");
//! assert_eq!(msg.content, "Hi");
//! assert_eq!(msg.correlation_id.as_deref(), Some("r1"));
//! assert!(msg.is_complete);
//! ```

mod decoder;
mod frame;

pub use decoder::{DecodedMessage, StreamDecoder, StreamUpdate, decode};
pub use frame::{DATA_PREFIX, DONE_SENTINEL, StreamFrame};

use futures::{Stream, StreamExt};

/// Decode a byte stream as it arrives.
///
/// Yields updates in arrival order and stops after [`StreamUpdate::Done`]
/// without polling the source any further. A transport error ends the
/// stream after being yielded.
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamUpdate, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::try_stream! {
        let mut decoder = StreamDecoder::new();

        futures::pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for update in decoder.push(chunk.as_ref()) {
                yield update;
            }
            if decoder.is_complete() {
                break;
            }
        }

        for update in decoder.flush() {
            yield update;
        }
    }
}
