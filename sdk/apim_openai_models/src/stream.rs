//! Server-Sent Events decoding for streamed chat completions.
//!
//! The service sends one `data: <json>` line per chunk, separated by blank
//! lines, and ends with `data: [DONE]`. Other SSE fields (`event:`, `id:`,
//! comments) are ignored.

use apim_openai_core::error::{GatewayError, GatewayResult};
use apim_openai_core::models::Usage;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;

/// Stream of decoded chunks returned by [`crate::chat::complete_stream`].
pub type ChatCompletionStream = BoxStream<'static, GatewayResult<ChatCompletionChunk>>;

const DONE_MARKER: &[u8] = b"[DONE]";

/// One fragment of a streamed chat completion.
///
/// Azure sends a leading chunk with empty `choices` that only carries
/// content filter results, so identifying fields default to empty.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Only present on the final chunk, and only when the service reports it.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    /// Non-empty delta text of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Error { error: ApiErrorBody },
    Chunk(Box<ChatCompletionChunk>),
}

#[derive(Debug)]
enum Frame {
    Chunk(ChatCompletionChunk),
    Done,
}

/// Incremental line splitter over the response body.
#[derive(Debug, Default)]
struct SseDecoder {
    buf: BytesMut,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next frame from the complete lines buffered so far.
    fn next_frame(&mut self) -> Option<GatewayResult<Frame>> {
        while let Some(pos) = memchr::memchr(b'\n', &self.buf) {
            let line = self.buf.split_to(pos + 1);
            if let Some(frame) = parse_line(&line[..pos]) {
                return Some(frame);
            }
        }
        None
    }

    /// Flush a trailing line that arrived without a newline.
    fn finish(&mut self) -> Option<GatewayResult<Frame>> {
        if self.buf.is_empty() {
            return None;
        }
        let line = self.buf.split();
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<GatewayResult<Frame>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let data = line.strip_prefix(b"data:")?;
    let data = data.strip_prefix(b" ").unwrap_or(data);

    if data.is_empty() {
        return None;
    }
    if data == DONE_MARKER {
        return Some(Ok(Frame::Done));
    }

    let frame = match serde_json::from_slice::<Payload>(data) {
        Ok(Payload::Chunk(chunk)) => Ok(Frame::Chunk(*chunk)),
        Ok(Payload::Error { error }) => Err(GatewayError::Api {
            code: error.code.unwrap_or_else(|| "unknown".into()),
            message: error.message.unwrap_or_default(),
        }),
        Err(e) => Err(GatewayError::Stream(format!("invalid chunk: {e}"))),
    };
    Some(frame)
}

struct DecodeState {
    body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    decoder: SseDecoder,
    finished: bool,
}

/// Decode an SSE byte stream into chat completion chunks.
///
/// The stream ends at `[DONE]`, at the end of the body, or right after the
/// first error.
pub fn decode_sse<S>(body: S) -> ChatCompletionStream
where
    S: futures::Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = DecodeState {
        body: body.boxed(),
        decoder: SseDecoder::default(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(frame) = state.decoder.next_frame() {
                match frame {
                    Ok(Frame::Chunk(chunk)) => return Some((Ok(chunk), state)),
                    Ok(Frame::Done) => {
                        tracing::trace!("stream terminated by [DONE]");
                        return None;
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }

            match state.body.next().await {
                Some(Ok(bytes)) => state.decoder.push(&bytes),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(GatewayError::Request(e)), state));
                }
                None => {
                    state.finished = true;
                    tracing::trace!("stream ended without [DONE]");
                    return match state.decoder.finish() {
                        Some(Ok(Frame::Chunk(chunk))) => Some((Ok(chunk), state)),
                        Some(Err(e)) => Some((Err(e), state)),
                        Some(Ok(Frame::Done)) | None => None,
                    };
                }
            }
        }
    })
    .boxed()
}
