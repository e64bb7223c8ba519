//! Reply stream decoder.
//!
//! Turns the provider's raw byte stream into typed
//! [`ExchangeEvent`]s. The framing is a sequence of newline-delimited
//! records, each either blank or `data: ` followed by a JSON object:
//! `{"content": "..."}` is a partial delta, `{"done": true, "metadata"?}`
//! is terminal. Unknown fields are ignored.
//!
//! The transport chunks bytes arbitrarily, so a logical record — or a
//! multi-byte character inside one — may span chunk boundaries. Bytes
//! are buffered until a full `\n`-terminated line is available, which
//! makes decoding invariant under re-chunking. A record whose JSON fails
//! to parse is dropped, not surfaced: one malformed frame must never
//! abort an otherwise healthy stream.

use bytes::Bytes;
use futures::Stream;
use haven_domain::{ExchangeEvent, ReplyMetadata};
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Wire shape of one JSON frame. Unknown fields are ignored by serde's
/// default behavior.
#[derive(Debug, Deserialize)]
struct ReplyFrame {
    content: Option<String>,
    done: Option<bool>,
    metadata: Option<ReplyMetadata>,
}

/// Decode one complete line into an event. `None` means the line carried
/// nothing actionable — blank, noise, or a malformed frame.
fn decode_line(line: &[u8]) -> Option<ExchangeEvent> {
    if line.is_empty() {
        return None;
    }
    let Ok(text) = std::str::from_utf8(line) else {
        debug!("dropping non-UTF-8 frame");
        return None;
    };
    let payload = text.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    let frame: ReplyFrame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(error) => {
            debug!("dropping malformed frame: {error}");
            return None;
        }
    };

    if let Some(content) = frame.content {
        return Some(ExchangeEvent::Delta(content));
    }
    if frame.done == Some(true) {
        return Some(ExchangeEvent::Done(frame.metadata));
    }
    None
}

/// Stream adapter decoding a chunked byte stream into exchange events.
///
/// Not restartable: the sequence ends on the terminal event or when the
/// underlying transport closes. A fresh request gets a fresh decoder.
pub struct ReplyFrameStream<S> {
    inner: S,
    buffer: Vec<u8>,
    done: bool,
}

impl<S> ReplyFrameStream<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Pop the next complete line (without its terminator) off the
    /// buffer, trimming a trailing `\r` for CRLF framing.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

impl<S, E> Stream for ReplyFrameStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<ExchangeEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            while let Some(line) = self.take_line() {
                if let Some(event) = decode_line(&line) {
                    if event.is_terminal() {
                        self.done = true;
                    }
                    return Poll::Ready(Some(Ok(event)));
                }
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(error))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    // Flush an unterminated trailing record.
                    if !self.buffer.is_empty() {
                        let mut tail = std::mem::take(&mut self.buffer);
                        if tail.last() == Some(&b'\r') {
                            tail.pop();
                        }
                        if let Some(event) = decode_line(&tail) {
                            return Poll::Ready(Some(Ok(event)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn byte_stream(
        chunks: Vec<Vec<u8>>,
    ) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    async fn decode_chunks(chunks: Vec<Vec<u8>>) -> Vec<ExchangeEvent> {
        let mut stream = ReplyFrameStream::new(byte_stream(chunks));
        let mut events = Vec::new();
        while let Some(item) = stream.next().await {
            events.push(item.unwrap());
        }
        events
    }

    fn delta(s: &str) -> ExchangeEvent {
        ExchangeEvent::Delta(s.to_string())
    }

    #[tokio::test]
    async fn decodes_deltas_and_terminal_frame() {
        let events = decode_chunks(vec![
            b"data: {\"content\":\"I \"}\n".to_vec(),
            b"data: {\"content\":\"hear you.\"}\n".to_vec(),
            b"data: {\"done\":true}\n".to_vec(),
        ])
        .await;

        assert_eq!(
            events,
            vec![delta("I "), delta("hear you."), ExchangeEvent::Done(None)]
        );
    }

    #[tokio::test]
    async fn chunk_boundaries_do_not_change_the_event_sequence() {
        let logical: &[u8] = b"data: {\"content\":\"I \"}\ndata: {\"content\":\"hear you.\"}\ndata: {\"done\":true}\n";

        let whole = decode_chunks(vec![logical.to_vec()]).await;

        // Split the same bytes at every offset; the decoded sequence
        // must be identical each time.
        for split in 1..logical.len() {
            let chunks = vec![logical[..split].to_vec(), logical[split..].to_vec()];
            assert_eq!(decode_chunks(chunks).await, whole, "split at {split}");
        }

        // Byte-at-a-time delivery too.
        let tiny: Vec<Vec<u8>> = logical.iter().map(|b| vec![*b]).collect();
        assert_eq!(decode_chunks(tiny).await, whole);
    }

    #[tokio::test]
    async fn multibyte_characters_survive_mid_character_splits() {
        let logical = "data: {\"content\":\"ここにいるよ\"}\ndata: {\"done\":true}\n".as_bytes();
        let whole = decode_chunks(vec![logical.to_vec()]).await;
        assert_eq!(whole[0], delta("ここにいるよ"));

        for split in 1..logical.len() {
            let chunks = vec![logical[..split].to_vec(), logical[split..].to_vec()];
            assert_eq!(decode_chunks(chunks).await, whole, "split at {split}");
        }
    }

    #[tokio::test]
    async fn malformed_frame_between_valid_frames_is_dropped() {
        let events = decode_chunks(vec![
            b"data: {\"content\":\"first\"}\n".to_vec(),
            b"data: {not json at all\n".to_vec(),
            b"data: {\"content\":\"second\"}\n".to_vec(),
        ])
        .await;

        // Exactly the two valid events, no error in between.
        assert_eq!(events, vec![delta("first"), delta("second")]);
    }

    #[tokio::test]
    async fn blank_lines_and_unknown_records_are_skipped() {
        let events = decode_chunks(vec![
            b"\n\ndata: {\"content\":\"a\"}\n".to_vec(),
            b": keepalive\n".to_vec(),
            b"data: {\"unknown\":1}\n".to_vec(),
            b"data: {\"done\":true}\n".to_vec(),
        ])
        .await;

        assert_eq!(events, vec![delta("a"), ExchangeEvent::Done(None)]);
    }

    #[tokio::test]
    async fn nothing_follows_the_terminal_event() {
        let events = decode_chunks(vec![
            b"data: {\"done\":true}\ndata: {\"content\":\"late\"}\n".to_vec(),
        ])
        .await;

        assert_eq!(events, vec![ExchangeEvent::Done(None)]);
    }

    #[tokio::test]
    async fn terminal_metadata_carries_the_crisis_flag() {
        let events = decode_chunks(vec![
            b"data: {\"done\":true,\"metadata\":{\"isCrisis\":true}}\n".to_vec(),
        ])
        .await;

        match &events[0] {
            ExchangeEvent::Done(Some(metadata)) => assert!(metadata.is_crisis),
            other => panic!("expected terminal metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn crlf_framing_is_accepted() {
        let events = decode_chunks(vec![
            b"data: {\"content\":\"a\"}\r\ndata: {\"done\":true}\r\n".to_vec(),
        ])
        .await;

        assert_eq!(events, vec![delta("a"), ExchangeEvent::Done(None)]);
    }

    #[tokio::test]
    async fn unterminated_trailing_record_is_flushed_on_close() {
        let events = decode_chunks(vec![b"data: {\"content\":\"tail\"}".to_vec()]).await;
        assert_eq!(events, vec![delta("tail")]);
    }

    #[tokio::test]
    async fn frame_with_content_wins_over_done_in_the_same_record() {
        // A frame carrying both fields is treated as a delta; the stream
        // then waits for a proper terminal record.
        let events = decode_chunks(vec![
            b"data: {\"content\":\"x\",\"done\":true}\ndata: {\"done\":true}\n".to_vec(),
        ])
        .await;
        assert_eq!(events, vec![delta("x"), ExchangeEvent::Done(None)]);
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let events = decode_chunks(vec![]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        #[derive(Debug)]
        struct Broken;
        let chunks: Vec<Result<Bytes, Broken>> = vec![
            Ok(Bytes::from_static(b"data: {\"content\":\"a\"}\n")),
            Err(Broken),
        ];
        let mut stream = ReplyFrameStream::new(futures::stream::iter(chunks));

        assert_eq!(stream.next().await.unwrap().unwrap(), delta("a"));
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
