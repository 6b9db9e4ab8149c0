use super::lines::LineDecoder;
use crate::backend::ByteStream;
use crate::errors::BackendError;
use futures::StreamExt;
use futures::stream::BoxStream;
use promptline_common::StreamEvent;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Buffer size of the channel returned by [`StreamDecoder::spawn`].
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

enum Read {
    Cancelled,
    Chunk(Result<Vec<u8>, BackendError>),
    End,
}

/// Decodes a live generation body into events.
///
/// Each read races against the cancellation token; a cancelled decode drops
/// the source without waiting for the next chunk. Exactly one terminal event
/// is produced, after which [`next_event`](Self::next_event) returns `None`.
pub struct StreamDecoder {
    source: Option<ByteStream>,
    cancel: CancellationToken,
    lines: LineDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(source: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            source: Some(source),
            cancel,
            lines: LineDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// A decoder that yields `event` and then ends. Used when a request fails
    /// before any body exists.
    pub fn failed(event: StreamEvent) -> Self {
        Self {
            source: None,
            cancel: CancellationToken::new(),
            lines: LineDecoder::new(),
            pending: VecDeque::from([event]),
            finished: true,
        }
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }

            let Some(source) = self.source.as_mut() else {
                let events = self.lines.finish();
                self.close(events);
                continue;
            };

            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Read::Cancelled,
                item = source.next() => match item {
                    Some(chunk) => Read::Chunk(chunk),
                    None => Read::End,
                },
            };

            match read {
                Read::Cancelled => {
                    debug!("generation cancelled, dropping response body");
                    let event = self.lines.cancel();
                    self.close(event);
                }
                Read::Chunk(Ok(bytes)) => {
                    let events = self.lines.push(&bytes);
                    self.pending.extend(events);
                    if self.lines.is_closed() {
                        self.close(None);
                    }
                }
                Read::Chunk(Err(e)) => {
                    warn!(error = %e, "response body read failed");
                    let event = self.lines.fail(e.to_string());
                    self.close(event);
                }
                Read::End => {
                    let events = self.lines.finish();
                    self.close(events);
                }
            }
        }
    }

    fn close(&mut self, events: impl IntoIterator<Item = StreamEvent>) {
        self.pending.extend(events);
        self.source = None;
        self.finished = true;
    }

    pub fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        futures::stream::unfold(self, |mut decoder| async move {
            decoder.next_event().await.map(|event| (event, decoder))
        })
        .boxed()
    }

    /// Run the decode on its own task. Decoding stops early if the receiver
    /// is dropped.
    pub fn spawn(mut self) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(event) = self.next_event().await {
                if tx.send(event).await.is_err() {
                    debug!("event receiver dropped, stopping decode");
                    break;
                }
            }
        });
        rx
    }

    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }
}
