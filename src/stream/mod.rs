//! Streaming progress channel (§4.4): a single FIFO queue of `think`/`url`
//! items drained by one serial consumer with naturalistic pacing, and a
//! preemption path that flushes immediately once the terminal answer is ready.

pub mod typing;

use crate::llm::Usage;
use crate::types::Reference;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use typing::naturalize;

/// What the HTTP layer actually emits, one per SSE event (or buffered-mode
/// accumulation step). Wire-shape mapping lives in `server::wire`.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    ThinkOpen,
    Think(String),
    Url(String),
    ThinkingEnd,
    Answer(AnswerChunk),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct AnswerChunk {
    pub text: String,
    pub usage: Usage,
    pub visited_urls: Vec<String>,
    pub read_urls: Vec<String>,
    pub num_urls: usize,
    pub references: Vec<Reference>,
}

enum Queued {
    Think(String),
    Url(String),
}

struct Inner {
    queue: parking_lot::Mutex<VecDeque<Queued>>,
    wake: Notify,
    drained: Notify,
    finalize_requested: AtomicBool,
    output_tx: mpsc::UnboundedSender<StreamChunk>,
}

/// Handle shared by every dispatch call site that wants to emit progress.
/// Cloning is cheap; all clones drive the same queue and consumer task.
#[derive(Clone)]
pub struct StreamChannel {
    inner: Arc<Inner>,
}

impl StreamChannel {
    /// Spawn the consumer task and return the channel handle plus the
    /// output stream the HTTP layer reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamChunk>) {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            queue: parking_lot::Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            drained: Notify::new(),
            finalize_requested: AtomicBool::new(false),
            output_tx,
        });

        let channel = Self { inner: inner.clone() };
        let _ = inner.output_tx.send(StreamChunk::ThinkOpen);
        tokio::spawn(run_consumer(inner));
        (channel, output_rx)
    }

    pub fn push_think(&self, text: impl Into<String>) {
        self.inner.queue.lock().push_back(Queued::Think(text.into()));
        self.inner.wake.notify_one();
    }

    /// Visit actions emit one `url` chunk per target, ahead of any think text.
    pub fn push_url(&self, url: impl Into<String>) {
        self.inner.queue.lock().push_back(Queued::Url(url.into()));
        self.inner.wake.notify_one();
    }

    /// Drain-and-finalize: flush whatever is in flight immediately, drop the
    /// rest of the queue unpaced, emit `ThinkingEnd`, then the final answer.
    /// `run_consumer` is the one that actually clears the queue, once it
    /// reaches the point between items where nothing is in flight.
    pub async fn finalize(&self, answer: AnswerChunk) {
        self.inner.finalize_requested.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
        self.inner.drained.notified().await;

        let _ = self.inner.output_tx.send(StreamChunk::ThinkingEnd);
        let _ = self.inner.output_tx.send(StreamChunk::Answer(answer));
    }

    /// Fatal error path (§7): a closing think marker then an error chunk.
    pub fn error(&self, message: impl Into<String>) {
        self.inner.finalize_requested.store(true, Ordering::SeqCst);
        let _ = self.inner.output_tx.send(StreamChunk::ThinkingEnd);
        let _ = self.inner.output_tx.send(StreamChunk::Error(message.into()));
    }
}

async fn run_consumer(inner: Arc<Inner>) {
    loop {
        // Check *before* starting a new queued item, not just mid-item:
        // finalize() only wants the item already in flight (if any) to
        // flush in full. Anything still sitting in the queue at this point
        // hasn't started and must be dropped, not flushed (§4.4).
        if inner.finalize_requested.load(Ordering::SeqCst) {
            inner.queue.lock().clear();
            inner.drained.notify_one();
            return;
        }

        let next = inner.queue.lock().pop_front();
        match next {
            Some(Queued::Url(url)) => {
                let _ = inner.output_tx.send(StreamChunk::Url(url));
            }
            Some(Queued::Think(text)) => {
                stream_think(&inner, text).await;
            }
            None => {
                inner.wake.notified().await;
            }
        }
    }
}

async fn stream_think(inner: &Arc<Inner>, text: String) {
    let fragments = naturalize(&text);
    for (idx, fragment) in fragments.iter().enumerate() {
        if inner.finalize_requested.load(Ordering::SeqCst) {
            let remaining: Vec<&str> = fragments[idx..].iter().map(|f| f.text.as_str()).collect();
            let _ = inner.output_tx.send(StreamChunk::Think(remaining.join(" ")));
            return;
        }
        tokio::time::sleep(fragment.delay).await;
        let _ = inner.output_tx.send(StreamChunk::Think(fragment.text.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_opening_think_marker_immediately() {
        let (_channel, mut rx) = StreamChannel::new();
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamChunk::ThinkOpen));
    }

    #[tokio::test]
    async fn url_chunks_are_emitted_ahead_of_think_text() {
        let (channel, mut rx) = StreamChannel::new();
        channel.push_url("https://example.com/a");
        channel.push_think("ok");

        assert!(matches!(rx.recv().await.unwrap(), StreamChunk::ThinkOpen));
        assert!(matches!(rx.recv().await.unwrap(), StreamChunk::Url(_)));
    }

    #[tokio::test]
    async fn finalize_emits_thinking_end_then_answer() {
        let (channel, mut rx) = StreamChannel::new();
        channel
            .finalize(AnswerChunk {
                text: "done".into(),
                usage: Usage::default(),
                visited_urls: vec![],
                read_urls: vec![],
                num_urls: 0,
                references: vec![],
            })
            .await;

        assert!(matches!(rx.recv().await.unwrap(), StreamChunk::ThinkOpen));
        assert!(matches!(rx.recv().await.unwrap(), StreamChunk::ThinkingEnd));
        match rx.recv().await.unwrap() {
            StreamChunk::Answer(answer) => assert_eq!(answer.text, "done"),
            other => panic!("expected answer chunk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unstarted_queue_items_are_dropped_once_finalize_is_requested() {
        // White-box: build the consumer's inner state directly so the
        // "finalize requested before this item started" case doesn't
        // depend on sleep timing.
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            queue: parking_lot::Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            drained: Notify::new(),
            finalize_requested: AtomicBool::new(true),
            output_tx,
        });
        inner.queue.lock().push_back(Queued::Think("never sent".to_string()));
        inner.queue.lock().push_back(Queued::Url("https://example.com".to_string()));

        run_consumer(inner.clone()).await;

        assert!(inner.queue.lock().is_empty());
        output_rx.close();
        assert!(output_rx.try_recv().is_err());
    }
}
