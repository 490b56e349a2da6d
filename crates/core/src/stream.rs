//! Streaming chunks and the callback pair a provider drives.

use crate::{CompletionMeta, ToolCall};
use serde::{Deserialize, Serialize};

/// One incremental piece of model output.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StreamChunk {
    /// Content delta, possibly empty
    #[serde(default)]
    pub content: String,

    /// Complete tool calls carried by this chunk
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl StreamChunk {
    /// A content-only chunk
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A tool-call-only chunk
    pub fn tool(calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls: calls,
        }
    }

    /// Whether the chunk carries nothing at all
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_calls.is_empty()
    }
}

/// Invoked for every chunk, zero or more times.
pub type OnChunk<'a> = Box<dyn FnMut(&StreamChunk) + Send + 'a>;

/// Invoked once with the final metadata.
pub type OnComplete<'a> = Box<dyn FnOnce(&CompletionMeta) + Send + 'a>;

/// The caller's half of a stream.
///
/// Providers report through [`chunk`](Self::chunk) and
/// [`complete`](Self::complete). `complete` consumes the completion
/// callback, so it fires at most once, and chunks reported after it are
/// dropped; callers always observe every chunk before the metadata.
#[derive(Default)]
pub struct StreamCallbacks<'a> {
    on_chunk: Option<OnChunk<'a>>,
    on_complete: Option<OnComplete<'a>>,
    completed: bool,
    recorded: bool,
}

impl<'a> StreamCallbacks<'a> {
    /// Callbacks that ignore everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk callback
    pub fn on_chunk(mut self, f: impl FnMut(&StreamChunk) + Send + 'a) -> Self {
        self.on_chunk = Some(Box::new(f));
        self
    }

    /// Set the completion callback
    pub fn on_complete(mut self, f: impl FnOnce(&CompletionMeta) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Mark the stream as already measured by a metrics decorator.
    pub fn recorded(mut self) -> Self {
        self.recorded = true;
        self
    }

    /// Whether an outer decorator already measures this stream
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// Whether `complete` has fired
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Report a chunk to the caller.
    pub fn chunk(&mut self, chunk: &StreamChunk) {
        if self.completed {
            tracing::trace!("dropping chunk reported after completion");
            return;
        }
        if let Some(f) = self.on_chunk.as_mut() {
            f(chunk);
        }
    }

    /// Report the final metadata. Later calls are no-ops.
    pub fn complete(&mut self, meta: &CompletionMeta) {
        if std::mem::replace(&mut self.completed, true) {
            return;
        }
        if let Some(f) = self.on_complete.take() {
            f(meta);
        }
    }

    /// Split into the raw callbacks, keeping nothing else.
    pub fn into_parts(self) -> (Option<OnChunk<'a>>, Option<OnComplete<'a>>) {
        (self.on_chunk, self.on_complete)
    }
}

impl std::fmt::Debug for StreamCallbacks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_chunk", &self.on_chunk.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("completed", &self.completed)
            .field("recorded", &self.recorded)
            .finish()
    }
}
