//! Streaming chat request

use crate::{Host, Message, Tool};
use std::sync::Arc;

/// One chat exchange aimed at one host.
///
/// The host is shared, not owned: configuration owns the record and every
/// request points at it.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Target host
    pub host: Arc<Host>,

    /// Model name as the backend knows it
    pub model: String,

    /// Message history
    pub messages: Vec<Message>,

    /// Tools the model may call
    pub tools: Vec<Tool>,
}

impl StreamRequest {
    /// Create a request with an empty history
    pub fn new(host: Arc<Host>, model: impl Into<String>) -> Self {
        Self {
            host,
            model: model.into(),
            messages: Vec::new(),
            tools: Vec::new(),
        }
    }

    /// Append a message to the history
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Offer a tool to the model
    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }
}
