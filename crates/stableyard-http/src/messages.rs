//! One-time flash messages kept in the session.
//!
//! A view queues a message before redirecting; the next page that renders
//! takes every queued message and shows it once.

use serde::{Deserialize, Serialize};
use stableyard_core::Result;

use crate::Session;

const MESSAGES_KEY: &str = "_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
	Debug,
	Info,
	Success,
	Warning,
	Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub level: MessageLevel,
	pub text: String,
}

impl Message {
	/// # Examples
	///
	/// ```
	/// use stableyard_http::{Message, MessageLevel};
	///
	/// let msg = Message::success("Horse saved");
	/// assert_eq!(msg.level, MessageLevel::Success);
	/// ```
	pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
		Self {
			level,
			text: text.into(),
		}
	}

	pub fn debug(text: impl Into<String>) -> Self {
		Self::new(MessageLevel::Debug, text)
	}

	pub fn info(text: impl Into<String>) -> Self {
		Self::new(MessageLevel::Info, text)
	}

	pub fn success(text: impl Into<String>) -> Self {
		Self::new(MessageLevel::Success, text)
	}

	pub fn warning(text: impl Into<String>) -> Self {
		Self::new(MessageLevel::Warning, text)
	}

	pub fn error(text: impl Into<String>) -> Self {
		Self::new(MessageLevel::Error, text)
	}
}

impl Session {
	/// Queues a message for the next rendered page.
	pub fn add_message(&self, message: Message) -> Result<()> {
		let mut queued = self.peek_messages();
		queued.push(message);
		self.insert(MESSAGES_KEY, queued)
	}

	/// Removes and returns every queued message.
	pub fn take_messages(&self) -> Vec<Message> {
		self.remove(MESSAGES_KEY)
			.and_then(|value| serde_json::from_value(value).ok())
			.unwrap_or_default()
	}

	pub fn peek_messages(&self) -> Vec<Message> {
		self.get(MESSAGES_KEY).unwrap_or_default()
	}
}
