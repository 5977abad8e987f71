//! Error type shared by every stableyard crate.
//!
//! Each variant carries the message that is shown to the user, so views can
//! surface it as a flash message without re-wording it.

use crate::schedule::{ClassAction, ClassStatus};

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	/// A submitted form failed validation.
	#[error("{0}")]
	Validation(String),

	/// The operation collides with existing state (double booking, duplicate record).
	#[error("{0}")]
	Conflict(String),

	/// A training class was asked to leave a terminal state.
	#[error("{}", transition_message(.from, .action))]
	InvalidTransition { from: ClassStatus, action: ClassAction },

	/// The acting user lacks the required role or ownership.
	#[error("{0}")]
	PermissionDenied(String),

	#[error("{0}")]
	Authentication(String),

	#[error("{0}")]
	NotFound(String),

	#[error("Database error: {0}")]
	Database(String),

	#[error("Configuration error: {0}")]
	Configuration(String),

	#[error("Serialization error: {0}")]
	Serialization(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

fn transition_message(from: &ClassStatus, action: &ClassAction) -> &'static str {
	from.rejection_message(*action)
}

impl Error {
	/// HTTP status code that best describes the error.
	pub fn status_code(&self) -> u16 {
		match self {
			Error::Validation(_) => 422,
			Error::Conflict(_) | Error::InvalidTransition { .. } => 409,
			Error::PermissionDenied(_) => 403,
			Error::Authentication(_) => 401,
			Error::NotFound(_) => 404,
			Error::Database(_)
			| Error::Configuration(_)
			| Error::Serialization(_)
			| Error::Internal(_) => 500,
		}
	}

	/// Whether the message is safe to show to an end user.
	///
	/// Server-side failures are logged in full but surfaced with a generic text.
	pub fn is_user_facing(&self) -> bool {
		self.status_code() < 500
	}

	/// Message suitable for a flash notification.
	pub fn user_message(&self) -> String {
		if self.is_user_facing() {
			self.to_string()
		} else {
			"Something went wrong. Please try again".to_string()
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Serialization(err.to_string())
	}
}
