//! Page contexts and post-redirect responses.
//!
//! Every page is answered as a JSON document:
//!
//! ```json
//! {"page": "client_bookings", "messages": [{"level": "success", "text": "Booking created"}], "context": {...}}
//! ```

use serde::Serialize;
use serde_json::Value;
use stableyard_core::{Error, Result};
use stableyard_http::{Message, Response, Session, StatusCode};

#[derive(Debug, Serialize)]
struct Page<'a> {
	page: &'a str,
	messages: Vec<Message>,
	context: Value,
}

fn page(
	session: &Session,
	name: &str,
	context: Value,
	status: StatusCode,
	extra: Option<Message>,
) -> Result<Response> {
	let mut messages = session.take_messages();
	messages.extend(extra);
	Response::new(status).with_json(&Page {
		page: name,
		messages,
		context,
	})
}

/// Renders a page and consumes the queued flash messages.
pub(crate) fn render(session: &Session, name: &str, context: Value) -> Result<Response> {
	page(session, name, context, StatusCode::OK, None)
}

/// Re-renders a form page with the error shown to the user.
///
/// Only errors the user can fix on the form are rendered; anything else
/// (missing records, server failures) is returned for the router to answer.
pub(crate) fn rerender(
	session: &Session,
	name: &str,
	context: Value,
	error: Error,
) -> Result<Response> {
	if !matches!(error.status_code(), 401 | 409 | 422) {
		return Err(error);
	}
	let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
	page(
		session,
		name,
		context,
		status,
		Some(Message::error(error.to_string())),
	)
}

/// Queues `message` and answers `303 See Other`.
pub(crate) fn redirect(session: &Session, message: Message, location: &str) -> Result<Response> {
	session.add_message(message)?;
	Ok(Response::see_other(location))
}
