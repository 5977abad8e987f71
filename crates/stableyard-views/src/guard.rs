//! Login and role requirements shared by the views.

use stableyard_auth::AuthState;
use stableyard_core::{Result, Role, User};
use stableyard_http::{Message, Request, Response, Session, encode_query_value};

use crate::AppState;
use crate::render::redirect;

pub const NO_ACCESS: &str = "You do not have access to this section";

/// The logged-in user making the request.
pub(crate) struct Visitor {
	pub user: User,
	pub auth: AuthState,
	pub session: Session,
}

impl Visitor {
	/// Persists a changed [`AuthState`] back into the session.
	pub fn save_auth(&self) -> Result<()> {
		self.session.insert(AuthState::SESSION_KEY, &self.auth)
	}
}

/// Outcome of a guard: either the visitor or the response to send instead.
pub(crate) enum Gate {
	Pass(Visitor),
	Redirect(Response),
}

/// Unwraps a [`Gate`], returning its redirect from the calling view.
macro_rules! pass {
	($gate:expr) => {
		match $gate {
			$crate::guard::Gate::Pass(visitor) => visitor,
			$crate::guard::Gate::Redirect(response) => return Ok(response),
		}
	};
}
pub(crate) use pass;

/// Resolves the session's user. A session that names a deleted or
/// deactivated account is flushed.
pub(crate) async fn identify(state: &AppState, request: &Request) -> Result<Option<Visitor>> {
	let session = request.session()?;
	let Some(auth) = session.get::<AuthState>(AuthState::SESSION_KEY) else {
		return Ok(None);
	};
	match state.repo.find_user(auth.user_id).await {
		Ok(user) if user.is_active => Ok(Some(Visitor {
			user,
			auth,
			session,
		})),
		Ok(_) | Err(stableyard_core::Error::NotFound(_)) => {
			tracing::info!(user_id = auth.user_id, "dropping session of a missing or inactive user");
			session.flush();
			Ok(None)
		}
		Err(error) => Err(error),
	}
}

fn login_redirect(request: &Request) -> Response {
	Response::see_other(format!(
		"/login/?next={}",
		encode_query_value(&request.full_path())
	))
}

pub(crate) async fn login_required(state: &AppState, request: &Request) -> Result<Gate> {
	Ok(match identify(state, request).await? {
		Some(visitor) => Gate::Pass(visitor),
		None => Gate::Redirect(login_redirect(request)),
	})
}

/// Requires a logged-in user whose profile holds `role`.
pub(crate) async fn role_required(state: &AppState, request: &Request, role: Role) -> Result<Gate> {
	let visitor = match login_required(state, request).await? {
		Gate::Pass(visitor) => visitor,
		redirect => return Ok(redirect),
	};
	let holds = state
		.repo
		.find_profile(visitor.user.id)
		.await?
		.is_some_and(|profile| profile.roles.contains(role));
	if holds {
		return Ok(Gate::Pass(visitor));
	}
	tracing::info!(
		user = %visitor.user.username,
		role = role.as_str(),
		path = request.path(),
		"role required"
	);
	Ok(Gate::Redirect(redirect(
		&visitor.session,
		Message::error(NO_ACCESS),
		"/dashboard/",
	)?))
}
