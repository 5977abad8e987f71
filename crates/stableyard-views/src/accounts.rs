//! Landing page, sign-up, login/logout, the dashboard and role switching.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::json;
use stableyard_auth::{AuthState, authenticate, register as register_account};
use stableyard_core::validation::{LoginForm, RegistrationForm};
use stableyard_core::{Result, Role, RoleInfo, RoleSet, User};
use stableyard_http::{Message, Request, Response, Session};

use crate::AppState;
use crate::guard::{identify, login_required, pass};
use crate::render::{redirect, render, rerender};

const DASHBOARD: &str = "/dashboard/";

pub const NO_ROLE_ACCESS: &str = "You do not have access to this role";

/// Stores the user in the session under a fresh session id.
fn log_in(session: &Session, user: &User) -> Result<()> {
	session.cycle();
	session.insert(AuthState::SESSION_KEY, AuthState::for_user(user))?;
	tracing::info!(user = %user.username, "logged in");
	Ok(())
}

/// Accepts only same-site paths as a post-login target.
fn safe_next(next: Option<String>) -> Option<String> {
	next.filter(|next| {
		next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
	})
}

pub(crate) async fn home(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = identify(&state, &request).await?;
	let session = request.session()?;
	render(
		&session,
		"home",
		json!({
			"authenticated": visitor.is_some(),
			"user": visitor.as_ref().map(|v| &v.user),
		}),
	)
}

pub(crate) async fn register(state: Arc<AppState>, request: Request) -> Result<Response> {
	if identify(&state, &request).await?.is_some() {
		return Ok(Response::see_other(DASHBOARD));
	}
	let session = request.session()?;
	if !request.is_post() {
		return render(&session, "register", json!({}));
	}

	let form: RegistrationForm = request.form()?;
	let context = json!({"name": form.name, "username": form.username});
	let registration = match form.validate() {
		Ok(registration) => registration,
		Err(error) => return rerender(&session, "register", context, error),
	};
	let user = match register_account(state.repo.as_ref(), &state.hasher, &registration).await {
		Ok(user) => user,
		Err(error) => return rerender(&session, "register", context, error),
	};

	log_in(&session, &user)?;
	redirect(
		&session,
		Message::success(format!(
			"Welcome {}! Your account has been created",
			registration.name
		)),
		DASHBOARD,
	)
}

pub(crate) async fn login(state: Arc<AppState>, request: Request) -> Result<Response> {
	if identify(&state, &request).await?.is_some() {
		return Ok(Response::see_other(DASHBOARD));
	}
	let session = request.session()?;
	let next = safe_next(request.query("next"));
	if !request.is_post() {
		return render(&session, "login", json!({"next": next}));
	}

	let form: LoginForm = request.form()?;
	let context = json!({"username": form.username, "next": next});
	let (username, password) = match form.credentials() {
		Ok(credentials) => credentials,
		Err(error) => return rerender(&session, "login", context, error),
	};
	let user = match authenticate(
		state.repo.as_ref(),
		&state.hasher,
		username,
		password,
	)
	.await
	{
		Ok(user) => user,
		Err(error) => return rerender(&session, "login", context, error),
	};

	log_in(&session, &user)?;
	redirect(
		&session,
		Message::success(format!("Welcome back {}!", user.display_name())),
		next.as_deref().unwrap_or(DASHBOARD),
	)
}

pub(crate) async fn logout(state: Arc<AppState>, request: Request) -> Result<Response> {
	if !request.is_post() {
		return Ok(Response::see_other("/"));
	}
	let Some(visitor) = identify(&state, &request).await? else {
		return Ok(Response::see_other("/"));
	};
	visitor.session.flush();
	tracing::info!(user = %visitor.user.username, "logged out");
	redirect(
		&visitor.session,
		Message::success(format!(
			"See you soon {}. You have been logged out",
			visitor.user.display_name()
		)),
		"/",
	)
}

pub(crate) async fn dashboard(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(login_required(&state, &request).await?);
	let (profile, created) = state
		.repo
		.get_or_create_profile(visitor.user.id, RoleSet::single(Role::Client))
		.await?;
	if created {
		tracing::info!(user = %visitor.user.username, "created missing profile");
	}

	let active = visitor.auth.active_role;
	let mut context = json!({
		"user": visitor.user,
		"profile": profile,
		"roles": profile.roles.iter().map(RoleInfo::from).collect::<Vec<_>>(),
		"active_role": RoleInfo::from(active),
	});
	if active.works_with_horses() {
		let search = request.query("search").unwrap_or_default();
		let term = search.trim();
		let horses = state
			.repo
			.list_horses((!term.is_empty()).then_some(term), true)
			.await?;
		context["horses"] = json!(horses);
		context["search"] = json!(search);
	}
	render(&visitor.session, &format!("dashboard_{}", active.as_str()), context)
}

pub(crate) async fn switch_role(state: Arc<AppState>, request: Request) -> Result<Response> {
	let mut visitor = pass!(login_required(&state, &request).await?);
	let requested = request
		.path_params
		.get("role")
		.and_then(|slug| Role::from_str(slug).ok());
	let profile = state.repo.find_profile(visitor.user.id).await?;

	match (requested, profile) {
		(Some(role), Some(profile)) if profile.roles.contains(role) => {
			visitor.auth.active_role = role;
			visitor.save_auth()?;
			redirect(
				&visitor.session,
				Message::success(format!("View switched to {}", role.display_name())),
				DASHBOARD,
			)
		}
		_ => redirect(&visitor.session, Message::error(NO_ROLE_ACCESS), DASHBOARD),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Some("/vet/horse/3/"), Some("/vet/horse/3/"))]
	#[case(Some("/trainer/classes/?filter=pending"), Some("/trainer/classes/?filter=pending"))]
	#[case(Some("//evil.example/"), None)]
	#[case(Some("https://evil.example/"), None)]
	#[case(Some("/\\evil.example"), None)]
	#[case(None, None)]
	fn test_safe_next(#[case] next: Option<&str>, #[case] expected: Option<&str>) {
		assert_eq!(
			safe_next(next.map(str::to_string)).as_deref(),
			expected
		);
	}
}
