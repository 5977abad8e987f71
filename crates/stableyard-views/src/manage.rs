//! Administrator pages: user accounts, role assignment and the horse registry.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Value, json};
use stableyard_auth::{create_account, hash_password};
use stableyard_core::validation::{HorseForm, UserCreateForm, UserEditForm};
use stableyard_core::{Error, HorseData, Result, Role, RoleInfo, RoleSet, UserUpdate};
use stableyard_http::{Message, Request, Response};

use crate::AppState;
use crate::guard::{Visitor, pass, role_required};
use crate::render::{redirect, render, rerender};

const USERS: &str = "/manage/users/";
const HORSES: &str = "/manage/horses/";

pub const CANNOT_DELETE_SELF: &str = "You cannot delete yourself";

async fn admin(state: &AppState, request: &Request) -> Result<crate::guard::Gate> {
	role_required(state, request, Role::Administrator).await
}

fn search_term(request: &Request) -> (String, Option<String>) {
	let search = request.query("search").unwrap_or_default();
	let term = Some(search.trim().to_string()).filter(|term| !term.is_empty());
	(search, term)
}

pub(crate) async fn users(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	let (search, term) = search_term(&request);
	let users = state.repo.list_users(term.as_deref()).await?;
	render(
		&visitor.session,
		"manage_users",
		json!({"users": users, "search": search}),
	)
}

pub(crate) async fn user_create(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	if !request.is_post() {
		return render(&visitor.session, "manage_user_form", json!({"editing": false}));
	}

	let form: UserCreateForm = request.form()?;
	let context = json!({
		"editing": false,
		"username": form.username,
		"name": form.name,
		"email": form.email,
	});
	let (username, password) = match form.required() {
		Ok(required) => required,
		Err(error) => return rerender(&visitor.session, "manage_user_form", context, error),
	};
	// Accounts made here start without roles; the administrator assigns them next
	let user = match create_account(
		state.repo.as_ref(),
		&state.hasher,
		username,
		password,
		&form.name(),
		&form.email(),
		RoleSet::empty(),
	)
	.await
	{
		Ok(user) => user,
		Err(error) => return rerender(&visitor.session, "manage_user_form", context, error),
	};
	tracing::info!(admin = %visitor.user.username, user = %user.username, "user created");
	redirect(
		&visitor.session,
		Message::success(format!("User {} created", user.username)),
		USERS,
	)
}

pub(crate) async fn user_edit(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	let user = state.repo.find_user(request.path_param("id")?).await?;
	state
		.repo
		.get_or_create_profile(user.id, RoleSet::empty())
		.await?;
	if !request.is_post() {
		return render(
			&visitor.session,
			"manage_user_form",
			json!({"editing": true, "user": user}),
		);
	}

	let form: UserEditForm = request.form()?;
	let password_hash = match form.new_password() {
		Some(password) => Some(hash_password(&state.hasher, password).await?),
		None => None,
	};
	let user = state
		.repo
		.update_user(
			user.id,
			UserUpdate {
				first_name: form.name(),
				email: form.email(),
				password_hash,
			},
		)
		.await?;
	redirect(
		&visitor.session,
		Message::success(format!("User {} updated", user.username)),
		USERS,
	)
}

pub(crate) async fn user_delete(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	let user = state.repo.find_user(request.path_param("id")?).await?;
	if user.id == visitor.user.id {
		return redirect(&visitor.session, Message::error(CANNOT_DELETE_SELF), USERS);
	}
	if !request.is_post() {
		return render(&visitor.session, "manage_user_delete", json!({"user": user}));
	}

	state.repo.delete_user(user.id).await?;
	tracing::info!(admin = %visitor.user.username, user = %user.username, "user deleted");
	redirect(
		&visitor.session,
		Message::success(format!("User {} deleted", user.username)),
		USERS,
	)
}

fn all_roles() -> Vec<RoleInfo> {
	Role::ALL.into_iter().map(RoleInfo::from).collect()
}

pub(crate) async fn user_roles(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	let user = state.repo.find_user(request.path_param("id")?).await?;
	let (profile, _) = state
		.repo
		.get_or_create_profile(user.id, RoleSet::empty())
		.await?;
	let context = json!({"user": user, "profile": profile, "all_roles": all_roles()});
	if !request.is_post() {
		return render(&visitor.session, "manage_user_roles", context);
	}

	let roles = match request
		.form_values("roles")?
		.iter()
		.map(|slug| {
			Role::from_str(slug).map_err(|_| Error::Validation(format!("Unknown role: {}", slug)))
		})
		.collect::<Result<RoleSet>>()
	{
		Ok(roles) => roles,
		Err(error) => return rerender(&visitor.session, "manage_user_roles", context, error),
	};
	state.repo.set_roles(user.id, roles).await?;
	tracing::info!(
		admin = %visitor.user.username,
		user = %user.username,
		roles = ?roles.iter().map(Role::as_str).collect::<Vec<_>>(),
		"roles replaced"
	);
	redirect(
		&visitor.session,
		Message::success(format!("Roles of {} updated", user.username)),
		USERS,
	)
}

pub(crate) async fn horses(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	let (search, term) = search_term(&request);
	let horses = state.repo.list_horses(term.as_deref(), false).await?;
	render(
		&visitor.session,
		"manage_horses",
		json!({"horses": horses, "search": search}),
	)
}

/// Validates the horse form, including that the chosen owner exists.
async fn horse_data(state: &AppState, form: &HorseForm, creating: bool) -> Result<HorseData> {
	let data = form.validate(creating)?;
	match state.repo.find_user(data.owner_id).await {
		Ok(_) => Ok(data),
		Err(Error::NotFound(_)) => Err(Error::Validation(
			"The selected owner does not exist".to_string(),
		)),
		Err(error) => Err(error),
	}
}

async fn horse_form_context(state: &AppState, extra: Value) -> Result<Value> {
	let mut context = json!({"owners": state.repo.list_users(None).await?});
	if let (Some(context), Value::Object(extra)) = (context.as_object_mut(), extra) {
		context.extend(extra);
	}
	Ok(context)
}

pub(crate) async fn horse_create(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	if !request.is_post() {
		let context = horse_form_context(&state, json!({"editing": false})).await?;
		return render(&visitor.session, "manage_horse_form", context);
	}

	let form: HorseForm = request.form()?;
	let data = match horse_data(&state, &form, true).await {
		Ok(data) => data,
		Err(error) => {
			let context = horse_form_context(
				&state,
				json!({
					"editing": false,
					"name": form.name,
					"breed": form.breed,
					"age": form.age,
					"color": form.color,
					"owner": form.owner,
				}),
			)
			.await?;
			return rerender(&visitor.session, "manage_horse_form", context, error);
		}
	};
	let horse = state.repo.create_horse(data).await?;
	log_horse_change(&visitor, horse.id, "created");
	redirect(
		&visitor.session,
		Message::success(format!("Horse {} created", horse.name)),
		HORSES,
	)
}

pub(crate) async fn horse_edit(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	let horse = state.repo.find_horse(request.path_param("id")?).await?;
	if !request.is_post() {
		let context = horse_form_context(&state, json!({"editing": true, "horse": horse})).await?;
		return render(&visitor.session, "manage_horse_form", context);
	}

	let form: HorseForm = request.form()?;
	let data = match horse_data(&state, &form, false).await {
		Ok(data) => data,
		Err(error) => {
			let context =
				horse_form_context(&state, json!({"editing": true, "horse": horse})).await?;
			return rerender(&visitor.session, "manage_horse_form", context, error);
		}
	};
	let horse = state.repo.update_horse(horse.id, data).await?;
	log_horse_change(&visitor, horse.id, "updated");
	redirect(
		&visitor.session,
		Message::success(format!("Horse {} updated", horse.name)),
		HORSES,
	)
}

pub(crate) async fn horse_delete(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	let horse = state.repo.find_horse(request.path_param("id")?).await?;
	if !request.is_post() {
		return render(&visitor.session, "manage_horse_delete", json!({"horse": horse}));
	}

	let horse = state.repo.delete_horse(horse.id).await?;
	log_horse_change(&visitor, horse.id, "deleted");
	redirect(
		&visitor.session,
		Message::success(format!("Horse {} deleted", horse.name)),
		HORSES,
	)
}

pub(crate) async fn horse_history(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(admin(&state, &request).await?);
	let horse = state.repo.find_horse(request.path_param("id")?).await?;
	let checks = state.repo.list_vet_checks(horse.id).await?;
	let tasks = state.repo.list_groom_tasks(horse.id).await?;
	render(
		&visitor.session,
		"manage_horse_history",
		json!({"horse": horse, "checks": checks, "tasks": tasks}),
	)
}

fn log_horse_change(visitor: &Visitor, horse_id: i64, action: &str) {
	tracing::info!(admin = %visitor.user.username, horse_id, action, "horse registry changed");
}
