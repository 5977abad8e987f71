use std::sync::Arc;

use serde_json::json;
use stableyard_core::validation::VetCheckForm;
use stableyard_core::{BodyCondition, Result, Role};
use stableyard_http::{Message, Request, Response};

use crate::AppState;
use crate::guard::{pass, role_required};
use crate::render::{redirect, render, rerender};

pub(crate) async fn horse_detail(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(role_required(&state, &request, Role::Veterinarian).await?);
	let horse = state.repo.find_horse(request.path_param("id")?).await?;
	let checks = state.repo.list_vet_checks(horse.id).await?;
	render(
		&visitor.session,
		"vet_horse_detail",
		json!({"horse": horse, "checks": checks}),
	)
}

pub(crate) async fn new_check(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(role_required(&state, &request, Role::Veterinarian).await?);
	let horse = state.repo.find_horse(request.path_param("id")?).await?;
	let context = json!({
		"horse": horse,
		"body_condition_scale": (BodyCondition::MIN..=BodyCondition::MAX).collect::<Vec<_>>(),
	});
	if !request.is_post() {
		return render(&visitor.session, "vet_check_form", context);
	}

	let form: VetCheckForm = request.form()?;
	let check = match form.validate(horse.id, visitor.user.id) {
		Ok(check) => check,
		Err(error) => return rerender(&visitor.session, "vet_check_form", context, error),
	};
	let check = state.repo.add_vet_check(check).await?;
	tracing::info!(
		horse = %horse.name,
		vet = %visitor.user.username,
		check_id = check.id,
		"veterinary check recorded"
	);
	redirect(
		&visitor.session,
		Message::success("Check recorded"),
		&format!("/vet/horse/{}/", horse.id),
	)
}
