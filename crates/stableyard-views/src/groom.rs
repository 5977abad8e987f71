//! The groom's horse page and daily care checklist.
//!
//! A horse gets at most one checklist per calendar day, counted in the
//! stable's configured zone.

use std::sync::Arc;

use serde_json::json;
use stableyard_core::validation::GroomChecklistForm;
use stableyard_core::{Error, Result, Role};
use stableyard_db::GROOM_TASK_EXISTS;
use stableyard_http::{Message, Request, Response};

use crate::AppState;
use crate::guard::{pass, role_required};
use crate::render::{redirect, render};

const CHECKLIST_ITEMS: [&str; 8] = [
	"hoof_cleaning",
	"horseshoe_check",
	"hoof_treatment",
	"oil_application",
	"shoeing_check",
	"medication",
	"wound_cleaning",
	"prescribed_exercises",
];

pub(crate) async fn horse_detail(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(role_required(&state, &request, Role::Groom).await?);
	let horse = state.repo.find_horse(request.path_param("id")?).await?;
	let checks = state.repo.list_vet_checks(horse.id).await?;
	let today = state.today();
	let task = state.repo.find_groom_task_on(horse.id, today).await?;
	render(
		&visitor.session,
		"groom_horse_detail",
		json!({"horse": horse, "checks": checks, "today": today, "task": task}),
	)
}

pub(crate) async fn checklist(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(role_required(&state, &request, Role::Groom).await?);
	let horse = state.repo.find_horse(request.path_param("id")?).await?;
	let detail = format!("/groom/horse/{}/", horse.id);
	let today = state.today();

	if state.repo.find_groom_task_on(horse.id, today).await?.is_some() {
		return redirect(&visitor.session, Message::warning(GROOM_TASK_EXISTS), &detail);
	}
	if !request.is_post() {
		return render(
			&visitor.session,
			"groom_checklist",
			json!({"horse": horse, "today": today, "items": CHECKLIST_ITEMS}),
		);
	}

	let form: GroomChecklistForm = request.form()?;
	match state
		.repo
		.add_groom_task(form.into_task(horse.id, visitor.user.id, today))
		.await
	{
		Ok(task) => {
			tracing::info!(
				horse = %horse.name,
				groom = %visitor.user.username,
				completed = task.checklist.completed_count(),
				"groom checklist recorded"
			);
			redirect(&visitor.session, Message::success("Tasks recorded"), &detail)
		}
		// Another submission for the same day won the race
		Err(Error::Conflict(message)) => {
			redirect(&visitor.session, Message::warning(message), &detail)
		}
		Err(error) => Err(error),
	}
}
