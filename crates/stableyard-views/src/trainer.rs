//! The trainer's class list and the pending-class actions.
//!
//! Every action first checks that the class belongs to the trainer (another
//! trainer's class is a 404) and that it is still pending. A class that was
//! already processed sends the trainer back to the list with the reason.

use std::sync::Arc;

use serde_json::json;
use stableyard_core::validation::{CompleteForm, RescheduleForm};
use stableyard_core::{ClassAction, ClassFilter, Error, Result, Role, TrainingClass};
use stableyard_http::{Message, Request, Response};

use crate::AppState;
use crate::guard::{Gate, Visitor, pass, role_required};
use crate::render::{redirect, render, rerender};

const CLASSES: &str = "/trainer/classes/";

async fn trainer(state: &AppState, request: &Request) -> Result<Gate> {
	role_required(state, request, Role::Trainer).await
}

pub(crate) async fn classes(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(trainer(&state, &request).await?);
	let filter = ClassFilter::parse(request.query("filter").as_deref());
	let classes = state
		.repo
		.list_trainer_classes(visitor.user.id, filter)
		.await?;
	render(
		&visitor.session,
		"trainer_classes",
		json!({"classes": classes, "filter": filter}),
	)
}

/// Loads the class named in the path, hiding classes of other trainers.
async fn own_class(state: &AppState, request: &Request, visitor: &Visitor) -> Result<TrainingClass> {
	let class = state.repo.find_class(request.path_param("id")?).await?;
	if class.trainer_id != visitor.user.id {
		return Err(Error::NotFound(format!("Training class {} not found", class.id)));
	}
	Ok(class)
}

/// Sends the trainer back to the list when `action` is not allowed anymore.
fn rejected(visitor: &Visitor, class: &TrainingClass, action: ClassAction) -> Result<Option<Response>> {
	match class.status.transition(action) {
		Ok(_) => Ok(None),
		Err(error) => {
			tracing::debug!(class_id = class.id, status = %class.status, ?action, "action rejected");
			redirect(&visitor.session, Message::error(error.to_string()), CLASSES).map(Some)
		}
	}
}

/// Answers a transition the store refused, e.g. after a concurrent update.
fn lost_race(visitor: &Visitor, result: Result<TrainingClass>, success: &str) -> Result<Response> {
	match result {
		Ok(_) => redirect(&visitor.session, Message::success(success), CLASSES),
		Err(error @ Error::InvalidTransition { .. }) => {
			redirect(&visitor.session, Message::error(error.to_string()), CLASSES)
		}
		Err(error) => Err(error),
	}
}

pub(crate) async fn complete(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(trainer(&state, &request).await?);
	let class = own_class(&state, &request, &visitor).await?;
	if let Some(response) = rejected(&visitor, &class, ClassAction::Complete)? {
		return Ok(response);
	}
	if !request.is_post() {
		return render(&visitor.session, "trainer_complete", json!({"class": class}));
	}

	let form: CompleteForm = request.form()?;
	let result = state.repo.complete_class(class.id, form.observations).await;
	if result.is_ok() {
		tracing::info!(class_id = class.id, trainer = %visitor.user.username, "class completed");
	}
	lost_race(&visitor, result, "Class marked as completed")
}

pub(crate) async fn cancel(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(trainer(&state, &request).await?);
	let class = own_class(&state, &request, &visitor).await?;
	if let Some(response) = rejected(&visitor, &class, ClassAction::Cancel)? {
		return Ok(response);
	}
	if !request.is_post() {
		return render(&visitor.session, "trainer_cancel", json!({"class": class}));
	}

	let result = state.repo.cancel_class(class.id).await;
	if result.is_ok() {
		tracing::info!(class_id = class.id, trainer = %visitor.user.username, "class cancelled");
	}
	lost_race(&visitor, result, "Class cancelled")
}

pub(crate) async fn reschedule(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(trainer(&state, &request).await?);
	let class = own_class(&state, &request, &visitor).await?;
	if let Some(response) = rejected(&visitor, &class, ClassAction::Reschedule)? {
		return Ok(response);
	}
	if !request.is_post() {
		return render(&visitor.session, "trainer_reschedule", json!({"class": class}));
	}

	let form: RescheduleForm = request.form()?;
	let context = json!({
		"class": class,
		"date": form.date,
		"start": form.start,
		"end": form.end,
	});
	let reschedule = match form.validate() {
		Ok(reschedule) => reschedule,
		Err(error) => return rerender(&visitor.session, "trainer_reschedule", context, error),
	};
	match state.repo.reschedule_class(class.id, reschedule).await {
		Ok(moved) => {
			tracing::info!(
				class_id = moved.id,
				date = %moved.date,
				slot = %moved.slot,
				"class rescheduled"
			);
			redirect(&visitor.session, Message::success("Class rescheduled"), CLASSES)
		}
		Err(error @ Error::InvalidTransition { .. }) => {
			redirect(&visitor.session, Message::error(error.to_string()), CLASSES)
		}
		Err(error) => rerender(&visitor.session, "trainer_reschedule", context, error),
	}
}
