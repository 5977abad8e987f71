//! Client bookings: listing, booking a class and cancelling it.

use std::sync::Arc;

use serde_json::{Value, json};
use stableyard_core::validation::BookingForm;
use stableyard_core::{ClassStatus, Error, NewBooking, Result, Role, catalog};
use stableyard_http::{Message, Request, Response};

use crate::AppState;
use crate::guard::{Gate, pass, role_required};
use crate::render::{redirect, render, rerender};

const BOOKINGS: &str = "/client/bookings/";

pub const CANNOT_CANCEL: &str = "You cannot cancel this booking";

async fn client(state: &AppState, request: &Request) -> Result<Gate> {
	role_required(state, request, Role::Client).await
}

pub(crate) async fn bookings(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(client(&state, &request).await?);
	let bookings = state.repo.list_client_classes(visitor.user.id).await?;
	render(
		&visitor.session,
		"client_bookings",
		json!({"bookings": bookings}),
	)
}

/// Choices offered by the booking form.
async fn booking_choices(state: &AppState) -> Result<Value> {
	let slots: Vec<String> = catalog().iter().map(ToString::to_string).collect();
	Ok(json!({
		"trainers": state.repo.list_users_with_role(Role::Trainer).await?,
		"horses": state.repo.list_horses(None, true).await?,
		"slots": slots,
	}))
}

/// Checks the chosen trainer and horse against the offered choices.
fn check_choices(choices: &Value, booking: &NewBooking) -> Result<()> {
	let offers = |key: &str, id: i64| {
		choices[key]
			.as_array()
			.is_some_and(|items| items.iter().any(|item| item["id"] == id))
	};
	if !offers("trainers", booking.trainer_id) {
		return Err(Error::Validation("Choose a trainer from the list".to_string()));
	}
	if !offers("horses", booking.horse_id) {
		return Err(Error::Validation("Choose an active horse".to_string()));
	}
	Ok(())
}

pub(crate) async fn new_booking(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(client(&state, &request).await?);
	let mut context = booking_choices(&state).await?;
	if !request.is_post() {
		return render(&visitor.session, "client_new_booking", context);
	}

	let form: BookingForm = request.form()?;
	context["form"] = json!({
		"trainer": form.trainer,
		"horse": form.horse,
		"date": form.date,
		"slot": form.slot,
		"training_type": form.training_type,
	});
	let booking = match form
		.validate(visitor.user.id)
		.and_then(|booking| check_choices(&context, &booking).map(|()| booking))
	{
		Ok(booking) => booking,
		Err(error) => return rerender(&visitor.session, "client_new_booking", context, error),
	};

	match state.repo.book_class(booking, state.conflict_policy).await {
		Ok(class) => {
			tracing::info!(
				class_id = class.id,
				client = %visitor.user.username,
				trainer = %class.trainer_username,
				date = %class.date,
				slot = %class.slot,
				"class booked"
			);
			redirect(&visitor.session, Message::success("Booking created"), BOOKINGS)
		}
		Err(error) => rerender(&visitor.session, "client_new_booking", context, error),
	}
}

pub(crate) async fn cancel_booking(state: Arc<AppState>, request: Request) -> Result<Response> {
	let visitor = pass!(client(&state, &request).await?);
	let booking = state.repo.find_class(request.path_param("id")?).await?;
	if booking.client_id != visitor.user.id {
		return Err(Error::NotFound(format!("Booking {} not found", booking.id)));
	}
	if booking.status != ClassStatus::Pending {
		return redirect(&visitor.session, Message::error(CANNOT_CANCEL), BOOKINGS);
	}
	if !request.is_post() {
		return render(
			&visitor.session,
			"client_cancel_booking",
			json!({"booking": booking}),
		);
	}

	match state.repo.cancel_class(booking.id).await {
		Ok(_) => {
			tracing::info!(class_id = booking.id, client = %visitor.user.username, "booking cancelled");
			redirect(&visitor.session, Message::success("Booking cancelled"), BOOKINGS)
		}
		Err(Error::InvalidTransition { .. }) => {
			redirect(&visitor.session, Message::error(CANNOT_CANCEL), BOOKINGS)
		}
		Err(error) => Err(error),
	}
}
