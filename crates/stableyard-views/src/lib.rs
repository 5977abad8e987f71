//! # stableyard-views
//!
//! The stable's pages, one module per audience:
//!
//! - `accounts`: landing page, sign-up, login/logout, dashboard, role switch
//! - `vet` and `groom`: horse pages and the care records
//! - `manage`: administrator CRUD for users, roles and horses
//! - `trainer` and `client`: the training-class workflow
//!
//! [`urls`] maps every page to its path; [`application`] wraps the router in
//! the session and logging middleware.
//!
//! ```no_run
//! # async fn run() -> stableyard_core::Result<()> {
//! use std::sync::Arc;
//! use stableyard_db::{SqliteRepository, connect_in_memory};
//! use stableyard_http::{HttpServer, SessionConfig};
//! use stableyard_views::{AppState, application};
//!
//! let repo = Arc::new(SqliteRepository::new(connect_in_memory().await?));
//! let app = application(Arc::new(AppState::new(repo)), SessionConfig::default())?;
//! HttpServer::new(Arc::new(app))
//! 	.listen("127.0.0.1:8000".parse().unwrap())
//! 	.await
//! 	.ok();
//! # Ok(())
//! # }
//! ```

mod accounts;
mod client;
mod groom;
mod guard;
mod manage;
mod render;
mod state;
mod trainer;
mod vet;

use std::future::Future;
use std::sync::Arc;

use stableyard_core::Result;
use stableyard_http::{
	Handler, LoggingMiddleware, Method, MiddlewareChain, Request, Response, Router,
	SessionConfig, SessionMiddleware, handler_fn,
};

pub use accounts::NO_ROLE_ACCESS;
pub use client::CANNOT_CANCEL;
pub use guard::NO_ACCESS;
pub use manage::CANNOT_DELETE_SELF;
pub use state::AppState;

/// Binds a view to the shared state.
fn view<F, Fut>(state: &Arc<AppState>, page: F) -> Arc<dyn Handler>
where
	F: Fn(Arc<AppState>, Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Response>> + Send + 'static,
{
	let state = state.clone();
	Arc::new(handler_fn(move |request| page(state.clone(), request)))
}

/// Builds the router holding every page of the stable.
pub fn urls(state: Arc<AppState>) -> Result<Router> {
	const GET: &[Method] = &[Method::GET];
	const FORM: &[Method] = &[Method::GET, Method::POST];

	let mut router = Router::new();
	router
		.add("home", "/", GET, view(&state, accounts::home))?
		.add("register", "/register/", FORM, view(&state, accounts::register))?
		.add("login", "/login/", FORM, view(&state, accounts::login))?
		.add("logout", "/logout/", FORM, view(&state, accounts::logout))?
		.add("dashboard", "/dashboard/", GET, view(&state, accounts::dashboard))?
		.add(
			"switch_role",
			"/switch-role/{role}/",
			FORM,
			view(&state, accounts::switch_role),
		)?
		// Veterinarian
		.add("vet_horse_detail", "/vet/horse/{id}/", GET, view(&state, vet::horse_detail))?
		.add("vet_new_check", "/vet/check/new/{id}/", FORM, view(&state, vet::new_check))?
		// Groom
		.add(
			"groom_horse_detail",
			"/groom/horse/{id}/",
			GET,
			view(&state, groom::horse_detail),
		)?
		.add(
			"groom_checklist",
			"/groom/checklist/{id}/",
			FORM,
			view(&state, groom::checklist),
		)?
		// Administrator
		.add("manage_users", "/manage/users/", GET, view(&state, manage::users))?
		.add(
			"manage_user_create",
			"/manage/user/create/",
			FORM,
			view(&state, manage::user_create),
		)?
		.add(
			"manage_user_edit",
			"/manage/user/{id}/edit/",
			FORM,
			view(&state, manage::user_edit),
		)?
		.add(
			"manage_user_delete",
			"/manage/user/{id}/delete/",
			FORM,
			view(&state, manage::user_delete),
		)?
		.add(
			"manage_user_roles",
			"/manage/user/{id}/roles/",
			FORM,
			view(&state, manage::user_roles),
		)?
		.add("manage_horses", "/manage/horses/", GET, view(&state, manage::horses))?
		.add(
			"manage_horse_create",
			"/manage/horse/create/",
			FORM,
			view(&state, manage::horse_create),
		)?
		.add(
			"manage_horse_edit",
			"/manage/horse/{id}/edit/",
			FORM,
			view(&state, manage::horse_edit),
		)?
		.add(
			"manage_horse_delete",
			"/manage/horse/{id}/delete/",
			FORM,
			view(&state, manage::horse_delete),
		)?
		.add(
			"manage_horse_history",
			"/manage/horse/{id}/history/",
			GET,
			view(&state, manage::horse_history),
		)?
		// Trainer
		.add("trainer_classes", "/trainer/classes/", GET, view(&state, trainer::classes))?
		.add(
			"trainer_complete",
			"/trainer/class/{id}/complete/",
			FORM,
			view(&state, trainer::complete),
		)?
		.add(
			"trainer_cancel",
			"/trainer/class/{id}/cancel/",
			FORM,
			view(&state, trainer::cancel),
		)?
		.add(
			"trainer_reschedule",
			"/trainer/class/{id}/reschedule/",
			FORM,
			view(&state, trainer::reschedule),
		)?
		// Client
		.add("client_bookings", "/client/bookings/", GET, view(&state, client::bookings))?
		.add(
			"client_new_booking",
			"/client/booking/new/",
			FORM,
			view(&state, client::new_booking),
		)?
		.add(
			"client_cancel_booking",
			"/client/booking/{id}/cancel/",
			FORM,
			view(&state, client::cancel_booking),
		)?;
	Ok(router)
}

/// The complete request handler: logging, then sessions, then the router.
pub fn application(state: Arc<AppState>, session: SessionConfig) -> Result<MiddlewareChain> {
	let router = urls(state)?;
	Ok(MiddlewareChain::new(Arc::new(router))
		.with_middleware(Arc::new(LoggingMiddleware::new()))
		.with_middleware(Arc::new(SessionMiddleware::new(session))))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use stableyard_db::{SqliteRepository, connect_in_memory};

	#[rstest]
	#[tokio::test]
	async fn test_urls_reverse() {
		let repo = Arc::new(SqliteRepository::new(connect_in_memory().await.unwrap()));
		let router = urls(Arc::new(AppState::new(repo))).unwrap();

		assert_eq!(router.route_names().count(), 27);
		assert_eq!(
			router.reverse("trainer_reschedule", &[("id", "7")]).as_deref(),
			Some("/trainer/class/7/reschedule/")
		);
		assert_eq!(
			router.reverse("switch_role", &[("role", "groom")]).as_deref(),
			Some("/switch-role/groom/")
		);
		assert_eq!(router.reverse("manage_users", &[]).as_deref(), Some("/manage/users/"));
	}
}
