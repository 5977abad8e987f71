//! The assembled application on a file-backed database
//!
//! Settings come from TOML files in a temporary directory, as `manage
//! runserver` would read them.

use std::fs;
use std::sync::Arc;

use rstest::*;
use serde_json::Value;
use serial_test::serial;
use stableyard::build_app;
use stableyard::commands::{self, NewAccount};
use stableyard::conf::Settings;
use stableyard::core::Role;
use stableyard::db::PoolConfig;
use stableyard::http::{Handler, Method, MiddlewareChain, Request, Response, StatusCode};
use tempfile::TempDir;

fn settings_in(dir: &TempDir) -> Settings {
	let database = dir.path().join("stable.db");
	fs::write(
		dir.path().join("base.toml"),
		format!(
			"database_url = \"sqlite://{}\"\n[session]\ncookie_name = \"stable_session\"\n",
			database.display()
		),
	)
	.unwrap();
	Settings::load_from(dir.path(), "test").unwrap()
}

async fn send(
	app: &Arc<MiddlewareChain>,
	method: Method,
	path: &str,
	cookie: Option<&str>,
	form: &[(&str, &str)],
) -> Response {
	let mut builder = Request::builder().method(method).uri(path).form(form);
	if let Some(cookie) = cookie {
		builder = builder.header("cookie", cookie);
	}
	app.handle(builder.build().unwrap()).await.unwrap()
}

fn session_cookie(response: &Response) -> String {
	let header = response.headers.get("set-cookie").unwrap().to_str().unwrap();
	assert!(header.starts_with("stable_session="), "{}", header);
	header.split(';').next().unwrap().to_string()
}

#[rstest]
#[serial(env)]
#[tokio::test]
async fn test_accounts_survive_a_restart() {
	let dir = TempDir::new().unwrap();
	let settings = settings_in(&dir);

	let app = Arc::new(build_app(&settings).await.unwrap());
	let response = send(
		&app,
		Method::POST,
		"/register/",
		None,
		&[
			("name", "Nora"),
			("username", "nora"),
			("password", "halter"),
			("password_confirm", "halter"),
		],
	)
	.await;
	assert_eq!(response.status, StatusCode::SEE_OTHER);
	drop(app);

	let app = Arc::new(build_app(&settings).await.unwrap());
	let response = send(
		&app,
		Method::POST,
		"/login/",
		None,
		&[("username", "nora"), ("password", "halter")],
	)
	.await;
	assert_eq!(response.location(), Some("/dashboard/"));
	let cookie = session_cookie(&response);

	let dashboard = send(&app, Method::GET, "/dashboard/", Some(&cookie), &[]).await;
	let page: Value = dashboard.json().unwrap();
	assert_eq!(page["page"], "dashboard_client");
	assert_eq!(page["messages"][0]["text"], "Welcome back Nora!");
}

#[rstest]
#[serial(env)]
#[tokio::test]
async fn test_seeded_stable_is_served() {
	let dir = TempDir::new().unwrap();
	let settings = settings_in(&dir);
	let app = Arc::new(build_app(&settings).await.unwrap());

	let repo = stableyard::db::SqliteRepository::new(
		stableyard::db::connect(&settings.database_url, &PoolConfig::from(&settings.pool))
			.await
			.unwrap(),
	);
	commands::create_user(
		&repo,
		&stableyard::auth::Argon2Hasher::shared(),
		&NewAccount {
			username: "boss".to_string(),
			password: "reins".to_string(),
			roles: vec![Role::Administrator],
			..Default::default()
		},
	)
	.await
	.unwrap();
	commands::seed_horses(&repo).await.unwrap();

	let response = send(
		&app,
		Method::POST,
		"/login/",
		None,
		&[("username", "boss"), ("password", "reins")],
	)
	.await;
	let cookie = session_cookie(&response);
	let horses: Value = send(&app, Method::GET, "/manage/horses/", Some(&cookie), &[])
		.await
		.json()
		.unwrap();
	let names: Vec<&str> = horses["context"]["horses"]
		.as_array()
		.unwrap()
		.iter()
		.map(|horse| horse["name"].as_str().unwrap())
		.collect();
	assert_eq!(names.len(), 5);
	assert!(names.contains(&"Estrella"));
}
