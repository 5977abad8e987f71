//! Stable management CLI
//!
//! ```bash
//! manage migrate
//! manage createuser --username admin --password secret --role administrator
//! manage seedhorses
//! manage runserver 0.0.0.0:8000
//! ```

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use stableyard::auth::Argon2Hasher;
use stableyard::commands::{self, NewAccount};
use stableyard::conf::Settings;
use stableyard::core::Role;
use stableyard::db::{PoolConfig, SqliteRepository, connect, migrate};
use stableyard::http::HttpServer;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "manage")]
#[command(about = "Stable management utility", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Verbosity level (can be repeated)
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbosity: u8,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the web server
	Runserver {
		/// Address to bind (defaults to `bind_address` from the settings)
		#[arg(value_name = "ADDR")]
		addr: Option<SocketAddr>,
	},

	/// Apply pending database migrations
	Migrate,

	/// Validate the settings and the pool configuration
	Check,

	/// Create a user account
	Createuser {
		#[arg(long)]
		username: String,

		#[arg(long)]
		password: String,

		/// First name shown in greetings
		#[arg(long, default_value = "")]
		name: String,

		#[arg(long, default_value = "")]
		email: String,

		/// Role to grant (can be repeated)
		#[arg(long = "role", value_name = "ROLE")]
		roles: Vec<Role>,
	},

	/// Add a role to an existing user
	Grantrole {
		#[arg(value_name = "USERNAME")]
		username: String,

		#[arg(value_name = "ROLE")]
		role: Role,
	},

	/// Print the available roles
	Listroles,

	/// Create the demo horses, owned by the first user
	Seedhorses,
}

fn init_tracing(settings: &Settings, verbosity: u8) {
	let level = match verbosity {
		0 => settings.log_level.as_str(),
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn repository(settings: &Settings) -> anyhow::Result<SqliteRepository> {
	let pool = connect(&settings.database_url, &PoolConfig::from(&settings.pool))
		.await
		.context("failed to open the database")?;
	Ok(SqliteRepository::new(pool))
}

async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
	match cli.command {
		Commands::Runserver { addr } => {
			let addr = match addr {
				Some(addr) => addr,
				None => settings.bind_address.parse()?,
			};
			let app = stableyard::build_app(&settings).await?;
			println!("Starting development server at http://{}/", addr);
			println!("Quit the server with CONTROL-C.");
			HttpServer::new(Arc::new(app)).listen(addr).await?;
		}
		Commands::Migrate => {
			let repo = repository(&settings).await?;
			migrate(repo.pool()).await?;
			println!("Migrations applied");
		}
		Commands::Check => {
			commands::check(&settings)?;
			println!(
				"System check identified no issues (database: {}, booking conflicts: {:?})",
				settings.database_url, settings.booking.conflict_policy
			);
		}
		Commands::Createuser {
			username,
			password,
			name,
			email,
			roles,
		} => {
			let repo = repository(&settings).await?;
			migrate(repo.pool()).await?;
			let account = NewAccount {
				username,
				password,
				name,
				email,
				roles,
			};
			let user = commands::create_user(&repo, &Argon2Hasher::shared(), &account).await?;
			println!("User {} created", user.username);
		}
		Commands::Grantrole { username, role } => {
			let repo = repository(&settings).await?;
			let roles = commands::grant_role(&repo, &username, role).await?;
			let held: Vec<&str> = roles.iter().map(Role::as_str).collect();
			println!("{} now holds: {}", username, held.join(", "));
		}
		Commands::Listroles => {
			for info in commands::list_roles() {
				println!("{:<14} {}", info.role.as_str(), info.description);
			}
		}
		Commands::Seedhorses => {
			let repo = repository(&settings).await?;
			for (horse, created) in commands::seed_horses(&repo).await? {
				let state = if created { "created" } else { "already exists" };
				println!("{:<10} {}", horse.name, state);
			}
		}
	}
	Ok(())
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	let settings = match Settings::load() {
		Ok(settings) => settings,
		Err(error) => {
			eprintln!("Error: {}", error);
			process::exit(1);
		}
	};
	init_tracing(&settings, cli.verbosity);

	if let Err(error) = run(cli, settings).await {
		eprintln!("Error: {:#}", error);
		process::exit(1);
	}
}
