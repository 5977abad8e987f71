//! SQLite implementation of [`StableRepository`].

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use stableyard_core::{
	BodyCondition, ClassAction, ClassFilter, ClassStatus, ConflictPolicy, Error, GroomChecklist,
	GroomTask, Horse, HorseData, NewBooking, NewGroomTask, NewUser, NewVetCheck, Profile,
	Reschedule, Result, Role, RoleSet, TimeSlot, TrainingClass, User, UserUpdate, VeterinaryCheck,
	find_conflict,
};
use tokio::sync::Mutex;

use crate::error::{conflict_on_unique, map_sqlx_error};
use crate::repository::{
	BOOKING_CONFLICT, DUPLICATE_USERNAME, GROOM_TASK_EXISTS, RESCHEDULE_CONFLICT, StableRepository,
};

const USER_SELECT: &str = "SELECT id, username, first_name, email, password_hash, is_active, date_joined FROM users";

const HORSE_SELECT: &str = "SELECT h.id, h.name, h.breed, h.age, h.color, h.owner_id, \
	u.username AS owner_username, h.registered_at, h.active \
	FROM horses h JOIN users u ON u.id = h.owner_id";

const VET_CHECK_SELECT: &str = "SELECT id, horse_id, veterinarian_id, recorded_at, weight, \
	body_condition, feeding, observations FROM vet_checks";

const GROOM_TASK_SELECT: &str = "SELECT id, horse_id, groom_id, recorded_at, day, hoof_cleaning, \
	horseshoe_check, hoof_treatment, oil_application, shoeing_check, medication, wound_cleaning, \
	prescribed_exercises, observations FROM groom_tasks";

const CLASS_SELECT: &str = "SELECT c.id, c.trainer_id, t.username AS trainer_username, \
	c.client_id, cl.username AS client_username, c.horse_id, h.name AS horse_name, c.date, \
	c.start_minute, c.end_minute, c.training_type, c.status, c.observations, c.created_at \
	FROM training_classes c \
	JOIN users t ON t.id = c.trainer_id \
	JOIN users cl ON cl.id = c.client_id \
	JOIN horses h ON h.id = c.horse_id";

/// Builds a `LIKE` pattern matching `search` anywhere, escaping wildcards.
fn like_pattern(search: &str) -> String {
	let mut pattern = String::with_capacity(search.len() + 2);
	pattern.push('%');
	for c in search.chars() {
		if matches!(c, '%' | '_' | '\\') {
			pattern.push('\\');
		}
		pattern.push(c);
	}
	pattern.push('%');
	pattern
}

fn not_found(what: &str, id: i64) -> Error {
	Error::NotFound(format!("{} {} does not exist", what, id))
}

#[derive(FromRow)]
struct UserRow {
	id: i64,
	username: String,
	first_name: String,
	email: String,
	password_hash: String,
	is_active: bool,
	date_joined: DateTime<Utc>,
}

impl From<UserRow> for User {
	fn from(row: UserRow) -> Self {
		Self {
			id: row.id,
			username: row.username,
			first_name: row.first_name,
			email: row.email,
			password_hash: row.password_hash,
			is_active: row.is_active,
			date_joined: row.date_joined,
		}
	}
}

#[derive(FromRow)]
struct ProfileRow {
	user_id: i64,
	phone: String,
	address: String,
	created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct HorseRow {
	id: i64,
	name: String,
	breed: String,
	age: i64,
	color: String,
	owner_id: i64,
	owner_username: String,
	registered_at: DateTime<Utc>,
	active: bool,
}

impl TryFrom<HorseRow> for Horse {
	type Error = Error;

	fn try_from(row: HorseRow) -> Result<Self> {
		Ok(Self {
			id: row.id,
			name: row.name,
			breed: row.breed,
			age: u16::try_from(row.age)
				.map_err(|_| Error::Database(format!("horse {} has invalid age {}", row.id, row.age)))?,
			color: row.color,
			owner_id: row.owner_id,
			owner_username: row.owner_username,
			registered_at: row.registered_at,
			active: row.active,
		})
	}
}

#[derive(FromRow)]
struct VetCheckRow {
	id: i64,
	horse_id: i64,
	veterinarian_id: i64,
	recorded_at: DateTime<Utc>,
	weight: String,
	body_condition: i64,
	feeding: String,
	observations: String,
}

impl TryFrom<VetCheckRow> for VeterinaryCheck {
	type Error = Error;

	fn try_from(row: VetCheckRow) -> Result<Self> {
		let weight = Decimal::from_str(&row.weight)
			.map_err(|e| Error::Database(format!("vet check {} weight: {}", row.id, e)))?;
		let score = u8::try_from(row.body_condition)
			.map_err(|_| Error::Database(format!("vet check {} body condition", row.id)))?;
		Ok(Self {
			id: row.id,
			horse_id: row.horse_id,
			veterinarian_id: row.veterinarian_id,
			recorded_at: row.recorded_at,
			weight,
			body_condition: BodyCondition::new(score)?,
			feeding: row.feeding,
			observations: row.observations,
		})
	}
}

#[derive(FromRow)]
struct GroomTaskRow {
	id: i64,
	horse_id: i64,
	groom_id: i64,
	recorded_at: DateTime<Utc>,
	day: NaiveDate,
	hoof_cleaning: bool,
	horseshoe_check: bool,
	hoof_treatment: bool,
	oil_application: bool,
	shoeing_check: bool,
	medication: bool,
	wound_cleaning: bool,
	prescribed_exercises: bool,
	observations: String,
}

impl From<GroomTaskRow> for GroomTask {
	fn from(row: GroomTaskRow) -> Self {
		Self {
			id: row.id,
			horse_id: row.horse_id,
			groom_id: row.groom_id,
			recorded_at: row.recorded_at,
			day: row.day,
			checklist: GroomChecklist {
				hoof_cleaning: row.hoof_cleaning,
				horseshoe_check: row.horseshoe_check,
				hoof_treatment: row.hoof_treatment,
				oil_application: row.oil_application,
				shoeing_check: row.shoeing_check,
				medication: row.medication,
				wound_cleaning: row.wound_cleaning,
				prescribed_exercises: row.prescribed_exercises,
			},
			observations: row.observations,
		}
	}
}

#[derive(FromRow)]
struct ClassRow {
	id: i64,
	trainer_id: i64,
	trainer_username: String,
	client_id: i64,
	client_username: String,
	horse_id: i64,
	horse_name: String,
	date: NaiveDate,
	start_minute: i64,
	end_minute: i64,
	training_type: String,
	status: String,
	observations: String,
	created_at: DateTime<Utc>,
}

fn slot_from_row(id: i64, start: i64, end: i64) -> Result<TimeSlot> {
	let minutes = |value: i64| {
		u32::try_from(value).map_err(|_| Error::Database(format!("class {} has invalid time", id)))
	};
	TimeSlot::from_minutes(minutes(start)?, minutes(end)?)
}

impl TryFrom<ClassRow> for TrainingClass {
	type Error = Error;

	fn try_from(row: ClassRow) -> Result<Self> {
		Ok(Self {
			id: row.id,
			trainer_id: row.trainer_id,
			trainer_username: row.trainer_username,
			client_id: row.client_id,
			client_username: row.client_username,
			horse_id: row.horse_id,
			horse_name: row.horse_name,
			date: row.date,
			slot: slot_from_row(row.id, row.start_minute, row.end_minute)?,
			training_type: row.training_type,
			status: row.status.parse()?,
			observations: row.observations,
			created_at: row.created_at,
		})
	}
}

/// Pending classes of one trainer on one date, as `(id, slot)` pairs.
async fn pending_slots(
	conn: &mut sqlx::SqliteConnection,
	trainer_id: i64,
	date: NaiveDate,
) -> Result<Vec<(i64, TimeSlot)>> {
	let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
		"SELECT id, start_minute, end_minute FROM training_classes \
		 WHERE trainer_id = ? AND date = ? AND status = 'pending'",
	)
	.bind(trainer_id)
	.bind(date)
	.fetch_all(&mut *conn)
	.await
	.map_err(map_sqlx_error)?;

	rows.into_iter()
		.map(|(id, start, end)| Ok((id, slot_from_row(id, start, end)?)))
		.collect()
}

/// SQLite-backed store.
///
/// Booking and rescheduling additionally hold an in-process lock so that
/// check and write run one at a time; the partial unique index on pending
/// start times backs this up across processes.
#[derive(Clone)]
pub struct SqliteRepository {
	pool: SqlitePool,
	schedule_lock: Arc<Mutex<()>>,
}

impl SqliteRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			schedule_lock: Arc::new(Mutex::new(())),
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Starts a transaction that takes the write lock up front.
	///
	/// In WAL mode a deferred transaction that has already read cannot be
	/// upgraded after another connection commits; SQLite answers SQLITE_BUSY
	/// at once instead of waiting out the busy timeout.
	async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
		self.pool
			.begin_with("BEGIN IMMEDIATE")
			.await
			.map_err(map_sqlx_error)
	}

	async fn load_roles(&self, user_id: i64) -> Result<RoleSet> {
		let slugs: Vec<String> =
			sqlx::query_scalar("SELECT role FROM profile_roles WHERE user_id = ?")
				.bind(user_id)
				.fetch_all(&self.pool)
				.await
				.map_err(map_sqlx_error)?;
		slugs
			.iter()
			.map(|slug| slug.parse::<Role>())
			.collect::<Result<RoleSet>>()
	}

	async fn require_profile(&self, user_id: i64) -> Result<Profile> {
		self.find_profile(user_id)
			.await?
			.ok_or_else(|| not_found("Profile of user", user_id))
	}

	async fn transition_class(
		&self,
		id: i64,
		action: ClassAction,
		observations: Option<String>,
	) -> Result<TrainingClass> {
		let target = ClassStatus::Pending.transition(action)?;
		let result = sqlx::query(
			"UPDATE training_classes SET status = ?, observations = COALESCE(?, observations) \
			 WHERE id = ? AND status = 'pending'",
		)
		.bind(target.as_str())
		.bind(observations)
		.bind(id)
		.execute(&self.pool)
		.await
		.map_err(map_sqlx_error)?;

		if result.rows_affected() == 0 {
			// Either missing or already out of the pending state
			let current = self.find_class(id).await?;
			current.status.transition(action)?;
		}
		let class = self.find_class(id).await?;
		tracing::info!(class_id = id, status = %class.status, "training class updated");
		Ok(class)
	}
}

#[async_trait]
impl StableRepository for SqliteRepository {
	async fn create_user(&self, user: NewUser) -> Result<User> {
		let id = sqlx::query(
			"INSERT INTO users (username, first_name, email, password_hash, is_active, date_joined) \
			 VALUES (?, ?, ?, ?, 1, ?)",
		)
		.bind(&user.username)
		.bind(&user.first_name)
		.bind(&user.email)
		.bind(&user.password_hash)
		.bind(Utc::now())
		.execute(&self.pool)
		.await
		.map_err(conflict_on_unique(DUPLICATE_USERNAME))?
		.last_insert_rowid();
		tracing::info!(user_id = id, username = %user.username, "user created");
		self.find_user(id).await
	}

	async fn find_user(&self, id: i64) -> Result<User> {
		sqlx::query_as::<_, UserRow>(&format!("{} WHERE id = ?", USER_SELECT))
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx_error)?
			.map(User::from)
			.ok_or_else(|| not_found("User", id))
	}

	async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
		Ok(
			sqlx::query_as::<_, UserRow>(&format!("{} WHERE username = ?", USER_SELECT))
				.bind(username)
				.fetch_optional(&self.pool)
				.await
				.map_err(map_sqlx_error)?
				.map(User::from),
		)
	}

	async fn first_user(&self) -> Result<Option<User>> {
		Ok(
			sqlx::query_as::<_, UserRow>(&format!("{} ORDER BY id LIMIT 1", USER_SELECT))
				.fetch_optional(&self.pool)
				.await
				.map_err(map_sqlx_error)?
				.map(User::from),
		)
	}

	async fn list_users(&self, search: Option<&str>) -> Result<Vec<User>> {
		let rows = match search.map(str::trim).filter(|s| !s.is_empty()) {
			Some(search) => {
				let pattern = like_pattern(search);
				sqlx::query_as::<_, UserRow>(&format!(
					"{} WHERE username LIKE ?1 ESCAPE '\\' OR first_name LIKE ?1 ESCAPE '\\' \
					 OR email LIKE ?1 ESCAPE '\\' ORDER BY id",
					USER_SELECT
				))
				.bind(pattern)
				.fetch_all(&self.pool)
				.await
			}
			None => {
				sqlx::query_as::<_, UserRow>(&format!("{} ORDER BY id", USER_SELECT))
					.fetch_all(&self.pool)
					.await
			}
		}
		.map_err(map_sqlx_error)?;
		Ok(rows.into_iter().map(User::from).collect())
	}

	async fn update_user(&self, id: i64, update: UserUpdate) -> Result<User> {
		let result = sqlx::query(
			"UPDATE users SET first_name = ?, email = ?, \
			 password_hash = COALESCE(?, password_hash) WHERE id = ?",
		)
		.bind(&update.first_name)
		.bind(&update.email)
		.bind(update.password_hash)
		.bind(id)
		.execute(&self.pool)
		.await
		.map_err(map_sqlx_error)?;
		if result.rows_affected() == 0 {
			return Err(not_found("User", id));
		}
		self.find_user(id).await
	}

	async fn delete_user(&self, id: i64) -> Result<()> {
		let result = sqlx::query("DELETE FROM users WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await
			.map_err(map_sqlx_error)?;
		if result.rows_affected() == 0 {
			return Err(not_found("User", id));
		}
		tracing::info!(user_id = id, "user deleted");
		Ok(())
	}

	async fn find_profile(&self, user_id: i64) -> Result<Option<Profile>> {
		let row = sqlx::query_as::<_, ProfileRow>(
			"SELECT user_id, phone, address, created_at FROM profiles WHERE user_id = ?",
		)
		.bind(user_id)
		.fetch_optional(&self.pool)
		.await
		.map_err(map_sqlx_error)?;

		match row {
			Some(row) => Ok(Some(Profile {
				user_id: row.user_id,
				phone: row.phone,
				address: row.address,
				created_at: row.created_at,
				roles: self.load_roles(user_id).await?,
			})),
			None => Ok(None),
		}
	}

	async fn get_or_create_profile(
		&self,
		user_id: i64,
		default_roles: RoleSet,
	) -> Result<(Profile, bool)> {
		self.find_user(user_id).await?;

		let mut tx = self.begin_write().await?;
		let created = sqlx::query("INSERT OR IGNORE INTO profiles (user_id, created_at) VALUES (?, ?)")
			.bind(user_id)
			.bind(Utc::now())
			.execute(&mut *tx)
			.await
			.map_err(map_sqlx_error)?
			.rows_affected() == 1;
		if created {
			for role in default_roles.iter() {
				sqlx::query("INSERT INTO profile_roles (user_id, role) VALUES (?, ?)")
					.bind(user_id)
					.bind(role.as_str())
					.execute(&mut *tx)
					.await
					.map_err(map_sqlx_error)?;
			}
		}
		tx.commit().await.map_err(map_sqlx_error)?;

		if created {
			tracing::debug!(user_id, "profile created");
		}
		Ok((self.require_profile(user_id).await?, created))
	}

	async fn set_roles(&self, user_id: i64, roles: RoleSet) -> Result<Profile> {
		self.find_user(user_id).await?;

		let mut tx = self.begin_write().await?;
		sqlx::query("INSERT OR IGNORE INTO profiles (user_id, created_at) VALUES (?, ?)")
			.bind(user_id)
			.bind(Utc::now())
			.execute(&mut *tx)
			.await
			.map_err(map_sqlx_error)?;
		sqlx::query("DELETE FROM profile_roles WHERE user_id = ?")
			.bind(user_id)
			.execute(&mut *tx)
			.await
			.map_err(map_sqlx_error)?;
		for role in roles.iter() {
			sqlx::query("INSERT INTO profile_roles (user_id, role) VALUES (?, ?)")
				.bind(user_id)
				.bind(role.as_str())
				.execute(&mut *tx)
				.await
				.map_err(map_sqlx_error)?;
		}
		tx.commit().await.map_err(map_sqlx_error)?;

		tracing::info!(user_id, roles = roles.len(), "roles replaced");
		self.require_profile(user_id).await
	}

	async fn add_role(&self, user_id: i64, role: Role) -> Result<Profile> {
		self.get_or_create_profile(user_id, RoleSet::empty()).await?;
		sqlx::query("INSERT OR IGNORE INTO profile_roles (user_id, role) VALUES (?, ?)")
			.bind(user_id)
			.bind(role.as_str())
			.execute(&self.pool)
			.await
			.map_err(map_sqlx_error)?;
		self.require_profile(user_id).await
	}

	async fn list_users_with_role(&self, role: Role) -> Result<Vec<User>> {
		let rows = sqlx::query_as::<_, UserRow>(
			"SELECT u.id, u.username, u.first_name, u.email, u.password_hash, u.is_active, \
			 u.date_joined FROM users u JOIN profile_roles r ON r.user_id = u.id \
			 WHERE r.role = ? ORDER BY u.id",
		)
		.bind(role.as_str())
		.fetch_all(&self.pool)
		.await
		.map_err(map_sqlx_error)?;
		Ok(rows.into_iter().map(User::from).collect())
	}

	async fn create_horse(&self, data: HorseData) -> Result<Horse> {
		self.find_user(data.owner_id).await?;
		let id = sqlx::query(
			"INSERT INTO horses (name, breed, age, color, owner_id, registered_at, active) \
			 VALUES (?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&data.name)
		.bind(&data.breed)
		.bind(i64::from(data.age))
		.bind(&data.color)
		.bind(data.owner_id)
		.bind(Utc::now())
		.bind(data.active)
		.execute(&self.pool)
		.await
		.map_err(map_sqlx_error)?
		.last_insert_rowid();
		tracing::info!(horse_id = id, name = %data.name, "horse registered");
		self.find_horse(id).await
	}

	async fn find_horse(&self, id: i64) -> Result<Horse> {
		sqlx::query_as::<_, HorseRow>(&format!("{} WHERE h.id = ?", HORSE_SELECT))
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx_error)?
			.ok_or_else(|| not_found("Horse", id))?
			.try_into()
	}

	async fn find_horse_by_name(&self, name: &str) -> Result<Option<Horse>> {
		sqlx::query_as::<_, HorseRow>(&format!("{} WHERE h.name = ? ORDER BY h.id LIMIT 1", HORSE_SELECT))
			.bind(name)
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx_error)?
			.map(Horse::try_from)
			.transpose()
	}

	async fn update_horse(&self, id: i64, data: HorseData) -> Result<Horse> {
		self.find_user(data.owner_id).await?;
		let result = sqlx::query(
			"UPDATE horses SET name = ?, breed = ?, age = ?, color = ?, owner_id = ?, active = ? \
			 WHERE id = ?",
		)
		.bind(&data.name)
		.bind(&data.breed)
		.bind(i64::from(data.age))
		.bind(&data.color)
		.bind(data.owner_id)
		.bind(data.active)
		.bind(id)
		.execute(&self.pool)
		.await
		.map_err(map_sqlx_error)?;
		if result.rows_affected() == 0 {
			return Err(not_found("Horse", id));
		}
		self.find_horse(id).await
	}

	async fn delete_horse(&self, id: i64) -> Result<Horse> {
		let horse = self.find_horse(id).await?;
		sqlx::query("DELETE FROM horses WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await
			.map_err(map_sqlx_error)?;
		tracing::info!(horse_id = id, name = %horse.name, "horse deleted");
		Ok(horse)
	}

	async fn list_horses(&self, search: Option<&str>, active_only: bool) -> Result<Vec<Horse>> {
		let active_clause = if active_only { "h.active = 1" } else { "1 = 1" };
		let rows = match search.map(str::trim).filter(|s| !s.is_empty()) {
			Some(search) => {
				sqlx::query_as::<_, HorseRow>(&format!(
					"{} WHERE {} AND (h.name LIKE ?1 ESCAPE '\\' OR h.breed LIKE ?1 ESCAPE '\\' \
					 OR u.username LIKE ?1 ESCAPE '\\') ORDER BY h.id",
					HORSE_SELECT, active_clause
				))
				.bind(like_pattern(search))
				.fetch_all(&self.pool)
				.await
			}
			None => {
				sqlx::query_as::<_, HorseRow>(&format!(
					"{} WHERE {} ORDER BY h.id",
					HORSE_SELECT, active_clause
				))
				.fetch_all(&self.pool)
				.await
			}
		}
		.map_err(map_sqlx_error)?;
		rows.into_iter().map(Horse::try_from).collect()
	}

	async fn add_vet_check(&self, check: NewVetCheck) -> Result<VeterinaryCheck> {
		let id = sqlx::query(
			"INSERT INTO vet_checks (horse_id, veterinarian_id, recorded_at, weight, \
			 body_condition, feeding, observations) VALUES (?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(check.horse_id)
		.bind(check.veterinarian_id)
		.bind(Utc::now())
		.bind(check.weight.to_string())
		.bind(i64::from(check.body_condition.score()))
		.bind(&check.feeding)
		.bind(&check.observations)
		.execute(&self.pool)
		.await
		.map_err(map_sqlx_error)?
		.last_insert_rowid();
		tracing::info!(check_id = id, horse_id = check.horse_id, "veterinary check recorded");

		sqlx::query_as::<_, VetCheckRow>(&format!("{} WHERE id = ?", VET_CHECK_SELECT))
			.bind(id)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx_error)?
			.try_into()
	}

	async fn list_vet_checks(&self, horse_id: i64) -> Result<Vec<VeterinaryCheck>> {
		sqlx::query_as::<_, VetCheckRow>(&format!(
			"{} WHERE horse_id = ? ORDER BY recorded_at DESC, id DESC",
			VET_CHECK_SELECT
		))
		.bind(horse_id)
		.fetch_all(&self.pool)
		.await
		.map_err(map_sqlx_error)?
		.into_iter()
		.map(VeterinaryCheck::try_from)
		.collect()
	}

	async fn add_groom_task(&self, task: NewGroomTask) -> Result<GroomTask> {
		let c = task.checklist;
		let id = sqlx::query(
			"INSERT INTO groom_tasks (horse_id, groom_id, recorded_at, day, hoof_cleaning, \
			 horseshoe_check, hoof_treatment, oil_application, shoeing_check, medication, \
			 wound_cleaning, prescribed_exercises, observations) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(task.horse_id)
		.bind(task.groom_id)
		.bind(Utc::now())
		.bind(task.day)
		.bind(c.hoof_cleaning)
		.bind(c.horseshoe_check)
		.bind(c.hoof_treatment)
		.bind(c.oil_application)
		.bind(c.shoeing_check)
		.bind(c.medication)
		.bind(c.wound_cleaning)
		.bind(c.prescribed_exercises)
		.bind(&task.observations)
		.execute(&self.pool)
		.await
		.map_err(conflict_on_unique(GROOM_TASK_EXISTS))?
		.last_insert_rowid();
		tracing::info!(task_id = id, horse_id = task.horse_id, day = %task.day, "groom tasks recorded");

		sqlx::query_as::<_, GroomTaskRow>(&format!("{} WHERE id = ?", GROOM_TASK_SELECT))
			.bind(id)
			.fetch_one(&self.pool)
			.await
			.map(GroomTask::from)
			.map_err(map_sqlx_error)
	}

	async fn find_groom_task_on(&self, horse_id: i64, day: NaiveDate) -> Result<Option<GroomTask>> {
		Ok(sqlx::query_as::<_, GroomTaskRow>(&format!(
			"{} WHERE horse_id = ? AND day = ?",
			GROOM_TASK_SELECT
		))
		.bind(horse_id)
		.bind(day)
		.fetch_optional(&self.pool)
		.await
		.map_err(map_sqlx_error)?
		.map(GroomTask::from))
	}

	async fn list_groom_tasks(&self, horse_id: i64) -> Result<Vec<GroomTask>> {
		Ok(sqlx::query_as::<_, GroomTaskRow>(&format!(
			"{} WHERE horse_id = ? ORDER BY recorded_at DESC, id DESC",
			GROOM_TASK_SELECT
		))
		.bind(horse_id)
		.fetch_all(&self.pool)
		.await
		.map_err(map_sqlx_error)?
		.into_iter()
		.map(GroomTask::from)
		.collect())
	}

	async fn book_class(&self, booking: NewBooking, policy: ConflictPolicy) -> Result<TrainingClass> {
		let _guard = self.schedule_lock.lock().await;
		let mut tx = self.begin_write().await?;

		let pending = pending_slots(&mut tx, booking.trainer_id, booking.date).await?;
		if let Some(existing) = find_conflict(policy, pending, &booking.slot, None) {
			tracing::info!(
				trainer_id = booking.trainer_id,
				date = %booking.date,
				slot = %booking.slot,
				existing,
				"booking rejected: slot taken"
			);
			return Err(Error::Conflict(BOOKING_CONFLICT.to_string()));
		}

		let id = sqlx::query(
			"INSERT INTO training_classes (trainer_id, client_id, horse_id, date, start_minute, \
			 end_minute, training_type, status, observations, created_at) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', '', ?)",
		)
		.bind(booking.trainer_id)
		.bind(booking.client_id)
		.bind(booking.horse_id)
		.bind(booking.date)
		.bind(i64::from(booking.slot.start_minute()))
		.bind(i64::from(booking.slot.end_minute()))
		.bind(&booking.training_type)
		.bind(Utc::now())
		.execute(&mut *tx)
		.await
		.map_err(conflict_on_unique(BOOKING_CONFLICT))?
		.last_insert_rowid();
		tx.commit()
			.await
			.map_err(conflict_on_unique(BOOKING_CONFLICT))?;

		tracing::info!(
			class_id = id,
			trainer_id = booking.trainer_id,
			client_id = booking.client_id,
			date = %booking.date,
			slot = %booking.slot,
			"training class booked"
		);
		self.find_class(id).await
	}

	async fn find_class(&self, id: i64) -> Result<TrainingClass> {
		sqlx::query_as::<_, ClassRow>(&format!("{} WHERE c.id = ?", CLASS_SELECT))
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx_error)?
			.ok_or_else(|| not_found("Class", id))?
			.try_into()
	}

	async fn list_trainer_classes(
		&self,
		trainer_id: i64,
		filter: ClassFilter,
	) -> Result<Vec<TrainingClass>> {
		let rows = match filter.status() {
			Some(status) => {
				sqlx::query_as::<_, ClassRow>(&format!(
					"{} WHERE c.trainer_id = ? AND c.status = ? ORDER BY c.date, c.start_minute",
					CLASS_SELECT
				))
				.bind(trainer_id)
				.bind(status.as_str())
				.fetch_all(&self.pool)
				.await
			}
			None => {
				sqlx::query_as::<_, ClassRow>(&format!(
					"{} WHERE c.trainer_id = ? ORDER BY c.date, c.start_minute",
					CLASS_SELECT
				))
				.bind(trainer_id)
				.fetch_all(&self.pool)
				.await
			}
		}
		.map_err(map_sqlx_error)?;
		rows.into_iter().map(TrainingClass::try_from).collect()
	}

	async fn list_client_classes(&self, client_id: i64) -> Result<Vec<TrainingClass>> {
		sqlx::query_as::<_, ClassRow>(&format!(
			"{} WHERE c.client_id = ? ORDER BY c.date DESC, c.start_minute DESC",
			CLASS_SELECT
		))
		.bind(client_id)
		.fetch_all(&self.pool)
		.await
		.map_err(map_sqlx_error)?
		.into_iter()
		.map(TrainingClass::try_from)
		.collect()
	}

	async fn complete_class(&self, id: i64, observations: Option<String>) -> Result<TrainingClass> {
		self.transition_class(id, ClassAction::Complete, observations).await
	}

	async fn cancel_class(&self, id: i64) -> Result<TrainingClass> {
		self.transition_class(id, ClassAction::Cancel, None).await
	}

	async fn reschedule_class(&self, id: i64, reschedule: Reschedule) -> Result<TrainingClass> {
		let _guard = self.schedule_lock.lock().await;
		let mut tx = self.begin_write().await?;

		let (trainer_id, status): (i64, String) =
			sqlx::query_as("SELECT trainer_id, status FROM training_classes WHERE id = ?")
				.bind(id)
				.fetch_optional(&mut *tx)
				.await
				.map_err(map_sqlx_error)?
				.ok_or_else(|| not_found("Class", id))?;
		status
			.parse::<ClassStatus>()?
			.transition(ClassAction::Reschedule)?;

		let pending = pending_slots(&mut tx, trainer_id, reschedule.date).await?;
		if let Some(existing) =
			find_conflict(ConflictPolicy::Overlap, pending, &reschedule.slot, Some(id))
		{
			tracing::info!(
				class_id = id,
				existing,
				date = %reschedule.date,
				slot = %reschedule.slot,
				"reschedule rejected: overlapping class"
			);
			return Err(Error::Conflict(RESCHEDULE_CONFLICT.to_string()));
		}

		sqlx::query(
			"UPDATE training_classes SET date = ?, start_minute = ?, end_minute = ? \
			 WHERE id = ? AND status = 'pending'",
		)
		.bind(reschedule.date)
		.bind(i64::from(reschedule.slot.start_minute()))
		.bind(i64::from(reschedule.slot.end_minute()))
		.bind(id)
		.execute(&mut *tx)
		.await
		.map_err(conflict_on_unique(RESCHEDULE_CONFLICT))?;
		tx.commit()
			.await
			.map_err(conflict_on_unique(RESCHEDULE_CONFLICT))?;

		tracing::info!(
			class_id = id,
			date = %reschedule.date,
			slot = %reschedule.slot,
			"training class rescheduled"
		);
		self.find_class(id).await
	}
}
