//! Storage abstraction used by the views.

use async_trait::async_trait;
use chrono::NaiveDate;
use stableyard_core::{
	ClassFilter, ConflictPolicy, GroomTask, Horse, HorseData, NewBooking, NewGroomTask, NewUser,
	NewVetCheck, Profile, Reschedule, Result, Role, RoleSet, TrainingClass, User, UserUpdate,
	VeterinaryCheck,
};

pub const BOOKING_CONFLICT: &str = "That slot is already booked with that trainer";
pub const RESCHEDULE_CONFLICT: &str = "You already have a class at that time";
pub const DUPLICATE_USERNAME: &str = "That username already exists";
pub const GROOM_TASK_EXISTS: &str = "The tasks for this horse were already recorded today";

/// Every persistent operation of the stable.
///
/// Lookups by id fail with `Error::NotFound` when the row does not exist.
/// Scheduling operations check and write inside one transaction so that two
/// concurrent requests cannot both claim the same trainer time.
#[async_trait]
pub trait StableRepository: Send + Sync {
	// Users

	/// Fails with `Error::Conflict` when the username is taken.
	async fn create_user(&self, user: NewUser) -> Result<User>;
	async fn find_user(&self, id: i64) -> Result<User>;
	async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
	/// Oldest account, the owner of seeded demo horses.
	async fn first_user(&self) -> Result<Option<User>>;
	/// Case-insensitive search over username, first name and email.
	async fn list_users(&self, search: Option<&str>) -> Result<Vec<User>>;
	async fn update_user(&self, id: i64, update: UserUpdate) -> Result<User>;
	/// Removes the account together with its profile, horses and classes.
	async fn delete_user(&self, id: i64) -> Result<()>;

	// Profiles

	async fn find_profile(&self, user_id: i64) -> Result<Option<Profile>>;
	/// Returns the profile and whether it was created by this call. Only a new
	/// profile receives `default_roles`.
	async fn get_or_create_profile(
		&self,
		user_id: i64,
		default_roles: RoleSet,
	) -> Result<(Profile, bool)>;
	/// Replaces the role set, creating the profile if needed.
	async fn set_roles(&self, user_id: i64, roles: RoleSet) -> Result<Profile>;
	async fn add_role(&self, user_id: i64, role: Role) -> Result<Profile>;
	async fn list_users_with_role(&self, role: Role) -> Result<Vec<User>>;

	// Horses

	async fn create_horse(&self, data: HorseData) -> Result<Horse>;
	async fn find_horse(&self, id: i64) -> Result<Horse>;
	async fn find_horse_by_name(&self, name: &str) -> Result<Option<Horse>>;
	async fn update_horse(&self, id: i64, data: HorseData) -> Result<Horse>;
	/// Hard delete; checks, tasks and classes of the horse go with it.
	async fn delete_horse(&self, id: i64) -> Result<Horse>;
	/// Case-insensitive search over name, breed and owner username.
	async fn list_horses(&self, search: Option<&str>, active_only: bool) -> Result<Vec<Horse>>;

	// Veterinary checks

	async fn add_vet_check(&self, check: NewVetCheck) -> Result<VeterinaryCheck>;
	/// Newest first.
	async fn list_vet_checks(&self, horse_id: i64) -> Result<Vec<VeterinaryCheck>>;

	// Groom tasks

	/// Fails with `Error::Conflict` when the horse already has a task that day.
	async fn add_groom_task(&self, task: NewGroomTask) -> Result<GroomTask>;
	async fn find_groom_task_on(&self, horse_id: i64, day: NaiveDate) -> Result<Option<GroomTask>>;
	/// Newest first.
	async fn list_groom_tasks(&self, horse_id: i64) -> Result<Vec<GroomTask>>;

	// Training classes

	/// Books a pending class unless one of the trainer's pending classes on
	/// that date conflicts under `policy`.
	async fn book_class(&self, booking: NewBooking, policy: ConflictPolicy) -> Result<TrainingClass>;
	async fn find_class(&self, id: i64) -> Result<TrainingClass>;
	/// Ordered by date, then start time.
	async fn list_trainer_classes(
		&self,
		trainer_id: i64,
		filter: ClassFilter,
	) -> Result<Vec<TrainingClass>>;
	/// Most recent first.
	async fn list_client_classes(&self, client_id: i64) -> Result<Vec<TrainingClass>>;
	/// `observations` replaces the stored text only when given.
	async fn complete_class(&self, id: i64, observations: Option<String>) -> Result<TrainingClass>;
	async fn cancel_class(&self, id: i64) -> Result<TrainingClass>;
	/// Moves a pending class, rejecting any overlap with the trainer's other
	/// pending classes on the new date.
	async fn reschedule_class(&self, id: i64, reschedule: Reschedule) -> Result<TrainingClass>;
}
