//! Domain records persisted by the stable.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exception::{Error, Result};
use crate::role::RoleSet;
use crate::schedule::{ClassStatus, TimeSlot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
	pub id: i64,
	pub username: String,
	pub first_name: String,
	pub email: String,
	#[serde(skip_serializing)]
	pub password_hash: String,
	pub is_active: bool,
	pub date_joined: DateTime<Utc>,
}

impl User {
	/// Name used in greetings, falling back to the username.
	pub fn display_name(&self) -> &str {
		if self.first_name.is_empty() {
			&self.username
		} else {
			&self.first_name
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
	pub username: String,
	pub first_name: String,
	pub email: String,
	pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
	pub first_name: String,
	pub email: String,
	/// Replaces the stored hash when present.
	pub password_hash: Option<String>,
}

/// One-to-one companion of a [`User`] carrying contact data and roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
	pub user_id: i64,
	pub phone: String,
	pub address: String,
	pub created_at: DateTime<Utc>,
	pub roles: RoleSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Horse {
	pub id: i64,
	pub name: String,
	pub breed: String,
	pub age: u16,
	pub color: String,
	pub owner_id: i64,
	pub owner_username: String,
	pub registered_at: DateTime<Utc>,
	pub active: bool,
}

/// Field values for creating or editing a horse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HorseData {
	pub name: String,
	pub breed: String,
	pub age: u16,
	pub color: String,
	pub owner_id: i64,
	pub active: bool,
}

/// Body-condition score on the 1 (emaciated) to 9 (obese) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BodyCondition(u8);

impl BodyCondition {
	pub const MIN: u8 = 1;
	pub const MAX: u8 = 9;

	pub fn new(score: u8) -> Result<Self> {
		if (Self::MIN..=Self::MAX).contains(&score) {
			Ok(Self(score))
		} else {
			Err(Error::Validation(format!(
				"Body condition must be between {} and {}",
				Self::MIN,
				Self::MAX
			)))
		}
	}

	pub fn score(self) -> u8 {
		self.0
	}
}

impl TryFrom<u8> for BodyCondition {
	type Error = Error;

	fn try_from(score: u8) -> Result<Self> {
		Self::new(score)
	}
}

impl From<BodyCondition> for u8 {
	fn from(value: BodyCondition) -> Self {
		value.0
	}
}

/// Append-only veterinary record. Never edited once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VeterinaryCheck {
	pub id: i64,
	pub horse_id: i64,
	pub veterinarian_id: i64,
	pub recorded_at: DateTime<Utc>,
	pub weight: Decimal,
	pub body_condition: BodyCondition,
	pub feeding: String,
	pub observations: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVetCheck {
	pub horse_id: i64,
	pub veterinarian_id: i64,
	pub weight: Decimal,
	pub body_condition: BodyCondition,
	pub feeding: String,
	pub observations: String,
}

/// The eight daily care items a groom ticks off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroomChecklist {
	pub hoof_cleaning: bool,
	pub horseshoe_check: bool,
	pub hoof_treatment: bool,
	pub oil_application: bool,
	pub shoeing_check: bool,
	pub medication: bool,
	pub wound_cleaning: bool,
	pub prescribed_exercises: bool,
}

impl GroomChecklist {
	pub fn items(&self) -> [bool; 8] {
		[
			self.hoof_cleaning,
			self.horseshoe_check,
			self.hoof_treatment,
			self.oil_application,
			self.shoeing_check,
			self.medication,
			self.wound_cleaning,
			self.prescribed_exercises,
		]
	}

	pub fn completed_count(&self) -> usize {
		self.items().iter().filter(|done| **done).count()
	}
}

/// Daily checklist record. At most one per horse per calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroomTask {
	pub id: i64,
	pub horse_id: i64,
	pub groom_id: i64,
	pub recorded_at: DateTime<Utc>,
	pub day: NaiveDate,
	#[serde(flatten)]
	pub checklist: GroomChecklist,
	pub observations: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroomTask {
	pub horse_id: i64,
	pub groom_id: i64,
	pub day: NaiveDate,
	pub checklist: GroomChecklist,
	pub observations: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingClass {
	pub id: i64,
	pub trainer_id: i64,
	pub trainer_username: String,
	pub client_id: i64,
	pub client_username: String,
	pub horse_id: i64,
	pub horse_name: String,
	pub date: NaiveDate,
	#[serde(flatten)]
	pub slot: TimeSlot,
	pub training_type: String,
	pub status: ClassStatus,
	pub observations: String,
	pub created_at: DateTime<Utc>,
}

/// A client's booking request. The client is always the acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
	pub trainer_id: i64,
	pub client_id: i64,
	pub horse_id: i64,
	pub date: NaiveDate,
	pub slot: TimeSlot,
	pub training_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reschedule {
	pub date: NaiveDate,
	pub slot: TimeSlot,
}

/// Status filter of the trainer's class list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassFilter {
	#[default]
	All,
	Pending,
	Completed,
	Cancelled,
}

impl ClassFilter {
	/// Parses the query value; anything unrecognised shows every class.
	pub fn parse(value: Option<&str>) -> Self {
		match value {
			Some("pending") => ClassFilter::Pending,
			Some("completed") => ClassFilter::Completed,
			Some("cancelled") => ClassFilter::Cancelled,
			_ => ClassFilter::All,
		}
	}

	pub fn status(self) -> Option<ClassStatus> {
		match self {
			ClassFilter::All => None,
			ClassFilter::Pending => Some(ClassStatus::Pending),
			ClassFilter::Completed => Some(ClassStatus::Completed),
			ClassFilter::Cancelled => Some(ClassStatus::Cancelled),
		}
	}
}
