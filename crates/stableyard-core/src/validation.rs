//! Submitted forms and the rules that turn them into domain values.
//!
//! Every form deserializes from `application/x-www-form-urlencoded` bodies
//! with all fields optional, so a missing field and an empty one are reported
//! the same way.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::exception::{Error, Result};
use crate::model::{
	BodyCondition, GroomChecklist, HorseData, NewBooking, NewGroomTask, NewVetCheck, Reschedule,
};
use crate::schedule::{TimeSlot, parse_time};

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 4;

/// Largest weight accepted by a `decimal(6, 2)` column.
const MAX_WEIGHT: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

/// Returns the trimmed value when it is present and not blank.
fn filled(value: &Option<String>) -> Option<&str> {
	value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Returns the value untrimmed when it is present and not empty.
fn filled_raw(value: &Option<String>) -> Option<&str> {
	value.as_deref().filter(|v| !v.is_empty())
}

fn text(value: &Option<String>) -> String {
	value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn parse_id(value: &str, what: &str) -> Result<i64> {
	value
		.parse()
		.map_err(|_| Error::Validation(format!("Invalid {}", what)))
}

/// Parses an ISO `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
	NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
		.map_err(|_| Error::Validation(format!("Invalid date: {}", value.trim())))
}

/// HTML checkboxes submit `on` when ticked and nothing otherwise.
fn checked(value: &Option<String>) -> bool {
	value.as_deref() == Some("on")
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
	pub name: Option<String>,
	pub username: Option<String>,
	pub password: Option<String>,
	pub password_confirm: Option<String>,
}

/// Validated registration data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
	pub name: String,
	pub username: String,
	pub password: String,
}

impl RegistrationForm {
	/// Checks the form. Username uniqueness is left to the store.
	pub fn validate(&self) -> Result<Registration> {
		let (Some(name), Some(username), Some(password)) = (
			filled(&self.name),
			filled(&self.username),
			filled_raw(&self.password),
		) else {
			return Err(Error::Validation("All fields are required".to_string()));
		};
		let confirm = self.password_confirm.as_deref().unwrap_or_default();
		if name.chars().count() < MIN_NAME_LEN {
			return Err(Error::Validation(format!(
				"The name must be at least {} characters long",
				MIN_NAME_LEN
			)));
		}
		if username.chars().count() < MIN_USERNAME_LEN {
			return Err(Error::Validation(format!(
				"The username must be at least {} characters long",
				MIN_USERNAME_LEN
			)));
		}
		if password.chars().count() < MIN_PASSWORD_LEN {
			return Err(Error::Validation(format!(
				"The password must be at least {} characters long",
				MIN_PASSWORD_LEN
			)));
		}
		if password != confirm {
			return Err(Error::Validation("The passwords do not match".to_string()));
		}
		Ok(Registration {
			name: name.to_string(),
			username: username.to_string(),
			password: password.to_string(),
		})
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
	pub username: Option<String>,
	pub password: Option<String>,
}

impl LoginForm {
	pub fn credentials(&self) -> Result<(&str, &str)> {
		match (filled(&self.username), filled_raw(&self.password)) {
			(Some(username), Some(password)) => Ok((username, password)),
			_ => Err(Error::Validation(
				"Please enter username and password".to_string(),
			)),
		}
	}
}

/// Administrator's "create user" form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserCreateForm {
	pub username: Option<String>,
	pub name: Option<String>,
	pub email: Option<String>,
	pub password: Option<String>,
}

impl UserCreateForm {
	/// Returns `(username, password)` once both are present.
	pub fn required(&self) -> Result<(&str, &str)> {
		match (filled(&self.username), filled_raw(&self.password)) {
			(Some(username), Some(password)) => Ok((username, password)),
			_ => Err(Error::Validation(
				"Username and password are required".to_string(),
			)),
		}
	}

	pub fn name(&self) -> String {
		text(&self.name)
	}

	pub fn email(&self) -> String {
		text(&self.email)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserEditForm {
	pub name: Option<String>,
	pub email: Option<String>,
	/// Left blank to keep the current password.
	pub password: Option<String>,
}

impl UserEditForm {
	pub fn name(&self) -> String {
		text(&self.name)
	}

	pub fn email(&self) -> String {
		text(&self.email)
	}

	pub fn new_password(&self) -> Option<&str> {
		filled_raw(&self.password)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HorseForm {
	pub name: Option<String>,
	pub breed: Option<String>,
	pub age: Option<String>,
	pub color: Option<String>,
	pub owner: Option<String>,
	pub active: Option<String>,
}

impl HorseForm {
	/// Validates the form. `creating` makes new horses active regardless of
	/// the checkbox, which only the edit form shows.
	pub fn validate(&self, creating: bool) -> Result<HorseData> {
		let (Some(name), Some(age), Some(owner)) =
			(filled(&self.name), filled(&self.age), filled(&self.owner))
		else {
			return Err(Error::Validation(
				"Name, age and owner are required".to_string(),
			));
		};
		let age = age
			.parse::<u16>()
			.map_err(|_| Error::Validation("The age must be a whole number of years".to_string()))?;
		Ok(HorseData {
			name: name.to_string(),
			breed: text(&self.breed),
			age,
			color: text(&self.color),
			owner_id: parse_id(owner, "owner")?,
			active: creating || checked(&self.active),
		})
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VetCheckForm {
	pub weight: Option<String>,
	pub body_condition: Option<String>,
	pub feeding: Option<String>,
	pub observations: Option<String>,
}

impl VetCheckForm {
	pub fn validate(&self, horse_id: i64, veterinarian_id: i64) -> Result<NewVetCheck> {
		let (Some(weight), Some(condition), Some(feeding)) = (
			filled(&self.weight),
			filled(&self.body_condition),
			filled(&self.feeding),
		) else {
			return Err(Error::Validation(
				"Fill in every required field".to_string(),
			));
		};
		let weight = Decimal::from_str(weight)
			.map_err(|_| Error::Validation(format!("Invalid weight: {}", weight)))?
			.round_dp(2);
		if weight <= Decimal::ZERO || weight > MAX_WEIGHT {
			return Err(Error::Validation(
				"The weight must be a positive number below 10000".to_string(),
			));
		}
		let score = condition
			.parse::<u8>()
			.map_err(|_| Error::Validation(format!("Invalid body condition: {}", condition)))?;
		Ok(NewVetCheck {
			horse_id,
			veterinarian_id,
			weight,
			body_condition: BodyCondition::new(score)?,
			feeding: feeding.to_string(),
			observations: text(&self.observations),
		})
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroomChecklistForm {
	pub hoof_cleaning: Option<String>,
	pub horseshoe_check: Option<String>,
	pub hoof_treatment: Option<String>,
	pub oil_application: Option<String>,
	pub shoeing_check: Option<String>,
	pub medication: Option<String>,
	pub wound_cleaning: Option<String>,
	pub prescribed_exercises: Option<String>,
	pub observations: Option<String>,
}

impl GroomChecklistForm {
	pub fn into_task(self, horse_id: i64, groom_id: i64, day: NaiveDate) -> NewGroomTask {
		NewGroomTask {
			horse_id,
			groom_id,
			day,
			checklist: GroomChecklist {
				hoof_cleaning: checked(&self.hoof_cleaning),
				horseshoe_check: checked(&self.horseshoe_check),
				hoof_treatment: checked(&self.hoof_treatment),
				oil_application: checked(&self.oil_application),
				shoeing_check: checked(&self.shoeing_check),
				medication: checked(&self.medication),
				wound_cleaning: checked(&self.wound_cleaning),
				prescribed_exercises: checked(&self.prescribed_exercises),
			},
			observations: text(&self.observations),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingForm {
	pub trainer: Option<String>,
	pub horse: Option<String>,
	pub date: Option<String>,
	pub slot: Option<String>,
	pub training_type: Option<String>,
}

impl BookingForm {
	pub fn validate(&self, client_id: i64) -> Result<NewBooking> {
		let (Some(trainer), Some(horse), Some(date), Some(slot), Some(training_type)) = (
			filled(&self.trainer),
			filled(&self.horse),
			filled(&self.date),
			filled(&self.slot),
			filled(&self.training_type),
		) else {
			return Err(Error::Validation("Fill in every field".to_string()));
		};
		Ok(NewBooking {
			trainer_id: parse_id(trainer, "trainer")?,
			client_id,
			horse_id: parse_id(horse, "horse")?,
			date: parse_date(date)?,
			slot: TimeSlot::from_catalog(slot)?,
			training_type: training_type.to_string(),
		})
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RescheduleForm {
	pub date: Option<String>,
	pub start: Option<String>,
	pub end: Option<String>,
}

impl RescheduleForm {
	pub fn validate(&self) -> Result<Reschedule> {
		let (Some(date), Some(start), Some(end)) =
			(filled(&self.date), filled(&self.start), filled(&self.end))
		else {
			return Err(Error::Validation("All fields are required".to_string()));
		};
		Ok(Reschedule {
			date: parse_date(date)?,
			slot: TimeSlot::new(parse_time(start)?, parse_time(end)?)?,
		})
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompleteForm {
	/// When absent the class keeps its current observations.
	pub observations: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn registration(name: &str, username: &str, password: &str, confirm: &str) -> RegistrationForm {
		RegistrationForm {
			name: Some(name.into()),
			username: Some(username.into()),
			password: Some(password.into()),
			password_confirm: Some(confirm.into()),
		}
	}

	#[rstest]
	#[case(registration("", "rider", "pass", "pass"), "All fields are required")]
	#[case(registration("A", "rider", "pass", "pass"), "The name must be at least 2 characters long")]
	#[case(registration("Ann", "ri", "pass", "pass"), "The username must be at least 3 characters long")]
	#[case(registration("Ann", "rider", "abc", "abc"), "The password must be at least 4 characters long")]
	#[case(registration("Ann", "rider", "pass", "pasz"), "The passwords do not match")]
	#[case(registration("Ann", "rider", "pass", ""), "The passwords do not match")]
	#[case(registration("Ann", "rider", "", ""), "All fields are required")]
	fn test_registration_rejections(#[case] form: RegistrationForm, #[case] message: &str) {
		let err = form.validate().unwrap_err();
		assert_eq!(err.to_string(), message);
		assert_eq!(err.status_code(), 422);
	}

	#[rstest]
	fn test_registration_trims_identity_fields() {
		let form = registration("  Ann ", " rider ", "pass", "pass");
		let valid = form.validate().unwrap();
		assert_eq!(valid.name, "Ann");
		assert_eq!(valid.username, "rider");
	}

	#[rstest]
	fn test_login_requires_both_fields() {
		let form = LoginForm {
			username: Some("rider".into()),
			password: None,
		};
		assert_eq!(
			form.credentials().unwrap_err().to_string(),
			"Please enter username and password"
		);
	}

	#[rstest]
	fn test_booking_form_requires_every_field() {
		let form = BookingForm {
			trainer: Some("2".into()),
			horse: Some("1".into()),
			date: Some("2024-06-01".into()),
			slot: None,
			training_type: Some("dressage".into()),
		};
		assert_eq!(form.validate(5).unwrap_err().to_string(), "Fill in every field");
	}

	#[rstest]
	fn test_booking_form_parses_catalog_slot() {
		let form = BookingForm {
			trainer: Some("2".into()),
			horse: Some("1".into()),
			date: Some("2024-06-01".into()),
			slot: Some("08:00-09:00".into()),
			training_type: Some("jumping".into()),
		};
		let booking = form.validate(5).unwrap();
		assert_eq!(booking.client_id, 5);
		assert_eq!(booking.trainer_id, 2);
		assert_eq!(booking.slot.to_string(), "08:00-09:00");
		assert_eq!(booking.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
	}

	#[rstest]
	fn test_reschedule_form_rejects_inverted_interval() {
		let form = RescheduleForm {
			date: Some("2024-06-01".into()),
			start: Some("10:00".into()),
			end: Some("09:00".into()),
		};
		assert_eq!(form.validate().unwrap_err().status_code(), 422);
	}

	#[rstest]
	#[case("450.5", "5", true)]
	#[case("0", "5", false)]
	#[case("0.001", "5", false)]
	#[case("0.01", "5", true)]
	#[case("10000", "5", false)]
	#[case("abc", "5", false)]
	#[case("450", "10", false)]
	fn test_vet_check_form(#[case] weight: &str, #[case] condition: &str, #[case] valid: bool) {
		let form = VetCheckForm {
			weight: Some(weight.into()),
			body_condition: Some(condition.into()),
			feeding: Some("hay twice a day".into()),
			observations: None,
		};
		assert_eq!(form.validate(1, 2).is_ok(), valid);
	}

	#[rstest]
	fn test_vet_check_weight_is_kept_to_two_decimals() {
		let form = VetCheckForm {
			weight: Some("450.456".into()),
			body_condition: Some("5".into()),
			feeding: Some("hay".into()),
			observations: None,
		};
		assert_eq!(form.validate(1, 2).unwrap().weight, Decimal::new(45046, 2));
	}

	#[rstest]
	fn test_horse_form_requires_name_age_owner() {
		let form = HorseForm {
			name: Some("Luna".into()),
			age: None,
			owner: Some("1".into()),
			..Default::default()
		};
		assert_eq!(
			form.validate(true).unwrap_err().to_string(),
			"Name, age and owner are required"
		);
	}

	#[rstest]
	fn test_horse_edit_reads_active_checkbox() {
		let form = HorseForm {
			name: Some("Luna".into()),
			age: Some("7".into()),
			owner: Some("1".into()),
			active: None,
			..Default::default()
		};
		assert!(form.validate(true).unwrap().active);
		assert!(!form.validate(false).unwrap().active);
	}

	#[rstest]
	fn test_checklist_form_reads_checkboxes() {
		let form = GroomChecklistForm {
			hoof_cleaning: Some("on".into()),
			medication: Some("off".into()),
			..Default::default()
		};
		let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
		let task = form.into_task(3, 4, day);
		assert!(task.checklist.hoof_cleaning);
		assert!(!task.checklist.medication);
		assert_eq!(task.checklist.completed_count(), 1);
	}
}
