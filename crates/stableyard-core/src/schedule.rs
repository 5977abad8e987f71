//! Training-class scheduling rules.
//!
//! Classes occupy half-open `[start, end)` intervals on a calendar date. A
//! trainer may never hold two pending classes whose intervals overlap on the
//! same date; completed and cancelled classes no longer occupy the schedule.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::exception::{Error, Result};

/// Hours offered to clients when booking. 13:00-14:00 is the lunch gap.
const CATALOG_HOURS: [(u32, u32); 9] = [
	(8, 9),
	(9, 10),
	(10, 11),
	(11, 12),
	(12, 13),
	(14, 15),
	(15, 16),
	(16, 17),
	(17, 18),
];

/// A half-open time interval within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
	start: NaiveTime,
	end: NaiveTime,
}

impl TimeSlot {
	/// Creates a slot, rejecting empty or inverted intervals.
	///
	/// # Examples
	///
	/// ```
	/// use chrono::NaiveTime;
	/// use stableyard_core::TimeSlot;
	///
	/// let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
	/// let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
	/// assert!(TimeSlot::new(nine, ten).is_ok());
	/// assert!(TimeSlot::new(ten, nine).is_err());
	/// ```
	pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
		if end <= start {
			return Err(Error::Validation(
				"The end time must be after the start time".to_string(),
			));
		}
		Ok(Self { start, end })
	}

	/// Builds a slot from minutes since midnight, the storage representation.
	pub fn from_minutes(start: u32, end: u32) -> Result<Self> {
		let to_time = |minutes: u32| {
			NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
				.ok_or_else(|| Error::Validation(format!("Invalid time of day: {} minutes", minutes)))
		};
		Self::new(to_time(start)?, to_time(end)?)
	}

	/// Parses a slot and requires it to be one of the bookable catalog entries.
	pub fn from_catalog(value: &str) -> Result<Self> {
		let slot: TimeSlot = value.parse()?;
		if catalog().contains(&slot) {
			Ok(slot)
		} else {
			Err(Error::Validation(format!(
				"{} is not one of the available time slots",
				value
			)))
		}
	}

	pub fn start(&self) -> NaiveTime {
		self.start
	}

	pub fn end(&self) -> NaiveTime {
		self.end
	}

	pub fn start_minute(&self) -> u32 {
		self.start.hour() * 60 + self.start.minute()
	}

	pub fn end_minute(&self) -> u32 {
		self.end.hour() * 60 + self.end.minute()
	}

	/// `self.start < other.end && self.end > other.start`
	pub fn overlaps(&self, other: &TimeSlot) -> bool {
		self.start < other.end && self.end > other.start
	}
}

impl fmt::Display for TimeSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
	}
}

impl FromStr for TimeSlot {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		let (start, end) = s
			.split_once('-')
			.ok_or_else(|| Error::Validation(format!("Invalid time slot: {}", s)))?;
		Self::new(parse_time(start)?, parse_time(end)?)
	}
}

/// Parses `HH:MM` (seconds are accepted and must be zero-padded).
pub fn parse_time(value: &str) -> Result<NaiveTime> {
	let value = value.trim();
	NaiveTime::parse_from_str(value, "%H:%M")
		.or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
		.map_err(|_| Error::Validation(format!("Invalid time: {}", value)))
}

/// The nine bookable slots, in day order.
pub fn catalog() -> Vec<TimeSlot> {
	CATALOG_HOURS
		.iter()
		.filter_map(|(start, end)| TimeSlot::from_minutes(start * 60, end * 60).ok())
		.collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
	#[default]
	Pending,
	Completed,
	Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassAction {
	Complete,
	Cancel,
	Reschedule,
}

impl ClassStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			ClassStatus::Pending => "pending",
			ClassStatus::Completed => "completed",
			ClassStatus::Cancelled => "cancelled",
		}
	}

	pub fn is_terminal(self) -> bool {
		!matches!(self, ClassStatus::Pending)
	}

	/// Applies an action, returning the resulting state.
	///
	/// # Examples
	///
	/// ```
	/// use stableyard_core::{ClassAction, ClassStatus};
	///
	/// let done = ClassStatus::Pending.transition(ClassAction::Complete).unwrap();
	/// assert_eq!(done, ClassStatus::Completed);
	/// assert!(done.transition(ClassAction::Cancel).is_err());
	/// ```
	pub fn transition(self, action: ClassAction) -> Result<ClassStatus> {
		match (self, action) {
			(ClassStatus::Pending, ClassAction::Complete) => Ok(ClassStatus::Completed),
			(ClassStatus::Pending, ClassAction::Cancel) => Ok(ClassStatus::Cancelled),
			(ClassStatus::Pending, ClassAction::Reschedule) => Ok(ClassStatus::Pending),
			(from, action) => Err(Error::InvalidTransition { from, action }),
		}
	}

	pub(crate) fn rejection_message(self, action: ClassAction) -> &'static str {
		match action {
			ClassAction::Reschedule => "Only pending classes can be rescheduled",
			ClassAction::Complete | ClassAction::Cancel => "This class was already processed",
		}
	}
}

impl fmt::Display for ClassStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ClassStatus {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"pending" => Ok(ClassStatus::Pending),
			"completed" => Ok(ClassStatus::Completed),
			"cancelled" => Ok(ClassStatus::Cancelled),
			other => Err(Error::Database(format!("Unknown class status: {}", other))),
		}
	}
}

/// How a new booking is checked against the trainer's pending classes.
///
/// Rescheduling always uses [`ConflictPolicy::Overlap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
	/// Only a pending class starting at the very same time conflicts.
	ExactStart,
	/// Any pending class whose interval intersects the proposed one conflicts.
	#[default]
	Overlap,
}

impl ConflictPolicy {
	pub fn conflicts(self, existing: &TimeSlot, proposed: &TimeSlot) -> bool {
		match self {
			ConflictPolicy::ExactStart => existing.start == proposed.start,
			ConflictPolicy::Overlap => existing.overlaps(proposed),
		}
	}
}

/// Returns the id of the first pending class that blocks `proposed`.
///
/// `pending` must only hold classes of the same trainer on the same date.
/// `exclude` skips the class being rescheduled.
pub fn find_conflict<I>(
	policy: ConflictPolicy,
	pending: I,
	proposed: &TimeSlot,
	exclude: Option<i64>,
) -> Option<i64>
where
	I: IntoIterator<Item = (i64, TimeSlot)>,
{
	pending
		.into_iter()
		.filter(|(id, _)| Some(*id) != exclude)
		.find(|(_, slot)| policy.conflicts(slot, proposed))
		.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn slot(value: &str) -> TimeSlot {
		value.parse().unwrap()
	}

	#[rstest]
	fn test_catalog_has_nine_slots_with_lunch_gap() {
		let slots = catalog();
		assert_eq!(slots.len(), 9);
		assert_eq!(slots[0].to_string(), "08:00-09:00");
		assert_eq!(slots[8].to_string(), "17:00-18:00");
		assert!(!slots.contains(&slot("13:00-14:00")));
	}

	#[rstest]
	#[case("09:00-10:00", "09:30-10:30", true)]
	#[case("09:00-10:00", "10:00-11:00", false)]
	#[case("09:00-10:00", "08:00-09:00", false)]
	#[case("09:00-10:00", "08:30-10:30", true)]
	#[case("09:00-10:00", "09:15-09:45", true)]
	fn test_overlap_is_half_open(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
		assert_eq!(slot(a).overlaps(&slot(b)), expected);
		assert_eq!(slot(b).overlaps(&slot(a)), expected);
	}

	#[rstest]
	#[case("10:00-09:00")]
	#[case("10:00-10:00")]
	#[case("nine-ten")]
	#[case("09:00")]
	fn test_invalid_slots_are_rejected(#[case] value: &str) {
		assert!(value.parse::<TimeSlot>().is_err());
	}

	#[rstest]
	fn test_from_catalog_rejects_off_catalog_slot() {
		assert!(TimeSlot::from_catalog("08:00-09:00").is_ok());
		let err = TimeSlot::from_catalog("13:00-14:00").unwrap_err();
		assert_eq!(err.status_code(), 422);
	}

	#[rstest]
	fn test_minutes_round_trip() {
		let s = slot("09:30-10:45");
		assert_eq!(s.start_minute(), 570);
		assert_eq!(s.end_minute(), 645);
		assert_eq!(TimeSlot::from_minutes(570, 645).unwrap(), s);
	}

	#[rstest]
	#[case(ClassStatus::Pending, ClassAction::Complete, Some(ClassStatus::Completed))]
	#[case(ClassStatus::Pending, ClassAction::Cancel, Some(ClassStatus::Cancelled))]
	#[case(ClassStatus::Pending, ClassAction::Reschedule, Some(ClassStatus::Pending))]
	#[case(ClassStatus::Completed, ClassAction::Complete, None)]
	#[case(ClassStatus::Completed, ClassAction::Cancel, None)]
	#[case(ClassStatus::Completed, ClassAction::Reschedule, None)]
	#[case(ClassStatus::Cancelled, ClassAction::Complete, None)]
	#[case(ClassStatus::Cancelled, ClassAction::Cancel, None)]
	#[case(ClassStatus::Cancelled, ClassAction::Reschedule, None)]
	fn test_state_machine(
		#[case] from: ClassStatus,
		#[case] action: ClassAction,
		#[case] expected: Option<ClassStatus>,
	) {
		assert_eq!(from.transition(action).ok(), expected);
	}

	#[rstest]
	fn test_reschedule_rejection_message() {
		let err = ClassStatus::Cancelled
			.transition(ClassAction::Reschedule)
			.unwrap_err();
		assert_eq!(err.to_string(), "Only pending classes can be rescheduled");
	}

	#[rstest]
	fn test_exact_start_policy_misses_partial_overlap() {
		let pending = vec![(1, slot("08:30-09:30"))];
		let proposed = slot("08:00-09:00");
		assert_eq!(
			find_conflict(ConflictPolicy::ExactStart, pending.clone(), &proposed, None),
			None
		);
		assert_eq!(
			find_conflict(ConflictPolicy::Overlap, pending, &proposed, None),
			Some(1)
		);
	}

	#[rstest]
	fn test_find_conflict_excludes_rescheduled_class() {
		let pending = vec![(7, slot("09:00-10:00")), (8, slot("11:00-12:00"))];
		assert_eq!(
			find_conflict(ConflictPolicy::Overlap, pending.clone(), &slot("09:30-10:30"), Some(7)),
			None
		);
		assert_eq!(
			find_conflict(ConflictPolicy::Overlap, pending, &slot("09:30-10:30"), Some(8)),
			Some(7)
		);
	}

	#[rstest]
	#[case(ConflictPolicy::ExactStart)]
	#[case(ConflictPolicy::Overlap)]
	fn test_identical_slot_conflicts_under_every_policy(#[case] policy: ConflictPolicy) {
		let pending = vec![(1, slot("08:00-09:00"))];
		assert_eq!(find_conflict(policy, pending, &slot("08:00-09:00"), None), Some(1));
	}
}
