//! # stableyard-core
//!
//! Domain layer of the stable: roles, horses and their care records, and the
//! training-class scheduler with its conflict rules and state machine.
//!
//! Nothing here performs I/O. Stores and views build on these types.

pub mod exception;
pub mod model;
pub mod role;
pub mod schedule;
pub mod validation;

pub use exception::{Error, Result};
pub use model::{
	BodyCondition, ClassFilter, GroomChecklist, GroomTask, Horse, HorseData, NewBooking,
	NewGroomTask, NewUser, NewVetCheck, Profile, Reschedule, TrainingClass, User, UserUpdate,
	VeterinaryCheck,
};
pub use role::{Role, RoleInfo, RoleSet};
pub use schedule::{ClassAction, ClassStatus, ConflictPolicy, TimeSlot, catalog, find_conflict};
