//! Role capabilities.
//!
//! A user account holds any subset of the five roles at once. Exactly one of
//! them is "active" per session and decides which dashboard is shown.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::exception::Error;

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Veterinarian,
	Groom,
	Administrator,
	#[default]
	Client,
	Trainer,
}

impl Role {
	pub const ALL: [Role; 5] = [
		Role::Veterinarian,
		Role::Groom,
		Role::Administrator,
		Role::Client,
		Role::Trainer,
	];

	/// Stable slug used in URLs, the session and the database.
	pub fn as_str(self) -> &'static str {
		match self {
			Role::Veterinarian => "veterinarian",
			Role::Groom => "groom",
			Role::Administrator => "administrator",
			Role::Client => "client",
			Role::Trainer => "trainer",
		}
	}

	pub fn display_name(self) -> &'static str {
		match self {
			Role::Veterinarian => "Veterinarian",
			Role::Groom => "Groom",
			Role::Administrator => "Administrator",
			Role::Client => "Client",
			Role::Trainer => "Trainer",
		}
	}

	pub fn description(self) -> &'static str {
		match self {
			Role::Veterinarian => "Manages the health and veterinary checks of the horses",
			Role::Groom => "Looks after the daily care of the horses",
			Role::Administrator => "Full management of the system",
			Role::Client => "Horse owner or trainer",
			Role::Trainer => "Gives training classes and manages the schedule",
		}
	}

	/// Roles whose dashboard lists the active horses of the stable.
	pub fn works_with_horses(self) -> bool {
		matches!(self, Role::Veterinarian | Role::Groom | Role::Trainer)
	}

	fn bit(self) -> u8 {
		match self {
			Role::Veterinarian => 1 << 0,
			Role::Groom => 1 << 1,
			Role::Administrator => 1 << 2,
			Role::Client => 1 << 3,
			Role::Trainer => 1 << 4,
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Role::ALL
			.into_iter()
			.find(|role| role.as_str() == s)
			.ok_or_else(|| Error::NotFound(format!("Unknown role: {}", s)))
	}
}

/// Set of roles held by a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RoleSet(u8);

impl RoleSet {
	pub const fn empty() -> Self {
		Self(0)
	}

	/// Creates a set holding a single role.
	///
	/// # Examples
	///
	/// ```
	/// use stableyard_core::{Role, RoleSet};
	///
	/// let roles = RoleSet::single(Role::Client);
	/// assert!(roles.contains(Role::Client));
	/// assert!(!roles.contains(Role::Trainer));
	/// ```
	pub fn single(role: Role) -> Self {
		Self(role.bit())
	}

	pub fn insert(&mut self, role: Role) -> bool {
		let added = !self.contains(role);
		self.0 |= role.bit();
		added
	}

	pub fn remove(&mut self, role: Role) -> bool {
		let removed = self.contains(role);
		self.0 &= !role.bit();
		removed
	}

	pub fn contains(&self, role: Role) -> bool {
		self.0 & role.bit() != 0
	}

	pub fn is_empty(&self) -> bool {
		self.0 == 0
	}

	pub fn len(&self) -> usize {
		self.0.count_ones() as usize
	}

	/// Iterates the held roles in catalog order.
	pub fn iter(&self) -> impl Iterator<Item = Role> + use<> {
		let set = *self;
		Role::ALL.into_iter().filter(move |role| set.contains(*role))
	}
}

impl FromIterator<Role> for RoleSet {
	fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
		let mut set = RoleSet::empty();
		for role in iter {
			set.insert(role);
		}
		set
	}
}

impl Serialize for RoleSet {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_seq(self.iter())
	}
}

impl<'de> Deserialize<'de> for RoleSet {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let roles = Vec::<Role>::deserialize(deserializer)?;
		Ok(roles.into_iter().collect())
	}
}

/// Role catalog entry exposed to role pickers.
#[derive(Debug, Clone, Serialize)]
pub struct RoleInfo {
	pub role: Role,
	pub name: &'static str,
	pub description: &'static str,
}

impl From<Role> for RoleInfo {
	fn from(role: Role) -> Self {
		Self {
			role,
			name: role.display_name(),
			description: role.description(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("veterinarian", Role::Veterinarian)]
	#[case("groom", Role::Groom)]
	#[case("administrator", Role::Administrator)]
	#[case("client", Role::Client)]
	#[case("trainer", Role::Trainer)]
	fn test_parse_role_slug(#[case] slug: &str, #[case] expected: Role) {
		assert_eq!(slug.parse::<Role>().unwrap(), expected);
		assert_eq!(expected.as_str(), slug);
	}

	#[rstest]
	fn test_unknown_role_is_rejected() {
		let err = "farrier".parse::<Role>().unwrap_err();
		assert_eq!(err.status_code(), 404);
	}

	#[rstest]
	fn test_role_set_operations() {
		let mut roles = RoleSet::empty();
		assert!(roles.is_empty());
		assert!(roles.insert(Role::Trainer));
		assert!(!roles.insert(Role::Trainer));
		roles.insert(Role::Client);
		assert_eq!(roles.len(), 2);
		assert_eq!(roles.iter().collect::<Vec<_>>(), vec![Role::Client, Role::Trainer]);
		assert!(roles.remove(Role::Client));
		assert!(!roles.contains(Role::Client));
	}

	#[rstest]
	fn test_role_set_serializes_as_slugs() {
		let roles: RoleSet = [Role::Groom, Role::Veterinarian].into_iter().collect();
		let json = serde_json::to_string(&roles).unwrap();
		assert_eq!(json, r#"["veterinarian","groom"]"#);
		let back: RoleSet = serde_json::from_str(&json).unwrap();
		assert_eq!(back, roles);
	}

	#[rstest]
	fn test_default_active_role_is_client() {
		assert_eq!(Role::default(), Role::Client);
	}
}
