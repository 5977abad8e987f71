//! Type-keyed storage attached to a [`Request`](crate::Request).
//!
//! Middleware uses it to hand values such as the session handle down to
//! views without widening the request type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Default)]
pub struct Extensions {
	map: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl Extensions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a value, replacing any previous value of the same type.
	///
	/// # Examples
	///
	/// ```
	/// use stableyard_http::Extensions;
	///
	/// let extensions = Extensions::new();
	/// extensions.insert(42u32);
	///
	/// assert_eq!(extensions.get::<u32>(), Some(42));
	/// assert!(!extensions.contains::<String>());
	/// ```
	pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
		self.map.lock().insert(TypeId::of::<T>(), Box::new(value));
	}

	/// Returns a clone of the stored value.
	pub fn get<T>(&self) -> Option<T>
	where
		T: Clone + Send + Sync + 'static,
	{
		self.map
			.lock()
			.get(&TypeId::of::<T>())
			.and_then(|boxed| boxed.downcast_ref::<T>())
			.cloned()
	}

	pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
		self.map.lock().contains_key(&TypeId::of::<T>())
	}

	pub fn remove<T: Send + Sync + 'static>(&self) -> Option<T> {
		let mut map = self.map.lock();
		let boxed = map.remove(&TypeId::of::<T>())?;
		match boxed.downcast::<T>() {
			Ok(value) => Some(*value),
			Err(boxed) => {
				map.insert(TypeId::of::<T>(), boxed);
				None
			}
		}
	}
}

impl std::fmt::Debug for Extensions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Extensions")
			.field("len", &self.map.lock().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[derive(Debug, Clone, PartialEq)]
	struct Marker(&'static str);

	#[rstest]
	fn test_clones_share_storage() {
		let extensions = Extensions::new();
		let clone = extensions.clone();
		clone.insert(Marker("set through clone"));
		assert_eq!(
			extensions.get::<Marker>(),
			Some(Marker("set through clone"))
		);
	}

	#[rstest]
	fn test_remove_takes_the_value() {
		let extensions = Extensions::new();
		extensions.insert(7i64);
		assert_eq!(extensions.remove::<i64>(), Some(7));
		assert_eq!(extensions.remove::<i64>(), None);
		assert!(!extensions.contains::<i64>());
	}
}
