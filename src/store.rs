//! Session store handles returned to the framework

use crate::error::NotFound;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decoded session payload
pub type SessionData = HashMap<String, serde_json::Value>;

/// One session's identifier and decoded payload
///
/// A store is produced by [`read_store`](crate::SessionProvider::read_store)
/// or [`regenerate`](crate::SessionProvider::regenerate) and owned by the
/// caller afterwards. Changes are persisted with
/// [`save`](crate::SessionProvider::save).
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
	id: Vec<u8>,
	data: Option<SessionData>,
}

impl Store {
	/// Create a store for `id` holding `data`
	pub fn new(id: impl Into<Vec<u8>>, data: Option<SessionData>) -> Self {
		Self {
			id: id.into(),
			data,
		}
	}

	/// Raw session identifier
	pub fn id(&self) -> &[u8] {
		&self.id
	}

	/// Decoded payload, `None` for a session that has never been saved with data
	pub fn data(&self) -> Option<&SessionData> {
		self.data.as_ref()
	}

	/// Whether the store carries a payload
	pub fn has_data(&self) -> bool {
		self.data.is_some()
	}

	/// Get a value
	pub fn get<T>(&self, key: &str) -> Option<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		self.data
			.as_ref()?
			.get(key)
			.and_then(|v| serde_json::from_value(v.clone()).ok())
	}

	/// Set a value, creating the payload if the session had none
	pub fn set<T>(&mut self, key: impl Into<String>, value: T) -> Result<(), serde_json::Error>
	where
		T: Serialize,
	{
		let value = serde_json::to_value(value)?;
		self.data
			.get_or_insert_with(SessionData::new)
			.insert(key.into(), value);
		Ok(())
	}

	/// Delete a value
	pub fn delete(&mut self, key: &str) -> Option<serde_json::Value> {
		self.data.as_mut()?.remove(key)
	}

	/// Check if a key exists
	pub fn contains_key(&self, key: &str) -> bool {
		self.data.as_ref().is_some_and(|d| d.contains_key(key))
	}

	/// Drop every value but keep the identifier
	pub fn clear(&mut self) {
		self.data = None;
	}

	pub fn into_parts(self) -> (Vec<u8>, Option<SessionData>) {
		(self.id, self.data)
	}
}

/// Outcome of reading a session
///
/// Always carries a usable [`Store`]. When the session did not exist, a
/// placeholder was created in Redis and [`not_found`](Self::not_found)
/// reports [`NotFound`] alongside that placeholder; callers treat this as
/// a new session, not as a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
	store: Store,
	not_found: Option<NotFound>,
}

impl Lookup {
	pub(crate) fn found(store: Store) -> Self {
		Self {
			store,
			not_found: None,
		}
	}

	pub(crate) fn created(store: Store) -> Self {
		Self {
			store,
			not_found: Some(NotFound),
		}
	}

	pub fn store(&self) -> &Store {
		&self.store
	}

	pub fn store_mut(&mut self) -> &mut Store {
		&mut self.store
	}

	/// The miss sentinel, set when the session was created by this read
	pub fn not_found(&self) -> Option<NotFound> {
		self.not_found
	}

	/// Shorthand for `not_found().is_some()`
	pub fn is_new(&self) -> bool {
		self.not_found.is_some()
	}

	pub fn into_store(self) -> Store {
		self.store
	}

	pub fn into_parts(self) -> (Store, Option<NotFound>) {
		(self.store, self.not_found)
	}
}
