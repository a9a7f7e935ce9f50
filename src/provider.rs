//! Redis-backed session provider
//!
//! Maps the session lifecycle onto plain Redis commands. Every operation
//! checks one connection out of the pool, issues its commands on it, and
//! hands it back when the connection guard drops, on success and error
//! paths alike.
//!
//! ## Example
//!
//! ```rust,no_run
//! use reinhardt_session_redis::{RedisConfig, RedisProvider, SessionProvider};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut provider = RedisProvider::new();
//! provider
//!     .init(3600, Box::new(RedisConfig::new("127.0.0.1", 6379).with_key_prefix("sess")))
//!     .await?;
//! let provider = Arc::new(provider);
//!
//! let lookup = provider.read_store(b"u1").await?;
//! if lookup.is_new() {
//!     // first request for this identifier
//! }
//!
//! let mut store = lookup.into_store();
//! store.set("user_id", 42)?;
//! provider.save(&store).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency caveats
//!
//! Operations on the same identifier are not serialized. `regenerate`
//! checks `EXISTS` before `RENAME` and `destroy` checks `EXISTS` before
//! `DEL`, each in a separate round trip. If two `regenerate` calls race on
//! one old identifier, both may see it present; the second `RENAME` then
//! fails with Redis's `no such key` reply and surfaces as
//! [`ProviderError::Connection`].
//!
//! ## Logging
//!
//! Keys appear in log lines through [`SessionKey`]'s `Display`, which shows
//! the prefix and identifier length but never the identifier.

use crate::codec::SessionCodec;
use crate::config::{ProviderConfig, RedisConfig};
use crate::error::{ConfigError, ProviderError, Result};
use crate::key::{SessionKey, build_key};
use crate::store::{Lookup, Store};
use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use std::sync::Arc;

/// Pattern suffix matching every session under a prefix
const ALL_SESSIONS: &[u8] = b"*";

/// Placeholder value of a session that exists but holds no data
const EMPTY_VALUE: &[u8] = b"";

/// Session storage operations the framework drives
///
/// The framework constructs a provider, calls [`init`](Self::init) once at
/// startup and then shares it between request handlers.
#[async_trait]
pub trait SessionProvider: Send + Sync {
	/// Configure the provider and verify the backend is reachable
	async fn init(&mut self, max_lifetime: u64, config: Box<dyn ProviderConfig>) -> Result<()>;

	/// Load a session, creating an empty one if it does not exist
	async fn read_store(&self, id: &[u8]) -> Result<Lookup>;

	/// Move a session to a new identifier, keeping its data
	async fn regenerate(&self, old_id: &[u8], new_id: &[u8]) -> Result<Lookup>;

	/// Remove a session; removing a missing session succeeds
	async fn destroy(&self, id: &[u8]) -> Result<()>;

	/// Number of stored sessions
	async fn count(&self) -> Result<usize>;

	/// Persist a store's data and re-arm its lifetime
	async fn save(&self, store: &Store) -> Result<()>;

	/// Whether the framework should schedule [`gc`](Self::gc)
	fn need_gc(&self) -> bool;

	/// Remove expired sessions
	fn gc(&self);
}

/// State installed by a successful `init`
struct Initialized {
	config: RedisConfig,
	codec: Arc<dyn SessionCodec>,
	pool: Pool,
	max_lifetime: u64,
	/// `max_lifetime` as the signed count `EXPIRE` takes
	expire_seconds: i64,
}

/// Session provider storing each session under `prefix:id` in Redis
///
/// Expiry is left entirely to Redis key TTLs, so [`need_gc`](SessionProvider::need_gc)
/// is always `false`.
#[derive(Default)]
pub struct RedisProvider {
	state: Option<Initialized>,
}

impl RedisProvider {
	/// Create an uninitialized provider
	pub fn new() -> Self {
		Self { state: None }
	}

	/// Whether `init` has completed successfully
	pub fn is_initialized(&self) -> bool {
		self.state.is_some()
	}

	/// Session lifetime in seconds, once initialized
	pub fn max_lifetime(&self) -> Option<u64> {
		self.state.as_ref().map(|s| s.max_lifetime)
	}

	/// Active configuration, once initialized
	pub fn config(&self) -> Option<&RedisConfig> {
		self.state.as_ref().map(|s| &s.config)
	}

	/// Build the Redis key of a session under this provider's prefix
	pub fn session_key(&self, id: &[u8]) -> Result<SessionKey> {
		Ok(build_key(&self.state()?.config.key_prefix, id))
	}

	fn state(&self) -> Result<&Initialized> {
		self.state.as_ref().ok_or(ProviderError::NotInitialized)
	}
}

impl Initialized {
	fn key(&self, id: &[u8]) -> SessionKey {
		build_key(&self.config.key_prefix, id)
	}

	/// Check out a connection after discarding connections idle past the timeout
	async fn connection(&self) -> Result<Connection> {
		let idle_timeout = self.config.idle_timeout;
		let pruned = self
			.pool
			.retain(|_, metrics| metrics.last_used() < idle_timeout);
		if !pruned.removed.is_empty() {
			tracing::trace!(
				removed = pruned.removed.len(),
				retained = pruned.retained,
				"Dropped idle redis connections"
			);
		}

		Ok(self.pool.get().await?)
	}

	/// GET the session and decode it, creating the placeholder on a miss
	async fn read(&self, conn: &mut Connection, id: &[u8], key: &SessionKey) -> Result<Lookup> {
		let reply: Option<Vec<u8>> = conn.get(key).await?;

		match reply {
			Some(bytes) if bytes.is_empty() => {
				tracing::trace!(%key, "Session placeholder found");
				Ok(Lookup::found(Store::new(id, None)))
			}
			Some(bytes) => {
				let data = self.codec.decode(&bytes).map_err(|e| {
					tracing::warn!(%key, codec = self.codec.name(), error = %e, "Undecodable session data");
					ProviderError::Decode(e)
				})?;
				tracing::trace!(%key, "Session loaded");
				Ok(Lookup::found(Store::new(id, Some(data))))
			}
			None => self.create(conn, id, key).await,
		}
	}

	/// SET an empty placeholder with a fresh TTL
	async fn create(&self, conn: &mut Connection, id: &[u8], key: &SessionKey) -> Result<Lookup> {
		let _: () = conn.set_ex(key, EMPTY_VALUE, self.max_lifetime).await?;
		tracing::debug!(%key, ttl = self.max_lifetime, "Session created");
		Ok(Lookup::created(Store::new(id, None)))
	}
}

#[async_trait]
impl SessionProvider for RedisProvider {
	async fn init(&mut self, max_lifetime: u64, config: Box<dyn ProviderConfig>) -> Result<()> {
		if config.name() != RedisConfig::PROVIDER_NAME {
			return Err(ProviderError::ConfigMismatch {
				expected: RedisConfig::PROVIDER_NAME,
				found: config.name().to_string(),
			});
		}
		let mut config = *config.into_any().downcast::<RedisConfig>().map_err(|_| {
			ProviderError::ConfigMismatch {
				expected: RedisConfig::PROVIDER_NAME,
				found: "unknown config type".to_string(),
			}
		})?;

		config.validate()?;
		let expire_seconds = i64::try_from(max_lifetime)
			.ok()
			.filter(|&seconds| seconds > 0)
			.ok_or(ConfigError::InvalidLifetime)?;
		let codec = config.codec();

		let mut pool_config = deadpool_redis::Config::from_connection_info(config.connection_info());
		pool_config.pool = Some(PoolConfig::new(config.max_idle));
		let pool = pool_config.create_pool(Some(Runtime::Tokio1))?;

		{
			let mut conn = pool.get().await?;
			let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
		}

		tracing::info!(
			host = %config.host,
			port = config.port,
			db = config.db,
			max_idle = config.max_idle,
			idle_timeout = ?config.idle_timeout,
			key_prefix = %config.key_prefix,
			codec = codec.name(),
			max_lifetime,
			"Redis session provider initialized"
		);

		// A previous pool is released once its last handle drops; it is not closed here.
		self.state = Some(Initialized {
			config,
			codec,
			pool,
			max_lifetime,
			expire_seconds,
		});
		Ok(())
	}

	async fn read_store(&self, id: &[u8]) -> Result<Lookup> {
		let state = self.state()?;
		let key = state.key(id);
		let mut conn = state.connection().await?;

		state.read(&mut conn, id, &key).await
	}

	async fn regenerate(&self, old_id: &[u8], new_id: &[u8]) -> Result<Lookup> {
		let state = self.state()?;
		let old_key = state.key(old_id);
		let new_key = state.key(new_id);
		let mut conn = state.connection().await?;

		let reply: redis::RedisResult<usize> = conn.exists(&old_key).await;
		let exists = match reply {
			Ok(n) => n > 0,
			Err(e) => {
				tracing::warn!(key = %old_key, error = %e, "EXISTS failed, treating session as absent");
				false
			}
		};

		if !exists {
			return state.create(&mut conn, new_id, &new_key).await;
		}

		let _: () = conn.rename(&old_key, &new_key).await?;
		let _: () = conn.expire(&new_key, state.expire_seconds).await?;
		tracing::debug!(from = %old_key, to = %new_key, "Session regenerated");

		state.read(&mut conn, new_id, &new_key).await
	}

	async fn destroy(&self, id: &[u8]) -> Result<()> {
		let state = self.state()?;
		let key = state.key(id);
		let mut conn = match state.connection().await {
			Ok(conn) => conn,
			Err(e) => {
				tracing::warn!(%key, error = %e, "No connection for destroy, treating session as absent");
				return Ok(());
			}
		};

		let reply: redis::RedisResult<usize> = conn.exists(&key).await;
		match reply {
			Ok(0) => return Ok(()),
			Ok(_) => {}
			Err(e) => {
				tracing::warn!(%key, error = %e, "EXISTS failed, treating session as absent");
				return Ok(());
			}
		}

		let _: () = conn.del(&key).await?;
		tracing::debug!(%key, "Session destroyed");
		Ok(())
	}

	/// Counts keys with `KEYS prefix:*`.
	///
	/// Cost grows with the whole keyspace, not the number of sessions, and
	/// the result may include keys Redis has expired but not yet reclaimed.
	async fn count(&self) -> Result<usize> {
		let state = self.state()?;
		let pattern = state.key(ALL_SESSIONS);
		let mut conn = state.connection().await?;

		let keys: Vec<Vec<u8>> = conn.keys(&pattern).await?;
		Ok(keys.len())
	}

	async fn save(&self, store: &Store) -> Result<()> {
		let state = self.state()?;
		let key = state.key(store.id());
		let value = match store.data() {
			Some(data) => state.codec.encode(data).map_err(ProviderError::Encode)?,
			None => EMPTY_VALUE.to_vec(),
		};
		let mut conn = state.connection().await?;

		let _: () = conn.set_ex(&key, value, state.max_lifetime).await?;
		tracing::trace!(%key, "Session saved");
		Ok(())
	}

	fn need_gc(&self) -> bool {
		false
	}

	/// Redis expires session keys itself; nothing to collect.
	fn gc(&self) {}
}

impl std::fmt::Debug for RedisProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut s = f.debug_struct("RedisProvider");
		match &self.state {
			Some(state) => s
				.field("config", &state.config)
				.field("max_lifetime", &state.max_lifetime)
				.field("pool", &state.pool.status()),
			None => s.field("initialized", &false),
		};
		s.finish()
	}
}
