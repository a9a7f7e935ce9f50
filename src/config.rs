//! Configuration for the Redis session provider

use crate::codec::{self, SessionCodec};
use crate::error::ConfigError;
use std::any::Any;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default Redis host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default Redis port
pub const DEFAULT_PORT: u16 = 6379;

/// Default number of pooled connections
pub const DEFAULT_MAX_IDLE: usize = 8;

/// Default idle timeout for pooled connections
///
/// Kept below the common Redis server `timeout` settings so the pool drops a
/// connection before the server does.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(240);

/// Default key prefix
pub const DEFAULT_KEY_PREFIX: &str = "session";

/// Configuration handed to a session provider's `init`
///
/// Each provider accepts exactly one concrete configuration type and
/// rejects the rest.
pub trait ProviderConfig: Send + 'static {
	/// Name of the provider this configuration belongs to
	fn name(&self) -> &'static str;

	/// Convert into `Any` so the provider can recover its concrete type
	fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Connection and behaviour settings for [`RedisProvider`](crate::RedisProvider)
///
/// # Examples
///
/// ```
/// use reinhardt_session_redis::RedisConfig;
/// use std::time::Duration;
///
/// let config = RedisConfig::new("127.0.0.1", 6379)
///     .with_max_idle(16)
///     .with_idle_timeout(Duration::from_secs(30))
///     .with_key_prefix("sess");
///
/// assert_eq!(config.key_prefix, "sess");
/// ```
#[derive(Clone)]
pub struct RedisConfig {
	pub host: String,
	pub port: u16,
	pub password: Option<String>,
	/// Redis logical database index
	pub db: i64,
	/// Upper bound of pooled connections
	///
	/// This caps every open connection, busy or idle, not only idle ones.
	/// When all `max_idle` connections are checked out, further operations
	/// wait for one to be returned, with no timeout of their own.
	pub max_idle: usize,
	/// Pooled connections unused for longer than this are discarded
	pub idle_timeout: Duration,
	pub key_prefix: String,
	/// Payload codec; [`MessagePackCodec`](crate::codec::MessagePackCodec) when unset
	pub codec: Option<Arc<dyn SessionCodec>>,
}

impl RedisConfig {
	/// Value returned by [`ProviderConfig::name`]
	pub const PROVIDER_NAME: &'static str = "redis";

	/// Create a configuration for `host:port` with default pool settings
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			..Self::default()
		}
	}

	pub fn with_password(mut self, password: impl Into<String>) -> Self {
		self.password = Some(password.into());
		self
	}

	pub fn with_db(mut self, db: i64) -> Self {
		self.db = db;
		self
	}

	pub fn with_max_idle(mut self, max_idle: usize) -> Self {
		self.max_idle = max_idle;
		self
	}

	pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
		self.idle_timeout = idle_timeout;
		self
	}

	pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.key_prefix = prefix.into();
		self
	}

	pub fn with_codec(mut self, codec: Arc<dyn SessionCodec>) -> Self {
		self.codec = Some(codec);
		self
	}

	/// Load configuration from environment variables.
	///
	/// # Environment Variables
	///
	/// - `SESSION_REDIS_HOST`: Redis host (default `127.0.0.1`)
	/// - `SESSION_REDIS_PORT`: Redis port (default `6379`)
	/// - `SESSION_REDIS_PASSWORD`: Password (optional)
	/// - `SESSION_REDIS_DB`: Database index (default `0`)
	/// - `SESSION_REDIS_MAX_IDLE`: Pooled connections (default `8`)
	/// - `SESSION_REDIS_IDLE_TIMEOUT`: Idle timeout in seconds (default `240`)
	/// - `SESSION_REDIS_KEY_PREFIX`: Key prefix (default `session`)
	/// - `SESSION_REDIS_CODEC`: `msgpack` or `json` (default `msgpack`)
	///
	/// Values are parsed but not validated; validation happens at `init`.
	pub fn from_env() -> Result<Self, ConfigError> {
		let mut config = Self::default();

		if let Ok(host) = env::var("SESSION_REDIS_HOST") {
			config.host = host;
		}
		if let Some(port) = parse_env("SESSION_REDIS_PORT")? {
			config.port = port;
		}
		config.password = env::var("SESSION_REDIS_PASSWORD")
			.ok()
			.filter(|p| !p.is_empty());
		if let Some(db) = parse_env("SESSION_REDIS_DB")? {
			config.db = db;
		}
		if let Some(max_idle) = parse_env("SESSION_REDIS_MAX_IDLE")? {
			config.max_idle = max_idle;
		}
		if let Some(secs) = parse_env::<u64>("SESSION_REDIS_IDLE_TIMEOUT")? {
			config.idle_timeout = Duration::from_secs(secs);
		}
		if let Ok(prefix) = env::var("SESSION_REDIS_KEY_PREFIX") {
			config.key_prefix = prefix;
		}
		if let Ok(name) = env::var("SESSION_REDIS_CODEC") {
			let codec = codec::codec_by_name(&name).ok_or_else(|| ConfigError::InvalidEnv {
				var: "SESSION_REDIS_CODEC",
				reason: format!("unknown codec `{}`", name),
			})?;
			config.codec = Some(codec);
		}

		Ok(config)
	}

	/// Check required fields and install the default codec when none is set
	pub fn validate(&mut self) -> Result<(), ConfigError> {
		if self.host.is_empty() {
			return Err(ConfigError::MissingHost);
		}
		if self.port == 0 {
			return Err(ConfigError::InvalidPort);
		}
		if self.max_idle == 0 {
			return Err(ConfigError::InvalidMaxIdle);
		}
		if self.idle_timeout.is_zero() {
			return Err(ConfigError::InvalidIdleTimeout);
		}

		if self.codec.is_none() {
			self.codec = Some(codec::default_codec());
		}

		Ok(())
	}

	/// Configured codec, or the default one
	pub fn codec(&self) -> Arc<dyn SessionCodec> {
		self.codec.clone().unwrap_or_else(codec::default_codec)
	}

	pub(crate) fn connection_info(&self) -> redis::ConnectionInfo {
		redis::ConnectionInfo {
			addr: redis::ConnectionAddr::Tcp(self.host.clone(), self.port),
			redis: redis::RedisConnectionInfo {
				db: self.db,
				password: self.password.clone(),
				..Default::default()
			},
		}
	}
}

impl Default for RedisConfig {
	fn default() -> Self {
		Self {
			host: DEFAULT_HOST.to_string(),
			port: DEFAULT_PORT,
			password: None,
			db: 0,
			max_idle: DEFAULT_MAX_IDLE,
			idle_timeout: DEFAULT_IDLE_TIMEOUT,
			key_prefix: DEFAULT_KEY_PREFIX.to_string(),
			codec: None,
		}
	}
}

impl fmt::Debug for RedisConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RedisConfig")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("db", &self.db)
			.field("max_idle", &self.max_idle)
			.field("idle_timeout", &self.idle_timeout)
			.field("key_prefix", &self.key_prefix)
			.field("codec", &self.codec.as_ref().map(|c| c.name()))
			.finish()
	}
}

impl ProviderConfig for RedisConfig {
	fn name(&self) -> &'static str {
		Self::PROVIDER_NAME
	}

	fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
		self
	}
}

fn parse_env<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: fmt::Display,
{
	match env::var(var) {
		Ok(raw) => raw
			.trim()
			.parse()
			.map(Some)
			.map_err(|e: T::Err| ConfigError::InvalidEnv {
				var,
				reason: e.to_string(),
			}),
		Err(_) => Ok(None),
	}
}
