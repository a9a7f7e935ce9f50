//! Error types for the Redis session provider

use thiserror::Error;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors returned by [`RedisProvider`](crate::RedisProvider) operations
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
	/// The configuration failed validation
	#[error("invalid session provider config: {0}")]
	Config(#[from] ConfigError),

	/// `init` received a configuration meant for another provider
	#[error("session provider config mismatch: expected `{expected}` config, got `{found}`")]
	ConfigMismatch {
		expected: &'static str,
		found: String,
	},

	/// Talking to Redis failed
	#[error("session redis connection error: {0}")]
	Connection(#[from] ConnectionError),

	/// Stored session bytes could not be decoded by the configured codec
	#[error("failed to decode session data: {0}")]
	Decode(#[source] CodecError),

	/// Session data could not be encoded by the configured codec
	#[error("failed to encode session data: {0}")]
	Encode(#[source] CodecError),

	/// An operation was issued before a successful `init`
	#[error("session provider used before init")]
	NotInitialized,
}

impl From<redis::RedisError> for ProviderError {
	fn from(err: redis::RedisError) -> Self {
		ProviderError::Connection(ConnectionError::Redis(err))
	}
}

impl From<deadpool_redis::PoolError> for ProviderError {
	fn from(err: deadpool_redis::PoolError) -> Self {
		ProviderError::Connection(ConnectionError::Pool(err))
	}
}

impl From<deadpool_redis::CreatePoolError> for ProviderError {
	fn from(err: deadpool_redis::CreatePoolError) -> Self {
		ProviderError::Connection(ConnectionError::CreatePool(err))
	}
}

/// Configuration validation errors
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	#[error("redis host must not be empty")]
	MissingHost,

	#[error("redis port must not be zero")]
	InvalidPort,

	#[error("max idle connections must be greater than zero")]
	InvalidMaxIdle,

	#[error("idle timeout must be greater than zero")]
	InvalidIdleTimeout,

	/// Redis refuses `SET ... EX 0`, so a session lifetime must be positive
	#[error("session lifetime must be greater than zero")]
	InvalidLifetime,

	#[error("invalid value for environment variable {var}: {reason}")]
	InvalidEnv { var: &'static str, reason: String },
}

/// Transport-level failures, wrapped unchanged
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error(transparent)]
	Redis(#[from] redis::RedisError),

	#[error(transparent)]
	Pool(#[from] deadpool_redis::PoolError),

	#[error(transparent)]
	CreatePool(#[from] deadpool_redis::CreatePoolError),
}

/// Session payload encode/decode errors
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
	#[error("MessagePack encode error: {0}")]
	MessagePackEncode(#[from] rmp_serde::encode::Error),

	#[error("MessagePack decode error: {0}")]
	MessagePackDecode(#[from] rmp_serde::decode::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Failure reported by a custom codec
	#[error("{0}")]
	Custom(String),
}

/// Marker returned next to a freshly created placeholder session.
///
/// A read that misses still yields a usable [`Store`](crate::Store); this
/// sentinel tells the caller the session is new rather than loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session not found")]
pub struct NotFound;
