//! # reinhardt-session-redis
//!
//! Redis session provider for Reinhardt.
//!
//! Stores short-lived, per-user session state in Redis and leaves expiry to
//! Redis key TTLs. The provider maps the session lifecycle onto plain Redis
//! commands:
//!
//! | Operation | Commands |
//! |---|---|
//! | `read_store` | `GET`, plus `SET .. EX` for a new session |
//! | `regenerate` | `EXISTS`, `RENAME`, `EXPIRE`, `GET` |
//! | `destroy` | `EXISTS`, `DEL` |
//! | `count` | `KEYS prefix:*` |
//! | `save` | `SET .. EX` |
//!
//! ## Features
//!
//! - **Connection pooling**: `deadpool-redis` pool, one connection per operation
//! - **Pluggable codecs**: MessagePack by default, JSON built in, custom via [`SessionCodec`]
//! - **Binary identifiers**: session ids are raw bytes and need not be UTF-8
//! - **No sweeper**: [`SessionProvider::need_gc`] is always `false`
//!
//! ## Example
//!
//! ```rust,no_run
//! use reinhardt_session_redis::{RedisConfig, RedisProvider, SessionProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::from_env()?;
//!
//!     let mut provider = RedisProvider::new();
//!     provider.init(3600, Box::new(config)).await?;
//!     let provider = Arc::new(provider);
//!
//!     let lookup = provider.read_store(b"session-id").await?;
//!     println!("new session: {}", lookup.is_new());
//!
//!     provider.regenerate(b"session-id", b"rotated-id").await?;
//!     provider.destroy(b"rotated-id").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Caveats
//!
//! - Keys are `prefix:id` without escaping, so ids or prefixes containing `:`
//!   can collide.
//! - `count` uses `KEYS` and costs O(keyspace).
//! - `regenerate` and `destroy` check `EXISTS` before acting, in a separate
//!   round trip, so concurrent calls on the same id can race.
//! - Operations carry no deadline of their own.

pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod provider;
pub mod store;

pub use codec::{JsonCodec, MessagePackCodec, SessionCodec};
pub use config::{ProviderConfig, RedisConfig};
pub use error::{CodecError, ConfigError, ConnectionError, NotFound, ProviderError, Result};
pub use key::{SessionKey, build_key};
pub use provider::{RedisProvider, SessionProvider};
pub use store::{Lookup, SessionData, Store};
