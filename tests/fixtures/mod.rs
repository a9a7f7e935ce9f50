//! Test fixtures for Redis session provider tests.
//!
//! All fixtures are designed to work with rstest and can be composed together.

#![allow(dead_code)]
#![allow(unreachable_pub)]

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use reinhardt_session_redis::{RedisConfig, RedisProvider, SessionProvider};
use rstest::fixture;
use std::time::Duration;
use testcontainers::{
	ContainerAsync, GenericImage,
	core::{IntoContainerPort, WaitFor},
	runners::AsyncRunner,
};

/// Host the mapped container port is reachable on
pub const REDIS_HOST: &str = "127.0.0.1";

/// Session lifetime used by most tests
pub const LIFETIME: u64 = 3600;

// ============================================================================
// Redis Container Fixtures
// ============================================================================

/// Fixture providing a Redis container
///
/// Starts a Redis 7 Alpine container and returns it with its mapped port.
#[fixture]
pub async fn redis_container() -> (ContainerAsync<GenericImage>, u16) {
	const MAX_RETRIES: u32 = 3;
	const RETRY_DELAY_MS: u64 = 2000;

	let mut last_error = None;

	for attempt in 0..MAX_RETRIES {
		match try_start_redis_container().await {
			Ok(result) => return result,
			Err(e) => {
				eprintln!(
					"Redis container start attempt {} of {} failed: {:?}",
					attempt + 1,
					MAX_RETRIES,
					e
				);
				last_error = Some(e);

				if attempt < MAX_RETRIES - 1 {
					tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
				}
			}
		}
	}

	panic!(
		"Failed to start Redis container after {} attempts: {:?}",
		MAX_RETRIES, last_error
	);
}

async fn try_start_redis_container()
-> Result<(ContainerAsync<GenericImage>, u16), Box<dyn std::error::Error>> {
	let redis = GenericImage::new("redis", "7-alpine")
		.with_exposed_port(6379.tcp())
		.with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
		.start()
		.await?;

	let port = redis.get_host_port_ipv4(6379).await?;

	Ok((redis, port))
}

// ============================================================================
// Session Fixtures
// ============================================================================

/// A running Redis with a side connection for inspecting raw keys
pub struct SessionRedis {
	container: ContainerAsync<GenericImage>,
	pub port: u16,
	pub inspector: MultiplexedConnection,
}

impl SessionRedis {
	/// Provider config pointing at this container
	pub fn config(&self) -> RedisConfig {
		RedisConfig::new(REDIS_HOST, self.port)
			.with_max_idle(8)
			.with_idle_timeout(Duration::from_secs(30))
			.with_key_prefix("sess")
	}

	/// Initialize a provider with `config` and `lifetime`
	pub async fn provider_with(&self, config: RedisConfig, lifetime: u64) -> RedisProvider {
		let mut provider = RedisProvider::new();
		provider
			.init(lifetime, Box::new(config))
			.await
			.expect("Failed to init redis session provider");
		provider
	}

	/// Initialize a provider with the default test config
	pub async fn provider(&self) -> RedisProvider {
		self.provider_with(self.config(), LIFETIME).await
	}

	/// Raw value stored under `key`
	pub async fn raw_get(&self, key: &[u8]) -> Option<Vec<u8>> {
		let mut conn = self.inspector.clone();
		conn.get(key).await.expect("GET failed")
	}

	/// Write a raw value under `key` without a TTL
	pub async fn raw_set(&self, key: &[u8], value: &[u8]) {
		let mut conn = self.inspector.clone();
		let _: () = conn.set(key, value).await.expect("SET failed");
	}

	pub async fn exists(&self, key: &[u8]) -> bool {
		let mut conn = self.inspector.clone();
		let count: usize = conn.exists(key).await.expect("EXISTS failed");
		count > 0
	}

	/// Remaining TTL of `key` in seconds (`-2` when missing, `-1` without TTL)
	pub async fn ttl(&self, key: &[u8]) -> i64 {
		let mut conn = self.inspector.clone();
		conn.ttl(key).await.expect("TTL failed")
	}

	pub async fn expire(&self, key: &[u8], seconds: i64) {
		let mut conn = self.inspector.clone();
		let _: () = conn.expire(key, seconds).await.expect("EXPIRE failed");
	}

	/// Deny `command` to the default user, which every connection here uses
	pub async fn deny_command(&self, command: &str) {
		let mut conn = self.inspector.clone();
		let _: () = redis::cmd("ACL")
			.arg("SETUSER")
			.arg("default")
			.arg(format!("-{}", command))
			.query_async(&mut conn)
			.await
			.expect("ACL SETUSER failed");
	}

	/// Stop the container, leaving the provider's pooled connections dangling
	pub async fn stop(&self) {
		self.container.stop().await.expect("Failed to stop redis container");
	}

	/// Ids of server-side client connections, excluding the inspector
	pub async fn client_ids(&self) -> Vec<u64> {
		let mut conn = self.inspector.clone();
		let own: u64 = redis::cmd("CLIENT")
			.arg("ID")
			.query_async(&mut conn)
			.await
			.expect("CLIENT ID failed");
		let list: String = redis::cmd("CLIENT")
			.arg("LIST")
			.query_async(&mut conn)
			.await
			.expect("CLIENT LIST failed");

		list.lines()
			.filter_map(|line| line.strip_prefix("id="))
			.filter_map(|rest| rest.split_whitespace().next())
			.filter_map(|id| id.parse().ok())
			.filter(|&id| id != own)
			.collect()
	}

	/// Server-side count of processed commands
	pub async fn commands_processed(&self) -> u64 {
		let mut conn = self.inspector.clone();
		let info: String = redis::cmd("INFO")
			.arg("stats")
			.query_async(&mut conn)
			.await
			.expect("INFO failed");

		info.lines()
			.find_map(|line| line.strip_prefix("total_commands_processed:"))
			.and_then(|v| v.trim().parse().ok())
			.expect("total_commands_processed missing from INFO")
	}
}

/// Fixture providing a Redis container plus an inspection connection
#[fixture]
pub async fn session_redis(
	#[future] redis_container: (ContainerAsync<GenericImage>, u16),
) -> SessionRedis {
	let (container, port) = redis_container.await;

	let client = redis::Client::open(format!("redis://{}:{}", REDIS_HOST, port))
		.expect("Failed to create redis client");
	let inspector = client
		.get_multiplexed_async_connection()
		.await
		.expect("Failed to connect to redis");

	SessionRedis {
		container,
		port,
		inspector,
	}
}

/// Assert `ttl` is a freshly armed lifetime
pub fn assert_fresh_ttl(ttl: i64, lifetime: u64) {
	let lifetime = lifetime as i64;
	assert!(
		ttl <= lifetime && ttl >= lifetime - 5,
		"expected TTL close to {}, got {}",
		lifetime,
		ttl
	);
}
