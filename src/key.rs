//! Namespaced Redis keys for sessions
//!
//! A session key is `prefix + ":" + id`, where `id` is the raw identifier
//! supplied by the client. Nothing is escaped: a prefix or identifier that
//! contains `:` can produce the same key as a different pair. Keys are
//! cheap to build, which matters because every request builds at least one.

use bytes::{BufMut, Bytes, BytesMut};
use redis::{RedisWrite, ToRedisArgs};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Separator between the key prefix and the session identifier
pub const KEY_SEPARATOR: u8 = b':';

/// Size of each chunk the per-thread key buffer allocates
const KEY_BUFFER_CHUNK: usize = 4096;

thread_local! {
	static KEY_BUFFER: RefCell<BytesMut> = RefCell::new(BytesMut::with_capacity(KEY_BUFFER_CHUNK));
}

/// A fully built Redis key
///
/// Holds binary data; identifiers are not required to be UTF-8. Equality and
/// hashing look at the key bytes only.
///
/// The identifier part is a client credential, so [`Display`](fmt::Display)
/// and [`Debug`](fmt::Debug) print the prefix and the identifier length instead of the
/// identifier itself.
#[derive(Clone)]
pub struct SessionKey {
	bytes: Bytes,
	prefix_len: usize,
}

impl SessionKey {
	/// Raw key bytes as sent to Redis
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Prefix part of the key, without the separator
	pub fn prefix(&self) -> &[u8] {
		&self.bytes[..self.prefix_len]
	}

	/// Length of the identifier part in bytes
	pub fn id_len(&self) -> usize {
		self.bytes.len() - self.prefix_len - 1
	}
}

impl PartialEq for SessionKey {
	fn eq(&self, other: &Self) -> bool {
		self.bytes == other.bytes
	}
}

impl Eq for SessionKey {}

impl Hash for SessionKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.bytes.hash(state);
	}
}

impl AsRef<[u8]> for SessionKey {
	fn as_ref(&self) -> &[u8] {
		&self.bytes
	}
}

impl fmt::Debug for SessionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SessionKey(\"{}\")", self)
	}
}

impl fmt::Display for SessionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:<{} bytes>",
			String::from_utf8_lossy(self.prefix()),
			self.id_len()
		)
	}
}

impl ToRedisArgs for SessionKey {
	fn write_redis_args<W>(&self, out: &mut W)
	where
		W: ?Sized + RedisWrite,
	{
		out.write_arg(&self.bytes);
	}
}

/// Build the Redis key for a session identifier
///
/// The key is written into a per-thread buffer and split off as a shared
/// [`Bytes`], so consecutive keys on the same thread share one allocation
/// until the chunk is used up.
///
/// # Examples
///
/// ```
/// use reinhardt_session_redis::build_key;
///
/// let key = build_key("sess", b"u1");
/// assert_eq!(key.as_bytes(), b"sess:u1");
/// ```
pub fn build_key(prefix: &str, id: &[u8]) -> SessionKey {
	let len = prefix.len() + 1 + id.len();
	KEY_BUFFER.with(|cell| {
		let mut buf = cell.borrow_mut();
		if buf.capacity() < len {
			buf.reserve(len.max(KEY_BUFFER_CHUNK));
		}
		buf.put_slice(prefix.as_bytes());
		buf.put_u8(KEY_SEPARATOR);
		buf.put_slice(id);
		SessionKey {
			bytes: buf.split().freeze(),
			prefix_len: prefix.len(),
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case::ascii(b"u1".as_slice())]
	#[case::empty(b"".as_slice())]
	#[case::binary(&[0x00, 0xff, 0x7f, 0x80])]
	#[case::wildcard(b"*")]
	fn test_build_key_concatenates(#[case] id: &[u8]) {
		let key = build_key("sess", id);

		let mut expected = b"sess:".to_vec();
		expected.extend_from_slice(id);
		assert_eq!(key.as_bytes(), expected.as_slice());
	}

	#[rstest]
	fn test_keys_are_independent_after_buffer_reuse() {
		let first = build_key("sess", b"first");
		let second = build_key("sess", b"second");

		assert_eq!(first.as_bytes(), b"sess:first");
		assert_eq!(second.as_bytes(), b"sess:second");
	}

	#[rstest]
	fn test_key_longer_than_chunk() {
		let id = vec![b'x'; KEY_BUFFER_CHUNK * 2];

		let key = build_key("p", &id);

		assert_eq!(key.as_bytes().len(), id.len() + 2);
		assert!(key.as_bytes().starts_with(b"p:"));
	}

	#[rstest]
	fn test_key_is_written_as_single_binary_arg() {
		let key = build_key("sess", &[0xff, b':', 0x00]);

		let args = key.to_redis_args();

		assert_eq!(args, vec![b"sess:\xff:\x00".to_vec()]);
	}

	#[rstest]
	#[case::ascii(b"secret-token".as_slice(), "sess:<12 bytes>")]
	#[case::binary(&[0xff, b':', 0x00], "sess:<3 bytes>")]
	#[case::empty(b"".as_slice(), "sess:<0 bytes>")]
	fn test_formatting_hides_identifier(#[case] id: &[u8], #[case] expected: &str) {
		let key = build_key("sess", id);

		assert_eq!(key.to_string(), expected);
		assert_eq!(format!("{:?}", key), format!("SessionKey(\"{}\")", expected));
	}

	#[rstest]
	fn test_formatting_never_contains_identifier() {
		let key = build_key("sess", b"bearer-abc123");

		assert!(!key.to_string().contains("bearer-abc123"));
		assert!(!format!("{:?}", key).contains("bearer-abc123"));
		assert_eq!(key.prefix(), b"sess");
		assert_eq!(key.id_len(), 13);
	}

	#[rstest]
	fn test_separator_in_parts_collides() {
		// Keys are not escaped, so these two sessions share a backend key.
		let a = build_key("app", b"users:42");
		let b = build_key("app:users", b"42");

		assert_eq!(a, b);
		assert_ne!(a.prefix(), b.prefix());
	}
}
