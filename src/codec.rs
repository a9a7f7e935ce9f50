//! Session payload codecs
//!
//! A codec turns a session's [`SessionData`] into the bytes stored in Redis
//! and back. The provider uses [`MessagePackCodec`] unless the configuration
//! supplies another implementation.
//!
//! ## Example
//!
//! ```rust
//! use reinhardt_session_redis::codec::{JsonCodec, SessionCodec};
//! use reinhardt_session_redis::SessionData;
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = JsonCodec;
//!
//! let mut data = SessionData::new();
//! data.insert("user_id".to_string(), json!(42));
//!
//! let bytes = codec.encode(&data)?;
//! assert_eq!(codec.decode(&bytes)?, data);
//! # Ok(())
//! # }
//! ```

use crate::error::CodecError;
use crate::store::SessionData;
use std::fmt;
use std::sync::Arc;

/// Encodes and decodes session payloads
///
/// Implementations must be deterministic inverses: for every payload `p`
/// that encodes successfully, `decode(encode(p)) == p`.
pub trait SessionCodec: Send + Sync + fmt::Debug {
	/// Short identifier, used in logs and `SESSION_REDIS_CODEC`
	fn name(&self) -> &'static str;

	/// Encode a payload to bytes
	fn encode(&self, data: &SessionData) -> Result<Vec<u8>, CodecError>;

	/// Decode bytes previously produced by [`encode`](Self::encode)
	fn decode(&self, bytes: &[u8]) -> Result<SessionData, CodecError>;
}

/// Compact binary codec backed by `rmp-serde`
///
/// This is the default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl SessionCodec for MessagePackCodec {
	fn name(&self) -> &'static str {
		"msgpack"
	}

	fn encode(&self, data: &SessionData) -> Result<Vec<u8>, CodecError> {
		Ok(rmp_serde::to_vec_named(data)?)
	}

	fn decode(&self, bytes: &[u8]) -> Result<SessionData, CodecError> {
		Ok(rmp_serde::from_slice(bytes)?)
	}
}

/// Human-readable codec backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl SessionCodec for JsonCodec {
	fn name(&self) -> &'static str {
		"json"
	}

	fn encode(&self, data: &SessionData) -> Result<Vec<u8>, CodecError> {
		Ok(serde_json::to_vec(data)?)
	}

	fn decode(&self, bytes: &[u8]) -> Result<SessionData, CodecError> {
		Ok(serde_json::from_slice(bytes)?)
	}
}

/// The codec installed when a configuration does not name one
pub fn default_codec() -> Arc<dyn SessionCodec> {
	Arc::new(MessagePackCodec)
}

/// Look up a built-in codec by its [`SessionCodec::name`]
pub fn codec_by_name(name: &str) -> Option<Arc<dyn SessionCodec>> {
	match name.to_ascii_lowercase().as_str() {
		"msgpack" | "messagepack" => Some(Arc::new(MessagePackCodec)),
		"json" => Some(Arc::new(JsonCodec)),
		_ => None,
	}
}
