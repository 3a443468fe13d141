//! Storage key layout.
//!
//! Named entries live under `<prefix><h[0..2]>/<h[2..4]>/<h[4..]>` where `h` is the hex
//! SHA-224 of the optional salt followed by the entry name.

// std
use std::fmt::Write as _;
// crates.io
use sha2::{Digest, Sha224};
// self
use crate::_prelude::*;

/// Storage key of the backend configuration entry.
pub const CONFIG_KEY: &str = "config";

/// Kinds of named entries kept in storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
	/// Authorization server definitions.
	Server,
	/// Authorization-code credentials.
	AuthCode,
	/// Client-credentials credentials.
	ClientCreds,
}
impl EntryKind {
	/// Storage prefix for this kind, including the trailing slash.
	pub const fn prefix(self) -> &'static str {
		match self {
			Self::Server => "servers/",
			Self::AuthCode => "creds/",
			Self::ClientCreds => "self/",
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Server => "server",
			Self::AuthCode => "auth_code",
			Self::ClientCreds => "client_creds",
		}
	}
}
impl Display for EntryKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully qualified storage key of a named entry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
	kind: EntryKind,
	path: String,
}
impl EntryKey {
	/// Wraps a raw storage key, returning `None` when it lies outside `kind`'s prefix.
	pub fn from_storage(kind: EntryKind, path: impl Into<String>) -> Option<Self> {
		let path = path.into();

		path.starts_with(kind.prefix()).then_some(Self { kind, path })
	}

	/// Entry kind addressed by this key.
	pub fn kind(&self) -> EntryKind {
		self.kind
	}

	/// Raw storage key.
	pub fn as_str(&self) -> &str {
		&self.path
	}
}
impl Debug for EntryKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "EntryKey({})", self.path)
	}
}
impl Display for EntryKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.path)
	}
}

/// Derives storage keys from entry names.
#[derive(Clone, Default)]
pub struct KeyDeriver {
	salt: Arc<[u8]>,
}
impl KeyDeriver {
	/// Creates a deriver that mixes `salt` into every hash.
	///
	/// An empty salt keeps the unsalted layout.
	pub fn new(salt: impl Into<Vec<u8>>) -> Self {
		Self { salt: salt.into().into() }
	}

	/// Storage key for the entry `name` of `kind`.
	pub fn derive(&self, kind: EntryKind, name: &str) -> EntryKey {
		let digest = Sha224::new().chain_update(&self.salt).chain_update(name.as_bytes()).finalize();
		let path =
			format!("{}{}/{}/{}", kind.prefix(), hex(&digest[..2]), hex(&digest[2..4]), hex(&digest[4..]));

		EntryKey { kind, path }
	}
}
impl Debug for KeyDeriver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeyDeriver").field("salted", &!self.salt.is_empty()).finish()
	}
}

fn hex(bytes: &[u8]) -> String {
	let mut buf = String::with_capacity(bytes.len() * 2);

	for byte in bytes {
		let _ = write!(buf, "{byte:02x}");
	}

	buf
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unsalted_layout_splits_the_digest() {
		let key = KeyDeriver::default().derive(EntryKind::Server, "abc");

		assert_eq!(
			key.as_str(),
			"servers/2309/7d22/3405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"
		);
		assert_eq!(key.kind(), EntryKind::Server);
	}

	#[test]
	fn kinds_and_salts_separate_key_spaces() {
		let plain = KeyDeriver::default();
		let salted = KeyDeriver::new(b"pepper".to_vec());
		let server = plain.derive(EntryKind::Server, "corp");
		let creds = plain.derive(EntryKind::AuthCode, "corp");

		assert!(creds.as_str().starts_with("creds/"));
		assert_eq!(&server.as_str()["servers/".len()..], &creds.as_str()["creds/".len()..]);
		assert_ne!(server, salted.derive(EntryKind::Server, "corp"));
	}

	#[test]
	fn from_storage_checks_the_prefix() {
		assert!(EntryKey::from_storage(EntryKind::ClientCreds, "self/aa/bb/cc").is_some());
		assert!(EntryKey::from_storage(EntryKind::ClientCreds, "creds/aa/bb/cc").is_none());
	}
}
