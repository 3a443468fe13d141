//! Strongly typed names for servers and credentials.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_name {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new name after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, NameError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}

			/// Returns the name as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = NameError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = NameError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const NAME_MAX_LEN: usize = 256;

/// Error returned when name validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum NameError {
	/// The name was empty.
	#[error("{kind} name cannot be empty.")]
	Empty {
		/// Kind of name (server, credential).
		kind: &'static str,
	},
	/// The name contains whitespace or control characters.
	#[error("{kind} name contains whitespace or control characters.")]
	InvalidCharacter {
		/// Kind of name (server, credential).
		kind: &'static str,
	},
	/// The name exceeded the allowed byte count.
	#[error("{kind} name exceeds {max} bytes.")]
	TooLong {
		/// Kind of name (server, credential).
		kind: &'static str,
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

def_name! { ServerName, "Name of a configured authorization server.", "Server" }
def_name! { CredentialName, "Name of a stored credential (authorization code or client credentials).", "Credential" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), NameError> {
	if view.is_empty() {
		return Err(NameError::Empty { kind });
	}
	if view.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(NameError::InvalidCharacter { kind });
	}
	if view.len() > NAME_MAX_LEN {
		return Err(NameError::TooLong { kind, max: NAME_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn names_reject_whitespace_and_control_characters() {
		assert!(ServerName::new(" corp").is_err(), "Leading whitespace must be rejected.");
		assert!(ServerName::new("corp\u{7}").is_err(), "Control characters must be rejected.");
		assert!(CredentialName::new("").is_err());

		let name = CredentialName::new("team/ci-bot")
			.expect("Slash-separated credential names should be accepted.");

		assert_eq!(name.as_str(), "team/ci-bot");
	}

	#[test]
	fn serde_enforces_validation() {
		let server: ServerName =
			serde_json::from_str("\"github\"").expect("Server name should deserialize.");

		assert_eq!(server.as_ref(), "github");
		assert!(serde_json::from_str::<ServerName>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		ServerName::new("a".repeat(NAME_MAX_LEN)).expect("Exact length should succeed.");

		assert!(ServerName::new("a".repeat(NAME_MAX_LEN + 1)).is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ServerName, u8> = HashMap::from_iter([(
			ServerName::new("corp").expect("Server used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("corp"), Some(&7));
	}
}
