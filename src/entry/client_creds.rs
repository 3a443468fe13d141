//! Client-credentials credentials.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, ServerName, Token},
	entry::{Entry, EntryKind},
};

/// A credential issued to the client itself through the client-credentials grant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientCredsEntry {
	/// Credential name.
	pub name: CredentialName,
	/// Server the token is requested from.
	pub server_name: ServerName,
	/// Extra parameters sent to the token endpoint.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub token_url_params: BTreeMap<String, String>,
	/// Requested scopes.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes: Vec<String>,
	/// Provider-specific options.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub provider_options: BTreeMap<String, String>,
	/// Most recently issued token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token: Option<Token>,
}
impl ClientCredsEntry {
	/// Creates an entry with no parameters and no token.
	pub fn new(name: CredentialName, server_name: ServerName) -> Self {
		Self {
			name,
			server_name,
			token_url_params: BTreeMap::new(),
			scopes: Vec::new(),
			provider_options: BTreeMap::new(),
			token: None,
		}
	}
}
impl Entry for ClientCredsEntry {
	const KIND: EntryKind = EntryKind::ClientCreds;

	fn name(&self) -> &str {
		self.name.as_str()
	}
}
