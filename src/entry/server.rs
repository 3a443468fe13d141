//! Authorization server definitions.

// self
use crate::{
	_prelude::*,
	auth::{Secret, ServerName},
	entry::{Entry, EntryKind},
};

/// A configured authorization server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
	/// Plaintext server name; must derive to the key the entry is stored under.
	pub name: ServerName,
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secrets, tried in order until one is accepted.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub client_secrets: Vec<Secret>,
	/// Extra parameters appended to authorization URLs.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub auth_url_params: BTreeMap<String, String>,
	/// Registered provider implementation name.
	pub provider_name: String,
	/// Provider version recorded when the server was written.
	#[serde(default)]
	pub provider_version: i32,
	/// Provider-specific options.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub provider_options: BTreeMap<String, String>,
	#[serde(default, rename = "client_secret", skip_serializing)]
	legacy_client_secret: Option<Secret>,
}
impl ServerEntry {
	/// Creates a server entry with no secrets or options.
	pub fn new(
		name: ServerName,
		client_id: impl Into<String>,
		provider_name: impl Into<String>,
	) -> Self {
		Self {
			name,
			client_id: client_id.into(),
			client_secrets: Vec::new(),
			auth_url_params: BTreeMap::new(),
			provider_name: provider_name.into(),
			provider_version: 0,
			provider_options: BTreeMap::new(),
			legacy_client_secret: None,
		}
	}

	/// Appends a client secret.
	pub fn with_client_secret(mut self, secret: impl Into<Secret>) -> Self {
		self.client_secrets.push(secret.into());

		self
	}

	/// Sets a provider option.
	pub fn with_provider_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.provider_options.insert(key.into(), value.into());

		self
	}
}
impl Entry for ServerEntry {
	const KIND: EntryKind = EntryKind::Server;

	fn name(&self) -> &str {
		self.name.as_str()
	}

	fn upgrade(&mut self) {
		let Some(secret) = self.legacy_client_secret.take() else { return };

		if !secret.is_empty() && !self.client_secrets.contains(&secret) {
			self.client_secrets.insert(0, secret);
		}
	}
}
