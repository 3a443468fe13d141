//! Server definitions: read, sorted listing, validated write, delete.

// self
use crate::{
	_prelude::*,
	auth::{Secret, ServerName},
	backend::{Backend, ServerView},
	entry::ServerEntry,
	provider::ProviderConfig,
};

/// Server definition supplied by a caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerWrite {
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secrets, tried in order.
	pub client_secrets: Vec<Secret>,
	/// Extra authorization URL parameters.
	pub auth_url_params: BTreeMap<String, String>,
	/// Registered provider name.
	pub provider: String,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}

impl Backend {
	/// Reads server `name` without its secrets.
	pub async fn read_server(&self, name: &ServerName) -> Result<Option<ServerView>> {
		let key = self.store().key::<ServerEntry>(name);

		Ok(self.store().read::<ServerEntry>(&key).await?.as_ref().map(ServerView::from))
	}

	/// Lists server names in lexical order. Entries stored under a foreign key are skipped.
	pub async fn list_servers(&self) -> Result<Vec<ServerName>> {
		let mut names = Vec::new();

		for key in self.store().list_keys::<ServerEntry>().await? {
			match self.store().read::<ServerEntry>(&key).await {
				Ok(Some(server)) => names.push(server.name),
				Ok(None) => {},
				Err(Error::KeyMismatch { key, name }) => {
					tracing::warn!(%key, %name, "skipping server stored under a foreign key");
				},
				Err(e) => return Err(e),
			}
		}

		names.sort();

		Ok(names)
	}

	/// Validates and stores server `name`, replacing any previous definition.
	///
	/// The provider is instantiated once to check its name and options; its version is recorded.
	pub async fn write_server(&self, name: ServerName, request: ServerWrite) -> Result<()> {
		if request.client_id.is_empty() {
			return Err(Error::invalid_input("client_id", "must not be empty"));
		}
		if request.provider.is_empty() {
			return Err(Error::invalid_input("provider", "must not be empty"));
		}

		let config = ProviderConfig {
			version: None,
			options: request.provider_options.clone(),
			clock: self.clock().clone(),
		};
		let provider = match self.registry().create(&request.provider, &config) {
			Ok(provider) => provider,
			Err(Error::Provider(e)) => return Err(Error::invalid_input("provider_options", e.message)),
			Err(e) => return Err(e),
		};
		let mut server = ServerEntry::new(name, request.client_id, request.provider);

		server.client_secrets = request.client_secrets.into_iter().filter(|s| !s.is_empty()).collect();
		server.auth_url_params = request.auth_url_params;
		server.provider_options = request.provider_options;
		server.provider_version = provider.version();

		let key = self.store().key::<ServerEntry>(&server.name);

		self.store().lock::<ServerEntry>(&key).await.write(&server).await?;
		tracing::info!(server = %server.name, provider = %server.provider_name, "server written");

		Ok(())
	}

	/// Deletes server `name`. Credentials issued by it are kept and report the server as
	/// unusable until it is written again.
	pub async fn delete_server(&self, name: &ServerName) -> Result<()> {
		let key = self.store().key::<ServerEntry>(name);

		self.store().lock::<ServerEntry>(&key).await.delete().await?;
		tracing::info!(server = %name, "server deleted");

		Ok(())
	}

	pub(crate) async fn require_server(&self, name: &ServerName) -> Result<()> {
		let key = self.store().key::<ServerEntry>(name);

		match self.store().read::<ServerEntry>(&key).await? {
			Some(_) => Ok(()),
			None => Err(Error::UnknownServer { name: name.to_string() }),
		}
	}
}
