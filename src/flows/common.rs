//! Server resolution and provider call plumbing shared by every flow.

// self
use crate::{
	_prelude::*,
	auth::ServerName,
	backend::Backend,
	clock::Clock,
	entry::ServerEntry,
	provider::{
		ClientAuth, Provider, ProviderConfig, ProviderError, ProviderErrorKind, ProviderOperations,
	},
};

/// Provider operations for one resolved server definition.
pub(crate) struct ServerOperations {
	server: ServerEntry,
	provider: Arc<dyn Provider>,
	clock: Arc<dyn Clock>,
	timeout: Option<Duration>,
}
impl ServerOperations {
	pub(crate) fn server(&self) -> &ServerEntry {
		&self.server
	}

	/// Operations bound to the first configured client identity.
	pub(crate) fn primary(&self) -> Box<dyn ProviderOperations> {
		let client = match self.server.client_secrets.first() {
			Some(secret) => ClientAuth::confidential(&self.server.client_id, secret.clone()),
			None => ClientAuth::public(&self.server.client_id),
		};

		self.provider.operations(client)
	}

	/// Runs `call` with each configured client secret in order until one is not rejected
	/// with `invalid_client`. Every attempt is bounded by the provider timeout.
	pub(crate) async fn with_secrets<T, F, Fut>(&self, mut call: F) -> Result<T, ProviderError>
	where
		F: FnMut(Box<dyn ProviderOperations>) -> Fut,
		Fut: Future<Output = Result<T, ProviderError>>,
	{
		let mut rejected = None;

		for client in self.clients() {
			match self.timed(call(self.provider.operations(client))).await {
				Err(e) if e.kind == ProviderErrorKind::InvalidClient => {
					tracing::debug!(server = %self.server.name, "client secret rejected, trying the next one");

					rejected = Some(e);
				},
				result => return result,
			}
		}

		Err(rejected.unwrap_or_else(|| {
			ProviderError::new(ProviderErrorKind::InvalidClient, "no client secret was accepted")
		}))
	}

	/// Bounds `call` by the provider timeout measured on the backend clock.
	pub(crate) async fn timed<T, Fut>(&self, call: Fut) -> Result<T, ProviderError>
	where
		Fut: Future<Output = Result<T, ProviderError>>,
	{
		let Some(limit) = self.timeout else { return call.await };

		tokio::select! {
			result = call => result,
			_ = self.clock.after(limit) =>
				Err(ProviderError::transient(format!("provider did not answer within {limit}"))),
		}
	}

	fn clients(&self) -> Vec<ClientAuth> {
		if self.server.client_secrets.is_empty() {
			return vec![ClientAuth::public(&self.server.client_id)];
		}

		self.server
			.client_secrets
			.iter()
			.map(|secret| ClientAuth::confidential(&self.server.client_id, secret.clone()))
			.collect()
	}
}

impl Backend {
	/// Returns `requested`, falling back to the configured default server.
	pub(crate) async fn server_or_default(&self, requested: Option<ServerName>) -> Result<ServerName> {
		if let Some(server) = requested {
			return Ok(server);
		}

		self.store()
			.read_config()
			.await?
			.and_then(|config| config.default_server)
			.ok_or_else(|| Error::invalid_input("server", "no server given and no default server is configured"))
	}

	/// Resolves `name` into provider operations.
	///
	/// A missing, corrupt, or unusable server is reported as [`Error::ServerConfiguration`];
	/// storage failures propagate unchanged. `expiry_delta` caps the provider timeout.
	pub(crate) async fn server_operations(
		&self,
		name: &ServerName,
		expiry_delta: Duration,
	) -> Result<ServerOperations> {
		let unusable =
			|reason: String| Error::ServerConfiguration { server: name.to_string(), reason };
		let key = self.store().key::<ServerEntry>(name);
		let server = match self.store().read::<ServerEntry>(&key).await {
			Ok(Some(server)) => server,
			Ok(None) => return Err(unusable("server not found".into())),
			Err(Error::KeyMismatch { .. }) =>
				return Err(unusable("stored server does not match its name".into())),
			Err(e) => return Err(e),
		};
		let config = ProviderConfig {
			version: Some(server.provider_version).filter(|version| *version > 0),
			options: server.provider_options.clone(),
			clock: self.clock().clone(),
		};
		let provider = match self.registry().create(&server.provider_name, &config) {
			Ok(provider) => provider,
			Err(Error::UnknownProvider { name }) =>
				return Err(unusable(format!("provider {name:?} is not registered"))),
			Err(Error::Provider(e)) => return Err(unusable(e.message)),
			Err(e) => return Err(e),
		};
		let timeout = self.tuning().await?.provider_timeout(expiry_delta);

		Ok(ServerOperations { server, provider, clock: self.clock().clone(), timeout })
	}
}
