//! Walks a device authorization through approval against the scriptable mock provider, then
//! lets the background refresh loop keep the credential fresh.

// std
use std::sync::Arc;
// crates.io
use color_eyre::{Result, eyre::eyre};
use time::Duration;
// self
use oauthapp::{
	auth::{CredentialName, ServerName},
	backend::{BackendOptions, CredentialGrant, CredentialWrite, CredentialWriteOutcome, ServerWrite},
	entry::{ConfigEntry, Tuning},
	provider::{MockProvider, ProviderRegistry},
	store::MemoryStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let provider = MockProvider::new().with_token_lifetime(Some(Duration::seconds(15)));
	let registry = ProviderRegistry::new();

	registry.register("mock", provider.factory());

	let backend =
		BackendOptions::new(Arc::new(MemoryStorage::default())).with_registry(Arc::new(registry)).build();
	let corp = ServerName::new("corp")?;
	let name = CredentialName::new("living-room-tv")?;

	backend
		.write_server(
			corp.clone(),
			ServerWrite { client_id: "tv-client".into(), provider: "mock".into(), ..Default::default() },
		)
		.await?;
	backend
		.write_config(ConfigEntry {
			default_server: Some(corp),
			tuning: Tuning { refresh_check_interval_seconds: 5, ..Default::default() },
		})
		.await?;

	let grant = CredentialGrant::DeviceCode { scopes: vec!["openid".into()] };
	let CredentialWriteOutcome::PendingDeviceAuthorization(view) =
		backend.write_credential(&name, CredentialWrite::new(grant)).await?
	else {
		return Err(eyre!("device grant should wait for the user"));
	};

	println!("Visit {} and enter {}.", view.verification_uri, view.user_code);

	backend.poll_device_code(&name).await?;

	if let Some(token) = backend.read_credential(&name, Duration::ZERO).await? {
		println!("Approved, access token {}.", token.access_token.expose());
	}

	tokio::time::sleep(std::time::Duration::from_secs(6)).await;

	if let Some(token) = backend.read_credential(&name, Duration::ZERO).await? {
		println!("After the refresh loop ran: {}.", token.access_token.expose());
	}

	backend.shutdown().await;

	Ok(())
}
