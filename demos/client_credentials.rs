//! Issues and reuses a client-credentials token from an HTTP token endpoint served by
//! `httpmock`, using the default provider registry and in-memory storage.

// std
use std::{collections::BTreeMap, sync::Arc};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
// self
use oauthapp::{
	auth::{CredentialName, Secret, ServerName},
	backend::{BackendOptions, ClientCredsWrite, ServerWrite},
	provider::basic,
	store::MemoryStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let backend = BackendOptions::new(Arc::new(MemoryStorage::default())).build();
	let corp = ServerName::new("corp")?;
	let name = CredentialName::new("service-router")?;

	backend
		.write_server(
			corp.clone(),
			ServerWrite {
				client_id: "demo-client".into(),
				client_secrets: vec![Secret::new("super-secret")],
				provider: basic::NAME.into(),
				provider_options: BTreeMap::from([
					("auth_code_url".to_owned(), server.url("/authorize")),
					("token_url".to_owned(), server.url("/token")),
				]),
				..Default::default()
			},
		)
		.await?;
	backend
		.write_self(
			&name,
			ClientCredsWrite {
				server: Some(corp),
				scopes: vec!["email.read".into(), "profile.read".into()],
				..Default::default()
			},
		)
		.await?;

	for _ in 0..2 {
		if let Some(token) = backend.read_self(&name, Duration::minutes(1)).await? {
			println!("Reusable access token: {}.", token.access_token.expose());
		}
	}

	token_mock.assert_async().await;

	Ok(())
}
