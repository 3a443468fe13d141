#![cfg(feature = "test")]

// self
use oauthapp::{
	_preludet::*,
	backend::ClientCredsWrite,
	provider::{MockOperation, ProviderError},
};

fn access(view: Option<oauthapp::backend::TokenView>) -> String {
	view.expect("Entry should exist.").access_token.expose().to_owned()
}

#[tokio::test]
async fn client_credentials_are_cached_and_reissued() {
	let harness = TestBackend::new();
	let name = credential_name("svc");
	let server = harness.add_server("corp").await;

	harness
		.backend
		.write_self(
			&name,
			ClientCredsWrite { server: Some(server), scopes: vec!["api".into()], ..Default::default() },
		)
		.await
		.expect("Failed to write client credentials entry.");

	let first = harness.backend.read_self(&name, Duration::ZERO).await.expect("Read should succeed.");

	assert_eq!(access(first), "client-1");

	let cached = harness.backend.read_self(&name, Duration::ZERO).await.expect("Read should succeed.");

	assert_eq!(access(cached), "client-1");
	assert_eq!(harness.provider.calls(MockOperation::ClientCredentials), 1);

	harness.clock.advance(Duration::hours(1));

	let reissued = harness.backend.read_self(&name, Duration::ZERO).await.expect("Read should succeed.");

	assert_eq!(access(reissued), "client-2");

	harness.clock.advance(Duration::hours(1));
	harness.provider.fail_next(MockOperation::ClientCredentials, ProviderError::transient("upstream flapped"));

	let err = harness
		.backend
		.read_self(&name, Duration::ZERO)
		.await
		.expect_err("Client credentials failures are returned to the caller.");

	assert!(matches!(err, Error::Provider(ref e) if e.message == "upstream flapped"));

	harness.backend.delete_self(&name).await.expect("Delete should succeed.");

	assert!(harness.backend.read_self(&name, Duration::ZERO).await.expect("Read should succeed.").is_none());
}

#[tokio::test]
async fn client_credentials_need_an_existing_server() {
	let harness = TestBackend::new();
	let err = harness
		.backend
		.write_self(
			&credential_name("svc"),
			ClientCredsWrite { server: Some(server_name("missing")), ..Default::default() },
		)
		.await
		.expect_err("Unknown servers should be rejected.");

	assert!(matches!(err, Error::UnknownServer { ref name } if name == "missing"));
}

#[tokio::test]
async fn deleted_servers_surface_as_configuration_errors() {
	let harness = TestBackend::new();
	let name = credential_name("svc");
	let server = harness.add_server("corp").await;

	harness
		.backend
		.write_self(&name, ClientCredsWrite { server: Some(server.clone()), ..Default::default() })
		.await
		.expect("Failed to write client credentials entry.");
	harness.backend.delete_server(&server).await.expect("Delete should succeed.");

	let err = harness
		.backend
		.read_self(&name, Duration::ZERO)
		.await
		.expect_err("A missing server cannot issue tokens.");

	assert!(matches!(err, Error::ServerConfiguration { ref reason, .. } if reason == "server not found"));
	assert_eq!(harness.provider.calls(MockOperation::ClientCredentials), 0);
}
