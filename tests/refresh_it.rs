#![cfg(feature = "test")]

// self
use oauthapp::{
	_preludet::*,
	auth::{Secret, ServerName},
	backend::{CredentialGrant, CredentialWrite, ServerWrite},
	entry::ConfigEntry,
	provider::{MockOperation, MockProvider, ProviderError, ProviderErrorKind},
};

async fn issue(harness: &TestBackend, name: &str, server: &ServerName) {
	let grant = CredentialGrant::AuthorizationCode { code: name.into(), redirect_url: None };

	harness
		.backend
		.write_credential(&credential_name(name), CredentialWrite::new(grant).with_server(server.clone()))
		.await
		.expect("Failed to issue test credential.");
}

#[tokio::test]
async fn validity_check_is_idempotent() {
	let harness = TestBackend::new();
	let server = harness.add_server("corp").await;

	issue(&harness, "ci", &server).await;

	let first = harness
		.backend
		.read_credential(&credential_name("ci"), Duration::minutes(5))
		.await
		.expect("Read should succeed.")
		.expect("Credential should exist.");
	let second = harness
		.backend
		.read_credential(&credential_name("ci"), Duration::minutes(5))
		.await
		.expect("Read should succeed.")
		.expect("Credential should exist.");

	assert_eq!(first, second);
	assert_eq!(first.access_token.expose(), "ci-access");
	assert_eq!(harness.provider.calls(MockOperation::Refresh), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_refresh() {
	let harness = TestBackend::new();
	let server = harness.add_server("corp").await;

	issue(&harness, "shared", &server).await;
	harness.clock.advance(Duration::hours(2));

	let mut tasks = Vec::new();

	for _ in 0..16 {
		let backend = harness.backend.clone();

		tasks.push(tokio::spawn(async move {
			backend
				.get_or_refresh(&credential_name("shared"), Duration::ZERO)
				.await
				.expect("Refresh should succeed.")
				.expect("Credential should exist.")
		}));
	}

	for task in tasks {
		let entry = task.await.expect("Refresh task should not panic.");
		let token = entry.token.expect("Refreshed credential should carry a token.");

		assert_eq!(token.access_token.expose(), "refreshed-1");
		assert_eq!(token.refresh_secret().map(Secret::expose), Some("shared-refresh"));
	}

	assert_eq!(harness.provider.calls(MockOperation::Refresh), 1);
}

#[tokio::test]
async fn refresh_failures_are_classified() {
	let harness = TestBackend::new();
	let server = harness.add_server("corp").await;
	let name = credential_name("flaky");

	issue(&harness, "flaky", &server).await;
	harness.clock.advance(Duration::hours(2));

	// The read below retries the refresh, so it needs a failure of its own.
	for _ in 0..2 {
		harness.provider.fail_next(MockOperation::Refresh, ProviderError::transient("upstream flapped"));
	}

	let entry = harness
		.backend
		.get_or_refresh(&name, Duration::ZERO)
		.await
		.expect("Transient failures should not surface.")
		.expect("Credential should exist.");

	assert_eq!(entry.transient_errors_since_last_issue, 1);
	assert_eq!(entry.last_transient_error.as_deref(), Some("refresh failed: upstream flapped"));
	assert!(matches!(
		harness.backend.read_credential(&name, Duration::ZERO).await,
		Err(Error::TokenExpired)
	));

	for _ in 0..2 {
		harness.provider.fail_next(
			MockOperation::Refresh,
			ProviderError::new(ProviderErrorKind::InvalidGrant, "invalid_grant"),
		);
	}

	let entry = harness
		.backend
		.get_or_refresh(&name, Duration::ZERO)
		.await
		.expect("User failures should not surface.")
		.expect("Credential should exist.");

	assert_eq!(entry.user_error(), Some("refresh failed: invalid_grant"));
	assert_eq!(entry.transient_errors_since_last_issue, 2);
	assert!(matches!(
		harness.backend.read_credential(&name, Duration::ZERO).await,
		Err(Error::Rejected { reason }) if reason == "refresh failed: invalid_grant"
	));

	let healed = harness
		.backend
		.get_or_refresh(&name, Duration::ZERO)
		.await
		.expect("Refresh should succeed.")
		.expect("Credential should exist.");

	assert!(healed.token_issued());
	assert_eq!(healed.user_error(), None);
	assert_eq!(healed.transient_errors_since_last_issue, 0);
}

#[tokio::test]
async fn deleted_servers_heal_when_written_again() {
	let harness = TestBackend::new();
	let server = harness.add_server("corp").await;
	let name = credential_name("orphan");

	issue(&harness, "orphan", &server).await;
	harness.backend.delete_server(&server).await.expect("Server delete should succeed.");
	harness.clock.advance(Duration::hours(2));

	let err = harness
		.backend
		.read_credential(&name, Duration::ZERO)
		.await
		.expect_err("Credential of a deleted server should not be readable.");

	assert!(matches!(err, Error::ServerConfiguration { ref reason, .. } if reason == "server not found"));
	assert_eq!(
		harness.auth_code(&name).await.and_then(|entry| entry.auth_server_error().map(str::to_owned)),
		Some("server not found".into())
	);

	harness.add_server("corp").await;

	let token = harness
		.backend
		.read_credential(&name, Duration::ZERO)
		.await
		.expect("Read should succeed once the server is back.")
		.expect("Credential should exist.");

	assert_eq!(token.access_token.expose(), "refreshed-1");
}

#[tokio::test]
async fn rejected_client_secrets_fall_through_to_the_next() {
	let harness = TestBackend::with_provider(MockProvider::new().with_expected_secret("new"));
	let server = server_name("rotating");
	let request = ServerWrite {
		client_id: "client".into(),
		client_secrets: vec![Secret::new("old"), Secret::new("new")],
		provider: MOCK_PROVIDER.into(),
		..Default::default()
	};

	harness.backend.write_server(server.clone(), request).await.expect("Server write should succeed.");
	issue(&harness, "rotated", &server).await;

	assert_eq!(harness.provider.calls(MockOperation::AuthCodeExchange), 2);
	assert!(harness.auth_code(&credential_name("rotated")).await.is_some_and(|entry| entry.token_issued()));
}

#[tokio::test]
async fn default_server_is_used_when_none_is_given() {
	let harness = TestBackend::new();
	let server = harness.add_server("corp").await;
	let name = credential_name("defaulted");
	let request = || {
		CredentialWrite::new(CredentialGrant::AuthorizationCode { code: "c".into(), redirect_url: None })
	};
	let err = harness
		.backend
		.write_credential(&name, request())
		.await
		.expect_err("Write without any server should fail.");

	assert!(matches!(err, Error::InvalidInput { field: "server", .. }));

	harness
		.backend
		.write_config(ConfigEntry { default_server: Some(server.clone()), tuning: TestBackend::tuning() })
		.await
		.expect("Config write should succeed.");
	harness.backend.write_credential(&name, request()).await.expect("Default server should be used.");

	assert_eq!(harness.auth_code(&name).await.map(|entry| entry.server_name), Some(server));

	let err = harness
		.backend
		.write_credential(&name, request().with_server(server_name("missing")))
		.await
		.expect_err("Unknown servers should be rejected.");

	assert!(matches!(err, Error::UnknownServer { ref name } if name == "missing"));
	harness.backend.shutdown().await;
}

#[tokio::test]
async fn refresh_token_import_redeems_immediately() {
	let harness = TestBackend::new();
	let server = harness.add_server("corp").await;
	let name = credential_name("imported");
	let grant = CredentialGrant::RefreshToken { refresh_token: Secret::new("seed") };

	harness
		.backend
		.write_credential(&name, CredentialWrite::new(grant).with_server(server))
		.await
		.expect("Import should succeed.");

	let entry = harness.auth_code(&name).await.expect("Credential should exist.");
	let token = entry.token.expect("Imported credential should carry a token.");

	assert_eq!(token.access_token.expose(), "refreshed-1");
	assert_eq!(token.refresh_secret().map(Secret::expose), Some("seed"));
}

#[tokio::test]
async fn provider_options_are_replayed_on_refresh() {
	let harness = TestBackend::new();
	let server = harness.add_server("corp").await;
	let name = credential_name("tenanted");
	let grant = CredentialGrant::AuthorizationCode { code: "tenanted".into(), redirect_url: None };
	let options = BTreeMap::from([("tenant".to_owned(), "acme".to_owned())]);
	let request =
		CredentialWrite { provider_options: options.clone(), ..CredentialWrite::new(grant).with_server(server) };

	harness.backend.write_credential(&name, request).await.expect("Failed to issue test credential.");
	harness.clock.advance(Duration::hours(2));
	harness.backend.get_or_refresh(&name, Duration::ZERO).await.expect("Refresh should succeed.");

	assert_eq!(harness.provider.last_refresh_options(), Some(options.clone()));
	assert_eq!(harness.auth_code(&name).await.map(|entry| entry.provider_options), Some(options));
}

#[tokio::test]
async fn oversized_minimum_validity_is_reported_as_expired() {
	let harness = TestBackend::new();
	let server = harness.add_server("corp").await;

	issue(&harness, "ci", &server).await;

	let result =
		harness.backend.read_credential(&credential_name("ci"), Duration::days(365 * 20_000)).await;

	assert!(matches!(result, Err(Error::TokenExpired)), "Unexpected result: {result:?}.");
	assert!(
		harness
			.backend
			.read_credential(&credential_name("ci"), Duration::minutes(5))
			.await
			.expect("Read should succeed.")
			.is_some()
	);
}
