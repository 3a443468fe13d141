#![cfg(feature = "test")]

// self
use oauthapp::{
	_preludet::*,
	auth::Secret,
	backend::{CredentialGrant, CredentialWrite, ServerWrite},
	entry::ServerEntry,
	store::Storage,
};

#[tokio::test]
async fn servers_are_listed_in_order_without_secrets() {
	let harness = TestBackend::new();

	for name in ["zeta", "alpha", "mid"] {
		harness.add_server(name).await;
	}

	harness
		.backend
		.write_server(
			server_name("alpha"),
			ServerWrite {
				client_id: "alpha-client".into(),
				client_secrets: vec![Secret::new("one"), Secret::new(""), Secret::new("two")],
				provider: MOCK_PROVIDER.into(),
				..Default::default()
			},
		)
		.await
		.expect("Failed to overwrite server.");

	let names = harness.backend.list_servers().await.expect("Listing should succeed.");

	assert_eq!(names, vec![server_name("alpha"), server_name("mid"), server_name("zeta")]);

	let view = harness
		.backend
		.read_server(&server_name("alpha"))
		.await
		.expect("Read should succeed.")
		.expect("Server should exist.");

	assert_eq!(view.client_id, "alpha-client");
	assert_eq!(view.client_secrets, 2);
	assert_eq!(view.provider_version, 1);

	let json = serde_json::to_string(&view).expect("Server views should serialize.");

	assert!(!json.contains("one"));
}

#[tokio::test]
async fn invalid_server_writes_are_rejected() {
	let harness = TestBackend::new();
	let err = harness
		.backend
		.write_server(server_name("corp"), ServerWrite { provider: MOCK_PROVIDER.into(), ..Default::default() })
		.await
		.expect_err("An empty client id should be rejected.");

	assert!(matches!(err, Error::InvalidInput { field: "client_id", .. }));

	let err = harness
		.backend
		.write_server(
			server_name("corp"),
			ServerWrite { client_id: "client".into(), provider: "nope".into(), ..Default::default() },
		)
		.await
		.expect_err("Unknown providers should be rejected.");

	assert!(matches!(err, Error::UnknownProvider { ref name } if name == "nope"));
	assert!(harness.backend.list_servers().await.expect("Listing should succeed.").is_empty());
}

#[tokio::test]
async fn servers_stored_under_a_foreign_key_are_not_trusted() {
	let harness = TestBackend::new();
	let corp = harness.add_server("corp").await;

	harness.add_server("alpha").await;

	let grant = CredentialGrant::AuthorizationCode { code: "ci".into(), redirect_url: None };

	harness
		.backend
		.write_credential(&credential_name("ci"), CredentialWrite::new(grant).with_server(corp.clone()))
		.await
		.expect("Failed to issue test credential.");

	let key = harness.backend.store().key::<ServerEntry>(&corp);
	let foreign = ServerEntry::new(server_name("other"), "client", MOCK_PROVIDER);

	harness
		.backend
		.store()
		.storage()
		.put(key.as_str(), serde_json::to_vec(&foreign).expect("Server entries should serialize."))
		.await
		.expect("Failed to plant foreign server.");

	assert_eq!(
		harness.backend.list_servers().await.expect("Listing should skip foreign entries."),
		vec![server_name("alpha")]
	);
	assert!(matches!(harness.backend.read_server(&corp).await, Err(Error::KeyMismatch { .. })));

	harness.clock.advance(Duration::hours(2));

	let entry = harness
		.backend
		.get_or_refresh(&credential_name("ci"), Duration::ZERO)
		.await
		.expect("Server problems are recorded, not returned.")
		.expect("Credential should exist.");

	assert_eq!(entry.auth_server_error(), Some("stored server does not match its name"));
}
