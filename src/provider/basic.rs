//! Built-in provider for standards-compliant authorization servers.
//!
//! Authorization code, refresh, and client-credentials grants go through the `oauth2`
//! crate's [`BasicClient`]; RFC 8693 token exchange and the RFC 8628 device flow are plain
//! form posts over the same reqwest transport. Failures are classified by
//! [`DefaultProviderStrategy`].
//!
//! Recognized server options:
//!
//! | option            | required | meaning                                              |
//! |-------------------|----------|------------------------------------------------------|
//! | `auth_code_url`   | yes      | authorization endpoint                               |
//! | `token_url`       | yes      | token endpoint                                       |
//! | `device_code_url` | no       | device authorization endpoint                        |
//! | `auth_style`      | no       | `in_header` (default) or `in_params` client auth     |

// std
use std::borrow::Cow;
// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
	EndpointSet, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{Secret, Token},
	clock::Clock,
	http::{HttpTransport, StatusSlot},
	provider::{
		AuthCodeExchangeOptions, AuthCodeUrlOptions, ClientAuth, ClientCredentialsOptions,
		DefaultProviderStrategy, DeviceAuthorization, DeviceCodeAuthOptions,
		DeviceCodeExchangeOptions, GrantType, Provider, ProviderConfig, ProviderError,
		ProviderErrorContext, ProviderErrorKind, ProviderFuture, ProviderOperations,
		ProviderStrategy, ProviderToken, RefreshTokenOptions, TokenExchangeOptions,
	},
};

/// Registry name of the built-in provider.
pub const NAME: &str = "basic";

const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// How client credentials are presented to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthStyle {
	/// HTTP Basic `Authorization` header.
	#[default]
	InHeader,
	/// `client_id` and `client_secret` form parameters.
	InParams,
}
impl FromStr for AuthStyle {
	type Err = ProviderError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"in_header" => Ok(Self::InHeader),
			"in_params" => Ok(Self::InParams),
			other => Err(ProviderError::invalid_option(
				"auth_style",
				format!("expected in_header or in_params, got {other:?}"),
			)),
		}
	}
}

/// Endpoints and client-auth style parsed from server options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicOptions {
	/// Authorization endpoint.
	pub auth_code_url: Url,
	/// Token endpoint.
	pub token_url: Url,
	/// Device authorization endpoint, when the server offers the device flow.
	pub device_code_url: Option<Url>,
	/// Client authentication style.
	pub auth_style: AuthStyle,
}
impl BasicOptions {
	/// Parses and validates server options; unknown options are rejected.
	pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, ProviderError> {
		if let Some(unknown) = options.keys().find(|key| {
			!matches!(key.as_str(), "auth_code_url" | "token_url" | "device_code_url" | "auth_style")
		}) {
			return Err(ProviderError::invalid_option(unknown, "unknown option"));
		}

		let auth_code_url = required_url(options, "auth_code_url")?;
		let token_url = required_url(options, "token_url")?;
		let device_code_url =
			options.get("device_code_url").map(|raw| parse_url("device_code_url", raw)).transpose()?;
		let auth_style =
			options.get("auth_style").map(|raw| raw.parse::<AuthStyle>()).transpose()?.unwrap_or_default();

		Ok(Self { auth_code_url, token_url, device_code_url, auth_style })
	}
}

/// Provider speaking RFC 6749, RFC 8628, and RFC 8693 to a single server.
#[derive(Clone)]
pub struct BasicProvider(Arc<BasicShared>);
impl BasicProvider {
	/// Implementation version.
	pub const VERSION: i32 = 1;

	/// Factory suitable for [`ProviderRegistry::register`](crate::provider::ProviderRegistry::register).
	pub fn create(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
		let http = HttpTransport::new().map_err(|e| ProviderError::transient(e.to_string()))?;

		Ok(Arc::new(Self::new(config, http)?))
	}

	/// Builds a provider that sends requests through `http`.
	pub fn new(config: &ProviderConfig, http: HttpTransport) -> Result<Self, ProviderError> {
		if let Some(version) = config.version.filter(|version| *version > Self::VERSION) {
			return Err(ProviderError::new(
				ProviderErrorKind::Unsupported,
				format!("provider {NAME} has no version {version}"),
			));
		}

		let options = BasicOptions::from_options(&config.options)?;

		Ok(Self(Arc::new(BasicShared {
			options,
			http,
			strategy: Arc::new(DefaultProviderStrategy),
			clock: config.clock.clone(),
		})))
	}

	/// Replaces the error classification strategy.
	pub fn with_strategy(self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		let shared = &self.0;

		Self(Arc::new(BasicShared {
			options: shared.options.clone(),
			http: shared.http.clone(),
			strategy,
			clock: shared.clock.clone(),
		}))
	}

	/// Parsed endpoint options.
	pub fn options(&self) -> &BasicOptions {
		&self.0.options
	}
}
impl Provider for BasicProvider {
	fn version(&self) -> i32 {
		Self::VERSION
	}

	fn operations(&self, client: ClientAuth) -> Box<dyn ProviderOperations> {
		let options = &self.0.options;
		let mut oauth = BasicClient::new(ClientId::new(client.client_id.clone()))
			.set_auth_uri(AuthUrl::from_url(options.auth_code_url.clone()))
			.set_token_uri(TokenUrl::from_url(options.token_url.clone()));

		if let Some(secret) = &client.client_secret {
			oauth = oauth.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}
		if matches!(options.auth_style, AuthStyle::InParams) {
			oauth = oauth.set_auth_type(AuthType::RequestBody);
		}

		Box::new(BasicOperations { shared: self.0.clone(), client, oauth })
	}
}
impl Debug for BasicProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicProvider").field("options", &self.0.options).finish()
	}
}

struct BasicShared {
	options: BasicOptions,
	http: HttpTransport,
	strategy: Arc<dyn ProviderStrategy>,
	clock: Arc<dyn Clock>,
}

struct BasicOperations {
	shared: Arc<BasicShared>,
	client: ClientAuth,
	oauth: ConfiguredBasicClient,
}
impl BasicOperations {
	fn token_from_oauth(&self, response: &BasicTokenResponse) -> ProviderToken {
		let mut token = Token::bearer(response.access_token().secret().to_owned());

		token.token_type = response.token_type().as_ref().to_owned();
		token.refresh_token =
			response.refresh_token().map(|refresh| Secret::new(refresh.secret().to_owned()));
		token.expiry = response
			.expires_in()
			.and_then(|lifetime| Duration::try_from(lifetime).ok())
			.and_then(|lifetime| self.shared.clock.now().checked_add(lifetime));

		if let Some(scopes) = response.scopes() {
			let joined = scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ");

			token.extra.insert("scope".into(), serde_json::Value::String(joined));
		}

		ProviderToken::new(token, BasicProvider::VERSION)
	}

	fn token_from_raw(&self, raw: RawTokenResponse) -> ProviderToken {
		let mut token = Token::bearer(raw.access_token);

		if let Some(token_type) = raw.token_type.filter(|value| !value.is_empty()) {
			token.token_type = token_type;
		}

		token.refresh_token = raw.refresh_token.filter(|value| !value.is_empty()).map(Secret::new);
		token.expiry = raw
			.expires_in
			.filter(|seconds| *seconds > 0)
			.and_then(|seconds| self.shared.clock.now().checked_add(Duration::seconds(seconds)));

		if let Some(issued) = raw.issued_token_type {
			token.extra.insert("issued_token_type".into(), serde_json::Value::String(issued));
		}
		if let Some(scope) = raw.scope {
			token.extra.insert("scope".into(), serde_json::Value::String(scope));
		}

		ProviderToken::new(token, BasicProvider::VERSION)
	}

	fn map_request_error(
		&self,
		grant: GrantType,
		status: Option<u16>,
		err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
	) -> ProviderError {
		match err {
			RequestTokenError::ServerResponse(response) =>
				self.map_server_response(grant, status, &response),
			RequestTokenError::Request(HttpClientError::Reqwest(inner)) =>
				self.map_transport_error(grant, &inner),
			RequestTokenError::Request(other) => ProviderError::transient(format!(
				"HTTP client error occurred while calling the token endpoint: {other}"
			)),
			RequestTokenError::Parse(error, _) =>
				self.classify(grant, status, None, None, Some(format!("unparsable response: {error}"))),
			RequestTokenError::Other(message) =>
				self.classify(grant, status, None, None, Some(message)),
		}
	}

	fn map_server_response(
		&self,
		grant: GrantType,
		status: Option<u16>,
		response: &BasicErrorResponse,
	) -> ProviderError {
		self.classify(
			grant,
			status,
			Some(response.error().as_ref().to_owned()),
			response.error_description().cloned(),
			None,
		)
	}

	fn map_transport_error(&self, grant: GrantType, err: &ReqwestError) -> ProviderError {
		let kind = self
			.shared
			.strategy
			.classify_token_error(&ProviderErrorContext::network_failure(grant));
		let message = if err.is_timeout() {
			"request timed out while calling the token endpoint".to_owned()
		} else {
			format!("request to the token endpoint failed: {err}")
		};

		ProviderError::new(kind, message)
	}

	fn classify(
		&self,
		grant: GrantType,
		status: Option<u16>,
		oauth_error: Option<String>,
		description: Option<String>,
		body: Option<String>,
	) -> ProviderError {
		let mut ctx = ProviderErrorContext::new(grant);

		if let Some(status) = status {
			ctx = ctx.with_http_status(status);
		}
		if let Some(error) = &oauth_error {
			ctx = ctx.with_oauth_error(error.clone());
		}
		if let Some(description) = &description {
			ctx = ctx.with_error_description(description.clone());
		}
		if let Some(body) = body {
			ctx = ctx.with_body_preview(body);
		}

		let kind = self.shared.strategy.classify_token_error(&ctx);
		let message = match (oauth_error, description, ctx.body_preview, status) {
			(Some(error), Some(description), ..) => format!("{error}: {description}"),
			(Some(error), None, ..) => error,
			(None, _, Some(body), _) => format!("token endpoint returned an error: {body}"),
			(None, _, None, Some(status)) => format!("token endpoint returned HTTP {status}"),
			(None, _, None, None) => "token endpoint returned an error".to_owned(),
		};

		ProviderError::new(kind, message)
	}

	async fn post_form<T>(
		&self,
		grant: GrantType,
		url: &Url,
		mut form: Vec<(&'static str, String)>,
	) -> Result<T, ProviderError>
	where
		T: DeserializeOwned,
	{
		let mut request = self.shared.http.post(url.clone()).header(ACCEPT, "application/json");

		match (&self.client.client_secret, self.shared.options.auth_style) {
			(Some(secret), AuthStyle::InHeader) => {
				request =
					request.header(AUTHORIZATION, basic_authorization(&self.client.client_id, secret));
			},
			(Some(secret), AuthStyle::InParams) => {
				form.push(("client_id", self.client.client_id.clone()));
				form.push(("client_secret", secret.expose().to_owned()));
			},
			(None, _) => form.push(("client_id", self.client.client_id.clone())),
		}

		let response =
			request.form(&form).send().await.map_err(|e| self.map_transport_error(grant, &e))?;
		let status = response.status();
		let body = response.bytes().await.map_err(|e| self.map_transport_error(grant, &e))?;

		if !status.is_success() {
			return Err(match serde_json::from_slice::<ErrorBody>(&body) {
				Ok(error) =>
					self.classify(grant, Some(status.as_u16()), Some(error.error), error.error_description, None),
				Err(_) => self.classify(
					grant,
					Some(status.as_u16()),
					None,
					None,
					Some(String::from_utf8_lossy(&body).into_owned()).filter(|body| !body.is_empty()),
				),
			});
		}

		let mut de = serde_json::Deserializer::from_slice(&body);

		serde_path_to_error::deserialize(&mut de).map_err(|e| {
			ProviderError::transient(format!(
				"token endpoint returned an unparsable response at {}: {}",
				e.path(),
				e.inner()
			))
		})
	}
}
impl ProviderOperations for BasicOperations {
	fn auth_code_url(
		&self,
		state: &str,
		options: AuthCodeUrlOptions,
	) -> Result<Option<Url>, ProviderError> {
		let state = state.to_owned();
		let mut request = self
			.oauth
			.authorize_url(move || CsrfToken::new(state))
			.add_scopes(options.scopes.into_iter().map(Scope::new));

		if let Some(redirect) = options.redirect_url {
			request = request.set_redirect_uri(Cow::Owned(redirect_url(redirect)?));
		}
		for (key, value) in options.url_params {
			request = request.add_extra_param(key, value);
		}

		let (url, _) = request.url();

		Ok(Some(url))
	}

	fn auth_code_exchange<'a>(
		&'a self,
		code: &'a str,
		options: AuthCodeExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			let status = StatusSlot::default();
			let recording = self.shared.http.recording(status.clone());
			let mut request = self.oauth.exchange_code(AuthorizationCode::new(code.to_owned()));

			if let Some(redirect) = options.redirect_url {
				request = request.set_redirect_uri(Cow::Owned(redirect_url(redirect)?));
			}
			for (key, value) in options.url_params {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&recording).await.map_err(|err| {
				self.map_request_error(GrantType::AuthorizationCode, status.take(), err)
			})?;

			Ok(self.token_from_oauth(&response))
		})
	}

	fn refresh_token<'a>(
		&'a self,
		token: &'a Token,
		_: RefreshTokenOptions,
	) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			let secret = token.refresh_secret().ok_or_else(|| {
				ProviderError::new(ProviderErrorKind::InvalidGrant, "token has no refresh token")
			})?;
			let status = StatusSlot::default();
			let recording = self.shared.http.recording(status.clone());
			let refresh = RefreshToken::new(secret.expose().to_owned());
			let response = self
				.oauth
				.exchange_refresh_token(&refresh)
				.request_async(&recording)
				.await
				.map_err(|err| self.map_request_error(GrantType::RefreshToken, status.take(), err))?;

			Ok(self.token_from_oauth(&response))
		})
	}

	fn client_credentials(
		&self,
		options: ClientCredentialsOptions,
	) -> ProviderFuture<'_, ProviderToken> {
		Box::pin(async move {
			let status = StatusSlot::default();
			let recording = self.shared.http.recording(status.clone());
			let mut request = self
				.oauth
				.exchange_client_credentials()
				.add_scopes(options.scopes.into_iter().map(Scope::new));

			for (key, value) in options.url_params {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&recording).await.map_err(|err| {
				self.map_request_error(GrantType::ClientCredentials, status.take(), err)
			})?;

			Ok(self.token_from_oauth(&response))
		})
	}

	fn token_exchange<'a>(
		&'a self,
		token: &'a Token,
		options: TokenExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			let mut form = vec![
				("grant_type", GrantType::TokenExchange.as_str().to_owned()),
				("subject_token", token.access_token.expose().to_owned()),
				("subject_token_type", ACCESS_TOKEN_TYPE.to_owned()),
			];

			if !options.scopes.is_empty() {
				form.push(("scope", options.scopes.join(" ")));
			}

			form.extend(options.audiences.into_iter().map(|audience| ("audience", audience)));
			form.extend(options.resources.into_iter().map(|resource| ("resource", resource)));

			let raw = self
				.post_form::<RawTokenResponse>(GrantType::TokenExchange, &self.shared.options.token_url, form)
				.await?;

			Ok(self.token_from_raw(raw))
		})
	}

	fn device_code_auth(
		&self,
		options: DeviceCodeAuthOptions,
	) -> ProviderFuture<'_, Option<DeviceAuthorization>> {
		Box::pin(async move {
			let Some(url) = &self.shared.options.device_code_url else {
				return Ok(None);
			};
			let mut form = Vec::new();

			if !options.scopes.is_empty() {
				form.push(("scope", options.scopes.join(" ")));
			}

			let raw = self.post_form::<RawDeviceAuthorization>(GrantType::DeviceCode, url, form).await?;

			Ok(Some(DeviceAuthorization {
				device_code: Secret::new(raw.device_code),
				user_code: raw.user_code,
				verification_uri: raw.verification_uri,
				verification_uri_complete: raw.verification_uri_complete,
				expires_in: raw.expires_in.filter(|secs| *secs > 0).map(Duration::seconds),
				interval: raw.interval.filter(|secs| *secs > 0).map(Duration::seconds),
			}))
		})
	}

	fn device_code_exchange<'a>(
		&'a self,
		device_code: &'a str,
		_: DeviceCodeExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			let form = vec![
				("grant_type", GrantType::DeviceCode.as_str().to_owned()),
				("device_code", device_code.to_owned()),
			];
			let raw = self
				.post_form::<RawTokenResponse>(GrantType::DeviceCode, &self.shared.options.token_url, form)
				.await?;

			Ok(self.token_from_raw(raw))
		})
	}
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	issued_token_type: Option<String>,
	#[serde(default)]
	scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDeviceAuthorization {
	device_code: String,
	user_code: String,
	#[serde(alias = "verification_url")]
	verification_uri: String,
	#[serde(default)]
	verification_uri_complete: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	interval: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

fn required_url(options: &BTreeMap<String, String>, option: &str) -> Result<Url, ProviderError> {
	let raw = options.get(option).ok_or_else(|| ProviderError::invalid_option(option, "is required"))?;

	parse_url(option, raw)
}

fn parse_url(option: &str, raw: &str) -> Result<Url, ProviderError> {
	Url::parse(raw).map_err(|e| ProviderError::invalid_option(option, e))
}

fn redirect_url(raw: String) -> Result<RedirectUrl, ProviderError> {
	RedirectUrl::new(raw).map_err(|e| ProviderError::invalid_option("redirect_url", e))
}

// RFC 6749 section 2.3.1 form-encodes both halves before base64.
fn basic_authorization(client_id: &str, secret: &Secret) -> String {
	let encode = |value: &str| url::form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>();

	format!("Basic {}", STANDARD.encode(format!("{}:{}", encode(client_id), encode(secret.expose()))))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::clock::ManualClock;

	fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
	}

	#[test]
	fn options_require_endpoints() {
		let err = BasicOptions::from_options(&options(&[("token_url", "https://a.example/token")]))
			.expect_err("Missing authorization endpoint should be rejected.");

		assert_eq!(err.kind, ProviderErrorKind::InvalidOption);
		assert!(err.message.contains("auth_code_url"));
	}

	#[test]
	fn options_reject_unknown_keys_and_styles() {
		let base = [
			("auth_code_url", "https://a.example/auth"),
			("token_url", "https://a.example/token"),
		];
		let mut unknown = options(&base);

		unknown.insert("tenant".into(), "x".into());

		assert!(BasicOptions::from_options(&unknown).is_err());

		let mut style = options(&base);

		style.insert("auth_style".into(), "in_body".into());

		assert!(BasicOptions::from_options(&style).is_err());

		style.insert("auth_style".into(), "in_params".into());

		let parsed = BasicOptions::from_options(&style).expect("Options should parse.");

		assert_eq!(parsed.auth_style, AuthStyle::InParams);
		assert!(parsed.device_code_url.is_none());
	}

	#[test]
	fn newer_versions_are_rejected() {
		let config = ProviderConfig {
			version: Some(BasicProvider::VERSION + 1),
			options: options(&[
				("auth_code_url", "https://a.example/auth"),
				("token_url", "https://a.example/token"),
			]),
			clock: Arc::new(ManualClock::default()),
		};

		assert!(BasicProvider::create(&config).is_err());
	}

	#[test]
	fn basic_authorization_form_encodes_credentials() {
		let header = basic_authorization("id with space", &Secret::new("p:ss"));

		assert_eq!(header, format!("Basic {}", STANDARD.encode("id+with+space:p%3Ass")));
	}
}
