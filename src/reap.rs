//! Reap policy: decides when a broken credential should be deleted.
//!
//! Rules are evaluated in priority order and the first rule that applies decides, even when
//! it decides to keep the entry. A revoked credential is judged by the revoked TTL alone,
//! whatever transient failures it also recorded.

// self
use crate::{
	_prelude::*,
	entry::{AuthCodeEntry, Tuning},
};

/// TTLs and thresholds applied by [`ReapPolicy::check`]. Zero disables a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReapPolicy {
	/// Grace period for an expired credential without a refresh token.
	pub non_refreshable_ttl: Duration,
	/// Grace period for a credential with a user error.
	pub revoked_ttl: Duration,
	/// Transient failures required before the transient TTL applies.
	pub transient_error_attempts: u32,
	/// Grace period for a credential with transient failures.
	pub transient_error_ttl: Duration,
	/// Grace period for a credential whose server is unusable.
	pub server_deleted_ttl: Duration,
}
impl ReapPolicy {
	/// Evaluates `entry` at `now`.
	pub fn check(&self, entry: &AuthCodeEntry, now: OffsetDateTime) -> ReapDecision {
		let reference = reference_time(entry);
		let elapsed = |ttl: Duration| reference.checked_add(ttl).is_some_and(|at| at <= now);

		if let Some(message) = entry.user_error() {
			if !ttl_enabled(self.revoked_ttl) || !elapsed(self.revoked_ttl) {
				return ReapDecision::Keep;
			}

			return ReapDecision::Reap(ReapReason::Revoked { message: message.to_owned() });
		}
		if entry.transient_errors_since_last_issue > 0 {
			if self.transient_error_attempts == 0 && !ttl_enabled(self.transient_error_ttl) {
				return ReapDecision::Keep;
			}
			if entry.transient_errors_since_last_issue < self.transient_error_attempts
				|| !elapsed(self.transient_error_ttl)
			{
				return ReapDecision::Keep;
			}

			return ReapDecision::Reap(ReapReason::TransientErrors {
				message: entry.last_transient_error.clone().unwrap_or_default(),
			});
		}
		if let Some(message) = entry.auth_server_error() {
			if !ttl_enabled(self.server_deleted_ttl) || !elapsed(self.server_deleted_ttl) {
				return ReapDecision::Keep;
			}

			return ReapDecision::Reap(ReapReason::ServerUnusable {
				server: entry.server_name.to_string(),
				message: message.to_owned(),
			});
		}
		if !entry.token_issued() {
			return ReapDecision::Keep;
		}

		let Some(expiry) = entry.expiry() else { return ReapDecision::Keep };

		if entry.is_refreshable()
			|| !ttl_enabled(self.non_refreshable_ttl)
			|| expiry.checked_add(self.non_refreshable_ttl).is_none_or(|at| at > now)
		{
			return ReapDecision::Keep;
		}

		ReapDecision::Reap(ReapReason::Expired)
	}
}
impl From<&Tuning> for ReapPolicy {
	fn from(tuning: &Tuning) -> Self {
		Self {
			non_refreshable_ttl: Duration::seconds(tuning.reap_non_refreshable_seconds),
			revoked_ttl: Duration::seconds(tuning.reap_revoked_seconds),
			transient_error_attempts: u32::try_from(tuning.reap_transient_error_attempts.max(0))
				.unwrap_or(u32::MAX),
			transient_error_ttl: Duration::seconds(tuning.reap_transient_error_seconds),
			server_deleted_ttl: Duration::seconds(tuning.reap_server_deleted_seconds),
		}
	}
}
impl Default for ReapPolicy {
	fn default() -> Self {
		Self::from(&Tuning::default())
	}
}

/// Result of a reap evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReapDecision {
	/// The credential stays.
	Keep,
	/// The credential should be deleted.
	Reap(ReapReason),
}
impl ReapDecision {
	/// Returns `true` for [`ReapDecision::Reap`].
	pub fn is_reap(&self) -> bool {
		matches!(self, Self::Reap(_))
	}
}

/// Why a credential is being reaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReapReason {
	/// The server rejected the credential.
	Revoked {
		/// Recorded user error.
		message: String,
	},
	/// Transient failures crossed both the count and age thresholds.
	TransientErrors {
		/// Most recent transient failure.
		message: String,
	},
	/// The credential's server stayed missing or misconfigured.
	ServerUnusable {
		/// Server name.
		server: String,
		/// Recorded auth-server error.
		message: String,
	},
	/// The token expired and cannot be refreshed.
	Expired,
}
impl ReapReason {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Revoked { .. } => "revoked",
			Self::TransientErrors { .. } => "transient_errors",
			Self::ServerUnusable { .. } => "server_unusable",
			Self::Expired => "expired",
		}
	}
}
impl Display for ReapReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Revoked { message } => write!(f, "token revoked: {message}"),
			Self::TransientErrors { message } =>
				write!(f, "transient errors exceeded limits, most recently: {message}"),
			Self::ServerUnusable { server, message } =>
				write!(f, "server {server:?} has configuration problems: {message}"),
			Self::Expired => f.write_str("token expired"),
		}
	}
}

/// Instant TTLs are measured from: the token expiry when an expiring token was issued,
/// otherwise the last issuance attempt.
pub fn reference_time(entry: &AuthCodeEntry) -> OffsetDateTime {
	if entry.token_issued() {
		if let Some(expiry) = entry.expiry() {
			return expiry;
		}
	}

	entry.last_attempted_issue_time.unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

fn ttl_enabled(ttl: Duration) -> bool {
	ttl.is_positive()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::auth::{CredentialName, ServerName, Token};

	const NOW: OffsetDateTime = datetime!(2025-06-01 00:00 UTC);

	fn entry() -> AuthCodeEntry {
		AuthCodeEntry::new(
			CredentialName::new("cred").expect("Credential fixture should be valid."),
			ServerName::new("srv").expect("Server fixture should be valid."),
		)
	}

	fn issued(expiry: Option<OffsetDateTime>, refresh: bool) -> AuthCodeEntry {
		let mut entry = entry();
		let mut token = Token::bearer("access");

		token.expiry = expiry;

		if refresh {
			token = token.with_refresh_token("refresh");
		}

		entry.set_token(token, NOW - Duration::days(30));

		entry
	}

	fn policy() -> ReapPolicy {
		ReapPolicy {
			non_refreshable_ttl: Duration::hours(1),
			revoked_ttl: Duration::hours(2),
			transient_error_attempts: 3,
			transient_error_ttl: Duration::hours(3),
			server_deleted_ttl: Duration::hours(4),
		}
	}

	#[test]
	fn user_error_uses_revoked_ttl() {
		let mut entry = entry();

		entry.set_user_error("invalid_grant", NOW - Duration::hours(1));

		assert_eq!(policy().check(&entry, NOW), ReapDecision::Keep);

		entry.set_user_error("invalid_grant", NOW - Duration::hours(2));

		let ReapDecision::Reap(reason) = policy().check(&entry, NOW) else {
			panic!("Revoked entry should be reaped after its TTL.");
		};

		assert_eq!(reason.to_string(), "token revoked: invalid_grant");
		assert_eq!(ReapPolicy { revoked_ttl: Duration::ZERO, ..policy() }.check(&entry, NOW), ReapDecision::Keep);
	}

	#[test]
	fn user_error_wins_over_transient_errors() {
		let mut entry = entry();

		for _ in 0..5 {
			entry.set_transient_error("timeout", NOW - Duration::days(10));
		}

		entry.set_user_error("access_denied", NOW - Duration::days(10));

		let revoked_disabled = ReapPolicy { revoked_ttl: Duration::ZERO, ..policy() };

		assert_eq!(revoked_disabled.check(&entry, NOW), ReapDecision::Keep);
		assert_eq!(
			policy().check(&entry, NOW),
			ReapDecision::Reap(ReapReason::Revoked { message: "access_denied".into() })
		);
	}

	#[test]
	fn transient_errors_need_count_and_age() {
		let mut entry = entry();

		entry.set_transient_error("timeout", NOW - Duration::days(1));
		entry.set_transient_error("timeout", NOW - Duration::days(1));

		assert_eq!(policy().check(&entry, NOW), ReapDecision::Keep);

		entry.set_transient_error("503", NOW - Duration::minutes(1));

		assert_eq!(policy().check(&entry, NOW), ReapDecision::Keep);

		entry.last_attempted_issue_time = Some(NOW - Duration::hours(3));

		let decision = policy().check(&entry, NOW);

		assert_eq!(
			decision,
			ReapDecision::Reap(ReapReason::TransientErrors { message: "503".into() })
		);

		let disabled =
			ReapPolicy { transient_error_attempts: 0, transient_error_ttl: Duration::ZERO, ..policy() };

		assert_eq!(disabled.check(&entry, NOW), ReapDecision::Keep);
	}

	#[test]
	fn transient_errors_below_threshold_shadow_auth_server_error() {
		let mut entry = entry();

		entry.set_auth_server_error("server does not exist", NOW - Duration::days(30));
		entry.transient_errors_since_last_issue = 1;
		entry.last_transient_error = Some("timeout".into());

		assert_eq!(policy().check(&entry, NOW), ReapDecision::Keep);
	}

	#[test]
	fn auth_server_error_uses_server_deleted_ttl() {
		let mut entry = entry();

		entry.set_auth_server_error("server does not exist", NOW - Duration::hours(3));

		assert_eq!(policy().check(&entry, NOW), ReapDecision::Keep);

		entry.last_attempted_issue_time = Some(NOW - Duration::hours(4));

		assert!(policy().check(&entry, NOW).is_reap());
		assert_eq!(
			ReapPolicy { server_deleted_ttl: Duration::ZERO, ..policy() }.check(&entry, NOW),
			ReapDecision::Keep
		);
	}

	#[test]
	fn healthy_or_recoverable_entries_are_kept() {
		let long_ago = NOW - Duration::days(365);

		assert_eq!(policy().check(&entry(), NOW), ReapDecision::Keep);
		assert_eq!(policy().check(&issued(None, false), NOW), ReapDecision::Keep);
		assert_eq!(policy().check(&issued(Some(long_ago), true), NOW), ReapDecision::Keep);
	}

	#[test]
	fn expired_non_refreshable_entries_wait_for_ttl() {
		let fresh = issued(Some(NOW - Duration::minutes(30)), false);
		let stale = issued(Some(NOW - Duration::hours(1)), false);

		assert_eq!(policy().check(&fresh, NOW), ReapDecision::Keep);
		assert_eq!(policy().check(&stale, NOW), ReapDecision::Reap(ReapReason::Expired));
		assert_eq!(
			ReapPolicy { non_refreshable_ttl: Duration::ZERO, ..policy() }.check(&stale, NOW),
			ReapDecision::Keep
		);
	}

	#[test]
	fn reference_time_prefers_issued_expiry() {
		let expiry = NOW - Duration::hours(5);
		let mut entry = issued(Some(expiry), false);

		entry.last_attempted_issue_time = Some(NOW);

		assert_eq!(reference_time(&entry), expiry);
		assert_eq!(reference_time(&issued(None, false)), NOW - Duration::days(30));
		assert_eq!(reference_time(&self::entry()), OffsetDateTime::UNIX_EPOCH);
	}

	#[test]
	fn defaults_follow_tuning() {
		let policy = ReapPolicy::default();

		assert_eq!(policy.revoked_ttl, Duration::hours(1));
		assert_eq!(policy.transient_error_attempts, 10);
		assert_eq!(policy.server_deleted_ttl, Duration::ZERO);
	}

	#[test]
	fn ttls_beyond_the_calendar_never_elapse() {
		let tuning = Tuning {
			reap_revoked_seconds: 1_000_000_000_000,
			reap_non_refreshable_seconds: 1_000_000_000_000,
			..Default::default()
		};

		assert!(tuning.validate().is_ok());

		let policy = ReapPolicy::from(&tuning);
		let mut revoked = entry();

		revoked.set_user_error("invalid_grant", NOW - Duration::days(365));

		assert_eq!(policy.check(&revoked, NOW), ReapDecision::Keep);
		assert_eq!(
			policy.check(&issued(Some(NOW - Duration::days(365)), false), NOW),
			ReapDecision::Keep
		);
	}
}
