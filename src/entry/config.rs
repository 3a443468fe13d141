//! Backend configuration and tuning knobs.

// self
use crate::{_prelude::*, auth::ServerName, error::ConfigError};

// Upper bound for scaled durations: `i64::MAX` nanoseconds, in seconds.
const MAX_SCALED_SECONDS: f64 = (i64::MAX / 1_000_000_000) as f64;

/// Persisted backend configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
	/// Server used when a credential write omits one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default_server: Option<ServerName>,
	/// Scheduler, reaper, and provider tuning.
	#[serde(default)]
	pub tuning: Tuning,
}

/// Tuning knobs. Durations are whole seconds; zero disables the corresponding behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
	/// Upper bound for a single provider call. Zero disables the bound.
	pub provider_timeout_seconds: i64,
	/// Multiplier applied to the expiry delta to cap provider calls made on behalf of
	/// expiring tokens.
	pub provider_timeout_expiry_leeway_factor: f64,
	/// Period of the background refresh loop. Zero disables the loop.
	pub refresh_check_interval_seconds: i64,
	/// Multiplier turning the refresh period into the proactive expiry delta.
	pub refresh_expiry_delta_factor: f64,
	/// Period of the background reap loop. Zero disables the loop.
	pub reap_check_interval_seconds: i64,
	/// Log reap decisions without deleting anything.
	pub reap_dry_run: bool,
	/// How long an unrefreshable, expired credential is kept.
	pub reap_non_refreshable_seconds: i64,
	/// How long a credential with a user error is kept.
	pub reap_revoked_seconds: i64,
	/// Transient failures tolerated before a credential becomes reapable.
	pub reap_transient_error_attempts: i64,
	/// How long a credential with only transient failures is kept.
	pub reap_transient_error_seconds: i64,
	/// How long a credential whose server is unusable is kept.
	pub reap_server_deleted_seconds: i64,
}
impl Tuning {
	/// Rejects negative durations and factors below one.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let seconds = [
			("provider_timeout_seconds", self.provider_timeout_seconds),
			("refresh_check_interval_seconds", self.refresh_check_interval_seconds),
			("reap_check_interval_seconds", self.reap_check_interval_seconds),
			("reap_non_refreshable_seconds", self.reap_non_refreshable_seconds),
			("reap_revoked_seconds", self.reap_revoked_seconds),
			("reap_transient_error_attempts", self.reap_transient_error_attempts),
			("reap_transient_error_seconds", self.reap_transient_error_seconds),
			("reap_server_deleted_seconds", self.reap_server_deleted_seconds),
		];

		for (field, value) in seconds {
			if value < 0 {
				return Err(ConfigError::InvalidTuning { field, reason: "must not be negative".into() });
			}
		}

		let factors = [
			("provider_timeout_expiry_leeway_factor", self.provider_timeout_expiry_leeway_factor),
			("refresh_expiry_delta_factor", self.refresh_expiry_delta_factor),
		];

		for (field, value) in factors {
			if !value.is_finite() || value < 1.0 {
				return Err(ConfigError::InvalidTuning { field, reason: "must be at least 1.0".into() });
			}
		}

		Ok(())
	}

	/// Refresh loop period, or `None` when the loop is disabled.
	pub fn refresh_check_interval(&self) -> Option<Duration> {
		positive_seconds(self.refresh_check_interval_seconds)
	}

	/// Expiry delta used by the refresh loop: the refresh period times its factor.
	pub fn refresh_expiry_delta(&self) -> Duration {
		self.refresh_check_interval()
			.map(|interval| scale(interval, self.refresh_expiry_delta_factor))
			.unwrap_or(Duration::ZERO)
	}

	/// Reap loop period, or `None` when the loop is disabled.
	pub fn reap_check_interval(&self) -> Option<Duration> {
		positive_seconds(self.reap_check_interval_seconds)
	}

	/// Bound for a provider call made while keeping a token valid for `expiry_delta`.
	///
	/// The configured timeout is shortened to `expiry_delta` times the leeway factor when
	/// that is smaller. `None` means unbounded.
	pub fn provider_timeout(&self, expiry_delta: Duration) -> Option<Duration> {
		let configured = positive_seconds(self.provider_timeout_seconds)?;

		if !expiry_delta.is_positive() {
			return Some(configured);
		}

		Some(configured.min(scale(expiry_delta, self.provider_timeout_expiry_leeway_factor)))
	}
}
impl Default for Tuning {
	fn default() -> Self {
		Self {
			provider_timeout_seconds: 30,
			provider_timeout_expiry_leeway_factor: 1.5,
			refresh_check_interval_seconds: 60,
			refresh_expiry_delta_factor: 1.2,
			reap_check_interval_seconds: 300,
			reap_dry_run: false,
			reap_non_refreshable_seconds: 86_400,
			reap_revoked_seconds: 3_600,
			reap_transient_error_attempts: 10,
			reap_transient_error_seconds: 86_400,
			reap_server_deleted_seconds: 0,
		}
	}
}

fn positive_seconds(seconds: i64) -> Option<Duration> {
	(seconds > 0).then(|| Duration::seconds(seconds))
}

// `duration * factor`, saturating at `MAX_SCALED_SECONDS`.
fn scale(duration: Duration, factor: f64) -> Duration {
	let seconds = duration.as_seconds_f64() * factor;

	if !seconds.is_finite() || seconds <= 0. {
		return Duration::ZERO;
	}

	Duration::seconds_f64(seconds.min(MAX_SCALED_SECONDS))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_refresh_delta_is_period_times_factor() {
		let tuning = Tuning::default();

		assert_eq!(tuning.refresh_check_interval(), Some(Duration::seconds(60)));
		assert_eq!(tuning.refresh_expiry_delta(), Duration::seconds(72));
	}

	#[test]
	fn zero_disables_loops() {
		let tuning = Tuning {
			refresh_check_interval_seconds: 0,
			reap_check_interval_seconds: 0,
			..Default::default()
		};

		assert_eq!(tuning.refresh_check_interval(), None);
		assert_eq!(tuning.reap_check_interval(), None);
		assert_eq!(tuning.refresh_expiry_delta(), Duration::ZERO);
	}

	#[test]
	fn provider_timeout_is_capped_by_leeway() {
		let tuning = Tuning::default();

		assert_eq!(tuning.provider_timeout(Duration::ZERO), Some(Duration::seconds(30)));
		assert_eq!(tuning.provider_timeout(Duration::seconds(10)), Some(Duration::seconds(15)));
		assert_eq!(
			Tuning { provider_timeout_seconds: 0, ..Default::default() }
				.provider_timeout(Duration::seconds(10)),
			None
		);
	}

	#[test]
	fn validation_rejects_out_of_range_values() {
		assert!(Tuning::default().validate().is_ok());
		assert!(Tuning { reap_revoked_seconds: -1, ..Default::default() }.validate().is_err());
		assert!(Tuning { refresh_expiry_delta_factor: 0.5, ..Default::default() }.validate().is_err());
	}

	#[test]
	fn partial_documents_fill_in_defaults() {
		let config: ConfigEntry =
			serde_json::from_value(serde_json::json!({ "tuning": { "reap_dry_run": true } }))
				.expect("Partial config should decode.");

		assert!(config.tuning.reap_dry_run);
		assert_eq!(config.tuning.refresh_check_interval_seconds, 60);
		assert_eq!(config.default_server, None);
	}

	#[test]
	fn scaled_durations_saturate() {
		let tuning = Tuning { refresh_check_interval_seconds: i64::MAX, ..Default::default() };

		assert!(tuning.validate().is_ok());
		assert_eq!(tuning.refresh_expiry_delta(), Duration::seconds_f64(MAX_SCALED_SECONDS));
		assert_eq!(
			Tuning::default().provider_timeout(Duration::days(365 * 20_000)),
			Some(Duration::seconds(30))
		);
		assert_eq!(Tuning::default().provider_timeout(Duration::MAX), Some(Duration::seconds(30)));
	}
}
