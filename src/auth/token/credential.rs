//! Per-tenant OAuth credential record and the safety-margined expiry rule.

// crates.io
use time::PrimitiveDateTime;
// self
use crate::{
	_prelude::*,
	auth::{TenantId, token::secret::TokenSecret},
};

/// Share of the declared token lifetime the broker trusts, as `NUMERATOR / DENOMINATOR`.
///
/// The same margin applies to authorization-code and refresh grants.
pub const SAFETY_MARGIN_NUMERATOR: i64 = 9;
/// See [`SAFETY_MARGIN_NUMERATOR`].
pub const SAFETY_MARGIN_DENOMINATOR: i64 = 10;

/// Current OAuth grant for one tenant.
///
/// `expires_at` is already shortened by the safety margin, so a credential is treated as
/// stale from that instant on. It is persisted as integer epoch milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCredential {
	/// Tenant (platform account) the grant belongs to.
	pub tenant: TenantId,
	/// Short-lived bearer token.
	pub access_token: TokenSecret,
	/// Long-lived token used to mint new access tokens; rotates on refresh.
	pub refresh_token: TokenSecret,
	/// Instant after which `access_token` must not be handed out.
	#[serde(with = "epoch_millis")]
	pub expires_at: OffsetDateTime,
}
impl TenantCredential {
	/// Builds a credential from a token response received at `issued_at`.
	pub fn from_grant(
		tenant: TenantId,
		access_token: TokenSecret,
		refresh_token: TokenSecret,
		issued_at: OffsetDateTime,
		expires_in_secs: i64,
	) -> Self {
		let expires_at = margined_expiry(issued_at, expires_in_secs);

		Self { tenant, access_token, refresh_token, expires_at }
	}

	/// Returns `true` once `expires_at <= instant`.
	pub fn is_stale_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at <= instant
	}

	/// Convenience helper that checks staleness against the current UTC clock.
	pub fn is_stale(&self) -> bool {
		self.is_stale_at(OffsetDateTime::now_utc())
	}

	/// Expiry as epoch milliseconds, the persisted representation.
	pub fn expires_at_millis(&self) -> i64 {
		to_millis(self.expires_at)
	}
}
impl Debug for TenantCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TenantCredential")
			.field("tenant", &self.tenant)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// `issued_at + expires_in * 1000 * 0.9`, in whole milliseconds.
///
/// Lifetimes reaching past the representable range clamp to [`latest_expiry`], so such a
/// credential is treated as long-lived rather than already stale.
pub fn margined_expiry(issued_at: OffsetDateTime, expires_in_secs: i64) -> OffsetDateTime {
	let lifetime_ms = expires_in_secs.saturating_mul(1_000);
	let trusted_ms = lifetime_ms / SAFETY_MARGIN_DENOMINATOR * SAFETY_MARGIN_NUMERATOR
		+ lifetime_ms % SAFETY_MARGIN_DENOMINATOR * SAFETY_MARGIN_NUMERATOR
			/ SAFETY_MARGIN_DENOMINATOR;

	match from_millis(to_millis(issued_at).saturating_add(trusted_ms)) {
		Some(expiry) => expiry,
		None if trusted_ms > 0 => latest_expiry(),
		None => issued_at,
	}
}

/// Latest whole-millisecond instant an expiry can hold.
pub fn latest_expiry() -> OffsetDateTime {
	let max = PrimitiveDateTime::MAX.assume_utc();

	max - Duration::nanoseconds(i64::from(max.nanosecond() % 1_000_000))
}

pub(crate) fn to_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

pub(crate) fn from_millis(millis: i64) -> Option<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

mod epoch_millis {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as DeError};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(instant: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(super::to_millis(*instant))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = i64::deserialize(deserializer)?;

		super::from_millis(millis)
			.ok_or_else(|| {
				DeError::custom(format!("Epoch milliseconds {millis} are out of range."))
			})
	}
}
