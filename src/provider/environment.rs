//! Production and QA platform switch with the base hosts each one uses.

// self
use crate::_prelude::*;

/// Platform deployment the integration is registered against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformEnvironment {
	#[default]
	/// Public production platform.
	Production,
	/// QA platform used while developing the integration.
	Qa,
}
impl PlatformEnvironment {
	/// Base URL of the REST API (token and identity endpoints).
	pub const fn api_base(self) -> &'static str {
		match self {
			PlatformEnvironment::Production => "https://api.hubapi.com",
			PlatformEnvironment::Qa => "https://api.hubapiqa.com",
		}
	}

	/// Base URL of the web app hosting the consent page.
	pub const fn app_base(self) -> &'static str {
		match self {
			PlatformEnvironment::Production => "https://app.hubspot.com",
			PlatformEnvironment::Qa => "https://app.hubspotqa.com",
		}
	}

	/// Interprets the `QA` flag: `1`, `true`, or `yes` (any case) selects QA.
	pub fn from_qa_flag(flag: Option<&str>) -> Self {
		match flag.map(str::trim) {
			Some(value)
				if value == "1"
					|| value.eq_ignore_ascii_case("true")
					|| value.eq_ignore_ascii_case("yes") =>
				PlatformEnvironment::Qa,
			_ => PlatformEnvironment::Production,
		}
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			PlatformEnvironment::Production => "production",
			PlatformEnvironment::Qa => "qa",
		}
	}
}
impl Display for PlatformEnvironment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn qa_flag_parsing() {
		assert_eq!(PlatformEnvironment::from_qa_flag(None), PlatformEnvironment::Production);
		assert_eq!(PlatformEnvironment::from_qa_flag(Some("")), PlatformEnvironment::Production);
		assert_eq!(
			PlatformEnvironment::from_qa_flag(Some("false")),
			PlatformEnvironment::Production
		);
		assert_eq!(PlatformEnvironment::from_qa_flag(Some("TRUE")), PlatformEnvironment::Qa);
		assert_eq!(PlatformEnvironment::from_qa_flag(Some(" 1 ")), PlatformEnvironment::Qa);
	}

	#[test]
	fn qa_domains_differ_from_production() {
		assert_eq!(PlatformEnvironment::Qa.api_base(), "https://api.hubapiqa.com");
		assert_eq!(PlatformEnvironment::Production.app_base(), "https://app.hubspot.com");
	}
}
