//! Strongly typed company and employee identifiers.
//!
//! Callers may hand over either strings or integers; both normalize to the same validated
//! string form used in endpoint paths.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl From<u64> for $name {
			fn from(value: u64) -> Self {
				Self(value.to_string())
			}
		}
		impl From<u32> for $name {
			fn from(value: u32) -> Self {
				Self(value.to_string())
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (company, employee).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (company, employee).
		kind: &'static str,
	},
	/// The identifier contains a path separator or query delimiter.
	#[error("{kind} identifier contains a reserved URL character.")]
	ReservedCharacter {
		/// Kind of identifier (company, employee).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (company, employee).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { CompanyId, "Paylocity company identifier.", "Company" }
def_id! { EmployeeId, "Paylocity employee identifier, unique within a company.", "Employee" }

/// Validates one URL path segment: non-empty, no whitespace or reserved characters, bounded.
pub(crate) fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.chars().any(|c| matches!(c, '/' | '?' | '#')) {
		return Err(IdentifierError::ReservedCharacter { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_validate() {
		assert!(CompanyId::new(" 12345").is_err(), "Leading whitespace must be rejected.");
		assert!(CompanyId::new("12345 ").is_err(), "Trailing whitespace must be rejected.");
		assert!(EmployeeId::new("").is_err());
		assert!(EmployeeId::new("42/../earnings").is_err());

		let company = CompanyId::new("A1B2C").expect("Company fixture should be considered valid.");

		assert_eq!(company.as_ref(), "A1B2C");
	}

	#[test]
	fn integers_and_strings_normalize_alike() {
		let from_int = CompanyId::from(12345_u64);
		let from_str: CompanyId = "12345".parse().expect("Numeric string should parse.");

		assert_eq!(from_int, from_str);
		assert_eq!(EmployeeId::from(7_u32).to_string(), "7");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let company: CompanyId =
			serde_json::from_str("\"98765\"").expect("Company should deserialize successfully.");

		assert_eq!(company.as_ref(), "98765");
		assert!(serde_json::from_str::<CompanyId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_applies() {
		let exact = "9".repeat(IDENTIFIER_MAX_LEN);

		EmployeeId::new(&exact).expect("Exact length should succeed.");

		assert!(EmployeeId::new("9".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}
}
