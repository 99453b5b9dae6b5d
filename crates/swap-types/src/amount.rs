//! Fixed-point token amounts.
//!
//! Every swap amount is an [`Amount`]. It never goes through floating point:
//! arithmetic is decimal arithmetic of unbounded size, and conversion to and
//! from the on-chain integer representation is exact for any `U256`.

use alloy::primitives::U256;
use bigdecimal::{BigDecimal, Zero};
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced by amount arithmetic and conversions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
	#[error("Division by zero")]
	DivisionByZero,
	#[error("Amount {0} does not fit in 256 bits")]
	Overflow(String),
	#[error("Amount {amount} cannot be represented with {decimals} decimals")]
	Precision { amount: String, decimals: u8 },
	#[error("Negative amount cannot be converted to an integer value: {0}")]
	Negative(String),
	#[error("Invalid amount: {0}")]
	Parse(String),
}

/// A non-floating decimal amount of some token.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(BigDecimal);

impl Amount {
	pub fn zero() -> Self {
		Self(BigDecimal::zero())
	}

	pub fn one() -> Self {
		Self(BigDecimal::from(1u8))
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	pub fn is_negative(&self) -> bool {
		self.0.sign() == Sign::Minus
	}

	pub fn checked_add(&self, rhs: &Amount) -> Result<Amount, AmountError> {
		Ok(Amount(&self.0 + &rhs.0))
	}

	pub fn checked_sub(&self, rhs: &Amount) -> Result<Amount, AmountError> {
		Ok(Amount(&self.0 - &rhs.0))
	}

	pub fn checked_mul(&self, rhs: &Amount) -> Result<Amount, AmountError> {
		Ok(Amount(&self.0 * &rhs.0))
	}

	/// Quotients that do not terminate are cut at 100 significant digits.
	pub fn checked_div(&self, rhs: &Amount) -> Result<Amount, AmountError> {
		if rhs.is_zero() {
			return Err(AmountError::DivisionByZero);
		}
		Ok(Amount(&self.0 / &rhs.0))
	}

	/// Returns `percent` percent of this amount.
	pub fn percent(&self, percent: &Amount) -> Result<Amount, AmountError> {
		self.checked_mul(percent)?
			.checked_div(&Amount::from(100u64))
	}

	/// Builds an amount from an integer value carrying `decimals` implied
	/// fractional digits.
	pub fn from_wei(value: U256, decimals: u8) -> Result<Amount, AmountError> {
		let digits = BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>());
		Ok(Amount(BigDecimal::new(digits, i64::from(decimals))))
	}

	/// Converts to the integer representation with `decimals` implied
	/// fractional digits.
	///
	/// Fails instead of truncating when the amount has more fractional
	/// digits than the token supports.
	pub fn to_wei(&self, decimals: u8) -> Result<U256, AmountError> {
		if self.is_negative() {
			return Err(AmountError::Negative(self.to_string()));
		}
		let (digits, scale) = self.0.normalized().into_bigint_and_exponent();
		let shift = i64::from(decimals) - scale;
		if shift < 0 {
			return Err(AmountError::Precision {
				amount: self.to_string(),
				decimals,
			});
		}
		let shift = u32::try_from(shift).map_err(|_| AmountError::Overflow(self.to_string()))?;
		let value = digits * BigInt::from(10u8).pow(shift);
		let (_, bytes) = value.to_bytes_be();
		if bytes.len() > 32 {
			return Err(AmountError::Overflow(self.to_string()));
		}
		Ok(U256::from_be_slice(&bytes))
	}
}

impl From<u64> for Amount {
	fn from(value: u64) -> Self {
		Self(BigDecimal::from(value))
	}
}

impl FromStr for Amount {
	type Err = AmountError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		BigDecimal::from_str(s.trim())
			.map(Amount)
			.map_err(|e| AmountError::Parse(format!("{}: {}", s, e)))
	}
}

impl fmt::Display for Amount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.normalized().to_plain_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn amount(s: &str) -> Amount {
		s.parse().unwrap()
	}

	#[test]
	fn test_wei_round_trip_is_exact() {
		let max_uint160 = (U256::from(1u8) << 160) - U256::from(1u8);
		let cases = [
			(U256::from(1u64), 18u8),
			(U256::from(1_000_000u64), 6),
			(U256::from(123_456_789_012_345_678_901u128), 18),
			(U256::from(10u64).pow(U256::from(27u64)), 18),
			(U256::from(10u64).pow(U256::from(29u64)), 18),
			(max_uint160, 18),
			(U256::MAX, 18),
			(U256::MAX, 0),
			(U256::ZERO, 8),
			(U256::from(99_999_999u64), 0),
		];

		for (wei, decimals) in cases {
			let value = Amount::from_wei(wei, decimals).unwrap();
			assert_eq!(value.to_wei(decimals).unwrap(), wei, "{} @ {}", wei, decimals);
		}
	}

	#[test]
	fn test_large_balances_keep_every_digit() {
		// 100 billion tokens with 18 decimals
		let wei = U256::from(10u64).pow(U256::from(29u64)) + U256::from(1u8);
		let value = Amount::from_wei(wei, 18).unwrap();
		assert_eq!(value.to_string(), "100000000000.000000000000000001");
		assert_eq!(value.to_wei(18).unwrap(), wei);
	}

	#[test]
	fn test_to_wei_scales_whole_units() {
		assert_eq!(
			amount("1.5").to_wei(18).unwrap(),
			U256::from(1_500_000_000_000_000_000u128)
		);
		assert_eq!(amount("2").to_wei(6).unwrap(), U256::from(2_000_000u64));
		assert_eq!(amount("1000").to_wei(0).unwrap(), U256::from(1000u64));
	}

	#[test]
	fn test_to_wei_rejects_values_beyond_u256() {
		let too_big = Amount::from_wei(U256::MAX, 0)
			.unwrap()
			.checked_add(&Amount::one())
			.unwrap();
		assert!(matches!(too_big.to_wei(0), Err(AmountError::Overflow(_))));
	}

	#[test]
	fn test_to_wei_rejects_excess_precision() {
		let err = amount("0.0000001").to_wei(6).unwrap_err();
		assert!(matches!(err, AmountError::Precision { decimals: 6, .. }));
	}

	#[test]
	fn test_to_wei_rejects_negative() {
		assert!(matches!(
			amount("-1").to_wei(18),
			Err(AmountError::Negative(_))
		));
	}

	#[test]
	fn test_division_by_zero() {
		assert_eq!(
			Amount::one().checked_div(&Amount::zero()),
			Err(AmountError::DivisionByZero)
		);
	}

	#[test]
	fn test_percent() {
		let market = amount("200");
		assert_eq!(market.percent(&amount("0.5")).unwrap(), amount("1"));
	}

	#[test]
	fn test_sign_checks() {
		assert!(Amount::zero().is_zero());
		assert!(!Amount::zero().is_negative());
		assert!(amount("-0.01").is_negative());
		assert_eq!(amount("1.50"), amount("1.5"));
	}
}
