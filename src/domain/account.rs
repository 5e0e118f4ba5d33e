use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places between the major and minor currency unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Identifies an account holder, as handed to us by the identity system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a count of minor units as a major-unit decimal, e.g. `2500` as `25.00`.
fn to_major(minor: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(minor), MINOR_UNIT_SCALE)
}

/// Converts a major-unit decimal into minor units.
///
/// Fails with `InvalidAmount` when the value carries a fraction of a minor
/// unit or does not fit. The sign is preserved so that callers can reject it
/// with the same error as any other non-positive amount.
pub fn minor_units_from_major(value: Decimal) -> Result<i64> {
    let scaled = value
        .checked_mul(Decimal::from(10u64.pow(MINOR_UNIT_SCALE)))
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{value} is out of range")))?;
    if !scaled.fract().is_zero() {
        return Err(LedgerError::InvalidAmount(format!(
            "{value} is not a whole number of minor units"
        )));
    }
    i64::try_from(scaled.trunc())
        .map_err(|_| LedgerError::InvalidAmount(format!("{value} is out of range")))
}

/// A non-negative account balance in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(u64);

impl Balance {
    pub const ZERO: Self = Self(0);

    pub fn new(minor_units: u64) -> Self {
        Self(minor_units)
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    pub fn to_major(&self) -> Decimal {
        to_major(self.0)
    }

    pub fn checked_add(self, amount: Amount) -> Option<Self> {
        self.0.checked_add(amount.0).map(Self)
    }

    /// `None` when the balance cannot cover `amount`.
    pub fn checked_sub(self, amount: Amount) -> Option<Self> {
        self.0.checked_sub(amount.0).map(Self)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_major())
    }
}

/// A strictly positive monetary amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(u64);

impl Amount {
    pub fn new(minor_units: i64) -> Result<Self> {
        if minor_units > 0 {
            Ok(Self(minor_units as u64))
        } else {
            Err(LedgerError::InvalidAmount(format!(
                "amount must be positive, got {minor_units}"
            )))
        }
    }

    pub fn from_major(value: Decimal) -> Result<Self> {
        Self::new(minor_units_from_major(value)?)
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    pub fn to_major(&self) -> Decimal {
        to_major(self.0)
    }
}

impl TryFrom<i64> for Amount {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        // Amounts are only ever built from positive i64 values.
        amount.0 as i64
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_major())
    }
}

/// A ledger row: the balance currently held by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Balance,
}

impl Account {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: Balance::ZERO,
        }
    }

    /// Adds funds to the balance.
    pub fn credit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(self.id.clone()))?;
        Ok(())
    }

    /// Removes funds if the balance covers them; the balance is untouched otherwise.
    pub fn debit(&mut self, amount: Amount) -> Result<()> {
        match self.balance.checked_sub(amount) {
            Some(balance) => {
                self.balance = balance;
                Ok(())
            }
            None => Err(LedgerError::InsufficientFunds {
                account: self.id.clone(),
                balance: self.balance,
                needed: amount,
            }),
        }
    }
}
