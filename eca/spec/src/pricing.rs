use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::SizeClass;
use crate::AmountError;

/// Wei in one ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

const ETHER_DECIMALS: usize = 18;

/// Native currency amount in wei.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Wei(u128);

impl Wei {
    /// Zero wei.
    pub const ZERO: Wei = Wei(0);

    /// Wrap a raw wei amount.
    pub const fn new(wei: u128) -> Self {
        Self(wei)
    }

    /// Raw wei amount.
    pub const fn get(self) -> u128 {
        self.0
    }

    /// Multiply, failing on overflow.
    pub fn checked_mul(self, factor: u128) -> Result<Self, AmountError> {
        self.0
            .checked_mul(factor)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Parse a decimal ether amount such as `0.05` or `2`.
    pub fn from_ether_str(text: &str) -> Result<Self, AmountError> {
        let trimmed = text.trim();
        let invalid = || AmountError::Invalid(text.to_string());
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if fraction.len() > ETHER_DECIMALS
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| AmountError::Overflow)?
                .checked_mul(WEI_PER_ETHER)
                .ok_or(AmountError::Overflow)?
        };
        let fraction_wei = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = ETHER_DECIMALS);
            padded.parse::<u128>().map_err(|_| invalid())?
        };
        whole_wei
            .checked_add(fraction_wei)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Render as ether with trailing zeros trimmed (`10000000000000000` -> `0.01`).
    pub fn to_ether_string(self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let fraction = self.0 % WEI_PER_ETHER;
        if fraction == 0 {
            return whole.to_string();
        }
        let digits = format!("{fraction:0width$}", width = ETHER_DECIMALS);
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }

    /// JSON-RPC quantity encoding (`0x`-prefixed, no leading zeros).
    pub fn to_quantity_hex(self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

/// Minimum payment for minting at a size class: `min_price * size_class^2`.
pub fn payment_floor(min_price: Wei, size_class: SizeClass) -> Result<Wei, AmountError> {
    let factor = u128::from(size_class.get()).pow(2);
    min_price.checked_mul(factor)
}
