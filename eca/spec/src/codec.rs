//! Token ids pack the artwork parameters into one integer:
//!
//! ```text
//! bits 16..   initial state, masked to draw_size bits
//! bits 8..15  rule
//! bits 0..7   size class
//! ```
//!
//! The layout must match the contract bit for bit, so the size class keeps a
//! full byte even though it only needs three bits. With size class 5 the
//! state field reaches bit 46, which is why ids are `u64`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Smallest accepted size class.
pub const MIN_SIZE_CLASS: u8 = 1;
/// Largest accepted size class.
pub const MAX_SIZE_CLASS: u8 = 5;
/// Bit offset of the rule field.
pub const RULE_SHIFT: u32 = 8;
/// Bit offset of the state field.
pub const STATE_SHIFT: u32 = 16;

const BYTE_MASK: u64 = 0xFF;

/// Elementary cellular automaton rule number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(u8);

impl Rule {
    /// Validate a rule number.
    pub fn new(value: i64) -> Result<Self, CodecError> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| CodecError::InvalidRule(value))
    }

    /// Raw rule byte.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for Rule {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grid width selector in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct SizeClass(u8);

impl SizeClass {
    /// Validate a size class.
    pub fn new(value: i64) -> Result<Self, CodecError> {
        if (i64::from(MIN_SIZE_CLASS)..=i64::from(MAX_SIZE_CLASS)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(CodecError::InvalidSizeClass(value))
        }
    }

    /// Raw size class.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Every valid size class, smallest first.
    pub fn all() -> impl Iterator<Item = SizeClass> {
        (MIN_SIZE_CLASS..=MAX_SIZE_CLASS).map(SizeClass)
    }

    /// Draw size and state mask for this class.
    pub const fn sizing(self) -> Sizing {
        let draw_size = (1u32 << self.0) - 1;
        Sizing {
            draw_size,
            state_mask: (1u64 << draw_size) - 1,
        }
    }
}

impl TryFrom<i64> for SizeClass {
    type Error = CodecError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SizeClass> for u8 {
    fn from(value: SizeClass) -> Self {
        value.0
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bit width of the drawn state and the mask selecting those bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizing {
    /// `2^size_class - 1`.
    pub draw_size: u32,
    /// `2^draw_size - 1`.
    pub state_mask: u64,
}

/// Initial automaton state.
///
/// Inputs may be arbitrarily large; only the low 64 bits are kept, which is
/// lossless for every drawable width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitialState(u64);

impl InitialState {
    /// Validate a signed state value.
    pub fn new(value: i128) -> Result<Self, CodecError> {
        if value < 0 {
            return Err(CodecError::InvalidState);
        }
        // Truncation keeps the low 64 bits.
        Ok(Self(value as u64))
    }

    /// Wrap raw state bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Low 64 bits of the state.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// State reduced to the drawn bits.
    pub const fn masked(self, sizing: Sizing) -> u64 {
        self.0 & sizing.state_mask
    }
}

impl FromStr for InitialState {
    type Err = CodecError;

    /// Parses decimal, `0x` hex, `0o` octal or `0b` binary text of any length.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.starts_with('-') {
            return Err(CodecError::InvalidState);
        }
        let text = text.strip_prefix('+').unwrap_or(text);
        let (radix, digits) = split_radix(text);
        wrapping_parse(digits, radix)
            .map(Self)
            .ok_or_else(|| CodecError::MalformedState(s.to_string()))
    }
}

impl fmt::Display for InitialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn split_radix(text: &str) -> (u32, &str) {
    let lower = text.get(..2).map(str::to_ascii_lowercase);
    match lower.as_deref() {
        Some("0x") => (16, &text[2..]),
        Some("0o") => (8, &text[2..]),
        Some("0b") => (2, &text[2..]),
        _ => (10, text),
    }
}

/// Parse digits modulo 2^64. Reduction commutes with masking the low bits.
fn wrapping_parse(digits: &str, radix: u32) -> Option<u64> {
    let mut value = 0u64;
    let mut seen = false;
    for ch in digits.chars() {
        if ch == '_' {
            continue;
        }
        let digit = ch.to_digit(radix)?;
        value = value
            .wrapping_mul(u64::from(radix))
            .wrapping_add(u64::from(digit));
        seen = true;
    }
    seen.then_some(value)
}

/// Canonical on-chain token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(u64);

impl TokenId {
    /// Wrap a raw id.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => text.parse::<u64>(),
        };
        parsed
            .map(Self)
            .map_err(|_| CodecError::MalformedTokenId(s.to_string()))
    }
}

/// Validated artwork parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenParams {
    /// Transition rule.
    pub rule: Rule,
    /// Initial state as supplied (low 64 bits).
    pub state: InitialState,
    /// Grid width selector.
    pub size_class: SizeClass,
}

impl TokenParams {
    /// Bundle already validated parameters.
    pub const fn new(rule: Rule, state: InitialState, size_class: SizeClass) -> Self {
        Self {
            rule,
            state,
            size_class,
        }
    }

    /// Validate raw parameters, checking rule, state and size class in that order.
    pub fn validate(rule: i64, state: i128, size_class: i64) -> Result<Self, CodecError> {
        let rule = Rule::new(rule)?;
        let state = InitialState::new(state)?;
        let size_class = SizeClass::new(size_class)?;
        Ok(Self::new(rule, state, size_class))
    }

    /// Draw size and mask for the size class.
    pub const fn sizing(&self) -> Sizing {
        self.size_class.sizing()
    }

    /// State bits that are actually drawn.
    pub const fn masked_state(&self) -> u64 {
        self.state.masked(self.sizing())
    }

    /// Pack the parameters into the canonical token id.
    pub const fn encode(&self) -> TokenId {
        TokenId(
            (self.masked_state() << STATE_SHIFT)
                | ((self.rule.get() as u64) << RULE_SHIFT)
                | self.size_class.get() as u64,
        )
    }

    /// Drawn state as a zero-padded binary string.
    pub fn state_bits(&self) -> String {
        format_state(self.state.bits(), self.sizing().draw_size)
    }
}

/// Fields extracted from a token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedToken {
    /// Bits 8..15.
    pub rule: u8,
    /// Bits 0..7.
    pub size_class: u8,
    /// Bits 16 and above: the masked initial state.
    pub state: u64,
}

impl DecodedToken {
    /// Re-validate the fields; ids not produced by the encoder fail here.
    pub fn params(&self) -> Result<TokenParams, CodecError> {
        let size_class = SizeClass::new(i64::from(self.size_class))?;
        Ok(TokenParams::new(
            Rule::from(self.rule),
            InitialState::from_bits(self.state),
            size_class,
        ))
    }
}

/// Draw size and state mask for a size class.
pub fn derive_sizing(size_class: i64) -> Result<Sizing, CodecError> {
    SizeClass::new(size_class).map(SizeClass::sizing)
}

/// Encode raw parameters into a token id, rejecting out-of-range input.
pub fn encode_token_id(rule: i64, initial_state: i128, size_class: i64) -> Result<TokenId, CodecError> {
    TokenParams::validate(rule, initial_state, size_class).map(|params| params.encode())
}

/// Split a token id into its fields. State bits above the draw size were
/// discarded at encode time and cannot be recovered.
pub const fn decode_token_id(token_id: TokenId) -> DecodedToken {
    let raw = token_id.get();
    DecodedToken {
        rule: ((raw >> RULE_SHIFT) & BYTE_MASK) as u8,
        size_class: (raw & BYTE_MASK) as u8,
        state: raw >> STATE_SHIFT,
    }
}

/// Render `initial_state & (2^draw_size - 1)` as exactly `draw_size` binary digits.
pub fn format_state(initial_state: u64, draw_size: u32) -> String {
    if draw_size == 0 {
        return String::new();
    }
    let mask = 1u64
        .checked_shl(draw_size)
        .map_or(u64::MAX, |bit| bit - 1);
    format!(
        "{:0width$b}",
        initial_state & mask,
        width = draw_size as usize
    )
}
