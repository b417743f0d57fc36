//! Minimal Solidity ABI support: enough to call the artwork contract.
//!
//! Only static head-encoded argument types (`uintN`, `address`, `bool`) are
//! encoded; return data may be a `uint256` word or a dynamic `string`.

use std::collections::HashMap;
use std::path::Path;

use eca_spec::Address;
use serde::Deserialize;
use sha3::{Digest, Keccak256};
use thiserror::Error;

const WORD: usize = 32;

/// ABI loading and encoding errors.
#[derive(Debug, Error)]
pub enum AbiError {
    /// Artifact file could not be read.
    #[error("reading abi artifact: {0}")]
    Io(#[from] std::io::Error),
    /// Artifact is not an ABI array or an object with an `abi` field.
    #[error("parsing abi artifact: {0}")]
    Json(#[from] serde_json::Error),
    /// No function with that name and arity.
    #[error("abi has no function {name} taking {arity} argument(s)")]
    MissingFunction {
        /// Function name.
        name: String,
        /// Argument count looked up.
        arity: usize,
    },
    /// Wrong number of arguments supplied.
    #[error("{function} expects {expected} argument(s), got {actual}")]
    Arity {
        /// Function signature.
        function: String,
        /// Declared inputs.
        expected: usize,
        /// Supplied values.
        actual: usize,
    },
    /// Parameter type is not supported by this encoder.
    #[error("unsupported abi type {0}")]
    UnsupportedType(String),
    /// Value kind does not match the declared parameter type.
    #[error("parameter {param} of type {kind} cannot take {value:?}")]
    TypeMismatch {
        /// Parameter name or position.
        param: String,
        /// Declared type.
        kind: String,
        /// Supplied value.
        value: AbiValue,
    },
    /// Integer does not fit the declared width.
    #[error("value {value} does not fit {kind}")]
    OutOfRange {
        /// Declared type.
        kind: String,
        /// Supplied value.
        value: u128,
    },
    /// Return data ended early or pointed outside itself.
    #[error("return data truncated: {0}")]
    Truncated(&'static str),
    /// Returned string is not UTF-8.
    #[error("returned string is not valid UTF-8")]
    InvalidUtf8,
}

/// One input or output parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiParam {
    /// Parameter name (may be empty).
    #[serde(default)]
    pub name: String,
    /// Solidity type, e.g. `uint256`.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_kind")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
    #[serde(default, rename = "stateMutability")]
    state_mutability: Option<String>,
    #[serde(default)]
    payable: Option<bool>,
}

fn default_entry_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AbiArtifact {
    Bare(Vec<AbiEntry>),
    Wrapped { abi: Vec<AbiEntry> },
}

/// Contract function description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiFunction {
    /// Function name.
    pub name: String,
    /// Declared inputs.
    pub inputs: Vec<AbiParam>,
    /// Declared outputs.
    pub outputs: Vec<AbiParam>,
    /// Whether the function accepts value.
    pub payable: bool,
}

/// Argument value for call encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiValue {
    /// Unsigned integer.
    Uint(u128),
    /// Account or contract address.
    Address(Address),
    /// Boolean.
    Bool(bool),
}

impl AbiFunction {
    /// Canonical signature, e.g. `tokenURI(uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self
            .inputs
            .iter()
            .map(|param| canonical_type(&param.kind))
            .collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// First four bytes of the Keccak-256 hash of the signature.
    pub fn selector(&self) -> [u8; 4] {
        let digest = Keccak256::digest(self.signature().as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&digest[..4]);
        selector
    }

    /// Selector followed by one head word per argument.
    pub fn encode_call(&self, args: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
        if args.len() != self.inputs.len() {
            return Err(AbiError::Arity {
                function: self.signature(),
                expected: self.inputs.len(),
                actual: args.len(),
            });
        }
        let mut data = Vec::with_capacity(4 + WORD * args.len());
        data.extend_from_slice(&self.selector());
        for (index, (param, value)) in self.inputs.iter().zip(args).enumerate() {
            data.extend_from_slice(&encode_word(index, param, value)?);
        }
        Ok(data)
    }
}

fn canonical_type(kind: &str) -> &str {
    match kind {
        "uint" => "uint256",
        "int" => "int256",
        other => other,
    }
}

fn uint_bits(kind: &str) -> Result<u32, AbiError> {
    let unsupported = || AbiError::UnsupportedType(kind.to_string());
    let suffix = canonical_type(kind)
        .strip_prefix("uint")
        .ok_or_else(unsupported)?;
    let bits: u32 = suffix.parse().map_err(|_| unsupported())?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(unsupported());
    }
    Ok(bits)
}

fn encode_word(index: usize, param: &AbiParam, value: &AbiValue) -> Result<[u8; WORD], AbiError> {
    let mut word = [0u8; WORD];
    let kind = canonical_type(&param.kind);
    let mismatch = || AbiError::TypeMismatch {
        param: if param.name.is_empty() {
            format!("#{index}")
        } else {
            param.name.clone()
        },
        kind: kind.to_string(),
        value: *value,
    };
    match value {
        AbiValue::Uint(n) => {
            if !kind.starts_with("uint") {
                return Err(mismatch());
            }
            let bits = uint_bits(kind)?;
            if bits < 128 && *n >> bits != 0 {
                return Err(AbiError::OutOfRange {
                    kind: kind.to_string(),
                    value: *n,
                });
            }
            word[WORD - 16..].copy_from_slice(&n.to_be_bytes());
        }
        AbiValue::Address(addr) => {
            if kind != "address" {
                return Err(mismatch());
            }
            word[WORD - 20..].copy_from_slice(addr.as_bytes());
        }
        AbiValue::Bool(flag) => {
            if kind != "bool" {
                return Err(mismatch());
            }
            word[WORD - 1] = u8::from(*flag);
        }
    }
    Ok(word)
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or(AbiError::Truncated("word out of bounds"))
}

fn word_to_u128(word: &[u8]) -> Result<u128, AbiError> {
    if word[..WORD - 16].iter().any(|b| *b != 0) {
        return Err(AbiError::OutOfRange {
            kind: "uint256".into(),
            value: u128::MAX,
        });
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[WORD - 16..]);
    Ok(u128::from_be_bytes(low))
}

/// Decode a single `uint` return value that fits 128 bits.
pub fn decode_uint(data: &[u8]) -> Result<u128, AbiError> {
    word_to_u128(read_word(data, 0)?)
}

/// Decode a single dynamic `string` return value.
pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    let offset = usize::try_from(word_to_u128(read_word(data, 0)?)?)
        .map_err(|_| AbiError::Truncated("string offset"))?;
    let len = usize::try_from(word_to_u128(read_word(data, offset)?)?)
        .map_err(|_| AbiError::Truncated("string length"))?;
    let start = offset + WORD;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or(AbiError::Truncated("string body"))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)
}

/// Encode a single `string` as return data; the inverse of [`decode_string`].
pub fn encode_string(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut data = Vec::with_capacity(2 * WORD + padded);
    data.extend_from_slice(&uint_word(WORD as u128));
    data.extend_from_slice(&uint_word(bytes.len() as u128));
    data.extend_from_slice(bytes);
    data.resize(2 * WORD + padded, 0);
    data
}

/// Big-endian 32-byte word holding `value`.
pub fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Functions of a deployed contract, indexed by name.
#[derive(Debug, Clone, Default)]
pub struct ContractAbi {
    functions: HashMap<String, Vec<AbiFunction>>,
}

impl ContractAbi {
    /// Parse an ABI array or a build artifact with an `abi` field.
    pub fn from_slice(data: &[u8]) -> Result<Self, AbiError> {
        let entries = match serde_json::from_slice::<AbiArtifact>(data)? {
            AbiArtifact::Bare(entries) | AbiArtifact::Wrapped { abi: entries } => entries,
        };
        let mut functions: HashMap<String, Vec<AbiFunction>> = HashMap::new();
        for entry in entries.into_iter().filter(|e| e.kind == "function") {
            let payable = entry.payable.unwrap_or(false)
                || entry.state_mutability.as_deref() == Some("payable");
            functions
                .entry(entry.name.clone())
                .or_default()
                .push(AbiFunction {
                    name: entry.name,
                    inputs: entry.inputs,
                    outputs: entry.outputs,
                    payable,
                });
        }
        tracing::debug!(functions = functions.len(), "loaded contract abi");
        Ok(Self { functions })
    }

    /// Read and parse an artifact file.
    pub fn from_path(path: &Path) -> Result<Self, AbiError> {
        let data = std::fs::read(path)?;
        Self::from_slice(&data)
    }

    /// Look up a function by name and argument count.
    pub fn function(&self, name: &str, arity: usize) -> Result<&AbiFunction, AbiError> {
        self.functions
            .get(name)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
            .ok_or_else(|| AbiError::MissingFunction {
                name: name.to_string(),
                arity,
            })
    }

    /// Number of distinct function names.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the ABI declares no functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
