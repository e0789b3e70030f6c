//! Typed calldata encoding.
//!
//! Every field handed to a constructor or entrypoint ends up as a [`Felt`]. Literals are parsed
//! with explicit overflow checks:
//!
//! - `0x1f`: hexadecimal,
//! - `1234`: decimal,
//! - `'uri'`: a Cairo short string of at most 31 ASCII bytes.

use crate::{
    error::{DeployError, Result},
    felt::Felt,
};
use std::fmt;

/// A single calldata field, either already typed or a literal still to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalldataField {
    Felt(Felt),
    Literal(String),
}

impl From<Felt> for CalldataField {
    fn from(felt: Felt) -> Self {
        CalldataField::Felt(felt)
    }
}

impl From<&str> for CalldataField {
    fn from(literal: &str) -> Self {
        CalldataField::Literal(literal.to_string())
    }
}

impl fmt::Display for CalldataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalldataField::Felt(felt) => write!(f, "{felt}"),
            CalldataField::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

impl CalldataField {
    pub fn encode(&self) -> Result<Felt> {
        match self {
            CalldataField::Felt(felt) => Ok(*felt),
            CalldataField::Literal(literal) => encode_literal(literal),
        }
    }
}

/// Encodes a literal into a felt, see the module docs for the accepted forms.
pub fn encode_literal(literal: &str) -> Result<Felt> {
    let trimmed = literal.trim();
    let encoded = match trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        Some(short_string) => Felt::from_short_string(short_string),
        None => trimmed.parse::<Felt>(),
    };
    encoded.map_err(|e| DeployError::CalldataEncoding {
        field: literal.to_string(),
        reason: e.to_string(),
    })
}

/// Encodes every field, failing on the first one that does not fit.
pub fn encode(fields: &[CalldataField]) -> Result<Vec<Felt>> {
    fields.iter().map(CalldataField::encode).collect()
}
