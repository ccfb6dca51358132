//! Coerces the string-typed constructor arguments supplied by the agent
//! (or typed in by the user) into ABI tokens for the declared parameter
//! list, all-or-nothing. Anything that cannot be coerced to its declared
//! type fails the attempt with the parameter index and offending value,
//! so bad input surfaces to the user instead of being silently encoded.

use super::signature::ConstructorParam;
use ethabi::{
    ethereum_types::U256,
    param_type::{ParamType, Reader},
    token::Token,
    Address,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("constructor expects {expected} argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("unsupported parameter type `{0}`")]
    UnsupportedType(String),
    #[error("invalid parameter type `{type_text}`: {message}")]
    InvalidType { type_text: String, message: String },
    #[error("argument {index} (`{type_text}`): {message}, got `{value}`")]
    InvalidValue {
        index: usize,
        type_text: String,
        value: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedArgs {
    pub tokens: Vec<Token>,
    pub encoded: Vec<u8>,
}

impl EncodedArgs {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Hex without the `0x` prefix, the form explorer verification
    /// endpoints expect for `constructorArguements`.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.encoded)
    }
}

pub fn encode_constructor_args(
    params: &[ConstructorParam],
    values: &[String],
) -> Result<EncodedArgs, EncodeError> {
    if params.len() != values.len() {
        return Err(EncodeError::ArityMismatch {
            expected: params.len(),
            got: values.len(),
        });
    }

    let mut tokens = Vec::with_capacity(params.len());
    for (index, (param, value)) in params.iter().zip(values).enumerate() {
        let kind = parse_param_type(&param.type_text)?;
        let token = coerce_value(&kind, value).map_err(|message| EncodeError::InvalidValue {
            index,
            type_text: param.type_text.clone(),
            value: value.clone(),
            message,
        })?;
        tokens.push(token);
    }

    let encoded = ethabi::encode(&tokens);
    Ok(EncodedArgs { tokens, encoded })
}

/// Declared type text -> [`ParamType`]. `payable` qualifiers are part of
/// the declaration but not of the ABI type.
pub fn parse_param_type(type_text: &str) -> Result<ParamType, EncodeError> {
    let normalized = type_text.replace(" payable", "");
    let normalized = normalized.trim();
    Reader::read(normalized).map_err(|err| EncodeError::InvalidType {
        type_text: type_text.to_string(),
        message: err.to_string(),
    })
}

fn coerce_value(kind: &ParamType, raw: &str) -> Result<Token, String> {
    let trimmed = raw.trim();
    match kind {
        ParamType::String => Ok(Token::String(unquote(trimmed).to_string())),
        ParamType::Bool => match unquote(trimmed) {
            "true" => Ok(Token::Bool(true)),
            "false" => Ok(Token::Bool(false)),
            _ => Err("expected `true` or `false`".to_string()),
        },
        ParamType::Uint(_) => parse_uint(unquote(trimmed)).map(Token::Uint),
        ParamType::Int(_) => {
            let value = unquote(trimmed);
            if let Some(magnitude) = value.strip_prefix('-') {
                let magnitude = parse_uint(magnitude.trim())?;
                // Two's complement over 256 bits.
                Ok(Token::Int((!magnitude).overflowing_add(U256::one()).0))
            } else {
                parse_uint(value).map(Token::Int)
            }
        }
        ParamType::Address => {
            let bytes = parse_hex(unquote(trimmed))?;
            if bytes.len() != 20 {
                return Err(format!("expected 20 byte address, got {}", bytes.len()));
            }
            Ok(Token::Address(Address::from_slice(&bytes)))
        }
        ParamType::Bytes => parse_hex(unquote(trimmed)).map(Token::Bytes),
        ParamType::FixedBytes(size) => {
            let bytes = parse_hex(unquote(trimmed))?;
            if bytes.len() != *size {
                return Err(format!("expected {} bytes, got {}", size, bytes.len()));
            }
            Ok(Token::FixedBytes(bytes))
        }
        ParamType::Array(inner) => {
            let elements = split_array(trimmed)?
                .into_iter()
                .map(|element| coerce_value(inner, element))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Token::Array(elements))
        }
        ParamType::FixedArray(inner, size) => {
            let elements = split_array(trimmed)?
                .into_iter()
                .map(|element| coerce_value(inner, element))
                .collect::<Result<Vec<_>, _>>()?;
            if elements.len() != *size {
                return Err(format!(
                    "expected {} element(s), got {}",
                    size,
                    elements.len()
                ));
            }
            Ok(Token::FixedArray(elements))
        }
        ParamType::Tuple(_) => Err("tuple parameters are not supported".to_string()),
    }
}

fn parse_uint(value: &str) -> Result<U256, String> {
    let parsed = if let Some(hex) = value.strip_prefix("0x") {
        U256::from_str_radix(hex, 16).ok()
    } else {
        U256::from_dec_str(value).ok()
    };
    parsed.ok_or_else(|| "expected a decimal or 0x-prefixed integer".to_string())
}

fn parse_hex(value: &str) -> Result<Vec<u8>, String> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
        .map_err(|_| "expected a hex string".to_string())
}

/// Splits a `[...]` literal on top-level commas, tracking bracket and
/// paren depth. Commas inside quoted elements are not treated specially.
fn split_array(raw: &str) -> Result<Vec<&str>, String> {
    let body = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| "expected a `[...]` array literal".to_string())?;

    if body.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut elements = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                elements.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    elements.push(body[start..].trim());
    Ok(elements)
}

fn unquote(value: &str) -> &str {
    let stripped = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            value
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
        });
    stripped.unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(types: &[&str]) -> Vec<ConstructorParam> {
        types
            .iter()
            .map(|t| ConstructorParam {
                type_text: t.to_string(),
                name: None,
            })
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn encoding_round_trips_through_abi_decoding() {
        let encoded = encode_constructor_args(
            &params(&["uint256", "string[]", "bool"]),
            &strings(&["1", r#"["a","b"]"#, "true"]),
        )
        .unwrap();

        let decoded = ethabi::decode(
            &[
                ParamType::Uint(256),
                ParamType::Array(Box::new(ParamType::String)),
                ParamType::Bool,
            ],
            &encoded.encoded,
        )
        .unwrap();

        assert_eq!(
            decoded,
            vec![
                Token::Uint(U256::from(1u64)),
                Token::Array(vec![
                    Token::String("a".to_string()),
                    Token::String("b".to_string()),
                ]),
                Token::Bool(true),
            ]
        );
    }

    #[test]
    fn token_name_and_symbol() {
        let encoded = encode_constructor_args(
            &params(&["string", "string"]),
            &strings(&["MyToken", "MTK"]),
        )
        .unwrap();
        assert_eq!(
            encoded.tokens,
            vec![
                Token::String("MyToken".to_string()),
                Token::String("MTK".to_string()),
            ]
        );
        assert!(!encoded.to_hex().is_empty());
    }

    #[test]
    fn negative_ints_are_twos_complemented() {
        let encoded =
            encode_constructor_args(&params(&["int256"]), &strings(&["-1"])).unwrap();
        assert_eq!(encoded.tokens, vec![Token::Int(U256::MAX)]);
    }

    #[test]
    fn addresses_and_bytes_parse_from_hex() {
        let encoded = encode_constructor_args(
            &params(&["address", "bytes32"]),
            &strings(&[
                "0x00000000000000000000000000000000000000ff",
                &format!("0x{}", "11".repeat(32)),
            ]),
        )
        .unwrap();
        assert!(matches!(encoded.tokens[0], Token::Address(_)));
        assert!(matches!(encoded.tokens[1], Token::FixedBytes(_)));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = encode_constructor_args(&params(&["uint256"]), &strings(&[])).unwrap_err();
        assert_eq!(
            err,
            EncodeError::ArityMismatch {
                expected: 1,
                got: 0
            }
        );
    }

    #[test]
    fn uncoercible_value_reports_the_argument() {
        let err = encode_constructor_args(
            &params(&["uint256", "bool"]),
            &strings(&["1", "maybe"]),
        )
        .unwrap_err();
        match err {
            EncodeError::InvalidValue { index, value, .. } => {
                assert_eq!(index, 1);
                assert_eq!(value, "maybe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nested_arrays_split_on_top_level_commas_only() {
        let encoded = encode_constructor_args(
            &params(&["uint256[][]"]),
            &strings(&["[[1,2],[3]]"]),
        )
        .unwrap();
        assert_eq!(
            encoded.tokens,
            vec![Token::Array(vec![
                Token::Array(vec![
                    Token::Uint(U256::from(1u64)),
                    Token::Uint(U256::from(2u64)),
                ]),
                Token::Array(vec![Token::Uint(U256::from(3u64))]),
            ])]
        );
    }
}
