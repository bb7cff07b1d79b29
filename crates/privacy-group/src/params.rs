//! Named ABI parameters and their JSON representation.
//!
//! Inputs are JSON objects keyed by parameter name. Integers are accepted as
//! JSON numbers, decimal strings or `0x` hex strings; addresses and bytes as
//! hex strings. Outputs use decimal strings for integers and lowercase `0x` hex
//! for addresses and bytes.
use ethers_core::{
    abi::{Param, ParamType, Token, param_type::Reader},
    types::{H160, I256, U256},
};
use serde_json::{Map, Value};

use crate::GroupError;

pub fn new_parameter(name: &str, kind: &str) -> Result<Param, GroupError> {
    let kind = Reader::read(kind)
        .map_err(|err| GroupError::InvalidParameter(format!("{name} {kind}: {err}")))?;
    Ok(Param {
        name: name.to_string(),
        kind,
        internal_type: None,
    })
}

pub fn new_parameters<'a>(
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<Vec<Param>, GroupError> {
    params
        .into_iter()
        .map(|(name, kind)| new_parameter(name, kind))
        .collect()
}

pub fn param_types(params: &[Param]) -> Vec<ParamType> {
    params.iter().map(|param| param.kind.clone()).collect()
}

/// Pulls one token per parameter out of a JSON object.
pub fn tokenize_inputs(params: &[Param], inputs: &Value) -> Result<Vec<Token>, GroupError> {
    let empty = Map::new();
    let object = match inputs {
        Value::Object(object) => object,
        Value::Null => &empty,
        other => {
            return Err(GroupError::InvalidInput {
                name: "inputs".to_string(),
                reason: format!("expected a JSON object, found {other}"),
            });
        }
    };

    params
        .iter()
        .map(|param| {
            let value = object
                .get(&param.name)
                .ok_or_else(|| GroupError::MissingInput(param.name.clone()))?;
            json_to_token(&param.kind, value).map_err(|reason| GroupError::InvalidInput {
                name: param.name.clone(),
                reason,
            })
        })
        .collect()
}

pub fn json_to_token(kind: &ParamType, value: &Value) -> Result<Token, String> {
    match (kind, value) {
        (ParamType::Address, Value::String(s)) => parse_address(s).map(Token::Address),
        (ParamType::Uint(bits), Value::String(s)) => {
            parse_uint(s).and_then(|value| fit_uint(value, *bits))
        }
        (ParamType::Uint(bits), Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| format!("{n} is not an unsigned integer"))
            .and_then(|value| fit_uint(U256::from(value), *bits)),
        (ParamType::Int(bits), Value::String(s)) => {
            parse_int(s).and_then(|value| fit_int(value, *bits))
        }
        (ParamType::Int(bits), Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| format!("{n} is not an integer"))
            .and_then(|value| fit_int(I256::from(value), *bits)),
        (ParamType::Bool, Value::Bool(b)) => Ok(Token::Bool(*b)),
        (ParamType::Bool, Value::String(s)) => match s.as_str() {
            "true" => Ok(Token::Bool(true)),
            "false" => Ok(Token::Bool(false)),
            _ => Err(format!("\"{s}\" is not a bool")),
        },
        (ParamType::String, Value::String(s)) => Ok(Token::String(s.clone())),
        (ParamType::Bytes, Value::String(s)) => parse_hex(s).map(Token::Bytes),
        (ParamType::FixedBytes(len), Value::String(s)) => {
            let bytes = parse_hex(s)?;
            if bytes.len() != *len {
                return Err(format!("expected {len} bytes, found {}", bytes.len()));
            }
            Ok(Token::FixedBytes(bytes))
        }
        (ParamType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| json_to_token(inner, item))
            .collect::<Result<_, _>>()
            .map(Token::Array),
        (ParamType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(format!("expected {len} elements, found {}", items.len()));
            }
            items
                .iter()
                .map(|item| json_to_token(inner, item))
                .collect::<Result<_, _>>()
                .map(Token::FixedArray)
        }
        (ParamType::Tuple(kinds), Value::Array(items)) => {
            if items.len() != kinds.len() {
                return Err(format!(
                    "expected {} tuple components, found {}",
                    kinds.len(),
                    items.len()
                ));
            }
            kinds
                .iter()
                .zip(items)
                .map(|(kind, item)| json_to_token(kind, item))
                .collect::<Result<_, _>>()
                .map(Token::Tuple)
        }
        (kind, value) => Err(format!("cannot convert {value} to {kind}")),
    }
}

pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(address) => Value::String(format!("{address:#x}")),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Int(raw) => Value::String(I256::from_raw(*raw).to_string()),
        Token::Uint(value) => Value::String(value.to_string()),
        Token::Bool(b) => Value::Bool(*b),
        Token::String(s) => Value::String(s.clone()),
        Token::FixedArray(items) | Token::Array(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

/// Names decoded outputs after their parameters; unnamed outputs use their index.
pub fn outputs_to_json(params: &[Param], tokens: &[Token]) -> Map<String, Value> {
    params
        .iter()
        .zip(tokens)
        .enumerate()
        .map(|(index, (param, token))| {
            let name = if param.name.is_empty() {
                index.to_string()
            } else {
                param.name.clone()
            };
            (name, token_to_json(token))
        })
        .collect()
}

fn parse_address(s: &str) -> Result<H160, String> {
    s.trim()
        .parse::<H160>()
        .map_err(|err| format!("\"{s}\" is not an address: {err}"))
}

fn parse_uint(s: &str) -> Result<U256, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_dec_str(s).ok(),
    };
    parsed.ok_or_else(|| format!("\"{s}\" is not an unsigned integer"))
}

fn parse_int(s: &str) -> Result<I256, String> {
    s.trim()
        .parse::<I256>()
        .map_err(|err| format!("\"{s}\" is not an integer: {err}"))
}

fn fit_uint(value: U256, bits: usize) -> Result<Token, String> {
    if bits < 256 && value.bits() > bits {
        return Err(format!("{value} does not fit in uint{bits}"));
    }
    Ok(Token::Uint(value))
}

/// Accepts `-2^(bits-1) <= value < 2^(bits-1)`.
fn fit_int(value: I256, bits: usize) -> Result<Token, String> {
    if (1..256).contains(&bits) {
        let bound = I256::from_raw(U256::one() << (bits - 1));
        if value >= bound || value < -bound {
            return Err(format!("{value} does not fit in int{bits}"));
        }
    }
    Ok(Token::Int(value.into_raw()))
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let trimmed = s.trim();
    hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|err| format!("\"{s}\" is not hex: {err}"))
}
