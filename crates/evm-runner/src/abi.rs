//! ABI helpers bridging `ethers-core` tokens and `revm` primitives.
use ethers_core::{
    abi::{self, AbiParser, ParamType, Token},
    types::{H160, U256 as AbiU256},
    utils::id,
};
use revm::primitives::{Address, U256};

use crate::RunnerError;

/// Canonical ABI type of a token. Unsized integers are taken to be 256 bits wide.
pub fn param_type_of(token: &Token) -> Result<ParamType, RunnerError> {
    Ok(match token {
        Token::Address(_) => ParamType::Address,
        Token::FixedBytes(bytes) => ParamType::FixedBytes(bytes.len()),
        Token::Bytes(_) => ParamType::Bytes,
        Token::Int(_) => ParamType::Int(256),
        Token::Uint(_) => ParamType::Uint(256),
        Token::Bool(_) => ParamType::Bool,
        Token::String(_) => ParamType::String,
        Token::FixedArray(items) => {
            let first = items
                .first()
                .ok_or_else(|| RunnerError::UntypedArgument(token.to_string()))?;
            ParamType::FixedArray(Box::new(param_type_of(first)?), items.len())
        }
        Token::Array(items) => {
            let first = items
                .first()
                .ok_or_else(|| RunnerError::UntypedArgument(token.to_string()))?;
            ParamType::Array(Box::new(param_type_of(first)?))
        }
        Token::Tuple(items) => ParamType::Tuple(
            items
                .iter()
                .map(param_type_of)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

/// `name(type,...)` for a method called with `args`.
pub fn method_signature(method: &str, args: &[Token]) -> Result<String, RunnerError> {
    let types = args
        .iter()
        .map(param_type_of)
        .collect::<Result<Vec<_>, _>>()?;
    let types = types
        .iter()
        .map(ParamType::to_string)
        .collect::<Vec<_>>()
        .join(",");
    Ok(format!("{method}({types})"))
}

/// Selector followed by the encoded arguments, with types inferred from the tokens.
pub fn encode_invoke(method: &str, args: &[Token]) -> Result<Vec<u8>, RunnerError> {
    let signature = method_signature(method, args)?;
    tracing::trace!(target: "evm_runner", "Encoding call to {signature}");
    let mut calldata = id(&signature).to_vec();
    calldata.extend(abi::encode(args));
    Ok(calldata)
}

/// ABI-encodes a function call according to the provided signature.
pub fn encode_function_call(signature: &str, args: &[Token]) -> Result<Vec<u8>, RunnerError> {
    let function = AbiParser::default().parse_function(signature)?;
    let encoded = function.encode_input(args)?;
    Ok(encoded)
}

pub fn decode_output(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, RunnerError> {
    Ok(abi::decode(types, data)?)
}

pub fn to_abi_address(address: Address) -> H160 {
    H160::from_slice(address.as_slice())
}

pub fn from_abi_address(address: H160) -> Address {
    Address::from(address.0)
}

pub fn to_abi_u256(value: U256) -> AbiU256 {
    AbiU256::from_big_endian(&value.to_be_bytes::<32>())
}

pub fn from_abi_u256(value: AbiU256) -> U256 {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    U256::from_be_bytes(buf)
}
