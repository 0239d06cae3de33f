//! Argument coercion from transport values to ABI tokens
//!
//! The two back ends accept different input shapes. The ethers back end is
//! forgiving: numeric strings in decimal or hex become integers, records
//! fill tuples by component name, and strings it cannot interpret are
//! handed to the encoder untouched (which then rejects them). The local-key
//! back end only accepts the canonical transport representation: integers
//! as decimal strings or JSON numbers, never `0x` hex.

use crate::abi::AbiParam;
use crate::errors::{EvvmError, Result};
use ethers::abi::Token;
use ethers::types::{Address, I256, U256};
use serde_json::Value;

/// How strictly transport values are matched against parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Lenient,
    Typed,
}

/// Coerce a positional argument list against a function's inputs
pub fn coerce_arguments(params: &[AbiParam], args: &[Value], mode: Coercion) -> Result<Vec<Token>> {
    if params.len() != args.len() {
        return Err(EvvmError::InvalidArgument(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| coerce_value(param, arg, mode))
        .collect()
}

/// Coerce one value against one parameter descriptor.
///
/// `null` always becomes the zero value of the parameter type.
pub fn coerce_value(param: &AbiParam, value: &Value, mode: Coercion) -> Result<Token> {
    if let Some((element, fixed)) = param.array_element() {
        return coerce_array(param, &element, fixed, value, mode);
    }
    if param.is_tuple() {
        return coerce_tuple(param, value, mode);
    }
    coerce_scalar(param, value, mode)
}

fn coerce_array(
    param: &AbiParam,
    element: &AbiParam,
    fixed: Option<usize>,
    value: &Value,
    mode: Coercion,
) -> Result<Token> {
    let nulls;
    let items = match value {
        Value::Array(items) => items,
        Value::Null => {
            nulls = vec![Value::Null; fixed.unwrap_or(0)];
            &nulls
        }
        other => return Err(mismatch(param, other)),
    };

    if let Some(len) = fixed {
        if items.len() != len {
            return Err(EvvmError::InvalidArgument(format!(
                "{} '{}' expects {} elements, got {}",
                param.ty,
                param.name,
                len,
                items.len()
            )));
        }
    }

    let tokens = items
        .iter()
        .map(|item| coerce_value(element, item, mode))
        .collect::<Result<Vec<_>>>()?;

    Ok(match fixed {
        Some(_) => Token::FixedArray(tokens),
        None => Token::Array(tokens),
    })
}

fn coerce_tuple(param: &AbiParam, value: &Value, mode: Coercion) -> Result<Token> {
    let components = param.components.as_deref().ok_or_else(|| {
        EvvmError::InvalidArgument(format!("tuple '{}' has no components", param.name))
    })?;

    let tokens = match value {
        Value::Array(items) => {
            if items.len() != components.len() {
                return Err(EvvmError::InvalidArgument(format!(
                    "tuple '{}' has {} components, got {} values",
                    param.name,
                    components.len(),
                    items.len()
                )));
            }
            components
                .iter()
                .zip(items)
                .map(|(component, item)| coerce_value(component, item, mode))
                .collect::<Result<Vec<_>>>()?
        }
        Value::Object(fields) => components
            .iter()
            .map(|component| {
                let field = fields.get(&component.name).ok_or_else(|| {
                    EvvmError::InvalidArgument(format!(
                        "tuple '{}' is missing component '{}'",
                        param.name, component.name
                    ))
                })?;
                coerce_value(component, field, mode)
            })
            .collect::<Result<Vec<_>>>()?,
        Value::Null => components
            .iter()
            .map(|component| coerce_value(component, &Value::Null, mode))
            .collect::<Result<Vec<_>>>()?,
        other => return Err(mismatch(param, other)),
    };

    Ok(Token::Tuple(tokens))
}

fn coerce_scalar(param: &AbiParam, value: &Value, mode: Coercion) -> Result<Token> {
    let ty = param.ty.as_str();
    match ty {
        "address" => coerce_address(param, value, mode),
        "bool" => coerce_bool(param, value, mode),
        "string" => match value {
            Value::String(s) => Ok(Token::String(s.clone())),
            Value::Null => Ok(Token::String(String::new())),
            other => Err(mismatch(param, other)),
        },
        "bytes" => coerce_bytes(param, value, mode, None),
        _ if ty.starts_with("bytes") => {
            let size = ty["bytes".len()..]
                .parse::<usize>()
                .map_err(|_| unsupported(param))?;
            coerce_bytes(param, value, mode, Some(size))
        }
        _ if ty.starts_with("uint") => coerce_integer(param, value, mode, false),
        _ if ty.starts_with("int") => coerce_integer(param, value, mode, true),
        _ => Err(unsupported(param)),
    }
}

fn coerce_address(param: &AbiParam, value: &Value, mode: Coercion) -> Result<Token> {
    match value {
        Value::Null => Ok(Token::Address(Address::zero())),
        Value::String(s) => match s.parse::<Address>() {
            Ok(address) => Ok(Token::Address(address)),
            Err(_) if mode == Coercion::Lenient => Ok(Token::String(s.clone())),
            Err(_) => Err(mismatch(param, value)),
        },
        other => Err(mismatch(param, other)),
    }
}

fn coerce_bool(param: &AbiParam, value: &Value, mode: Coercion) -> Result<Token> {
    match (value, mode) {
        (Value::Bool(b), _) => Ok(Token::Bool(*b)),
        (Value::Null, _) => Ok(Token::Bool(false)),
        (Value::String(s), Coercion::Lenient) => match s.as_str() {
            "true" => Ok(Token::Bool(true)),
            "false" => Ok(Token::Bool(false)),
            _ => Ok(Token::String(s.clone())),
        },
        (other, _) => Err(mismatch(param, other)),
    }
}

fn coerce_bytes(param: &AbiParam, value: &Value, mode: Coercion, size: Option<usize>) -> Result<Token> {
    let bytes = match value {
        Value::Null => Vec::new(),
        Value::String(s) => {
            let decoded = s.strip_prefix("0x").map(hex::decode);
            match (decoded, mode) {
                (Some(Ok(bytes)), _) => bytes,
                (_, Coercion::Lenient) => return Ok(Token::String(s.clone())),
                (_, Coercion::Typed) => return Err(mismatch(param, value)),
            }
        }
        other => return Err(mismatch(param, other)),
    };

    let Some(size) = size else {
        return Ok(Token::Bytes(bytes));
    };

    let exact = bytes.len() == size || value.is_null();
    if bytes.len() > size || (mode == Coercion::Typed && !exact) {
        return Err(EvvmError::InvalidArgument(format!(
            "{} '{}' cannot hold {} bytes",
            param.ty,
            param.name,
            bytes.len()
        )));
    }

    let mut padded = bytes;
    padded.resize(size, 0);
    Ok(Token::FixedBytes(padded))
}

fn coerce_integer(param: &AbiParam, value: &Value, mode: Coercion, signed: bool) -> Result<Token> {
    let wrap = |raw: U256| if signed { Token::Int(raw) } else { Token::Uint(raw) };

    match value {
        Value::Null => Ok(wrap(U256::zero())),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(wrap(U256::from(v)))
            } else if let (Some(v), true) = (n.as_i64(), signed) {
                Ok(Token::Int(I256::from(v).into_raw()))
            } else {
                Err(mismatch(param, value))
            }
        }
        Value::String(s) => {
            let parsed = match mode {
                Coercion::Lenient => parse_lenient_integer(s, signed),
                Coercion::Typed => parse_decimal_integer(s, signed),
            };
            match (parsed, mode) {
                (Some(Ok(raw)), _) => Ok(wrap(raw)),
                (Some(Err(reason)), _) => Err(EvvmError::InvalidArgument(format!(
                    "{} '{}': {}",
                    param.ty, param.name, reason
                ))),
                (None, Coercion::Lenient) => Ok(Token::String(s.clone())),
                (None, Coercion::Typed) => Err(mismatch(param, value)),
            }
        }
        other => Err(mismatch(param, other)),
    }
}

/// `None` when the string does not look numeric at all
fn parse_lenient_integer(raw: &str, signed: bool) -> Option<std::result::Result<U256, String>> {
    let raw = raw.trim();
    if let Some(digits) = raw.strip_prefix("0x") {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return Some(U256::from_str_radix(digits, 16).map_err(|e| e.to_string()));
    }
    parse_decimal_integer(raw, signed)
}

fn parse_decimal_integer(raw: &str, signed: bool) -> Option<std::result::Result<U256, String>> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if raw.starts_with('-') {
        if !signed {
            return Some(Err("negative value for unsigned integer".to_string()));
        }
        return Some(I256::from_dec_str(raw).map(I256::into_raw).map_err(|e| e.to_string()));
    }
    Some(U256::from_dec_str(digits).map_err(|e| e.to_string()))
}

fn mismatch(param: &AbiParam, value: &Value) -> EvvmError {
    EvvmError::InvalidArgument(format!(
        "cannot coerce {} into {} '{}'",
        value, param.ty, param.name
    ))
}

fn unsupported(param: &AbiParam) -> EvvmError {
    EvvmError::InvalidArgument(format!("unsupported ABI type {} for '{}'", param.ty, param.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipient_table() -> AbiParam {
        AbiParam::tuple(
            "toData",
            "tuple[]",
            vec![
                AbiParam::new("amount", "uint256"),
                AbiParam::new("to_address", "address"),
                AbiParam::new("to_identity", "string"),
            ],
        )
    }

    #[test]
    fn test_lenient_numeric_strings() {
        let param = AbiParam::new("amount", "uint256");
        let decimal = coerce_value(&param, &json!("1000"), Coercion::Lenient).unwrap();
        let hex = coerce_value(&param, &json!("0x3e8"), Coercion::Lenient).unwrap();
        let number = coerce_value(&param, &json!(1000), Coercion::Lenient).unwrap();
        assert_eq!(decimal, Token::Uint(U256::from(1000)));
        assert_eq!(hex, decimal);
        assert_eq!(number, decimal);
    }

    #[test]
    fn test_lenient_passes_unrecognised_strings_through() {
        let param = AbiParam::new("amount", "uint256");
        let token = coerce_value(&param, &json!("lots"), Coercion::Lenient).unwrap();
        assert_eq!(token, Token::String("lots".to_string()));

        let param = AbiParam::new("to", "address");
        let token = coerce_value(&param, &json!("alice"), Coercion::Lenient).unwrap();
        assert_eq!(token, Token::String("alice".to_string()));
    }

    #[test]
    fn test_typed_rejects_non_canonical_shapes() {
        let amount = AbiParam::new("amount", "uint256");
        assert!(coerce_value(&amount, &json!("0x3e8"), Coercion::Typed).is_err());
        assert!(coerce_value(&amount, &json!("lots"), Coercion::Typed).is_err());
        assert_eq!(
            coerce_value(&amount, &json!("1000"), Coercion::Typed).unwrap(),
            Token::Uint(U256::from(1000))
        );

        let to = AbiParam::new("to", "address");
        assert!(coerce_value(&to, &json!("alice"), Coercion::Typed).is_err());
    }

    #[test]
    fn test_signed_integers() {
        let param = AbiParam::new("delta", "int256");
        let token = coerce_value(&param, &json!("-5"), Coercion::Typed).unwrap();
        assert_eq!(token, Token::Int(I256::from(-5).into_raw()));

        let unsigned = AbiParam::new("amount", "uint256");
        assert!(coerce_value(&unsigned, &json!("-5"), Coercion::Lenient).is_err());
    }

    #[test]
    fn test_null_becomes_zero_value() {
        assert_eq!(
            coerce_value(&AbiParam::new("to", "address"), &Value::Null, Coercion::Typed).unwrap(),
            Token::Address(Address::zero())
        );
        assert_eq!(
            coerce_value(&AbiParam::new("id", "string"), &Value::Null, Coercion::Typed).unwrap(),
            Token::String(String::new())
        );
        assert_eq!(
            coerce_value(&AbiParam::new("h", "bytes32"), &Value::Null, Coercion::Typed).unwrap(),
            Token::FixedBytes(vec![0u8; 32])
        );
        assert_eq!(
            coerce_value(&recipient_table(), &Value::Null, Coercion::Typed).unwrap(),
            Token::Array(vec![])
        );
    }

    #[test]
    fn test_tuple_array_by_position_and_by_name() {
        let by_name = json!([
            { "amount": "10", "to_address": "0x1111111111111111111111111111111111111111", "to_identity": null },
            { "amount": "20", "to_address": null, "to_identity": "alice" }
        ]);
        let by_position = json!([
            ["10", "0x1111111111111111111111111111111111111111", null],
            ["20", null, "alice"]
        ]);

        let named = coerce_value(&recipient_table(), &by_name, Coercion::Lenient).unwrap();
        let positional = coerce_value(&recipient_table(), &by_position, Coercion::Lenient).unwrap();
        assert_eq!(named, positional);

        let Token::Array(entries) = named else {
            panic!("expected dynamic array");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1],
            Token::Tuple(vec![
                Token::Uint(U256::from(20)),
                Token::Address(Address::zero()),
                Token::String("alice".to_string()),
            ])
        );
    }

    #[test]
    fn test_tuple_missing_component() {
        let value = json!([{ "amount": "10", "to_address": null }]);
        assert!(coerce_value(&recipient_table(), &value, Coercion::Lenient).is_err());
    }

    #[test]
    fn test_fixed_array_length() {
        let param = AbiParam::new("pair", "uint256[2]");
        assert!(coerce_value(&param, &json!(["1", "2", "3"]), Coercion::Typed).is_err());
        assert_eq!(
            coerce_value(&param, &json!(["1", "2"]), Coercion::Typed).unwrap(),
            Token::FixedArray(vec![Token::Uint(U256::one()), Token::Uint(U256::from(2))])
        );
    }

    #[test]
    fn test_fixed_bytes_padding() {
        let param = AbiParam::new("hash", "bytes32");
        let token = coerce_value(&param, &json!("0xdeadbeef"), Coercion::Lenient).unwrap();
        let Token::FixedBytes(bytes) = token else {
            panic!("expected fixed bytes");
        };
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..4], &[0xde, 0xad, 0xbe, 0xef]);

        assert!(coerce_value(&param, &json!("0xdeadbeef"), Coercion::Typed).is_err());
    }

    #[test]
    fn test_argument_count() {
        let params = vec![AbiParam::new("a", "uint256"), AbiParam::new("b", "bool")];
        assert!(coerce_arguments(&params, &[json!("1")], Coercion::Typed).is_err());
        let tokens = coerce_arguments(&params, &[json!("1"), json!(true)], Coercion::Typed).unwrap();
        assert_eq!(tokens, vec![Token::Uint(U256::one()), Token::Bool(true)]);
    }
}
