use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::{Function, JsonAbi},
    primitives::{Address, Bytes},
    sol,
};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::str::FromStr;

use super::utils;

sol! {
    /// The counter contract read by the proxy server.
    contract Counter {
        function number() external view returns (uint256);
        function increment() external;
        function setNumber(uint256 newNumber) external;
    }
}

/// Look up a function by name in a loaded ABI
pub fn find_function<'a>(abi: &'a JsonAbi, name: &str) -> Result<&'a Function> {
    abi.functions().find(|f| f.name == name).ok_or_else(|| {
        let available_functions: Vec<String> = abi.functions().map(|f| f.name.clone()).collect();

        if available_functions.is_empty() {
            anyhow!(
                "Function '{}' not found. The contract ABI contains no functions.",
                name
            )
        } else {
            anyhow!(
                "Function '{}' not found in contract ABI. Available functions: {}",
                name,
                available_functions.join(", ")
            )
        }
    })
}

/// Encode positional JSON arguments as calldata for `function`
pub fn encode_call(function: &Function, args: &[Value]) -> Result<Bytes> {
    if args.len() != function.inputs.len() {
        let expected_params: Vec<String> = function
            .inputs
            .iter()
            .map(|input| format!("{} {}", input.ty, input.name))
            .collect();

        return Err(anyhow!(
            "Parameter count mismatch for function '{}': expected {} parameters, got {}.\nExpected parameters: [{}]",
            function.name,
            function.inputs.len(),
            args.len(),
            expected_params.join(", ")
        ));
    }

    let mut inputs = Vec::with_capacity(args.len());
    for (i, (arg, input)) in args.iter().zip(&function.inputs).enumerate() {
        let value = json_to_dyn_sol_value(arg, &input.ty).map_err(|e| {
            anyhow!(
                "Invalid parameter #{} ('{}' of type '{}'): {}",
                i + 1,
                input.name,
                input.ty,
                e
            )
        })?;
        inputs.push(value);
    }

    let encoded = function
        .abi_encode_input(&inputs)
        .map_err(|e| anyhow!("Failed to encode function inputs: {}", e))?;

    Ok(encoded.into())
}

/// Decode a call result into JSON
pub fn decode_output(function: &Function, result_bytes: &Bytes) -> Result<Value> {
    if result_bytes.is_empty() {
        return Ok(Value::Null);
    }

    let decoded = function
        .abi_decode_output(result_bytes, false)
        .map_err(|e| anyhow!("Failed to decode output: {}", e))?;

    if decoded.len() == 1 {
        dyn_sol_value_to_json(&decoded[0])
    } else {
        decoded
            .iter()
            .map(dyn_sol_value_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }
}

fn json_to_dyn_sol_value(value: &Value, sol_type: &str) -> Result<DynSolValue> {
    match sol_type {
        "address" => {
            let addr_str = value
                .as_str()
                .ok_or_else(|| anyhow!("Address must be a string"))?;
            Ok(DynSolValue::Address(Address::from_str(addr_str)?))
        }
        ty if ty.starts_with("uint") => {
            let bits = ty[4..].parse::<usize>().unwrap_or(256);
            let num = match value {
                Value::Number(n) => n
                    .as_u64()
                    .map(alloy::primitives::U256::from)
                    .ok_or_else(|| anyhow!("Invalid uint value: {}", n))?,
                Value::String(s) => utils::parse_uint(s)?,
                _ => return Err(anyhow!("Uint must be a number or string")),
            };
            Ok(DynSolValue::Uint(num, bits))
        }
        "string" => {
            let s = value
                .as_str()
                .ok_or_else(|| anyhow!("String parameter must be a string"))?;
            Ok(DynSolValue::String(s.to_string()))
        }
        "bool" => {
            let b = value
                .as_bool()
                .ok_or_else(|| anyhow!("Bool parameter must be a boolean"))?;
            Ok(DynSolValue::Bool(b))
        }
        _ => Err(anyhow!("Unsupported Solidity type: {}", sol_type)),
    }
}

fn dyn_sol_value_to_json(value: &DynSolValue) -> Result<Value> {
    match value {
        DynSolValue::Address(addr) => Ok(Value::String(format!("0x{:x}", addr))),
        DynSolValue::Uint(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Int(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Bool(b) => Ok(Value::Bool(*b)),
        DynSolValue::String(s) => Ok(Value::String(s.clone())),
        DynSolValue::Bytes(bytes) => Ok(Value::String(format!("0x{}", hex::encode(bytes)))),
        DynSolValue::FixedBytes(bytes, _) => {
            Ok(Value::String(format!("0x{}", hex::encode(bytes))))
        }
        DynSolValue::Array(items) | DynSolValue::Tuple(items) => items
            .iter()
            .map(dyn_sol_value_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Err(anyhow!("Unsupported DynSolValue type: {:?}", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use alloy::sol_types::SolCall;
    use serde_json::json;

    fn counter_abi() -> JsonAbi {
        serde_json::from_value(json!([
            { "type": "function", "name": "increment", "inputs": [], "outputs": [], "stateMutability": "nonpayable" },
            { "type": "function", "name": "number", "inputs": [], "outputs": [{ "name": "", "type": "uint256", "internalType": "uint256" }], "stateMutability": "view" },
            { "type": "function", "name": "setNumber", "inputs": [{ "name": "newNumber", "type": "uint256", "internalType": "uint256" }], "outputs": [], "stateMutability": "nonpayable" }
        ]))
        .unwrap()
    }

    #[test]
    fn test_find_function() {
        let abi = counter_abi();
        assert_eq!(find_function(&abi, "setNumber").unwrap().inputs.len(), 1);

        let err = find_function(&abi, "decrement").unwrap_err().to_string();
        assert!(err.contains("Available functions"));

        let empty: JsonAbi = serde_json::from_str("[]").unwrap();
        assert!(find_function(&empty, "increment")
            .unwrap_err()
            .to_string()
            .contains("no functions"));
    }

    #[test]
    fn test_encode_matches_sol_bindings() {
        let abi = counter_abi();

        let set_number = find_function(&abi, "setNumber").unwrap();
        let calldata = encode_call(set_number, &[json!(7)]).unwrap();
        let expected = Counter::setNumberCall {
            newNumber: U256::from(7),
        }
        .abi_encode();
        assert_eq!(calldata.to_vec(), expected);

        let increment = find_function(&abi, "increment").unwrap();
        let calldata = encode_call(increment, &[]).unwrap();
        assert_eq!(calldata.to_vec(), Counter::incrementCall {}.abi_encode());
    }

    #[test]
    fn test_encode_rejects_bad_arguments() {
        let abi = counter_abi();
        let set_number = find_function(&abi, "setNumber").unwrap();
        assert!(encode_call(set_number, &[]).is_err());
        assert!(encode_call(set_number, &[json!("abc")]).is_err());
        assert!(encode_call(set_number, &[json!(true)]).is_err());
    }

    #[test]
    fn test_decode_number_output() {
        let abi = counter_abi();
        let number = find_function(&abi, "number").unwrap();
        let raw = Bytes::from(U256::from(42).to_be_bytes::<32>().to_vec());
        assert_eq!(decode_output(number, &raw).unwrap(), json!("42"));
        assert_eq!(decode_output(number, &Bytes::new()).unwrap(), Value::Null);
    }
}
