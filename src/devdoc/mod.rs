pub mod render;
pub mod transform;
pub mod widget;

use alloy::json_abi::JsonAbi;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// NatSpec developer documentation as returned by the verification service.
///
/// Maps keep the order of the source document so methods and params render
/// in the order the compiler emitted them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevDoc {
    pub kind: Option<String>,
    pub title: Option<String>,
    pub details: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: IndexMap<String, MethodDoc>,
    pub state_variables: Option<IndexMap<String, StateVariableDoc>>,
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodDoc {
    pub details: Option<String>,
    pub params: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateVariableDoc {
    pub details: Option<String>,
}

/// One verified contract, fetched once per page load and never modified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub devdoc: DevDoc,
    pub address: Option<String>,
    pub chain_id: Option<String>,
    pub verified_at: Option<String>,
    pub abi: Option<JsonAbi>,
    #[serde(rename = "match")]
    pub match_kind: Option<String>,
    pub creation_match: Option<String>,
    pub runtime_match: Option<String>,
    pub match_id: Option<String>,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_sourcify_shape() {
        let record: ContractRecord = serde_json::from_str(
            r#"{
                "devdoc": {
                    "kind": "dev",
                    "title": "Counter",
                    "methods": {
                        "setNumber(uint256)": { "params": { "newNumber": "the value" } },
                        "increment()": { "details": "adds one" }
                    },
                    "version": 1
                },
                "match": "exact_match",
                "chainId": "11155111",
                "address": "0xF7eb390231F0Db11C673390f3C25e613D7228659",
                "verifiedAt": "2024-05-01T12:00:00Z"
            }"#,
        )
        .unwrap();

        let names: Vec<&String> = record.devdoc.methods.keys().collect();
        assert_eq!(names, vec!["setNumber(uint256)", "increment()"]);
        assert_eq!(record.match_kind.as_deref(), Some("exact_match"));
        assert_eq!(record.chain_id.as_deref(), Some("11155111"));
        assert!(record.abi.is_none());
    }

    #[test]
    fn test_missing_methods_default_to_empty() {
        let record: ContractRecord = serde_json::from_str(r#"{ "devdoc": {} }"#).unwrap();
        assert!(record.devdoc.methods.is_empty());
        assert!(record.devdoc.title.is_none());
    }

    #[test]
    fn test_null_devdoc_is_empty() {
        let record: ContractRecord =
            serde_json::from_str(r#"{ "devdoc": null, "chainId": "1" }"#).unwrap();
        assert!(record.devdoc.methods.is_empty());
        assert!(record.devdoc.title.is_none());
        assert_eq!(record.chain_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_null_methods_are_empty() {
        let record: ContractRecord = serde_json::from_str(
            r#"{ "devdoc": { "title": "Counter", "methods": null, "stateVariables": null } }"#,
        )
        .unwrap();
        assert!(record.devdoc.methods.is_empty());
        assert!(record.devdoc.state_variables.is_none());
        assert_eq!(record.devdoc.title.as_deref(), Some("Counter"));
    }

    #[test]
    fn test_record_carries_abi() {
        let record: ContractRecord = serde_json::from_str(
            r#"{
                "devdoc": { "methods": {} },
                "abi": [
                    { "type": "function", "name": "increment", "inputs": [], "outputs": [], "stateMutability": "nonpayable" }
                ]
            }"#,
        )
        .unwrap();

        let abi = record.abi.unwrap();
        assert_eq!(abi.functions().count(), 1);
    }
}
