//! Proptest strategies for request parameters

use proptest::prelude::*;
use serde_json::Value;

/// Parameter names as they appear on catalog requests
pub fn param_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,11}"
}

pub fn param_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[ -~]{0,20}".prop_map(Value::from),
        any::<u32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Distinct `(name, value)` pairs, in generation order
pub fn param_pairs_strategy() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map(param_name_strategy(), param_value_strategy(), 0..8)
        .prop_map(|map| map.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}
