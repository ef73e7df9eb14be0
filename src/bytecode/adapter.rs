//! Runtime helper methods the generated code calls for comparisons and
//! dynamic fallbacks.
//!
//! The table is embedded as JSON and parsed once per process.

use crate::ast::types::MethodDescriptor;
use crate::ast::{BinaryOp, InvokeKind, MethodRef};
use crate::bytecode::descriptor::parse_method_descriptor;
use crate::error::{CompileError, Result};

use serde::Deserialize;
use std::{collections::HashMap, str, sync::OnceLock};

pub const SCRIPT_BYTECODE_ADAPTER: &str = "org.codehaus.groovy.runtime.ScriptBytecodeAdapter";

#[derive(Deserialize, Debug, Clone)]
pub struct AdapterInfo {
    /// Dotted declaring class.
    pub owner: String,
    pub descriptor: String,
    /// Source operator the helper implements, for the comparison family.
    #[serde(default)]
    pub operator: Option<String>,
}

// Key: helper method name
pub type AdapterMap = HashMap<String, AdapterInfo>;

static ADAPTERS: OnceLock<std::result::Result<AdapterMap, String>> = OnceLock::new();

pub fn adapter_table() -> std::result::Result<&'static AdapterMap, &'static str> {
    ADAPTERS
        .get_or_init(|| {
            const JSON_BYTES: &[u8] = include_bytes!("adapters.json");

            let json_str = str::from_utf8(JSON_BYTES)
                .map_err(|e| format!("Failed to decode embedded adapter table as UTF-8: {}", e))?;

            let table: AdapterMap = serde_json::from_str(json_str)
                .map_err(|e| format!("Failed to parse embedded adapter table: {}", e))?;
            breadcrumbs::log!(
                breadcrumbs::LogLevel::Info,
                "bytecode-gen",
                format!("Loaded {} runtime adapter methods", table.len())
            );
            Ok(table)
        })
        .as_ref()
        .map_err(|e| e.as_str())
}

/// Resolves a helper by name into a static method reference.
pub fn adapter_method(name: &str) -> Result<MethodRef> {
    let table =
        adapter_table().map_err(|e| CompileError::internal("adapter table", e.to_string()))?;
    let info = table.get(name).ok_or_else(|| {
        CompileError::internal("adapter table", format!("no runtime adapter named {}", name))
    })?;
    let descriptor: MethodDescriptor = parse_method_descriptor(&info.descriptor)?;
    Ok(MethodRef::new(&info.owner, name, descriptor, InvokeKind::Static))
}

/// The comparison helper standing in for `op`, if `op` has one.
pub fn comparison_adapter(op: BinaryOp) -> Result<Option<MethodRef>> {
    let table =
        adapter_table().map_err(|e| CompileError::internal("adapter table", e.to_string()))?;
    let symbol = op.symbol();
    let Some((name, _)) = table
        .iter()
        .find(|(_, info)| info.operator.as_deref() == Some(symbol))
    else {
        return Ok(None);
    };
    adapter_method(name).map(Some)
}

/// Whether `name` is one of the comparison-family helpers.
pub fn is_comparison_adapter(name: &str) -> bool {
    adapter_table()
        .ok()
        .and_then(|table| table.get(name))
        .is_some_and(|info| info.operator.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::TypeRef;

    #[test]
    fn table_loads_once_and_is_shared() {
        let first = adapter_table().unwrap() as *const AdapterMap;
        let second = adapter_table().unwrap() as *const AdapterMap;
        assert_eq!(first, second);
    }

    #[test]
    fn every_ordering_operator_has_a_helper() {
        let expected = [
            (BinaryOp::Equal, "compareEqual"),
            (BinaryOp::NotEqual, "compareNotEqual"),
            (BinaryOp::LessThan, "compareLessThan"),
            (BinaryOp::LessThanEqual, "compareLessThanEqual"),
            (BinaryOp::GreaterThan, "compareGreaterThan"),
            (BinaryOp::GreaterThanEqual, "compareGreaterThanEqual"),
            (BinaryOp::CompareTo, "compareTo"),
        ];
        for (op, name) in expected {
            let method = comparison_adapter(op).unwrap().unwrap();
            assert_eq!(method.name, name);
            assert_eq!(method.owner, SCRIPT_BYTECODE_ADAPTER);
            assert!(method.is_static());
            assert!(is_comparison_adapter(name));
        }
        assert!(comparison_adapter(BinaryOp::Plus).unwrap().is_none());
        assert!(!is_comparison_adapter("createList"));
    }

    #[test]
    fn descriptors_are_parsed_into_types() {
        let compare_to = adapter_method("compareTo").unwrap();
        assert_eq!(compare_to.descriptor.params, vec![TypeRef::object(), TypeRef::object()]);
        assert_eq!(compare_to.descriptor.ret, TypeRef::class("java.lang.Integer"));
        let unbox = adapter_method("booleanUnbox").unwrap();
        assert_eq!(
            unbox.owner,
            "org.codehaus.groovy.runtime.typehandling.DefaultTypeTransformation"
        );
        assert_eq!(unbox.descriptor.ret, TypeRef::boolean());
        assert!(adapter_method("noSuchHelper").is_err());
    }
}
