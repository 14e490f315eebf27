/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Compiling and validating a guest module before it is ever instantiated.

use wasmer::wasmparser::{Parser, Payload};
use wasmer::{Module, Store};

use crate::error::CoreError;

/// `true` if the raw Wasm module declares a start function. Start functions run implicitly at
/// instantiation time, outside of any metering scope this crate controls, so modules that
/// declare one are refused outright.
fn has_start_section(code: &[u8]) -> bool {
    Parser::new(0)
        .parse_all(code)
        .any(|payload| matches!(payload, Ok(Payload::StartSection { .. })))
}

/// Compiles `code` against `store`, refusing modules with a start function.
pub fn compile(store: &Store, code: &[u8]) -> Result<Module, CoreError> {
    if has_start_section(code) {
        return Err(CoreError::StartFuncUnsupported);
    }
    Module::new(store, code).map_err(|e| CoreError::CreateVm(e.to_string()))
}

/// Refuses modules that import anything this crate's host does not provide. `env` is the only
/// import module this crate resolves, and `zwasm_magic` / `_get_len` / `_get` / `_set` are the
/// only names within it.
pub fn check_imports(module: &Module) -> Result<(), CoreError> {
    for import in module.imports() {
        let field = import.name();
        let ok = import.module() == "env"
            && matches!(field, "zwasm_magic" | "_get_len" | "_get" | "_set");
        if !ok {
            return Err(CoreError::UnknownHostImport {
                module: import.module().to_string(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}
