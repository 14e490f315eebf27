/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Instantiating a compiled module against an [Env] and running a metered call against it.

use wasmer::{Exports, Function, Global, ImportObject, Instance, Module, Store, Value};
use wasmer_middlewares::metering::{get_remaining_points, MeteringPoints};

use super::env::Env;
use super::host_functions;
use crate::error::CoreError;
use crate::store::ByteStore;

/// Instantiates `module` against `store`, wiring up the `env` module's host functions and
/// `zwasm_magic` global against `env`.
pub fn instantiate<S: ByteStore + Send + Sync + 'static>(
    store: &Store,
    module: &Module,
    env: Env<S>,
) -> Result<Instance, CoreError> {
    let mut exports = Exports::new();
    exports.insert("zwasm_magic", Global::new(store, Value::I64(76)));
    exports.insert("_get_len", Function::new_native_with_env(store, env.clone(), host_functions::get_len));
    exports.insert("_get", Function::new_native_with_env(store, env.clone(), host_functions::get));
    exports.insert("_set", Function::new_native_with_env(store, env, host_functions::set));

    let mut import_object = ImportObject::new();
    import_object.register("env", exports);

    Instance::new(module, &import_object).map_err(|e| CoreError::CreateVm(e.to_string()))
}

/// Calls `name` with `args`, metered against `gas_limit`. Gas used is reported whether the
/// call succeeds, traps, runs out of gas, or the export is missing.
pub fn call_exported(
    instance: &Instance,
    name: &str,
    args: &[Value],
    gas_limit: u64,
) -> (u64, Result<Box<[Value]>, CoreError>) {
    let function = match instance.exports.get_function(name) {
        Ok(f) => f,
        Err(_) => return (0, Err(CoreError::FunctionNotFound(name.to_string()))),
    };

    let call_result = function.call(args);
    let remaining = get_remaining_points(instance);
    let gas_used = match remaining {
        MeteringPoints::Remaining(points) => gas_limit.saturating_sub(points),
        MeteringPoints::Exhausted => gas_limit,
    };

    let result = match call_result {
        Ok(values) => Ok(values),
        Err(_) if matches!(remaining, MeteringPoints::Exhausted) => Err(CoreError::GasExhausted),
        Err(e) => Err(CoreError::CreateVm(e.to_string())),
    };
    (gas_used, result)
}
