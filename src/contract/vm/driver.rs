/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! `create` and `call`: the two entry points onto the VM, parsing the deploy and call wire
//! formats and driving a single metered execution each.
//!
//! Deploy payload: `[u32 LE total_len][u32 LE code_len][code bytes][optional trailing
//! CallInfo]`. The trailing `CallInfo`, when present, is run once against the freshly deployed
//! code as an initializer. Call payload: a bare `CallInfo`.

use wasmer::Value;

use super::{env::Env, instance, memory, module, store};
use crate::codec::Deserializable;
use crate::contract::state::ContractState;
use crate::error::CoreError;
use crate::gas::deploy_gas_cost;
use crate::hash::{AccountId, Hash};
use crate::manager::StateManager;
use crate::store::ByteStore;
use crate::types::CallInfo;

const LENGTH_PREFIX_SIZE: usize = 8;

/// The outcome of one metered call: gas is always populated, independent of whether the call
/// itself succeeded.
pub struct ExecutionOutcome {
    pub gas_used: u64,
    pub result: Result<Vec<u8>, CoreError>,
}

pub struct CreateOutcome {
    pub code_hash: Hash,
    pub deploy_gas_used: u64,
    /// Set when the deploy payload carried a trailing init call.
    pub init: Option<ExecutionOutcome>,
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, CoreError> {
    let slice = bytes
        .get(offset..offset + 4)
        .ok_or(CoreError::CodeTooShort(bytes.len()))?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

/// Deploys `payload`'s code to `account` and, if the payload carries a trailing init call,
/// runs it once against the freshly deployed code.
///
/// Returns the resulting [ContractState] alongside the outcome without committing it: a failed
/// init run must leave no trace in the account store, so committing is left to the caller, who
/// can inspect `init`'s result before deciding whether to call
/// [commit_contract_state](crate::contract::state::commit_contract_state).
pub fn create<S: ByteStore + Send + Sync + 'static>(
    manager: &StateManager<S>,
    account: AccountId,
    payload: &[u8],
) -> Result<(ContractState<S>, CreateOutcome), CoreError> {
    if payload.len() < LENGTH_PREFIX_SIZE {
        return Err(CoreError::CodeTooShort(payload.len()));
    }
    let total_len = read_u32_le(payload, 0)? as usize;
    let code_len = read_u32_le(payload, 4)? as usize;
    if total_len > payload.len() {
        return Err(CoreError::CodeLengthMismatch {
            declared: total_len as u32,
            actual: payload.len() as u32,
        });
    }

    let code_start = LENGTH_PREFIX_SIZE;
    let code_end = code_start + code_len;
    if code_end > payload.len() {
        return Err(CoreError::CodeLengthMismatch {
            declared: code_len as u32,
            actual: (payload.len() - code_start) as u32,
        });
    }
    let code = &payload[code_start..code_end];
    let trailer = &payload[code_end..total_len.min(payload.len())];

    let mut contract = ContractState::load(manager, account)?;
    let code_hash = contract.set_code(code);
    let deploy_gas_used = deploy_gas_cost(code.len());
    log::debug!("deployed {} bytes of code, hash {:?}, {} gas", code.len(), code_hash, deploy_gas_used);

    // An empty trailer means the deploy carries no initializer; this is the common case and
    // is not treated as malformed input.
    let init_call = if trailer.is_empty() {
        None
    } else {
        Some(CallInfo::deserialize(trailer).map_err(|e| CoreError::UnmarshalInitCall(e.to_string()))?)
    };

    let init = match init_call {
        Some(call_info) => {
            let (contract_after, outcome) = run(contract, code, &call_info);
            contract = contract_after;
            Some(outcome)
        }
        None => None,
    };

    Ok((
        contract,
        CreateOutcome {
            code_hash,
            deploy_gas_used,
            init,
        },
    ))
}

/// Invokes the exported function named in `payload`'s `CallInfo` against `account`'s deployed
/// code.
///
/// Returns the resulting [ContractState] alongside the outcome without committing it: a trapped
/// or gas-exhausted run must leave no trace in the account store, so committing is left to the
/// caller, who can inspect `outcome.result` before deciding whether to call
/// [commit_contract_state](crate::contract::state::commit_contract_state).
pub fn call<S: ByteStore + Send + Sync + 'static>(
    manager: &StateManager<S>,
    account: AccountId,
    payload: &[u8],
) -> Result<(ContractState<S>, ExecutionOutcome), CoreError> {
    let call_info = CallInfo::deserialize(payload).map_err(|e| CoreError::UnmarshalCall(e.to_string()))?;

    let contract = ContractState::load(manager, account)?;
    let code = contract.get_code();
    if code.is_empty() {
        log::debug!("call against account with no deployed code");
        return Err(CoreError::NoContract);
    }

    let (contract_after, outcome) = run(contract, &code, &call_info);
    Ok((contract_after, outcome))
}

/// Marshals `call_info.args` into the guest's linear memory as `u32 LE arg count` followed by,
/// for each argument, `u32 LE length` then the argument bytes; calls the named export with
/// `(args_ptr, args_len)`; and interprets its `i64` return as `(result_ptr << 32) | result_len`,
/// `0` meaning no return value.
fn run<S: ByteStore + Send + Sync + 'static>(
    contract: ContractState<S>,
    code: &[u8],
    call_info: &CallInfo,
) -> (ContractState<S>, ExecutionOutcome) {
    let gas_limit = default_call_gas_limit();
    let wasm_store = store::instantiate_store(gas_limit);

    let module = match module::compile(&wasm_store, code) {
        Ok(m) => m,
        Err(e) => {
            log::error!("failed to compile contract module: {e}");
            return (contract, ExecutionOutcome { gas_used: 0, result: Err(e) });
        }
    };
    if let Err(e) = module::check_imports(&module) {
        return (contract, ExecutionOutcome { gas_used: 0, result: Err(e) });
    }

    let env = Env::new(contract);
    let instance = match instance::instantiate(&wasm_store, &module, env.clone()) {
        Ok(i) => i,
        Err(e) => return (env.into_contract(), ExecutionOutcome { gas_used: 0, result: Err(e) }),
    };

    let memory = match instance.exports.get_memory("memory") {
        Ok(m) => m,
        Err(_) => {
            return (
                env.into_contract(),
                ExecutionOutcome {
                    gas_used: 0,
                    result: Err(CoreError::CreateVm("module does not export linear memory".to_string())),
                },
            )
        }
    };

    let mut arg_bytes = Vec::new();
    arg_bytes.extend_from_slice(&(call_info.args.len() as u32).to_le_bytes());
    for arg in &call_info.args {
        arg_bytes.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        arg_bytes.extend_from_slice(arg);
    }

    let alloc_fn = match instance.exports.get_function("alloc") {
        Ok(f) => f,
        Err(_) => {
            return (
                env.into_contract(),
                ExecutionOutcome { gas_used: 0, result: Err(CoreError::FunctionNotFound("alloc".to_string())) },
            )
        }
    };
    let args_ptr = match alloc_fn.call(&[Value::I32(arg_bytes.len() as i32)]) {
        Ok(values) => values[0].unwrap_i32() as u32,
        Err(e) => {
            return (
                env.into_contract(),
                ExecutionOutcome { gas_used: 0, result: Err(CoreError::CreateVm(e.to_string())) },
            )
        }
    };
    if let Err(e) = memory::write_bytes(memory, args_ptr, &arg_bytes) {
        return (env.into_contract(), ExecutionOutcome { gas_used: 0, result: Err(e) });
    }

    let (gas_used, call_result) = instance::call_exported(
        &instance,
        &call_info.name,
        &[Value::I32(args_ptr as i32), Value::I32(arg_bytes.len() as i32)],
        gas_limit,
    );

    let result = call_result.and_then(|values| decode_return_value(memory, &values));
    drop(instance);
    (env.into_contract(), ExecutionOutcome { gas_used, result })
}

fn decode_return_value(memory: &wasmer::Memory, values: &[Value]) -> Result<Vec<u8>, CoreError> {
    let packed = values
        .first()
        .and_then(|v| v.i64())
        .ok_or_else(|| CoreError::CreateVm("entry point did not return an i64".to_string()))?;
    if packed == 0 {
        return Ok(Vec::new());
    }
    let ptr = (packed >> 32) as u32;
    let len = (packed & 0xFFFF_FFFF) as u32;
    memory::read_bytes(memory, ptr, len)
}

/// The gas ceiling applied to every call and init run. Deploy-time storage cost
/// ([deploy_gas_cost]) is charged separately and does not consume this budget.
fn default_call_gas_limit() -> u64 {
    10_000_000
}
