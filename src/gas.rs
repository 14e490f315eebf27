/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Gas accounting: the cost function fed into [wasmer_middlewares::Metering] and the flat
//! deploy-time charge for persisting a contract's bytecode.

use wasmer::wasmparser::Operator;

/// Every Wasm instruction costs exactly one unit of gas, regardless of operand count or kind.
pub const GAS_PER_INSTRUCTION: u64 = 1;

/// Deploying a contract costs one unit of gas per kilobyte of bytecode, rounded up.
pub const GAS_PER_DEPLOY_KB: u64 = 1;

/// The cost function passed to [wasmer_middlewares::Metering::new]. Deliberately flat: this
/// crate meters instruction count, not instruction weight.
pub fn wasm_opcode_gas_schedule(_operator: &Operator) -> u64 {
    GAS_PER_INSTRUCTION
}

/// Gas charged for persisting `code_len` bytes of contract bytecode at deploy time.
pub fn deploy_gas_cost(code_len: usize) -> u64 {
    let kb = (code_len as u64).div_ceil(1024).max(1);
    kb * GAS_PER_DEPLOY_KB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_cost_rounds_up_to_whole_kilobytes() {
        assert_eq!(deploy_gas_cost(0), 1);
        assert_eq!(deploy_gas_cost(1), 1);
        assert_eq!(deploy_gas_cost(1024), 1);
        assert_eq!(deploy_gas_cost(1025), 2);
        assert_eq!(deploy_gas_cost(2048), 2);
    }
}
