/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines [CoreError], the error type returned by the state subsystem and the VM driver.
//!
//! `CoreError` is deliberately flat: callers differentiate failure modes by matching on the
//! variant rather than downcasting, the way processes hosting this runtime are expected to
//! translate failures into their own receipt / exit-code representation.

use thiserror::Error;

/// Descriptive error definitions arising from state operations and contract execution.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `EmptyAccountID` was passed to a state operation, or an empty key was passed to the
    /// byte store.
    #[error("invalid arguments")]
    InvalidArgs,

    /// `SetRoot`/`Revert` was handed a root the trie could not recognise.
    #[error("invalid root")]
    InvalidRoot,

    /// A trie or store I/O failure occurred behind `GetState`.
    #[error("failed to get state: {0}")]
    GetStateFailed(String),

    /// A trie or store I/O failure occurred behind `PutState`.
    #[error("failed to put state: {0}")]
    PutStateFailed(String),

    /// Byte-store read failed.
    #[error("failed to load data: {0}")]
    LoadData(String),

    /// Byte-store write failed.
    #[error("failed to save data: {0}")]
    SaveData(String),

    /// Deploy payload shorter than its length prefixes declare.
    #[error("code too short: {0} bytes")]
    CodeTooShort(usize),

    /// Deploy payload's declared code length exceeds the actual payload length.
    #[error("code length mismatch: declared {declared}, actual {actual}")]
    CodeLengthMismatch { declared: u32, actual: u32 },

    /// Failed to decode the trailing init `CallInfo` in a deploy payload.
    #[error("failed to unmarshal init call: {0}")]
    UnmarshalInitCall(String),

    /// Failed to decode a call payload's `CallInfo`.
    #[error("failed to unmarshal call: {0}")]
    UnmarshalCall(String),

    /// `Call` was issued against an account with no deployed code.
    #[error("no contract found")]
    NoContract,

    /// Post-`SetCode` sanity check failed.
    #[error("cannot deploy contract")]
    DeployContract,

    /// The Wasm engine refused to instantiate the module.
    #[error("failed to create virtual machine: {0}")]
    CreateVm(String),

    /// The module declares a `start` function, which is a determinism hazard.
    #[error("start function is not supported")]
    StartFuncUnsupported,

    /// The export named in `CallInfo::name` is absent from the module.
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// The metered run exhausted its gas limit.
    #[error("gas exhausted")]
    GasExhausted,

    /// A host function received an unknown `env` module/field pair. Fatal to the VM
    /// invocation: the module is malformed.
    #[error("unknown host import: {module}.{field}")]
    UnknownHostImport { module: String, field: String },
}
