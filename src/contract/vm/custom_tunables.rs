/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Caps the guest linear memory and table size a compiled module can request, so a single call
//! cannot exhaust host memory by declaring an unbounded `memory`/`table` import or export.

use std::ptr::NonNull;
use std::sync::Arc;

use wasmer::{
    vm::{self, MemoryError, MemoryStyle, TableStyle, VMMemoryDefinition, VMTableDefinition},
    MemoryType, Pages, TableType, Tunables,
};

/// Wraps a base [Tunables] implementation, rejecting memory or table requests past `memory_limit`
/// / `table_limit`.
pub struct CustomTunables<T: Tunables> {
    memory_limit: Pages,
    table_limit: u32,
    base: T,
}

impl<T: Tunables> CustomTunables<T> {
    pub fn new(base: T, memory_limit: Pages, table_limit: u32) -> Self {
        Self { memory_limit, table_limit, base }
    }

    /// Sets a maximum on the memory descriptor if the module didn't declare one itself.
    fn adjust_memory(&self, requested: &MemoryType) -> MemoryType {
        let mut adjusted = *requested;
        if requested.maximum.is_none() {
            adjusted.maximum = Some(self.memory_limit);
        }
        adjusted
    }

    fn validate_memory(&self, ty: &MemoryType) -> Result<(), MemoryError> {
        if ty.minimum > self.memory_limit {
            return Err(MemoryError::Generic("memory minimum exceeds the allowed limit".to_string()));
        }
        match ty.maximum {
            Some(max) if max > self.memory_limit => {
                Err(MemoryError::Generic("memory maximum exceeds the allowed limit".to_string()))
            }
            Some(_) => Ok(()),
            None => Err(MemoryError::Generic("memory maximum unset".to_string())),
        }
    }

    /// Sets a maximum on the table descriptor if the module didn't declare one itself.
    fn adjust_table(&self, requested: &TableType) -> TableType {
        let mut adjusted = *requested;
        if requested.maximum.is_none() {
            adjusted.maximum = Some(self.table_limit);
        }
        adjusted
    }

    fn validate_table(&self, ty: &TableType) -> Result<(), String> {
        if ty.minimum > self.table_limit {
            return Err("table minimum exceeds the allowed limit".to_string());
        }
        match ty.maximum {
            Some(max) if max > self.table_limit => Err("table maximum exceeds the allowed limit".to_string()),
            Some(_) => Ok(()),
            None => Err("table maximum unset".to_string()),
        }
    }
}

impl<T: Tunables> Tunables for CustomTunables<T> {
    fn memory_style(&self, memory: &MemoryType) -> MemoryStyle {
        let adjusted = self.adjust_memory(memory);
        self.base.memory_style(&adjusted)
    }

    fn table_style(&self, table: &TableType) -> TableStyle {
        let adjusted = self.adjust_table(table);
        self.base.table_style(&adjusted)
    }

    fn create_host_memory(&self, ty: &MemoryType, style: &MemoryStyle) -> Result<Arc<dyn vm::Memory>, MemoryError> {
        let adjusted = self.adjust_memory(ty);
        self.validate_memory(&adjusted)?;
        self.base.create_host_memory(&adjusted, style)
    }

    unsafe fn create_vm_memory(
        &self,
        ty: &MemoryType,
        style: &MemoryStyle,
        vm_definition_location: NonNull<VMMemoryDefinition>,
    ) -> Result<Arc<dyn vm::Memory>, MemoryError> {
        let adjusted = self.adjust_memory(ty);
        self.validate_memory(&adjusted)?;
        self.base.create_vm_memory(&adjusted, style, vm_definition_location)
    }

    fn create_host_table(&self, ty: &TableType, style: &TableStyle) -> Result<Arc<dyn vm::Table>, String> {
        let adjusted = self.adjust_table(ty);
        self.validate_table(&adjusted)?;
        self.base.create_host_table(&adjusted, style)
    }

    unsafe fn create_vm_table(
        &self,
        ty: &TableType,
        style: &TableStyle,
        vm_definition_location: NonNull<VMTableDefinition>,
    ) -> Result<Arc<dyn vm::Table>, String> {
        let adjusted = self.adjust_table(ty);
        self.validate_table(&adjusted)?;
        self.base.create_vm_table(&adjusted, style, vm_definition_location)
    }
}
