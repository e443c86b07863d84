//! Opaque ID newtypes and `ValueArena` for the lowering backend.
//!
//! These IDs decouple the lowering visitor from inkwell's `'ctx` lifetime.
//! All LLM values, types, blocks, and functions are stored in a
//! `ValueArena` and referenced by `Copy` ID handles — this is how §3's
//! invariant "a mapping (SIR id → LLM handle) is maintained and never
//! re-keyed" is made to hold structurally: nothing downstream of
//! registration ever sees a raw `'ctx`-tagged inkwell value, only an index.
//!
//! Each ID is a `u32` index into the corresponding arena `Vec`. A `NONE`
//! sentinel (`u32::MAX`) marks the "defined in a previously released
//! sibling module" case from §3.

use inkwell::basic_block::BasicBlock;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, FunctionValue, GlobalValue};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            pub const NONE: Self = Self(u32::MAX);

            #[inline]
            pub fn is_none(self) -> bool {
                self.0 == u32::MAX
            }

            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

id_newtype!(ValueId);
id_newtype!(LLVMTypeId);
id_newtype!(BlockId);
id_newtype!(FunctionId);
id_newtype!(GlobalId);

/// Stores LLM entities behind opaque IDs, hiding the `'ctx` lifetime.
///
/// Internal to `CodegenCx`/`IrBuilder` — callers interact only with ID
/// types. Each `push_*` allocates a slot and returns an ID; each `get_*`
/// retrieves the stored value by ID.
pub(crate) struct ValueArena<'ctx> {
    values: Vec<BasicValueEnum<'ctx>>,
    types: Vec<BasicTypeEnum<'ctx>>,
    blocks: Vec<BasicBlock<'ctx>>,
    functions: Vec<FunctionValue<'ctx>>,
    globals: Vec<GlobalValue<'ctx>>,
}

impl<'ctx> ValueArena<'ctx> {
    pub(crate) fn new() -> Self {
        Self {
            values: Vec::new(),
            types: Vec::new(),
            blocks: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn push_value(&mut self, val: BasicValueEnum<'ctx>) -> ValueId {
        let id = self.values.len();
        self.values.push(val);
        ValueId(id as u32)
    }

    #[inline]
    pub(crate) fn get_value(&self, id: ValueId) -> BasicValueEnum<'ctx> {
        debug_assert!(
            (id.0 as usize) < self.values.len(),
            "ValueId {} out of bounds (arena has {} values)",
            id.0,
            self.values.len()
        );
        self.values[id.0 as usize]
    }

    #[inline]
    pub(crate) fn push_type(&mut self, ty: BasicTypeEnum<'ctx>) -> LLVMTypeId {
        let id = self.types.len();
        self.types.push(ty);
        LLVMTypeId(id as u32)
    }

    #[inline]
    pub(crate) fn get_type(&self, id: LLVMTypeId) -> BasicTypeEnum<'ctx> {
        debug_assert!(
            (id.0 as usize) < self.types.len(),
            "LLVMTypeId {} out of bounds (arena has {} types)",
            id.0,
            self.types.len()
        );
        self.types[id.0 as usize]
    }

    #[inline]
    pub(crate) fn push_block(&mut self, bb: BasicBlock<'ctx>) -> BlockId {
        let id = self.blocks.len();
        self.blocks.push(bb);
        BlockId(id as u32)
    }

    #[inline]
    pub(crate) fn get_block(&self, id: BlockId) -> BasicBlock<'ctx> {
        debug_assert!(
            (id.0 as usize) < self.blocks.len(),
            "BlockId {} out of bounds (arena has {} blocks)",
            id.0,
            self.blocks.len()
        );
        self.blocks[id.0 as usize]
    }

    #[inline]
    pub(crate) fn push_function(&mut self, func: FunctionValue<'ctx>) -> FunctionId {
        let id = self.functions.len();
        self.functions.push(func);
        FunctionId(id as u32)
    }

    #[inline]
    pub(crate) fn get_function(&self, id: FunctionId) -> FunctionValue<'ctx> {
        debug_assert!(
            (id.0 as usize) < self.functions.len(),
            "FunctionId {} out of bounds (arena has {} functions)",
            id.0,
            self.functions.len()
        );
        self.functions[id.0 as usize]
    }

    #[inline]
    pub(crate) fn push_global(&mut self, global: GlobalValue<'ctx>) -> GlobalId {
        let id = self.globals.len();
        self.globals.push(global);
        GlobalId(id as u32)
    }

    #[inline]
    pub(crate) fn get_global(&self, id: GlobalId) -> GlobalValue<'ctx> {
        debug_assert!(
            (id.0 as usize) < self.globals.len(),
            "GlobalId {} out of bounds (arena has {} globals)",
            id.0,
            self.globals.len()
        );
        self.globals[id.0 as usize]
    }
}
