//! L2/L3 — name & linkage policy, global/function registrar (§4.2/§4.3).
//!
//! Grounded on the teacher's `declare.rs` (`declare_fn`/`declare_global`/
//! `get_fn`/`get_static`), trimmed to SIR's linkage rules: default external
//! in JIT mode, private in AOT/standalone, forced external on `export`.

use inkwell::module::Linkage;
use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use inkwell::values::FunctionValue;
use inkwell::AddressSpace;
use sir_ir::{Func, FuncAttrs, Type, TypeId, Var};

use crate::context::CodegenCx;
use crate::mangle::Mangler;
use crate::value_id::{FunctionId, GlobalId};

impl<'ll> CodegenCx<'ll, '_> {
    fn mangled_name(&self, mangler: &Mangler, module_path: &str, var: &Var) -> String {
        let name = self.interner.resolve(var.name);
        mangler.mangle_function(module_path, name)
    }

    /// §4.2: `export` always forces external linkage; otherwise the
    /// mode-driven default (external in JIT, private in AOT/standalone).
    pub(crate) fn linkage_for(&self, attrs: &FuncAttrs) -> Linkage {
        if attrs.export {
            Linkage::External
        } else {
            self.flags.default_linkage()
        }
    }

    pub(crate) fn function_llvm_type(&self, ty: TypeId) -> inkwell::types::FunctionType<'ll> {
        let Type::Func { args, ret, variadic } = self.types.get(ty) else {
            panic!("registerGlobal: function Var does not carry a Func type");
        };
        let param_types: Vec<BasicMetadataTypeEnum<'ll>> =
            args.iter().map(|&t| self.get_type_value(self.lower_type(t)).into()).collect();
        if self.is_void_type(*ret) {
            self.scx.type_void().fn_type(&param_types, *variadic)
        } else {
            self.get_type_value(self.lower_type(*ret)).fn_type(&param_types, *variadic)
        }
    }

    /// §4.2: `inline`/`noinline` attrs, applied once at declaration time —
    /// every call site inherits them from the callee's own attribute list,
    /// so there's nothing for L5's `Call` lowering to add.
    pub(crate) fn apply_func_attrs(&self, fn_val: FunctionValue<'ll>, attrs: &FuncAttrs) {
        if attrs.inline {
            add_enum_attr(self.scx.llcx, fn_val, "alwaysinline");
        }
        if attrs.noinline {
            add_enum_attr(self.scx.llcx, fn_val, "noinline");
        }
    }

    /// §4.3 `registerGlobal`: a function `Var` materializes a declaration
    /// only (no body — the module driver fills bodies in during its own
    /// second pass); a data `Var` allocates a zero-initialized global.
    pub fn register_global_var(&self, mangler: &Mangler, module_path: &str, var: &Var) {
        if var.is_func() {
            let func = var.func.as_ref().expect("is_func() implies func.is_some()");
            let name = self.mangled_name(mangler, module_path, var);
            let fn_type = self.function_llvm_type(var.ty);
            let linkage = self.linkage_for(&func.attrs);
            let fn_val = self.scx.llmod.add_function(&name, fn_type, Some(linkage));
            self.apply_func_attrs(fn_val, &func.attrs);
            let id = self.push_function(fn_val);
            self.register_function(var.id, id);
        } else {
            let name = self.mangled_name(mangler, module_path, var);
            let llty = self.get_type_value(self.lower_type(var.ty));
            let global = self.scx.llmod.add_global(llty, Some(AddressSpace::default()), &name);
            global.set_linkage(self.flags.default_linkage());
            global.set_initializer(&llty.const_zero());
            let id = self.push_global(global);
            self.register_global(var.id, id);
        }
    }

    /// §4.3 `getFunc`: returns the cached handle, or — for a JIT
    /// cross-module reference not present in the *current* module (the
    /// registry was cleared by [`CodegenCx::release_module_bindings`] when
    /// the previous module was taken out) — emits an external declaration
    /// and rebinds.
    pub fn get_func(&self, mangler: &Mangler, module_path: &str, var: &Var) -> FunctionId {
        if let Some(id) = self.lookup_function(var.id) {
            return id;
        }
        let name = self.mangled_name(mangler, module_path, var);
        let fn_type = self.function_llvm_type(var.ty);
        let fn_val = self.scx.llmod.add_function(&name, fn_type, Some(Linkage::External));
        let id = self.push_function(fn_val);
        self.register_function(var.id, id);
        id
    }

    /// §4.3 `getVar` for data globals — same auto-redeclare rule, with
    /// `externally_initialized` set since the defining module (not this
    /// one) owns the initializer.
    pub fn get_global(&self, mangler: &Mangler, module_path: &str, var: &Var) -> GlobalId {
        if let Some(id) = self.lookup_global(var.id) {
            return id;
        }
        let name = self.mangled_name(mangler, module_path, var);
        let llty = self.get_type_value(self.lower_type(var.ty));
        let global = self.scx.llmod.add_global(llty, None, &name);
        global.set_linkage(Linkage::External);
        global.set_externally_initialized(true);
        let id = self.push_global(global);
        self.register_global(var.id, id);
        id
    }

    /// Declares a runtime helper (§6): always external, attributed
    /// no-unwind / no-alias-return / no-return per §4.2, never mangled.
    pub fn declare_runtime_function(
        &self,
        name: &str,
        params: &[BasicMetadataTypeEnum<'ll>],
        ret: Option<inkwell::types::BasicTypeEnum<'ll>>,
        variadic: bool,
        no_return: bool,
    ) -> FunctionId {
        if let Some(existing) = self.scx.llmod.get_function(name) {
            return self.push_function(existing);
        }
        let fn_type = match ret {
            Some(r) => r.fn_type(params, variadic),
            None => self.scx.type_void().fn_type(params, variadic),
        };
        let fn_val = self.scx.llmod.add_function(name, fn_type, Some(Linkage::External));
        add_enum_attr(self.scx.llcx, fn_val, "nounwind");
        if no_return {
            add_enum_attr(self.scx.llcx, fn_val, "noreturn");
        } else {
            // Every runtime allocator returns a fresh, non-aliasing block —
            // never a pointer derived from one of its arguments.
            add_enum_attr(self.scx.llcx, fn_val, "noalias");
        }
        self.push_function(fn_val)
    }
}

pub(crate) fn add_enum_attr<'ll>(llcx: &'ll inkwell::context::Context, fn_val: FunctionValue<'ll>, name: &str) {
    let kind_id = inkwell::attributes::Attribute::get_named_enum_kind_id(name);
    let attr = llcx.create_enum_attribute(kind_id, 0);
    fn_val.add_attribute(inkwell::attributes::AttributeLoc::Function, attr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use sir_ir::{FuncKind, SourceLoc, StringInterner, TypeStore, VarId};

    fn test_cx<'ll, 'tcx>(context: &'ll Context, interner: &'tcx StringInterner, types: &'tcx TypeStore) -> CodegenCx<'ll, 'tcx> {
        use crate::context::{CodegenFlags, OutputMode};
        CodegenCx::new(context, interner, types, "test", CodegenFlags { mode: OutputMode::Aot, debug_info: false })
    }

    #[test]
    fn function_var_registers_with_private_linkage_in_aot() {
        let context = Context::create();
        let mut interner = StringInterner::new();
        let mut types = TypeStore::new();
        let name = interner.intern("f");
        let void = types.void();
        let fn_ty = types.push(Type::Func { args: vec![], ret: void, variadic: false });
        let var = Var {
            id: VarId(0),
            name,
            loc: SourceLoc::UNKNOWN,
            ty: fn_ty,
            global: true,
            func: Some(Func { attrs: FuncAttrs::default(), kind: FuncKind::External, ty: fn_ty }),
        };
        let cx = test_cx(&context, &interner, &types);
        let mangler = Mangler::new();
        cx.register_global_var(&mangler, "", &var);
        let fid = cx.lookup_function(VarId(0)).expect("registered");
        assert_eq!(cx.get_function_value(fid).get_linkage(), Linkage::Private);
    }

    #[test]
    fn export_forces_external_linkage() {
        let context = Context::create();
        let mut interner = StringInterner::new();
        let mut types = TypeStore::new();
        let name = interner.intern("f");
        let void = types.void();
        let fn_ty = types.push(Type::Func { args: vec![], ret: void, variadic: false });
        let var = Var {
            id: VarId(0),
            name,
            loc: SourceLoc::UNKNOWN,
            ty: fn_ty,
            global: true,
            func: Some(Func {
                attrs: FuncAttrs { export: true, ..FuncAttrs::default() },
                kind: FuncKind::External,
                ty: fn_ty,
            }),
        };
        let cx = test_cx(&context, &interner, &types);
        let mangler = Mangler::new();
        cx.register_global_var(&mangler, "", &var);
        let fid = cx.lookup_function(VarId(0)).expect("registered");
        assert_eq!(cx.get_function_value(fid).get_linkage(), Linkage::External);
    }

    #[test]
    fn get_func_redeclares_after_module_release() {
        let context = Context::create();
        let mut interner = StringInterner::new();
        let mut types = TypeStore::new();
        let name = interner.intern("helper");
        let void = types.void();
        let fn_ty = types.push(Type::Func { args: vec![], ret: void, variadic: false });
        let var = Var {
            id: VarId(7),
            name,
            loc: SourceLoc::UNKNOWN,
            ty: fn_ty,
            global: true,
            func: Some(Func { attrs: FuncAttrs::default(), kind: FuncKind::External, ty: fn_ty }),
        };
        let cx = test_cx(&context, &interner, &types);
        let mangler = Mangler::new();
        let first = cx.get_func(&mangler, "", &var);
        assert_eq!(cx.get_function_value(first).get_linkage(), Linkage::External);
        cx.release_module_bindings();
        let second = cx.get_func(&mangler, "", &var);
        assert_eq!(cx.get_function_value(second).get_linkage(), Linkage::External);
    }
}
