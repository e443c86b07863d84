//! Shared JIT harness for the end-to-end scenarios in this directory.
//!
//! Every scenario builds its own `sir_ir::Module`/`ExprArena` fixture by
//! hand (there is no parser in this crate) and hands it to
//! [`build_and_jit`], which runs the full `module::lower_module` driver and
//! then calls the fixture's SIR-level `main` directly by its mangled name —
//! bypassing the canonical `main(argc, argv)` entry point, which always
//! returns 0 regardless of what the SIR program itself returns and would
//! otherwise force every fixture to build a throwaway argv.
//!
//! `lower_module` always builds `codon.proxy_main`/canonical `main` as a
//! byproduct and wires `seq_personality`/`seq_init`/`strlen` into them
//! unconditionally, so MCJIT's eager whole-module compilation needs all
//! three resolvable even on a fixture that never actually unwinds or reads
//! argv. `seq_print` is the one symbol these fixtures' own bodies call for
//! real; it captures into [`take_output`] instead of the process's stdout.

use std::cell::RefCell;
use std::path::Path;

use inkwell::execution_engine::ExecutionEngine;
use inkwell::OptimizationLevel;

use sir_ir::{ExprArena, Module as SirModule};

use sir_llvm::aot::target::TargetConfig;
use sir_llvm::context::CodegenCx;
use sir_llvm::debug::DebugLevel;
use sir_llvm::mangle::Mangler;
use sir_llvm::module::lower_module;

thread_local! {
    static CAPTURED_OUTPUT: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Drains and returns everything `seq_print` has captured so far.
pub fn take_output() -> String {
    CAPTURED_OUTPUT.with(|c| c.take())
}

/// Layout of LLM's `{i64 len, i8* data}` string representation
/// (`CodegenCx::string_type`), as `seq_print` receives it.
#[repr(C)]
struct SirStr {
    len: i64,
    data: *const u8,
}

extern "C" fn shim_seq_init(_flags: i32) {}

extern "C" fn shim_seq_print(s: *const SirStr) {
    // SAFETY: `s` is whatever `lower_module`'s generated code passed to
    // `seq_print`, always a valid `{i64, ptr}` built by this directory's
    // own fixtures.
    let s = unsafe { &*s };
    let bytes = unsafe { std::slice::from_raw_parts(s.data, s.len as usize) };
    CAPTURED_OUTPUT.with(|c| c.borrow_mut().push_str(&String::from_utf8_lossy(bytes)));
}

/// Never actually reached by any fixture in this directory — none of them
/// let an exception escape to `codon.proxy_main`'s landing pad.
extern "C" fn shim_seq_terminate(_exc: *mut u8) {}

/// Never actually invoked — `seq_personality` only runs during a real
/// unwind, which these fixtures don't trigger. Declared solely so MCJIT's
/// relocation of `codon.proxy_main` has an address to bind.
extern "C" fn shim_seq_personality(_version: i32, _actions: i32, _exception_class: i64, _exception_object: *mut u8, _context: *mut u8) -> i32 {
    0
}

/// Never actually invoked — these fixtures call their SIR-level function
/// directly rather than through canonical `main`'s argv-marshalling loop.
extern "C" fn shim_strlen(s: *const u8) -> i64 {
    let mut len: i64 = 0;
    // SAFETY: dead code path; a real argv entry would be NUL-terminated.
    unsafe {
        let mut p = s;
        while *p != 0 {
            len += 1;
            p = p.add(1);
        }
    }
    len
}

/// Lowers `module`/`arena` under a native target, binds the runtime
/// symbols the generated scaffolding references, and hands back the
/// execution engine plus the fixture's mangled `main` name.
pub fn build_and_jit<'ll>(cx: &CodegenCx<'ll, '_>, module: &SirModule, arena: &ExprArena) -> (ExecutionEngine<'ll>, String) {
    let target = TargetConfig::native().expect("native target unavailable");
    lower_module(cx, module, arena, "", Path::new("<scenario>"), &target, DebugLevel::None).expect("lower_module failed");

    let ee = cx.scx.llmod.create_jit_execution_engine(OptimizationLevel::None).expect("failed to create execution engine");

    let mappings: [(&str, usize); 4] = [
        ("seq_init", shim_seq_init as usize),
        ("seq_print", shim_seq_print as usize),
        ("seq_terminate", shim_seq_terminate as usize),
        ("seq_personality", shim_seq_personality as usize),
    ];
    for (name, addr) in mappings {
        let func = cx.scx.llmod.get_function(name).unwrap_or_else(|| panic!("{name} not declared by lower_module"));
        ee.add_global_mapping(&func, addr);
    }
    let strlen_fn = cx.scx.llmod.get_function("strlen").expect("strlen not declared by lower_module");
    ee.add_global_mapping(&strlen_fn, shim_strlen as usize);

    let mangled_main = Mangler::new().mangle_function("", "main");
    (ee, mangled_main)
}
