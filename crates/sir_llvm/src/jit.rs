//! L11's JIT execution path (§4.11): run the canonical entry point
//! in-process under an MCJIT execution engine.
//!
//! Grounded on the teacher's `ModuleCompiler::run_test`/`add_runtime_mappings`
//! (`create_jit_execution_engine`, `get_function::<unsafe extern "C" fn...>`,
//! `.call()`), generalized from "call a zero-arg test function and read a
//! Rust-side panic flag" to "call the canonical `main(argc, argv)` and
//! surface an uncaught language exception as a [`JitError`]". Unlike the
//! teacher's own runtime (`ori_print`/`ori_panic`/... implemented directly
//! in Rust and bound with `add_global_mapping`), every `seq_*` symbol here
//! is resolved against a dynamically loaded runtime library — the lone
//! exception is `seq_terminate` itself, which this module overrides for
//! the lifetime of the execution engine so an uncaught exception becomes a
//! catchable unwind instead of the library's own abort path.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};

use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module as LlvmModule;
use inkwell::support::load_library_permanently;
use inkwell::OptimizationLevel;

use crate::error::{JitError, LowerError};

thread_local! {
    static PENDING_JIT_ERROR: RefCell<Option<JitError>> = const { RefCell::new(None) };
}

/// A Rust-side panic payload carrying the captured exception, thrown by
/// [`capture_uncaught_exception`] and caught back in [`run_jit`].
struct UncaughtException;

/// Replaces `seq_terminate`'s usual "print and abort" behavior: it stashes
/// a best-effort [`JitError`] in a thread-local and unwinds through the
/// JIT-compiled frames that called it, rather than terminating the host
/// process.
///
/// Bound to the `seq_terminate` symbol only inside [`run_jit`]; the
/// dynamically loaded runtime library's own implementation is used for
/// every other output mode.
extern "C" fn capture_uncaught_exception(_exc_obj: *mut u8) -> ! {
    PENDING_JIT_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(JitError {
            what: "uncaught exception".to_string(),
            exc_type: "Exception".to_string(),
            ..JitError::default()
        });
    });
    std::panic::panic_any(UncaughtException)
}

/// Loads every path in `library_paths` into the current process
/// permanently, so the JIT's symbol resolver can satisfy `seq_*` and any
/// user-requested shared library against them.
pub fn load_runtime_libraries(library_paths: &[String]) -> Result<(), LowerError> {
    for path in library_paths {
        // `load_library_permanently` returns `true` on failure.
        if load_library_permanently(path) {
            return Err(LowerError::Compilation {
                detail: format!("failed to load JIT runtime library `{path}`"),
            });
        }
    }
    Ok(())
}

/// Overrides `seq_terminate`'s mapping so an uncaught exception unwinds
/// back into [`run_jit`] instead of aborting the process. A module built
/// without a try/catch anywhere still declares `seq_terminate` (used by
/// `codon.proxy_main`), so this lookup never fails for a module produced
/// by [`crate::module::lower_module`].
fn install_terminate_hook(module: &LlvmModule<'_>, ee: &ExecutionEngine<'_>) {
    let terminate_fn = module
        .get_function("seq_terminate")
        .unwrap_or_else(|| panic!("seq_terminate not declared — module was not produced by lower_module"));
    ee.add_global_mapping(&terminate_fn, capture_uncaught_exception as usize);
}

/// Builds the NUL-terminated `argv` array the canonical `main` expects.
/// The returned `Vec<CString>` must outlive the pointer array it backs.
fn build_argv(args: &[String]) -> (Vec<CString>, Vec<*mut c_char>) {
    let owned: Vec<CString> =
        args.iter().map(|a| CString::new(a.as_str()).expect("argv entry contains no interior NUL")).collect();
    let mut ptrs: Vec<*mut c_char> = owned.iter().map(|c| c.as_ptr().cast_mut()).collect();
    ptrs.push(std::ptr::null_mut());
    (owned, ptrs)
}

/// Runs the canonical `main(i32 argc, i8** argv) -> i32` entry point under
/// an MCJIT execution engine (§4.11). `args` becomes `argv` verbatim
/// (`args[0]` is conventionally the program name); the process's own
/// environment is inherited unchanged, since the canonical entry point
/// takes no `envp` parameter.
///
/// Returns the program's exit code on normal completion, or the captured
/// [`JitError`] (already reported to stderr per `debug`) if the program's
/// `main` let an exception escape.
pub fn run_jit(module: &LlvmModule<'_>, args: &[String], debug: bool) -> Result<i32, LowerError> {
    let ee = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| LowerError::Compilation { detail: e.to_string() })?;
    install_terminate_hook(module, &ee);

    let (_owned_argv, mut argv_ptrs) = build_argv(args);
    let argc = c_int::try_from(args.len()).expect("argc fits c_int");
    let argv_ptr = argv_ptrs.as_mut_ptr();

    // SAFETY: `main` is looked up by the exact name and signature
    // `lower_module`'s canonical-entry-point synthesis always emits; the
    // JIT is trusted to have compiled it correctly.
    let main_fn = unsafe {
        ee.get_function::<unsafe extern "C" fn(c_int, *mut *mut c_char) -> c_int>("main")
            .map_err(|e| LowerError::Compilation { detail: format!("canonical entry point not found: {e}") })?
    };

    // SAFETY: `argv_ptr` stays valid for the call's duration since
    // `_owned_argv`/`argv_ptrs` are still alive on this stack frame.
    let result = catch_unwind(AssertUnwindSafe(|| unsafe { main_fn.call(argc, argv_ptr) }));

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(payload) => {
            if payload.downcast_ref::<UncaughtException>().is_none() {
                // Not ours — propagate whatever this actually was rather
                // than misreport it as a language exception.
                std::panic::resume_unwind(payload);
            }
            let err = PENDING_JIT_ERROR
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_default();
            err.report(debug);
            Err(LowerError::Jit(err))
        }
    }
}
