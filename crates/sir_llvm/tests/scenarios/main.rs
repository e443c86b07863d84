//! End-to-end entry-point scenarios, one file per scenario. Cargo builds
//! every file under this directory as submodules of a single `scenarios`
//! test binary, mirroring `ori_llvm/tests/aot/main.rs`'s layout.

mod support;

mod s1_hello;
mod s2_try_catch_rethrow;
mod s3_try_finally_break;
mod s4_generator_sum;
mod s5_nested_try_outer_catch;
mod s6_return_inside_try;
