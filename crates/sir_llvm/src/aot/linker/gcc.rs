//! cc/clang-wrapped linker invocation (Unix + `windows-gnu`).
//!
//! Uses `cc` as a wrapper, which handles CRT object linking, libc discovery,
//! and argument ordering so the driver never has to reproduce those itself.

use std::path::Path;
use std::process::Command;

use super::{LibraryKind, LinkOutput};
use crate::aot::target::TargetConfig;

pub struct GccLinker {
    cmd: Command,
    target: TargetConfig,
    hint_static: bool,
}

impl GccLinker {
    pub fn new(target: &TargetConfig) -> Self {
        let linker = if target.components().is_darwin() { "clang" } else { "cc" };
        Self { cmd: Command::new(linker), target: target.clone(), hint_static: false }
    }

    pub fn with_path(target: &TargetConfig, path: &str) -> Self {
        Self { cmd: Command::new(path), target: target.clone(), hint_static: false }
    }

    fn hint_static(&mut self) {
        if !self.hint_static {
            self.hint_static = true;
            if !self.target.components().is_darwin() {
                self.cmd.arg("-Wl,-Bstatic");
            }
        }
    }

    fn hint_dynamic(&mut self) {
        if self.hint_static {
            self.hint_static = false;
            if !self.target.components().is_darwin() {
                self.cmd.arg("-Wl,-Bdynamic");
            }
        }
    }

    pub fn set_output(&mut self, path: &Path) {
        self.cmd.arg("-o").arg(path);
    }

    pub fn set_output_kind(&mut self, kind: LinkOutput) {
        match kind {
            LinkOutput::SharedLibrary => {
                self.cmd.arg("-shared");
                if self.target.components().is_darwin() {
                    self.cmd.arg("-dynamiclib");
                } else {
                    self.cmd.arg("-fPIC");
                }
            }
            LinkOutput::Executable => {}
        }
    }

    pub fn add_object(&mut self, path: &Path) {
        self.cmd.arg(path);
    }

    pub fn add_library_path(&mut self, path: &Path) {
        self.cmd.arg("-L").arg(path);
    }

    pub fn link_library(&mut self, name: &str, kind: LibraryKind) {
        match kind {
            LibraryKind::Unspecified => {
                self.cmd.arg(format!("-l{name}"));
            }
            LibraryKind::Static => {
                if self.target.components().is_darwin() {
                    self.cmd.arg(format!("-l{name}"));
                } else {
                    self.hint_static();
                    self.cmd.arg(format!("-l{name}"));
                    self.hint_dynamic();
                }
            }
            LibraryKind::Dynamic => {
                self.hint_dynamic();
                self.cmd.arg(format!("-l{name}"));
            }
        }
    }

    pub fn gc_sections(&mut self, enable: bool) {
        if enable {
            if self.target.components().is_darwin() {
                self.cmd.arg("-Wl,-dead_strip");
            } else {
                self.cmd.arg("-Wl,--gc-sections");
            }
        }
    }

    pub fn strip_symbols(&mut self, strip: bool) {
        if strip {
            if self.target.components().is_darwin() {
                self.cmd.arg("-Wl,-S");
            } else {
                self.cmd.arg("-Wl,--strip-all");
            }
        }
    }

    pub fn finalize(self) -> Command {
        self.cmd
    }
}
