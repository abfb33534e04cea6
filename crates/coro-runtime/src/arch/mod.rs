//! Architecture-specific context switching
//!
//! One module per supported architecture, each exporting a
//! `NativeSwitch` implementing `coro_core::traits::ContextSwitch`.
//! All modules share the control-block offsets declared in
//! `coro_core::control` and keep `saved_sp_offset` in sync with the
//! saved stack pointer on every save.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use x86_64::NativeSwitch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use aarch64::NativeSwitch;
    } else {
        compile_error!("Unsupported architecture");
    }
}
