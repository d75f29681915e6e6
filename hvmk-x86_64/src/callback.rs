//! Production `CallbackHook`: transfers control to extension code by
//! calling it as an ordinary `extern "C"` function at a computed address.
//! The callback signals its verdict (spec.md §4.6 `exit`/`wait`/`again`)
//! through its own `control_op` syscall before returning; this wrapper
//! only decodes the low bits of the return value as a fallback verdict
//! for a callback that returns without ever calling `control_op`.

use hvmk_hal::callback::{CallbackHook, Verdict};

type EntryFn = unsafe extern "C" fn(u64, u64) -> u64;

pub struct NativeCallbackHook;

impl NativeCallbackHook {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for NativeCallbackHook {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackHook for NativeCallbackHook {
    fn invoke(&self, ip: u64, arg0: u64, arg1: u64) -> Verdict {
        // SAFETY: `ip` was validated by `ext::register_callback` to lie
        // inside the extension's code window before being stored; calling
        // it as a `u64, u64 -> u64` function is the documented extension
        // callback ABI (spec.md §6).
        let raw = unsafe {
            let entry: EntryFn = core::mem::transmute(ip);
            entry(arg0, arg1)
        };
        match raw & 0x3 {
            0 => Verdict::Exit,
            1 => Verdict::Wait,
            _ => Verdict::Again,
        }
    }
}
