//! The one non-instruction privileged operation the exec loop performs:
//! transferring control to extension code at a computed virtual address and
//! getting back the verdict (spec.md §4.6) the callback issued through
//! `control_op` before returning. Isolated behind a trait for the same
//! reason `ArchIntrinsics` is: the production impl is an `unsafe` far call,
//! the test double is a deterministic script.

/// What the extension's callback decided, reported via `control_op` before
/// the callback function returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Exit,
    Wait,
    Again,
}

/// Calls extension code at `ip` with up to two argument words and reports
/// the verdict it left behind. `ip` is always inside the extension's code
/// window; the caller (`exec_loop`) is responsible for that validation
/// before invoking this trait.
pub trait CallbackHook {
    fn invoke(&self, ip: u64, arg0: u64, arg1: u64) -> Verdict;
}

#[cfg(any(test, feature = "sim"))]
pub mod sim {
    use super::*;
    use spin::Mutex;

    /// Deterministic stand-in for real extension code: tests push the
    /// verdict(s) they want returned, in call order. An empty script
    /// reports `Exit` so a forgotten expectation fails a test loudly
    /// rather than spinning.
    pub struct ScriptedCallbackHook {
        script: Mutex<heapless::Deque<Verdict, 16>>,
        calls: Mutex<heapless::Vec<u64, 16>>,
    }

    impl ScriptedCallbackHook {
        pub const fn new() -> Self {
            Self { script: Mutex::new(heapless::Deque::new()), calls: Mutex::new(heapless::Vec::new()) }
        }

        pub fn push(&self, verdict: Verdict) {
            let _ = self.script.lock().push_back(verdict);
        }

        pub fn calls(&self) -> heapless::Vec<u64, 16> {
            self.calls.lock().clone()
        }
    }

    impl Default for ScriptedCallbackHook {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CallbackHook for ScriptedCallbackHook {
        fn invoke(&self, ip: u64, _arg0: u64, _arg1: u64) -> Verdict {
            let _ = self.calls.lock().push(ip);
            self.script.lock().pop_front().unwrap_or(Verdict::Exit)
        }
    }
}
