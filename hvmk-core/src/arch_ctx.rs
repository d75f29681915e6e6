//! The external collaborators the core calls into but never owns: the
//! privileged-instruction implementation, the page pool, and the detected
//! vendor extension. Set once by the boot entry point (`hvmk::boot_pp`)
//! before any capability table is touched; every other module reaches them
//! through this seam instead of threading references through every call.

use hvmk_hal::{ArchIntrinsics, CallbackHook, HeapPool, HugePool, PagePool};
use hvmk_x86_64::VendorExtension;
use spin::Once;

static INTRINSICS: Once<&'static dyn ArchIntrinsics> = Once::new();
static PAGE_POOL: Once<&'static dyn PagePool> = Once::new();
static HUGE_POOL: Once<&'static dyn HugePool> = Once::new();
static HEAP_POOL: Once<&'static dyn HeapPool> = Once::new();
static CALLBACK_HOOK: Once<&'static dyn CallbackHook> = Once::new();
static VENDOR: Once<VendorExtension> = Once::new();

#[allow(clippy::too_many_arguments)]
pub fn init(
    intrinsics: &'static dyn ArchIntrinsics,
    page_pool: &'static dyn PagePool,
    huge_pool: &'static dyn HugePool,
    heap_pool: &'static dyn HeapPool,
    callback_hook: &'static dyn CallbackHook,
    vendor: VendorExtension,
) {
    INTRINSICS.call_once(|| intrinsics);
    PAGE_POOL.call_once(|| page_pool);
    HUGE_POOL.call_once(|| huge_pool);
    HEAP_POOL.call_once(|| heap_pool);
    CALLBACK_HOOK.call_once(|| callback_hook);
    VENDOR.call_once(|| vendor);
}

pub fn intrinsics() -> &'static dyn ArchIntrinsics {
    *INTRINSICS.get().expect("arch_ctx::init not called before core use")
}

pub fn page_pool() -> &'static dyn PagePool {
    *PAGE_POOL.get().expect("arch_ctx::init not called before core use")
}

pub fn huge_pool() -> &'static dyn HugePool {
    *HUGE_POOL.get().expect("arch_ctx::init not called before core use")
}

pub fn heap_pool() -> &'static dyn HeapPool {
    *HEAP_POOL.get().expect("arch_ctx::init not called before core use")
}

pub fn callback_hook() -> &'static dyn CallbackHook {
    *CALLBACK_HOOK.get().expect("arch_ctx::init not called before core use")
}

pub fn vendor() -> VendorExtension {
    *VENDOR.get().expect("arch_ctx::init not called before core use")
}

#[cfg(any(test, feature = "sim"))]
static SCRIPTED_HOOK: Once<hvmk_hal::callback::sim::ScriptedCallbackHook> = Once::new();

#[cfg(any(test, feature = "sim"))]
pub fn init_sim() {
    use hvmk_hal::callback::sim::ScriptedCallbackHook;
    use hvmk_hal::intrinsics::sim::SimIntrinsics;
    use hvmk_hal::memory::test_double::BumpPool;

    static SIM: Once<SimIntrinsics> = Once::new();
    static POOL: Once<BumpPool> = Once::new();
    let sim = SIM.call_once(SimIntrinsics::new);
    let pool = POOL.call_once(|| BumpPool::new(0x10_0000, 0x1000_0000));
    let hook = SCRIPTED_HOOK.call_once(ScriptedCallbackHook::new);
    init(sim, pool, pool, pool, hook, VendorExtension::Vmx);
}

/// The scripted callback hook `init_sim` installed, for tests that need to
/// program verdicts or inspect which IPs were invoked.
#[cfg(any(test, feature = "sim"))]
pub fn scripted_callback_hook() -> &'static hvmk_hal::callback::sim::ScriptedCallbackHook {
    SCRIPTED_HOOK.get().expect("arch_ctx::init_sim not called before core use")
}
