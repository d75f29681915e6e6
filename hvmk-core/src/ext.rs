//! Extension runtime (spec.md §4.4): the single privileged caller of the
//! syscall surface. Tracks the code/data image range, the per-PP direct-map
//! window, the three callback entry points, and the one open handle.
//!
//! Handle cookie layout follows the original implementation's
//! `ext_id << 16 | generation` scheme rather than the bare `ExtId` the
//! distilled operation table implies: a generation counter that increments
//! on every `close_handle` so a stale cookie from a previous open can't be
//! replayed against a later open of the same extension.

use hvmk_hal::ExtId;

use crate::capability_table::{Table, TableError};
use crate::config::{EXT_CODE_ADDR, EXT_CODE_SIZE, MAX_EXTENSIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtError {
    Table(TableError),
    NotOpen,
    HandleMismatch,
    CallbackOutsideImage,
    AlreadyRegistered,
}

impl From<TableError> for ExtError {
    fn from(e: TableError) -> Self {
        ExtError::Table(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Bootstrap,
    Vmexit,
    Fail,
}

pub struct ExtObject {
    id: ExtId,
    code_base: u64,
    code_size: u64,
    bootstrap_ip: Option<u64>,
    vmexit_ip: Option<u64>,
    fail_ip: Option<u64>,
    /// `Some(generation)` while a handle is open; the live cookie is
    /// `(id << 16) | generation`.
    open_generation: Option<u16>,
    generation: u16,
    started: bool,
}

impl ExtObject {
    pub fn id(&self) -> ExtId {
        self.id
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn vmexit_ip(&self) -> Option<u64> {
        self.vmexit_ip
    }

    pub fn bootstrap_ip(&self) -> Option<u64> {
        self.bootstrap_ip
    }

    pub fn fail_ip(&self) -> Option<u64> {
        self.fail_ip
    }

    pub fn is_vmexit_extension(&self) -> bool {
        self.vmexit_ip.is_some()
    }

    fn cookie(&self, generation: u16) -> u64 {
        ((self.id.get() as u64) << 16) | generation as u64
    }
}

static EXT_TABLE: Table<ExtObject, MAX_EXTENSIONS> = Table::new();

pub fn create(code_base: u64, code_size: u64) -> Result<ExtId, ExtError> {
    let idx = EXT_TABLE.alloc(ExtObject {
        id: ExtId::INVALID,
        code_base,
        code_size,
        bootstrap_ip: None,
        vmexit_ip: None,
        fail_ip: None,
        open_generation: None,
        generation: 0,
        started: false,
    })?;
    let id = ExtId::new(idx as u16);
    unsafe {
        EXT_TABLE.get_mut(idx)?.id = id;
    }
    Ok(id)
}

pub fn destroy(id: ExtId) -> Result<(), ExtError> {
    let open = EXT_TABLE.get(id.as_usize())?.open_generation.is_some();
    Ok(EXT_TABLE.free(id.as_usize(), open)?)
}

pub fn get(id: ExtId) -> Result<&'static ExtObject, ExtError> {
    Ok(EXT_TABLE.get(id.as_usize())?)
}

/// # Safety
/// Exclusive access to this extension, per the same discipline as
/// `capability_table::Table::get_mut`.
unsafe fn get_mut(id: ExtId) -> Result<&'static mut ExtObject, ExtError> {
    Ok(unsafe { EXT_TABLE.get_mut(id.as_usize())? })
}

/// Idempotent: a second `open_handle` without an intervening `close_handle`
/// returns the same cookie rather than minting a fresh generation.
pub fn open_handle(id: ExtId) -> Result<u64, ExtError> {
    let ext = unsafe { get_mut(id) }?;
    let generation = match ext.open_generation {
        Some(g) => g,
        None => {
            ext.open_generation = Some(ext.generation);
            ext.generation
        }
    };
    Ok(ext.cookie(generation))
}

pub fn close_handle(id: ExtId, cookie: u64) -> Result<(), ExtError> {
    let ext = unsafe { get_mut(id) }?;
    let generation = ext.open_generation.ok_or(ExtError::NotOpen)?;
    if ext.cookie(generation) != cookie {
        return Err(ExtError::HandleMismatch);
    }
    ext.open_generation = None;
    ext.generation = ext.generation.wrapping_add(1);
    Ok(())
}

/// Validates a handle presented with a syscall against the extension it
/// claims to authorise, per spec.md §4.5 ("every syscall... first validates
/// that `ext_reg0` is the handle currently open by the calling extension").
pub fn authorize(id: ExtId, cookie: u64) -> Result<(), ExtError> {
    let ext = get(id)?;
    match ext.open_generation {
        Some(g) if ext.cookie(g) == cookie => Ok(()),
        _ => Err(ExtError::HandleMismatch),
    }
}

pub fn register_callback(id: ExtId, kind: CallbackKind, ip: u64) -> Result<(), ExtError> {
    let ext = unsafe { get_mut(id) }?;
    if ip < EXT_CODE_ADDR || ip >= EXT_CODE_ADDR.saturating_add(EXT_CODE_SIZE) {
        return Err(ExtError::CallbackOutsideImage);
    }
    let _ = ext.code_base;
    let _ = ext.code_size;
    let slot = match kind {
        CallbackKind::Bootstrap => &mut ext.bootstrap_ip,
        CallbackKind::Vmexit => &mut ext.vmexit_ip,
        CallbackKind::Fail => &mut ext.fail_ip,
    };
    if slot.is_some() {
        return Err(ExtError::AlreadyRegistered);
    }
    *slot = Some(ip);
    Ok(())
}

pub fn mark_started(id: ExtId) -> Result<(), ExtError> {
    unsafe { get_mut(id) }?.started = true;
    Ok(())
}

pub fn is_allocated(id: ExtId) -> bool {
    EXT_TABLE.is_allocated(id.as_usize())
}

/// Writes one tabular row describing `id` to the log ring buffer
/// (`debug_op.dump_ext`).
pub fn dump(id: ExtId) -> Result<(), ExtError> {
    let ext = get(id)?;
    crate::log::dump_row(
        "ext",
        &[
            ("id", ext.id.get() as u64),
            ("code_base", ext.code_base),
            ("code_size", ext.code_size),
            ("started", ext.started as u64),
            ("open", ext.open_generation.is_some() as u64),
            ("bootstrap_ip", ext.bootstrap_ip.unwrap_or(0)),
            ("vmexit_ip", ext.vmexit_ip.unwrap_or(0)),
            ("fail_ip", ext.fail_ip.unwrap_or(0)),
        ],
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `MAX_EXTENSIONS` is 2, shared by every test in this module; each test
    /// must release every extension it creates before returning.
    #[test]
    fn open_handle_is_idempotent() {
        let id = create(EXT_CODE_ADDR, 0x1000).unwrap();
        let a = open_handle(id).unwrap();
        let b = open_handle(id).unwrap();
        assert_eq!(a, b);
        close_handle(id, a).unwrap();
        destroy(id).unwrap();
    }

    #[test]
    fn close_then_open_yields_new_cookie() {
        let id = create(EXT_CODE_ADDR, 0x1000).unwrap();
        let a = open_handle(id).unwrap();
        close_handle(id, a).unwrap();
        let b = open_handle(id).unwrap();
        assert_ne!(a, b);
        close_handle(id, b).unwrap();
        destroy(id).unwrap();
    }

    #[test]
    fn authorize_rejects_stale_cookie() {
        let id = create(EXT_CODE_ADDR, 0x1000).unwrap();
        let a = open_handle(id).unwrap();
        close_handle(id, a).unwrap();
        assert_eq!(authorize(id, a), Err(ExtError::HandleMismatch));
        destroy(id).unwrap();
    }

    #[test]
    fn register_callback_rejects_ip_outside_image() {
        let id = create(EXT_CODE_ADDR, 0x1000).unwrap();
        assert_eq!(
            register_callback(id, CallbackKind::Bootstrap, 0x1000),
            Err(ExtError::CallbackOutsideImage)
        );
        assert_eq!(register_callback(id, CallbackKind::Bootstrap, EXT_CODE_ADDR), Ok(()));
        destroy(id).unwrap();
    }

    #[test]
    fn register_callback_rejects_duplicate() {
        let id = create(EXT_CODE_ADDR, 0x1000).unwrap();
        register_callback(id, CallbackKind::Vmexit, EXT_CODE_ADDR).unwrap();
        assert_eq!(
            register_callback(id, CallbackKind::Vmexit, EXT_CODE_ADDR + 8),
            Err(ExtError::AlreadyRegistered)
        );
        destroy(id).unwrap();
    }

    #[test]
    fn is_vmexit_extension_tracks_registration() {
        let a = create(EXT_CODE_ADDR, 0x1000).unwrap();
        let b = create(EXT_CODE_ADDR, 0x1000).unwrap();
        register_callback(a, CallbackKind::Vmexit, EXT_CODE_ADDR).unwrap();
        assert!(get(a).unwrap().is_vmexit_extension());
        assert!(!get(b).unwrap().is_vmexit_extension());
        destroy(a).unwrap();
        destroy(b).unwrap();
    }
}
