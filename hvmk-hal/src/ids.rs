//! Opaque, type-tagged object identifiers shared by every capability table.
//!
//! Each ID type wraps a `u16` so that a `VmId` and a `VpId` are never
//! interchangeable even though both are backed by the same representation.
//! `INVALID_ID` is the reserved all-ones sentinel used for "unassigned".

/// Reserved sentinel shared by every ID type.
pub const INVALID_ID: u16 = 0xFFFF;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u16);

        impl $name {
            /// The reserved all-ones sentinel for this ID type.
            pub const INVALID: Self = Self(INVALID_ID);

            #[inline]
            pub const fn new(raw: u16) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn get(self) -> u16 {
                self.0
            }

            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != INVALID_ID
            }

            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl From<u16> for $name {
            #[inline]
            fn from(raw: u16) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Identifies a registered extension. At most one exists in the core.
    ExtId
);
id_type!(
    /// Identifies a virtual machine. ID 0 is the implicit root VM.
    VmId
);
id_type!(
    /// Identifies a virtual processor, bound to exactly one VM at creation.
    VpId
);
id_type!(
    /// Identifies a virtual-state object (VMCS/VMCB owner). A root VS has
    /// `id == pp_id`.
    VsId
);
id_type!(
    /// Identifies a physical processor (logical core).
    PpId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel_is_all_ones() {
        assert_eq!(VmId::INVALID.get(), 0xFFFF);
        assert!(!VmId::INVALID.is_valid());
    }

    #[test]
    fn distinct_types_do_not_mix() {
        let vm = VmId::new(0);
        let vp = VpId::new(0);
        assert_eq!(vm.get(), vp.get());
        // Compile-time: `vm == vp` is not expressible, which is the point.
    }

    #[test]
    fn default_is_invalid() {
        assert_eq!(VsId::default(), VsId::INVALID);
    }
}
