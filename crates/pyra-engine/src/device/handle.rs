use std::fmt;
use std::num::NonZeroU32;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            #[inline]
            pub const fn new(raw: NonZeroU32) -> Self {
                Self(raw)
            }

            /// Creates a handle from a raw device name; `0` means "unallocated".
            #[inline]
            pub const fn from_raw(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }

            #[inline]
            pub const fn raw(self) -> NonZeroU32 {
                self.0
            }

            #[inline]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($kind, "#{}"), self.0)
            }
        }
    };
}

device_handle!(
    /// Device buffer object (vertex or index storage).
    BufferHandle,
    "buffer"
);

device_handle!(
    /// Vertex-array object holding attribute binding state.
    VertexArrayHandle,
    "vertex-array"
);

device_handle!(
    /// A single compiled shader stage.
    ShaderHandle,
    "shader"
);

device_handle!(
    /// A linked shader program.
    ProgramHandle,
    "program"
);

/// Location of a uniform inside a linked program.
///
/// Lookups that do not find the name return `None` instead of a sentinel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_unallocated() {
        assert!(BufferHandle::from_raw(0).is_none());
        assert_eq!(ProgramHandle::from_raw(7).map(ProgramHandle::get), Some(7));
    }

    #[test]
    fn debug_names_the_object_kind() {
        let h = VertexArrayHandle::from_raw(3).unwrap();
        assert_eq!(format!("{h:?}"), "vertex-array#3");
    }
}
