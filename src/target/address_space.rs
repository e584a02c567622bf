//!
//! The AMDGPU address spaces.
//!

///
/// The AMDGPU address spaces.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    /// The flat memory, covering all the others.
    Generic,
    /// The device global memory.
    Global,
    /// The GDS memory.
    Region,
    /// The workgroup shared memory.
    Local,
    /// The read-only global memory.
    Constant,
    /// The per-lane scratch memory, where every stack allocation must reside.
    Private,
}

impl From<AddressSpace> for u16 {
    fn from(value: AddressSpace) -> Self {
        match value {
            AddressSpace::Generic => 0,
            AddressSpace::Global => 1,
            AddressSpace::Region => 2,
            AddressSpace::Local => 3,
            AddressSpace::Constant => 4,
            AddressSpace::Private => 5,
        }
    }
}

impl std::fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "addrspace({})", u16::from(*self))
    }
}
