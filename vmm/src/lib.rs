//! # VMM: a hierarchical virtual memory manager.
//!
//! Virtual addresses are translated through a tree of page tables that lives
//! *inside* the physical memory it manages: every tree node occupies one
//! frame, the root is pinned to frame 0, and an entry value of 0 means "not
//! present". Walking the tree consumes the virtual address high-to-low, one
//! [`MemoryGeometry::offset_width`]-wide chunk per level; the final level
//! points at the data page, and the low bits select the word inside it.
//!
//! Physical memory is tiny on purpose. When a walk needs a frame, one is
//! provisioned in priority order: an existing table that has become all
//! zeroes, then the next never-used frame index, and only then an eviction.
//! The eviction policy swaps out the resident data page whose page index
//! maximizes the cyclic distance to the page being brought in.
//!
//! The manager drives an external [`PhysicalMemory`]; the bundled
//! [`SimMemory`] implements it as plain RAM plus an associative swap store,
//! which is all the persistence-through-eviction property needs.
//!
//! ```
//! use vmm::{MemoryGeometry, SimMemory, VirtualMemory};
//!
//! let geometry = MemoryGeometry::new(1, 4, 5).unwrap();
//! let mut vm = VirtualMemory::new(geometry, SimMemory::new(&geometry));
//! vm.write(13, 37).unwrap();
//! assert_eq!(vm.read(13).unwrap(), 37);
//! ```

mod geometry;
mod phys;
mod translate;

pub use geometry::{MemoryGeometry, Word};
pub use phys::{PhysicalMemory, SimMemory};
pub use translate::VirtualMemory;

/// Errors reported by the virtual memory manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A virtual address at or beyond the virtual memory size.
    AddressOutOfRange {
        /// The rejected address.
        address: u64,
        /// The virtual memory size it must stay below.
        size: u64,
    },
    /// A [`MemoryGeometry`] whose widths do not describe a usable machine.
    BadGeometry(&'static str),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::AddressOutOfRange { address, size } => write!(
                f,
                "virtual address {address:#x} is outside the virtual memory (size {size:#x})"
            ),
            Error::BadGeometry(why) => write!(f, "bad memory geometry: {why}"),
        }
    }
}

impl std::error::Error for Error {}

/// Shorthand for results of manager operations.
pub type Result<T> = core::result::Result<T, Error>;
