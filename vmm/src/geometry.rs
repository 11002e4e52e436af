//! Address-space geometry.

use crate::Error;

/// The word type stored in physical memory. Table entries hold frame indices
/// in the same type, which is why a geometry must keep the frame count below
/// `Word::MAX`.
pub type Word = i32;

/// The three widths that shape the machine, with everything else derived:
/// page size, RAM size, virtual memory size, frame and page counts, and the
/// depth of the page-table tree.
///
/// Carrying the widths as a value, rather than baking them in at compile
/// time, lets one process run several differently shaped machines side by
/// side, which the tests lean on heavily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryGeometry {
    offset_width: u32,
    physical_address_width: u32,
    virtual_address_width: u32,
}

impl MemoryGeometry {
    /// Builds a geometry from the offset, physical-address, and
    /// virtual-address widths, all in bits.
    ///
    /// # Errors
    ///
    /// [`Error::BadGeometry`] when the widths describe a machine the
    /// translation cannot run on: a zero-width offset, addresses wider than
    /// the arithmetic, frame indices that overflow [`Word`], or too few
    /// frames to hold a full walk path.
    pub fn new(
        offset_width: u32,
        physical_address_width: u32,
        virtual_address_width: u32,
    ) -> Result<Self, Error> {
        if offset_width == 0 {
            return Err(Error::BadGeometry("offset width must be positive"));
        }
        if physical_address_width >= 63 || virtual_address_width >= 63 {
            return Err(Error::BadGeometry("address widths must stay below 63 bits"));
        }
        if physical_address_width < offset_width {
            return Err(Error::BadGeometry("physical memory is smaller than one page"));
        }
        if virtual_address_width < offset_width {
            return Err(Error::BadGeometry("virtual memory is smaller than one page"));
        }
        if physical_address_width - offset_width > 31 {
            return Err(Error::BadGeometry("frame indices would overflow a table entry"));
        }
        let this = MemoryGeometry {
            offset_width,
            physical_address_width,
            virtual_address_width,
        };
        // A walk touches the root, one table per further level, and the data
        // page; with fewer frames than that the tree cannot exist.
        if this.num_frames() < u64::from(this.tables_depth()) + 1 {
            return Err(Error::BadGeometry("not enough frames to hold a full walk path"));
        }
        Ok(this)
    }

    /// Bits of the in-page offset; also the width of one table-index chunk.
    pub fn offset_width(&self) -> u32 {
        self.offset_width
    }

    /// Page (and frame, and table) size in words.
    pub fn page_size(&self) -> u64 {
        1 << self.offset_width
    }

    /// RAM size in words.
    pub fn ram_size(&self) -> u64 {
        1 << self.physical_address_width
    }

    /// Virtual memory size in words.
    pub fn virtual_memory_size(&self) -> u64 {
        1 << self.virtual_address_width
    }

    /// Number of frames in RAM.
    pub fn num_frames(&self) -> u64 {
        self.ram_size() >> self.offset_width
    }

    /// Number of pages in the virtual memory.
    pub fn num_pages(&self) -> u64 {
        self.virtual_memory_size() >> self.offset_width
    }

    /// Depth of the page-table tree: how many table levels a walk crosses
    /// before reaching the data page. Zero means the whole virtual memory is
    /// a single page living in frame 0.
    pub fn tables_depth(&self) -> u32 {
        (self.virtual_address_width - self.offset_width).div_ceil(self.offset_width)
    }

    /// Cyclic distance between two page indices: the shorter way around the
    /// page-index circle.
    pub fn cyclic_distance(&self, p: u64, q: u64) -> u64 {
        let diff = p.abs_diff(q);
        diff.min(self.num_pages() - diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_quantities() {
        let tiny = MemoryGeometry::new(1, 4, 5).unwrap();
        assert_eq!(tiny.page_size(), 2);
        assert_eq!(tiny.ram_size(), 16);
        assert_eq!(tiny.virtual_memory_size(), 32);
        assert_eq!(tiny.num_frames(), 8);
        assert_eq!(tiny.num_pages(), 16);
        assert_eq!(tiny.tables_depth(), 4);

        let normal = MemoryGeometry::new(4, 10, 20).unwrap();
        assert_eq!(normal.page_size(), 16);
        assert_eq!(normal.num_frames(), 64);
        assert_eq!(normal.num_pages(), 65536);
        assert_eq!(normal.tables_depth(), 4);

        let uneven = MemoryGeometry::new(2, 5, 7).unwrap();
        assert_eq!(uneven.tables_depth(), 3);

        let single_table = MemoryGeometry::new(5, 6, 10).unwrap();
        assert_eq!(single_table.num_frames(), 2);
        assert_eq!(single_table.tables_depth(), 1);

        let wide_ram = MemoryGeometry::new(3, 9, 6).unwrap();
        assert_eq!(wide_ram.num_frames(), 64);
        assert_eq!(wide_ram.num_pages(), 8);
        assert_eq!(wide_ram.tables_depth(), 1);

        let one_page = MemoryGeometry::new(5, 5, 5).unwrap();
        assert_eq!(one_page.num_frames(), 1);
        assert_eq!(one_page.num_pages(), 1);
        assert_eq!(one_page.tables_depth(), 0);
    }

    #[test]
    fn rejected_geometries() {
        assert!(MemoryGeometry::new(0, 4, 5).is_err());
        assert!(MemoryGeometry::new(4, 3, 5).is_err());
        assert!(MemoryGeometry::new(4, 10, 3).is_err());
        assert!(MemoryGeometry::new(1, 40, 5).is_err());
        assert!(MemoryGeometry::new(1, 64, 64).is_err());
        // Two frames cannot hold a three-level walk path.
        assert!(MemoryGeometry::new(1, 2, 4).is_err());
    }

    #[test]
    fn cyclic_distance_wraps() {
        let g = MemoryGeometry::new(1, 4, 5).unwrap();
        assert_eq!(g.num_pages(), 16);
        assert_eq!(g.cyclic_distance(1, 4), 3);
        assert_eq!(g.cyclic_distance(4, 1), 3);
        assert_eq!(g.cyclic_distance(0, 15), 1);
        assert_eq!(g.cyclic_distance(2, 10), 8);
        assert_eq!(g.cyclic_distance(7, 7), 0);
    }
}
