//! Block-grid and in-block coordinate arithmetic shared by the store and the cache.
//!
//! Everything here is dimension-generic over a `const D: usize` rather than being duplicated
//! per dimensionality the way the reference implementation this crate is modeled on specializes
//! `array2`/`array3`/`array4` into separate classes — `D` is a type-level constant so the
//! compiler still monomorphizes one copy of this arithmetic per dimensionality used, but the
//! source is written once.

use bit_field::BitField;

/// Side length, in scalars, of a block along any axis. All compression and caching operate at
/// the granularity of one `BLOCK_AXIS^D` tile.
pub const BLOCK_AXIS: u32 = 4;

/// Per-axis deficit of valid lanes in a border block, packed 2 bits per axis (so up to 4 axes
/// fit in a single byte). A deficit of 0 means the axis is full; deficits of 1..=3 mean the
/// trailing `BLOCK_AXIS - deficit` lanes are the only valid ones.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct BlockShape(u8);

impl BlockShape {
    /// the shape of an interior block: every lane is valid.
    pub const FULL: Self = BlockShape(0);

    /// build a shape from one deficit per axis (`deficit[axis] < BLOCK_AXIS`).
    pub fn from_deficits<const D: usize>(deficits: [u32; D]) -> Self {
        assert!(D <= 4, "block shape only packs up to 4 axes into one byte");

        let mut packed: u8 = 0;
        for (axis, &deficit) in deficits.iter().enumerate() {
            debug_assert!(deficit < BLOCK_AXIS, "deficit must be in 0..BLOCK_AXIS");
            packed.set_bits((axis * 2) as u32..(axis * 2 + 2) as u32, deficit as u8);
        }

        BlockShape(packed)
    }

    /// true for an interior block (every lane of the tile is valid).
    pub fn is_full(self) -> bool {
        self.0 == 0
    }

    /// number of valid lanes along `axis` (`BLOCK_AXIS - deficit`).
    pub fn valid_extent(self, axis: usize) -> u32 {
        let deficit = self.0.get_bits((axis * 2) as u32..(axis * 2 + 2) as u32) as u32;
        BLOCK_AXIS - deficit
    }
}

/// `ceil(axis_length / BLOCK_AXIS)`, the number of blocks spanning one axis.
pub fn blocks_per_axis(axis_length: u32) -> u32 {
    crate::math::block_count(axis_length)
}

/// grid extents (one entry per axis) for an array of the given dimensions.
pub fn block_grid<const D: usize>(dims: [u32; D]) -> [u32; D] {
    let mut grid = [0_u32; D];
    for axis in 0..D {
        grid[axis] = blocks_per_axis(dims[axis]);
    }

    grid
}

/// number of scalars in one block: `BLOCK_AXIS^D`.
pub fn block_volume<const D: usize>() -> usize {
    (BLOCK_AXIS as usize).pow(D as u32)
}

/// total number of blocks covering an array of the given dimensions.
pub fn blocks_total<const D: usize>(dims: [u32; D]) -> u64 {
    block_grid(dims).iter().map(|&n| n as u64).product()
}

/// integer-divide each coordinate by `BLOCK_AXIS` to get the block it belongs to.
pub fn coord_to_block<const D: usize>(coords: [u32; D]) -> [u32; D] {
    let mut block = [0_u32; D];
    for axis in 0..D {
        block[axis] = coords[axis] / BLOCK_AXIS;
    }

    block
}

/// combine per-axis block coordinates into a single row-major block index, axis 0 fastest.
pub fn block_grid_index<const D: usize>(block_coords: [u32; D], grid: [u32; D]) -> u64 {
    let mut index: u64 = 0;
    let mut stride: u64 = 1;

    for axis in 0..D {
        index += block_coords[axis] as u64 * stride;
        stride *= grid[axis] as u64;
    }

    index
}

/// inverse of [`block_grid_index`]: recover per-axis block coordinates from a flat block index.
pub fn block_grid_coords<const D: usize>(mut block_index: u64, grid: [u32; D]) -> [u32; D] {
    let mut coords = [0_u32; D];
    for axis in 0..D {
        let extent = grid[axis] as u64;
        coords[axis] = (block_index % extent) as u32;
        block_index /= extent;
    }

    coords
}

/// the block index containing `coords`, given the array's block-grid extents.
pub fn block_index<const D: usize>(coords: [u32; D], grid: [u32; D]) -> u64 {
    block_grid_index(coord_to_block(coords), grid)
}

/// row-major-within-block lane offset for `coords`, masking each coordinate to its low 2 bits
/// (`coord & (BLOCK_AXIS - 1)`), axis 0 fastest — matches [`block_grid_index`]'s axis order.
pub fn lane_index<const D: usize>(coords: [u32; D]) -> usize {
    let mut index: usize = 0;
    let mut stride: usize = 1;

    for axis in 0..D {
        index += (coords[axis] & (BLOCK_AXIS - 1)) as usize * stride;
        stride *= BLOCK_AXIS as usize;
    }

    index
}

/// the shape of the block at `block_coords`, given the array's dimensions and block grid.
pub fn shape_for_block<const D: usize>(
    block_coords: [u32; D], dims: [u32; D], grid: [u32; D],
) -> BlockShape {
    let mut deficits = [0_u32; D];
    let mut any_border = false;

    for axis in 0..D {
        if block_coords[axis] + 1 == grid[axis] {
            let full_extent = grid[axis] * BLOCK_AXIS;
            let deficit = full_extent - dims[axis];
            if deficit > 0 {
                deficits[axis] = deficit;
                any_border = true;
            }
        }
    }

    if any_border { BlockShape::from_deficits(deficits) } else { BlockShape::FULL }
}

/// walk every valid lane of a (possibly partial) block in row-major order, axis 0 fastest,
/// calling `visit` with the in-block lane coordinates (each `< BLOCK_AXIS`).
pub fn for_each_valid_lane<const D: usize>(shape: BlockShape, mut visit: impl FnMut([u32; D])) {
    let extents: [u32; D] = std::array::from_fn(|axis| shape.valid_extent(axis));
    let mut counters = [0_u32; D];

    loop {
        visit(counters);

        let mut axis = 0;
        loop {
            if axis == D {
                return;
            }

            counters[axis] += 1;
            if counters[axis] < extents[axis] {
                break;
            }

            counters[axis] = 0;
            axis += 1;
        }
    }
}
