//! Persistent storage of compressed blocks: a flat byte buffer sliced into equal-width slots,
//! one per block, plus the coordinate/shape bookkeeping needed to read or write one block at a
//! time.
//!
//! A store never holds a codec instance as a field. Because this crate's [`crate::codec::BlockCodec`]
//! is a pointer-free value type (see `DESIGN.md`), `bits_per_block` is a pure function of
//! `(block_volume, rate)` and the store can recompute it by constructing a throwaway codec value
//! whenever the rate changes, rather than owning a long-lived binding that would need to be torn
//! down and rebuilt on every reallocation the way the C++ reference's raw-pointer binding does.
//! The *codec instance actually used to compress/decompress a block* is supplied by the caller
//! (the cache) on every `encode`/`decode` call — every method here that touches a slot takes
//! `codec: &C` as an explicit argument rather than reaching for a field.

use crate::block::{self, BlockShape};
use crate::codec::BlockCodec;
use crate::error::{Error, Result};
use crate::math::round_up_to_word;
use crate::scalar::Scalar;
use std::marker::PhantomData;

/// Per-axis byte strides used by the strided gather/scatter paths. Unlike the C++ reference's
/// signed `ptrdiff_t` strides (which exist to support reverse traversal), this crate only ever
/// needs forward traversal of a dense row- or column-major buffer, so strides are plain `usize`
/// scalar (not byte) offsets — simpler, and it keeps every index computation in safe, panicking
/// arithmetic instead of pointer arithmetic.
pub type Strides<const D: usize> = [usize; D];

/// Owns the compressed bitstream and maps block indices to fixed-width slots.
#[derive(Debug, Clone)]
pub struct BlockStore<S: Scalar, C: BlockCodec<S>, const D: usize> {
    dims: [u32; D],
    grid: [u32; D],
    rate: f64,
    bits_per_block: u64,
    buffer: Vec<u8>,
    _scalar: PhantomData<S>,
    _codec: PhantomData<C>,
}

impl<S: Scalar, C: BlockCodec<S>, const D: usize> BlockStore<S, C, D> {
    /// allocate a store for an array of the given dimensions at the given rate. Contents decode
    /// to all-zeros (an all-zero slot is a valid, degenerate compressed block for this crate's
    /// codec: min = 0, scale = 0, every residual 0).
    pub fn new(dims: [u32; D], rate: f64) -> Self {
        let grid = block::block_grid(dims);
        let (bits_per_block, rate) = Self::layout(dims, rate);

        let mut store = BlockStore {
            dims, grid, rate, bits_per_block,
            buffer: Vec::new(),
            _scalar: PhantomData, _codec: PhantomData,
        };

        store.buffer = vec![0_u8; store.buffer_len_bytes()];
        store
    }

    /// construct a store from a previously-produced compressed buffer.
    ///
    /// Fails if `buffer` is smaller than `compressed_size()` for the given dimensions and rate —
    /// the one user-visible, construction-time error this crate's core raises.
    pub fn from_buffer(dims: [u32; D], rate: f64, buffer: &[u8]) -> Result<Self> {
        let grid = block::block_grid(dims);
        let (bits_per_block, rate) = Self::layout(dims, rate);

        let mut store = BlockStore {
            dims, grid, rate, bits_per_block,
            buffer: Vec::new(),
            _scalar: PhantomData, _codec: PhantomData,
        };

        let required = store.buffer_len_bytes();
        if buffer.len() < required {
            return Err(Error::configuration(format!(
                "buffer size is smaller than required ({} < {})", buffer.len(), required
            )));
        }

        store.buffer = buffer[..required].to_vec();
        Ok(store)
    }

    fn layout(dims: [u32; D], rate: f64) -> (u64, f64) {
        let volume = block::block_volume::<D>();
        let layout_codec = C::new(volume, rate);
        (layout_codec.bits_per_block(), layout_codec.rate())
    }

    fn bytes_per_block(&self) -> usize {
        debug_assert_eq!(self.bits_per_block % 8, 0, "codec must produce byte-aligned slots");
        (self.bits_per_block / 8) as usize
    }

    fn buffer_len_bytes(&self) -> usize {
        let total_blocks = self.blocks_total();
        round_up_to_word(total_blocks as usize * self.bytes_per_block())
    }

    fn slot(&self, b: u64) -> &[u8] {
        let start = b as usize * self.bytes_per_block();
        &self.buffer[start..start + self.bytes_per_block()]
    }

    fn slot_mut(&mut self, b: u64) -> &mut [u8] {
        let bytes_per_block = self.bytes_per_block();
        let start = b as usize * bytes_per_block;
        &mut self.buffer[start..start + bytes_per_block]
    }

    /// array dimensions this store was built (or last resized) for.
    pub fn dims(&self) -> [u32; D] { self.dims }

    /// total number of blocks covering the array.
    pub fn blocks_total(&self) -> u64 { block::blocks_total(self.dims) }

    /// current rate, in bits per scalar, after codec alignment.
    pub fn rate(&self) -> f64 { self.rate }

    /// the block index covering `coords` (preconditions: each coordinate in `0..dims[axis]`).
    pub fn block_index(&self, coords: [u32; D]) -> u64 {
        block::block_index(coords, self.grid)
    }

    /// the shape of block `b` (0 for every interior block).
    pub fn block_shape(&self, b: u64) -> BlockShape {
        let block_coords = block::block_grid_coords(b, self.grid);
        block::shape_for_block(block_coords, self.dims, self.grid)
    }

    /// raw compressed buffer, for read or write access. Reading a dirty cache's store directly
    /// does **not** implicitly flush — that is a façade-level convenience.
    pub fn compressed_data(&self) -> &[u8] { &self.buffer }

    pub fn compressed_data_mut(&mut self) -> &mut [u8] { &mut self.buffer }

    /// number of bytes of compressed data.
    pub fn compressed_size(&self) -> usize { self.buffer.len() }

    /// reallocate the buffer for new dimensions. All prior cached contents become meaningless;
    /// the caller (the cache) must drop them before calling this. `clear` zero-fills the new
    /// buffer; without it, this crate still zero-fills (see `DESIGN.md`) — the other permitted
    /// policies either risk resurrecting blocks encoded under a stale layout or are simply
    /// unspecified, and zero-fill is the only one that can never corrupt a later decode.
    pub fn resize(&mut self, dims: [u32; D], _clear: bool) {
        self.dims = dims;
        self.grid = block::block_grid(dims);
        self.buffer = vec![0_u8; self.buffer_len_bytes()];
    }

    /// reallocate for a new rate. Returns the actual rate after codec rounding. All prior cached
    /// contents become meaningless; the caller must drop them before calling this.
    pub fn set_rate(&mut self, rate: f64) -> f64 {
        let (bits_per_block, rate) = Self::layout(self.dims, rate);
        self.bits_per_block = bits_per_block;
        self.rate = rate;
        self.buffer = vec![0_u8; self.buffer_len_bytes()];
        self.rate
    }

    /// duplicate another store's dimensions, rate, and buffer bytes verbatim.
    pub fn deep_copy(&mut self, other: &Self) {
        self.dims = other.dims;
        self.grid = other.grid;
        self.rate = other.rate;
        self.bits_per_block = other.bits_per_block;
        self.buffer = other.buffer.clone();
    }

    /// compress a `block_volume`-scalar contiguous payload straight into slot `b` — the fast
    /// path used when flushing a cache line, whose storage is already contiguous.
    pub fn encode_contiguous(&mut self, codec: &C, b: u64, src: &[S]) {
        let shape = self.block_shape(b);
        let slot = self.slot_mut(b);
        codec.encode_block(src, shape, slot);
    }

    /// decompress slot `b` straight into a `block_volume`-scalar contiguous buffer — the fast
    /// path used when fetching a block into a cache line.
    pub fn decode_contiguous(&self, codec: &C, b: u64, dst: &mut [S]) {
        let shape = self.block_shape(b);
        let slot = self.slot(b);
        codec.decode_block(slot, shape, dst);
    }

    /// compress a 4^D tile read out of `src` with per-axis `strides`, relative to the block's own
    /// lowest-coordinate corner. Only valid lanes are read for a border block; the codec fills in
    /// the rest however it sees fit, since a later partial decode never reads them back out.
    pub fn encode_strided(&mut self, codec: &C, b: u64, src: &[S], strides: Strides<D>) {
        let shape = self.block_shape(b);
        let mut tile = vec![S::default(); block::block_volume::<D>()];

        block::for_each_valid_lane::<D>(shape, |coords| {
            let offset = strided_offset(coords, strides);
            tile[block::lane_index(coords)] = src[offset];
        });

        let slot = self.slot_mut(b);
        codec.encode_block(&tile, shape, slot);
    }

    /// decompress slot `b` into `dst` with per-axis `strides`. Invalid lanes of a border block
    /// are left untouched in `dst`.
    pub fn decode_strided(&self, codec: &C, b: u64, dst: &mut [S], strides: Strides<D>) {
        let shape = self.block_shape(b);
        let mut tile = vec![S::default(); block::block_volume::<D>()];
        let slot = self.slot(b);
        codec.decode_block(slot, shape, &mut tile);

        block::for_each_valid_lane::<D>(shape, |coords| {
            let offset = strided_offset(coords, strides);
            dst[offset] = tile[block::lane_index(coords)];
        });
    }
}

fn strided_offset<const D: usize>(coords: [u32; D], strides: Strides<D>) -> usize {
    (0..D).map(|axis| coords[axis] as usize * strides[axis]).sum()
}
