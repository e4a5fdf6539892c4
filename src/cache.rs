//! The write-back block cache sitting in front of a [`BlockStore`]: a small, direct-mapped set of
//! decoded blocks that absorbs repeated reads and batches writes into whole-block compressions.
//! Grounded on the tag/line machinery of `cache2.h`.
//!
//! A cache line's tag is encoded as a single `u64` sentinel (`0` = empty, otherwise
//! `block_index + 1`) rather than as a separate `Option<u64>` plus state enum — the dirty bit is
//! the only piece of state a non-empty line needs beyond which block it holds, matching the
//! reference's `tag` bit-packing but without needing raw bit tricks since Rust has no spare bits
//! to steal from a pointer here.

use crate::block;
use crate::codec::BlockCodec;
use crate::math::sqrt_cache_lines;
use crate::scalar::Scalar;
use crate::store::{BlockStore, Strides};
use smallvec::SmallVec;

/// Inline capacity of one cache line's payload: exactly `BLOCK_AXIS^3`, so every dimensionality
/// up to 3-D stores its block contents inline; a 4-D array's lines (`BLOCK_AXIS^4` scalars) spill
/// to the heap.
const INLINE_BLOCK_VOLUME: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tag(u64);

impl Tag {
    const EMPTY: Tag = Tag(0);

    fn of(block_index: u64) -> Self { Tag(block_index + 1) }

    fn block_index(self) -> Option<u64> {
        if self == Tag::EMPTY { None } else { Some(self.0 - 1) }
    }
}

#[derive(Debug, Clone)]
struct CacheLine<S: Scalar> {
    tag: Tag,
    dirty: bool,
    payload: SmallVec<[S; INLINE_BLOCK_VOLUME]>,
}

impl<S: Scalar> CacheLine<S> {
    fn empty(block_volume: usize) -> Self {
        CacheLine { tag: Tag::EMPTY, dirty: false, payload: SmallVec::from_elem(S::default(), block_volume) }
    }
}

/// in-memory size of one cache line (tag + dirty flag + inline/spilled payload storage), used by
/// callers sizing a cache from an explicit byte budget rather than a line count:
/// `max(1, ⌈B / sizeof(CacheLine)⌉)` lines for a `B`-byte budget.
pub fn cache_line_bytes<S: Scalar>() -> usize {
    std::mem::size_of::<CacheLine<S>>()
}

/// A direct-mapped, write-back cache of decoded blocks in front of a [`BlockStore`].
///
/// `C` is the codec type used to compress/decompress evicted and fetched lines; the cache owns
/// the one live codec instance used for actual block transforms (the store only ever constructs
/// transient instances of the same type to recompute layout facts — see `store.rs`).
#[derive(Debug, Clone)]
pub struct BlockCache<S: Scalar, C: BlockCodec<S>, const D: usize> {
    store: BlockStore<S, C, D>,
    codec: C,
    lines: Vec<CacheLine<S>>,
}

impl<S: Scalar, C: BlockCodec<S>, const D: usize> BlockCache<S, C, D> {
    /// build a cache over a fresh store of the given dimensions and rate, auto-sizing the number
    /// of lines per this crate's `N^2 >= blocks_total` rule.
    pub fn new(dims: [u32; D], rate: f64) -> Self {
        let store = BlockStore::new(dims, rate);
        Self::from_store(store)
    }

    /// build a cache over a fresh store of the given dimensions and rate, pinned to an explicit
    /// number of cache lines (rounded up to the next power of two, at least 1).
    pub fn with_cache_lines(dims: [u32; D], rate: f64, cache_lines: u32) -> Self {
        let store = BlockStore::new(dims, rate);
        let mut cache = Self::from_store(store);
        cache.resize_lines(cache_lines.max(1).next_power_of_two());
        cache
    }

    /// build a cache, auto-sized, over an already-constructed store (e.g. one loaded from a
    /// previously compressed buffer via [`BlockStore::from_buffer`]).
    pub fn from_store(store: BlockStore<S, C, D>) -> Self {
        let codec = C::new(block::block_volume::<D>(), store.rate());
        let line_count = sqrt_cache_lines(store.blocks_total()).next_power_of_two();
        let mut cache = BlockCache { store, codec, lines: Vec::new() };
        cache.resize_lines(line_count);
        cache
    }

    fn resize_lines(&mut self, line_count: u32) {
        let volume = block::block_volume::<D>();
        self.lines = (0..line_count).map(|_| CacheLine::empty(volume)).collect();
    }

    fn line_count(&self) -> u64 { self.lines.len() as u64 }

    fn slot_for(&self, b: u64) -> usize {
        (b & (self.line_count() - 1)) as usize
    }

    /// flush (if dirty) and evict whatever block currently occupies the line that `b` maps to,
    /// leaving that line empty. A no-op if the line is empty or already holds `b`.
    fn evict_for(&mut self, b: u64) {
        let slot = self.slot_for(b);
        if self.lines[slot].tag.block_index() == Some(b) {
            return;
        }

        self.flush_line(slot);
        self.lines[slot] = CacheLine::empty(block::block_volume::<D>());
    }

    fn flush_line(&mut self, slot: usize) {
        let line = &self.lines[slot];
        if let (Some(b), true) = (line.tag.block_index(), line.dirty) {
            self.store.encode_contiguous(&self.codec, b, &self.lines[slot].payload);
            self.lines[slot].dirty = false;
        }
    }

    /// ensure block `b`'s line holds decoded contents, fetching from the store on a miss, and
    /// return its slot index.
    fn access(&mut self, b: u64) -> usize {
        let slot = self.slot_for(b);
        if self.lines[slot].tag.block_index() != Some(b) {
            self.evict_for(b);
            let volume = block::block_volume::<D>();
            let mut payload: SmallVec<[S; INLINE_BLOCK_VOLUME]> = SmallVec::from_elem(S::default(), volume);
            self.store.decode_contiguous(&self.codec, b, &mut payload);
            self.lines[slot] = CacheLine { tag: Tag::of(b), dirty: false, payload };
        }

        slot
    }

    /// read one scalar at `coords`, fetching its block into the cache on a miss.
    pub fn get(&mut self, coords: [u32; D]) -> S {
        let b = self.store.block_index(coords);
        let slot = self.access(b);
        self.lines[slot].payload[block::lane_index(coords)]
    }

    /// write one scalar at `coords`, fetching its block into the cache on a miss and marking the
    /// line dirty — a line is dirty iff it differs from the store's last flush of that block.
    pub fn set(&mut self, coords: [u32; D], value: S) {
        let b = self.store.block_index(coords);
        let slot = self.access(b);
        self.lines[slot].payload[block::lane_index(coords)] = value;
        self.lines[slot].dirty = true;
    }

    /// mutate one scalar at `coords` in place via `f`, fetching its block on a miss and marking
    /// the line dirty — the closure-scoped equivalent of the reference's proxy `ref` type, which
    /// cannot be expressed as a bare `&mut S` without tying the cache's own borrow to the caller
    /// for longer than a single access (see `DESIGN.md`).
    pub fn with_mut<R>(&mut self, coords: [u32; D], f: impl FnOnce(&mut S) -> R) -> R {
        let b = self.store.block_index(coords);
        let slot = self.access(b);
        let lane = block::lane_index(coords);
        let result = f(&mut self.lines[slot].payload[lane]);
        self.lines[slot].dirty = true;
        result
    }

    /// bulk-read a contiguous tile of the array into `dst`, one block at a time, bypassing the
    /// cache entirely when a needed block isn't already resident clean-or-dirty (this mirrors the
    /// reference's strided bulk accessors, which read through the store rather than populating
    /// the cache for a one-shot transfer).
    pub fn get_strided(&self, dims: [u32; D], dst: &mut [S], strides: Strides<D>) {
        let grid = block::block_grid(dims);
        for b in 0..block::blocks_total(dims) {
            let block_coords = block::block_grid_coords(b, grid);
            if let Some(line) = self.resident_line(b) {
                let shape = self.store.block_shape(b);
                block::for_each_valid_lane::<D>(shape, |local| {
                    let global: [u32; D] = std::array::from_fn(|axis| {
                        block_coords[axis] * block::BLOCK_AXIS + local[axis]
                    });
                    let offset = (0..D).map(|axis| global[axis] as usize * strides[axis]).sum::<usize>();
                    dst[offset] = line.payload[block::lane_index(local)];
                });
            } else {
                let base = (0..D)
                    .map(|axis| block_coords[axis] as usize * block::BLOCK_AXIS as usize * strides[axis])
                    .sum::<usize>();
                self.store.decode_strided(&self.codec, b, &mut dst[base..], strides);
            }
        }
    }

    /// bulk-write a contiguous tile of the array from `src`, one block at a time. Any line
    /// currently caching a touched block is dropped rather than merged — a bulk write supplies
    /// every valid lane of the block it touches, so there is nothing in the old cached copy (dirty
    /// or not) worth preserving.
    pub fn set_strided(&mut self, dims: [u32; D], src: &[S], strides: Strides<D>) {
        let grid = block::block_grid(dims);
        for b in 0..block::blocks_total(dims) {
            let slot = self.slot_for(b);
            if self.lines[slot].tag.block_index() == Some(b) {
                self.lines[slot] = CacheLine::empty(block::block_volume::<D>());
            }

            let block_coords = block::block_grid_coords(b, grid);
            let base = (0..D)
                .map(|axis| block_coords[axis] as usize * block::BLOCK_AXIS as usize * strides[axis])
                .sum::<usize>();
            self.store.encode_strided(&self.codec, b, &src[base..], strides);
        }
    }

    fn resident_line(&self, b: u64) -> Option<&CacheLine<S>> {
        let slot = self.slot_for(b);
        if self.lines[slot].tag.block_index() == Some(b) { Some(&self.lines[slot]) } else { None }
    }

    /// write every dirty line back to the store, without evicting any line's contents.
    pub fn flush(&mut self) {
        for slot in 0..self.lines.len() {
            self.flush_line(slot);
        }
    }

    /// drop every tag without encoding — any write since the last `flush` is discarded. The only
    /// way to empty the cache without paying the encode cost, and the distinguishing contract
    /// versus `flush` (I5): a line that was never dirty decodes identically either way, but a
    /// dirty line's in-progress edits vanish here instead of reaching the store.
    pub fn clear(&mut self) {
        self.resize_lines(self.line_count() as u32);
    }

    /// access the underlying store's compressed buffer, implicitly flushing first so the bytes
    /// reflect every write made through the cache.
    pub fn compressed_data(&mut self) -> &[u8] {
        self.flush();
        self.store.compressed_data()
    }

    pub fn compressed_size(&mut self) -> usize {
        self.flush();
        self.store.compressed_size()
    }

    pub fn rate(&self) -> f64 { self.store.rate() }

    pub fn dims(&self) -> [u32; D] { self.store.dims() }

    pub fn cache_lines(&self) -> u32 { self.lines.len() as u32 }

    /// reallocate the store for new dimensions, dropping every cached block first — resizing
    /// never flushes stale contents against the new layout.
    pub fn resize(&mut self, dims: [u32; D], clear: bool) {
        self.resize_lines(self.line_count() as u32);
        self.store.resize(dims, clear);
    }

    /// reallocate the store for a new rate, preserving every block's contents (re-quantized at
    /// the new rate) rather than discarding them — flushing first so no pending write is lost,
    /// decoding every block under the old codec, reallocating, then re-encoding every block under
    /// the new one. Callers expect a rate change to preserve committed data rather than silently
    /// dropping it, so a rate change costs a full decode/re-encode pass instead of just wiping
    /// the buffer.
    pub fn set_rate(&mut self, rate: f64) -> f64 {
        self.flush();

        let volume = block::block_volume::<D>();
        let blocks_total = self.store.blocks_total() as usize;
        let mut scalars = vec![S::default(); blocks_total * volume];
        for b in 0..blocks_total as u64 {
            let offset = b as usize * volume;
            self.store.decode_contiguous(&self.codec, b, &mut scalars[offset..offset + volume]);
        }

        let actual = self.store.set_rate(rate);
        self.codec = C::new(volume, actual);

        for b in 0..blocks_total as u64 {
            let offset = b as usize * volume;
            self.store.encode_contiguous(&self.codec, b, &scalars[offset..offset + volume]);
        }

        self.resize_lines(self.line_count() as u32);
        actual
    }

    /// change the number of cache lines, flushing first so no write is lost.
    pub fn set_cache_lines(&mut self, cache_lines: u32) {
        self.flush();
        self.resize_lines(cache_lines.max(1).next_power_of_two());
    }

    /// flush, then duplicate another cache's store bytes, rate, and line count; the duplicate
    /// starts with an empty (cold) cache over that store, matching the reference's `deep_copy`
    /// (which copies the persisted bitstream, not the transient cache state).
    pub fn deep_copy(&mut self, other: &mut Self) {
        other.flush();
        self.store.deep_copy(&other.store);
        self.codec = C::new(block::block_volume::<D>(), self.store.rate());
        self.resize_lines(other.line_count() as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FixedRateQuantizer;

    type Cache2 = BlockCache<f64, FixedRateQuantizer<f64>, 2>;

    #[test]
    fn a_write_is_visible_through_a_read_before_any_flush() {
        let mut cache = Cache2::new([16, 16], 16.0);
        cache.set([3, 5], 7.5);
        assert_eq!(cache.get([3, 5]), 7.5);
    }

    #[test]
    fn eviction_preserves_a_write_through_the_store() {
        let mut cache = Cache2::with_cache_lines([16, 16], 32.0, 1);
        cache.set([0, 0], 1.0); // forces both blocks onto the single line, in turn
        cache.set([8, 8], 2.0);
        assert!((cache.get([0, 0]) - 1.0).abs() < 1e-6);
        assert!((cache.get([8, 8]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn with_mut_marks_the_line_dirty() {
        let mut cache = Cache2::new([8, 8], 16.0);
        cache.with_mut([1, 1], |v| *v = 3.0);
        assert_eq!(cache.get([1, 1]), 3.0);
    }

    #[test]
    fn clear_discards_writes_made_since_the_last_flush() {
        let mut cache = Cache2::new([8, 8], 16.0);
        cache.set([0, 0], 9.0);
        cache.clear();
        assert_eq!(cache.get([0, 0]), 0.0);
    }

    #[test]
    fn clear_preserves_content_committed_by_an_earlier_flush() {
        let mut cache = Cache2::new([8, 8], 16.0);
        cache.set([0, 0], 9.0);
        cache.flush();
        cache.set([1, 1], 2.0); // dirty, never flushed
        cache.clear();
        assert!((cache.get([0, 0]) - 9.0).abs() < 1e-6);
        assert_eq!(cache.get([1, 1]), 0.0);
    }

    #[test]
    fn set_rate_preserves_flushed_writes_under_the_new_rate() {
        let mut cache = Cache2::new([8, 8], 32.0);
        cache.set([2, 2], 11.0);
        let actual = cache.set_rate(16.0);
        assert!(actual >= 16.0);
        assert!((cache.get([2, 2]) - 11.0).abs() < 1e-3);
    }

    #[test]
    fn resize_drops_stale_cached_content() {
        let mut cache = Cache2::new([8, 8], 16.0);
        cache.set([1, 1], 42.0);
        cache.resize([16, 16], true);
        assert_eq!(cache.dims(), [16, 16]);
        assert_eq!(cache.get([1, 1]), 0.0);
    }

    #[test]
    fn deep_copy_carries_flushed_content_but_not_the_cache_state() {
        let mut source = Cache2::new([8, 8], 16.0);
        source.set([3, 3], 6.0);

        let mut copy = Cache2::new([8, 8], 16.0);
        copy.deep_copy(&mut source);

        assert!((copy.get([3, 3]) - 6.0).abs() < 1e-6);
    }
}
