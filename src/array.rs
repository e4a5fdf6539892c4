//! The public façade: a dense-looking multidimensional array backed by a [`BlockCache`] over a
//! [`BlockStore`], fixed to the crate's [`FixedRateQuantizer`] codec. Internal
//! storage order is row-major with axis 0 fastest-varying, matching the block-grid convention in
//! `block.rs`.
//!
//! This module is a thin consumer of the cache/store/codec core, not part of it: every operation
//! here is a direct forward to [`BlockCache`], with strides derived from `dims` for the bulk
//! paths. It exists so callers don't have to hand-roll strides or wire a codec type themselves.

use crate::cache::{self, BlockCache};
use crate::codec::FixedRateQuantizer;
use crate::error::{Error, Result};
use crate::math::RoundingMode;
use crate::scalar::Scalar;
use crate::store::Strides;

/// `max(1, ⌈cache_bytes / sizeof(CacheLine)⌉)`, over the cache line's actual in-memory size
/// rather than just its scalar payload.
fn cache_lines_for_byte_budget<S: Scalar>(cache_bytes: usize) -> u32 {
    let line_bytes = cache::cache_line_bytes::<S>().max(1);
    RoundingMode::Up.divide(cache_bytes as u64, line_bytes as u64).max(1) as u32
}

/// A compressed, fixed-rate, `D`-dimensional array of `S`.
#[derive(Debug, Clone)]
pub struct Array<S: Scalar, const D: usize> {
    cache: BlockCache<S, FixedRateQuantizer<S>, D>,
}

/// One-dimensional compressed array.
pub type Array1<S> = Array<S, 1>;
/// Two-dimensional compressed array.
pub type Array2<S> = Array<S, 2>;
/// Three-dimensional compressed array.
pub type Array3<S> = Array<S, 3>;
/// Four-dimensional compressed array.
pub type Array4<S> = Array<S, 4>;

impl<S: Scalar, const D: usize> Array<S, D> {
    /// construct an array of `dims` scalars per axis at `rate` bits per scalar, auto-sizing the
    /// cache per this crate's `N^2 >= blocks_total` rule. Fails if any axis length is 0.
    pub fn new(dims: [u32; D], rate: f64) -> Result<Self> {
        Self::validate_dims(dims)?;
        Ok(Array { cache: BlockCache::new(dims, rate) })
    }

    /// construct an array with an explicit cache-line budget rather than the automatic sizing
    /// rule (rounded up to the next power of two).
    pub fn with_cache_lines(dims: [u32; D], rate: f64, cache_lines: u32) -> Result<Self> {
        Self::validate_dims(dims)?;
        Ok(Array { cache: BlockCache::with_cache_lines(dims, rate, cache_lines) })
    }

    /// construct an array sized so its cache occupies roughly `cache_bytes` bytes.
    pub fn with_cache_size(dims: [u32; D], rate: f64, cache_bytes: usize) -> Result<Self> {
        Self::validate_dims(dims)?;
        let cache_lines = cache_lines_for_byte_budget::<S>(cache_bytes);
        Ok(Array { cache: BlockCache::with_cache_lines(dims, rate, cache_lines) })
    }

    fn validate_dims(dims: [u32; D]) -> Result<()> {
        if dims.iter().any(|&n| n == 0) {
            return Err(Error::configuration("every axis length must be nonzero"));
        }

        Ok(())
    }

    /// rebuild an array from a previously produced compressed buffer at the given dimensions and
    /// rate. Fails if `buffer` is too small to hold `blocks_total` slots at that layout.
    pub fn from_compressed(dims: [u32; D], rate: f64, buffer: &[u8]) -> Result<Self> {
        Self::validate_dims(dims)?;
        let store = crate::store::BlockStore::from_buffer(dims, rate, buffer)?;
        Ok(Array { cache: BlockCache::from_store(store) })
    }

    /// encode dimensions, rate, and cache-line count as a small fixed-width header, so a
    /// compressed buffer can be persisted and later rebuilt via [`Array::from_header_and_buffer`]
    /// without the caller having to track the array's shape out of band.
    pub fn to_header_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 * D + 8 + 4);
        for &n in &self.size() {
            bytes.extend_from_slice(&n.to_le_bytes());
        }
        bytes.extend_from_slice(&self.rate().to_le_bytes());
        bytes.extend_from_slice(&self.cache_lines().to_le_bytes());
        bytes
    }

    /// rebuild an array from a header produced by [`Array::to_header_bytes`] and the accompanying
    /// compressed buffer.
    pub fn from_header_and_buffer(header: &[u8], buffer: &[u8]) -> Result<Self> {
        let expected_len = 4 * D + 8 + 4;
        if header.len() < expected_len {
            return Err(Error::configuration("header is shorter than expected"));
        }

        let mut dims = [0_u32; D];
        for (axis, chunk) in header[..4 * D].chunks_exact(4).enumerate() {
            dims[axis] = u32::from_le_bytes(chunk.try_into().unwrap());
        }

        let rate = f64::from_le_bytes(header[4 * D..4 * D + 8].try_into().unwrap());
        let cache_lines = u32::from_le_bytes(header[4 * D + 8..expected_len].try_into().unwrap());

        let mut array = Self::from_compressed(dims, rate, buffer)?;
        array.cache.set_cache_lines(cache_lines);
        Ok(array)
    }

    /// array extents, one entry per axis.
    pub fn size(&self) -> [u32; D] { self.cache.dims() }

    /// length of a single axis.
    pub fn size_axis(&self, axis: usize) -> u32 { self.cache.dims()[axis] }

    /// total number of scalars in the array.
    pub fn len(&self) -> u64 { self.cache.dims().iter().map(|&n| n as u64).product() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// current rate, in bits per scalar, after codec alignment.
    pub fn rate(&self) -> f64 { self.cache.rate() }

    /// number of bytes occupied by the compressed bitstream (implicitly flushes).
    pub fn compressed_size(&mut self) -> usize { self.cache.compressed_size() }

    /// the compressed bitstream itself (implicitly flushes).
    pub fn compressed_data(&mut self) -> &[u8] { self.cache.compressed_data() }

    /// number of resident cache lines.
    pub fn cache_lines(&self) -> u32 { self.cache.cache_lines() }

    /// read the scalar at `coords`.
    pub fn get(&mut self, coords: [u32; D]) -> S { self.cache.get(coords) }

    /// write `value` at `coords`.
    pub fn set(&mut self, coords: [u32; D], value: S) { self.cache.set(coords, value) }

    /// mutate the scalar at `coords` in place, returning whatever `f` returns.
    pub fn with_mut<R>(&mut self, coords: [u32; D], f: impl FnOnce(&mut S) -> R) -> R {
        self.cache.with_mut(coords, f)
    }

    /// read every scalar of the array into `dst`, in row-major order with axis 0 fastest.
    pub fn get_all(&mut self, dst: &mut [S]) {
        self.cache.get_strided(self.size(), dst, self.row_major_strides());
    }

    /// overwrite every scalar of the array from `src`, in row-major order with axis 0 fastest.
    pub fn set_all(&mut self, src: &[S]) {
        let dims = self.size();
        self.cache.set_strided(dims, src, self.row_major_strides());
    }

    fn row_major_strides(&self) -> Strides<D> {
        let dims = self.size();
        let mut strides = [0_usize; D];
        let mut stride = 1;
        for axis in 0..D {
            strides[axis] = stride;
            stride *= dims[axis] as usize;
        }

        strides
    }

    /// flush every dirty cache line to the store without discarding cached contents.
    pub fn flush_cache(&mut self) { self.cache.flush(); }

    /// empty the cache without flushing — any write since the last `flush_cache` is discarded.
    pub fn clear_cache(&mut self) { self.cache.clear(); }

    /// reallocate for new dimensions, dropping every cached block. `clear` zero-fills the new
    /// storage (the only policy this crate implements — see `store.rs`).
    pub fn resize(&mut self, dims: [u32; D], clear: bool) -> Result<()> {
        Self::validate_dims(dims)?;
        self.cache.resize(dims, clear);
        Ok(())
    }

    /// change the rate, flushing first so no write is lost. Returns the actual rate after codec
    /// alignment.
    pub fn set_rate(&mut self, rate: f64) -> f64 { self.cache.set_rate(rate) }

    /// change the cache-line budget, flushing first so no write is lost.
    pub fn set_cache_size(&mut self, cache_bytes: usize) {
        let cache_lines = cache_lines_for_byte_budget::<S>(cache_bytes);
        self.cache.set_cache_lines(cache_lines);
    }

    /// flush `other`, then duplicate its compressed bytes, rate, and dimensions into `self`. The
    /// copy starts with a cold (empty) cache, matching the reference's `deep_copy`.
    pub fn deep_copy_from(&mut self, other: &mut Self) {
        self.cache.deep_copy(&mut other.cache);
    }
}
