//! The compression transform, modeled as a capability the cache/store core consumes but never
//! defines. A production-grade analogue of this trait would be a transform-plus-embedded-coder
//! (wavelet/orthogonal transform followed by bit-plane coding); that machinery is out of scope
//! here, so this crate ships one small, honest fixed-rate quantizer instead and keeps the trait
//! as the seam a production transform would plug into.
//!
//! Unlike the C++ reference this crate is modeled on, a [`BlockCodec`] never holds a pointer
//! into the store's buffer: it is a plain value bound to `(scalar type, dimension, rate)` and
//! receives the slot's byte slice as an explicit argument on every call. That sidesteps the
//! dangling-pointer hazard the reference's raw binding has to manage by discipline, at no cost
//! to the invariants the cache relies on (see `DESIGN.md`).

use crate::block::BlockShape;
use crate::bitstream::{BitReader, BitWriter};
use crate::math::bits_to_bytes;
use crate::scalar::Scalar;
use std::marker::PhantomData;

/// A stateless-per-block compressor/decompressor bound to one rate.
///
/// `block_volume` is fixed for the lifetime of a codec instance (it is `BLOCK_AXIS^D` for
/// whichever dimensionality the owning store was built for); `bits_per_block` depends only on
/// `block_volume` and the current rate, never on an individual block's shape.
pub trait BlockCodec<S: Scalar>: Sized {
    /// construct a codec for blocks of `block_volume` scalars at the given target rate.
    fn new(block_volume: usize, rate: f64) -> Self;

    /// number of scalars per block this codec was constructed for.
    fn block_volume(&self) -> usize;

    /// current rate in bits per scalar.
    fn rate(&self) -> f64;

    /// change the rate; returns the actual rate after the codec's own alignment rounding.
    fn set_rate(&mut self, rate: f64) -> f64;

    /// width, in bits, of one compressed slot at the current rate.
    fn bits_per_block(&self) -> u64;

    /// compress one full `block_volume`-scalar block into `slot` (exactly `bits_per_block` bits,
    /// rounded up to a whole byte). Lanes outside `shape` may be compressed using whatever
    /// values `block` holds for them (the store pads those before calling in), since the caller
    /// never reads them back out through a partial decode.
    fn encode_block(&self, block: &[S], shape: BlockShape, slot: &mut [u8]);

    /// decompress `slot` into a full `block_volume`-scalar `block`. Lanes outside `shape` are
    /// still written (this codec has no sparse representation) but callers reading through a
    /// partial store decode ignore them.
    fn decode_block(&self, slot: &[u8], shape: BlockShape, block: &mut [S]);
}

/// Fixed-rate block-floating-point quantizer: per block, a 64-bit header (min value and scale,
/// each an `f32`) followed by `bits_per_lane` quantized residual bits per scalar, packed
/// LSB-first via [`crate::bitstream`]. `bits_per_lane` is `ceil(rate)` clamped to
/// `1..=min(S::BITS, MAX_BITS_PER_LANE)` — this codec's alignment granularity is a whole bit per
/// lane rather than the finer, block-amortized rates a production transform coder achieves
/// (`set_rate` rounds a fractional request up to the next whole bit), and its quantization path
/// is itself done in `f64`, which caps useful precision at `f64`'s 52-bit mantissa regardless of
/// the scalar's native width.
#[derive(Debug, Clone)]
pub struct FixedRateQuantizer<S: Scalar> {
    block_volume: usize,
    bits_per_lane: u32,
    _scalar: PhantomData<S>,
}

const HEADER_BITS: u64 = 64;

/// quantization happens in `f64`; bits beyond its 52-bit mantissa cannot improve precision.
const MAX_BITS_PER_LANE: u32 = 52;

impl<S: Scalar> FixedRateQuantizer<S> {
    fn bits_per_lane_for_rate(rate: f64) -> u32 {
        let requested = rate.ceil().max(1.0) as u32;
        requested.min(S::BITS).min(MAX_BITS_PER_LANE)
    }

    fn max_level(&self) -> u128 {
        (1_u128 << self.bits_per_lane) - 1
    }

    fn valid_lane_range(&self, block: &[S], shape: BlockShape) -> (f64, f64) {
        let d = block_rank_for_volume(self.block_volume);
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        visit_lanes(d, shape, self.block_volume, |lane| {
            let value = block[lane].to_f64();
            min = min.min(value);
            max = max.max(value);
        });

        if !min.is_finite() {
            (0.0, 0.0) // fully degenerate block (D == 0 is never constructed, guard anyway)
        } else {
            (min, max)
        }
    }
}

impl<S: Scalar> BlockCodec<S> for FixedRateQuantizer<S> {
    fn new(block_volume: usize, rate: f64) -> Self {
        FixedRateQuantizer {
            block_volume,
            bits_per_lane: Self::bits_per_lane_for_rate(rate),
            _scalar: PhantomData,
        }
    }

    fn block_volume(&self) -> usize { self.block_volume }

    fn rate(&self) -> f64 { self.bits_per_lane as f64 }

    fn set_rate(&mut self, rate: f64) -> f64 {
        self.bits_per_lane = Self::bits_per_lane_for_rate(rate);
        self.rate()
    }

    fn bits_per_block(&self) -> u64 {
        let residual_bits = self.block_volume as u64 * self.bits_per_lane as u64;
        bits_to_bytes(HEADER_BITS + residual_bits) * 8
    }

    fn encode_block(&self, block: &[S], shape: BlockShape, slot: &mut [u8]) {
        debug_assert_eq!(block.len(), self.block_volume);
        debug_assert!((slot.len() as u64) * 8 >= self.bits_per_block());

        let (min, max) = self.valid_lane_range(block, shape);
        let range = max - min;
        let scale = if range > 0.0 { self.max_level() as f64 / range } else { 0.0 };

        // round the header constants to the f32 precision they're stored at *before* quantizing
        // against them, so decode's f32-rounded min/scale are the exact inverse of encode's.
        let min = min as f32 as f64;
        let scale = scale as f32 as f64;

        let mut writer = BitWriter::new(slot);
        writer.write_bits(f32_to_bits(min as f32) as u64, 32);
        writer.write_bits(f32_to_bits(scale as f32) as u64, 32);

        for &value in block {
            let quantized = if range > 0.0 {
                (((value.to_f64() - min) * scale).round().clamp(0.0, self.max_level() as f64)) as u64
            } else {
                0
            };

            writer.write_bits(quantized, self.bits_per_lane);
        }
    }

    fn decode_block(&self, slot: &[u8], _shape: BlockShape, block: &mut [S]) {
        debug_assert_eq!(block.len(), self.block_volume);
        debug_assert!((slot.len() as u64) * 8 >= self.bits_per_block());

        let mut reader = BitReader::new(slot);
        let min = f32_from_bits(reader.read_bits(32) as u32) as f64;
        let scale = f32_from_bits(reader.read_bits(32) as u32) as f64;

        for slot_value in block.iter_mut() {
            let quantized = reader.read_bits(self.bits_per_lane);
            let value = if scale > 0.0 { min + quantized as f64 / scale } else { min };
            *slot_value = S::from_f64(value);
        }
    }
}

fn f32_to_bits(value: f32) -> u32 { value.to_bits() }
fn f32_from_bits(bits: u32) -> f32 { f32::from_bits(bits) }

/// recover `D` from a block volume of `BLOCK_AXIS^D`; only ever called with volumes this crate
/// itself produced via [`crate::block::block_volume`], so the loop always terminates at a match.
fn block_rank_for_volume(volume: usize) -> u32 {
    let mut rank = 0;
    let mut v = 1;
    while v < volume {
        v *= crate::block::BLOCK_AXIS as usize;
        rank += 1;
    }

    debug_assert_eq!(v, volume, "block volume must be a power of BLOCK_AXIS");
    rank
}

/// dispatch [`crate::block::for_each_valid_lane`] for a rank recovered at runtime, converting
/// in-block coordinates back to a flat lane index via [`crate::block::lane_index`].
fn visit_lanes(rank: u32, shape: BlockShape, block_volume: usize, mut visit: impl FnMut(usize)) {
    macro_rules! dispatch {
        ($($rank:literal),*) => {
            match rank {
                $($rank => crate::block::for_each_valid_lane::<$rank>(shape, |coords| {
                    visit(crate::block::lane_index(coords));
                }),)*
                _ => unreachable!("block rank out of supported range 1..=4"),
            }
        };
    }

    let _ = block_volume;
    dispatch!(1, 2, 3, 4)
}
