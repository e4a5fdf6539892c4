//! Randomized coverage of interleaved reads and writes against a plain in-memory oracle, using a
//! seeded `StdRng` for reproducible fuzz-style coverage rather than hand-picked access sequences.

use compressed_array::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn interleaved_access_matches_an_uncompressed_oracle_within_the_quantization_step() {
    let dims = [17_u32, 13];
    let rate = 20.0;
    let mut array = Array2::<f64>::new(dims, rate).unwrap();
    let mut oracle = vec![0.0_f64; dims[0] as usize * dims[1] as usize];

    let mut rng = StdRng::seed_from_u64(0xC0FF_EE42);

    for _ in 0..5_000 {
        let x = rng.random_range(0..dims[0]);
        let y = rng.random_range(0..dims[1]);
        let index = x as usize + y as usize * dims[0] as usize;

        if rng.random_bool(0.5) {
            let value = rng.random_range(-1000.0..1000.0);
            array.set([x, y], value);
            oracle[index] = value;
        } else {
            let got = array.get([x, y]);
            let expected = oracle[index];
            assert!((got - expected).abs() < 0.5, "({x}, {y}): got {got}, expected {expected}");
        }
    }
}

#[test]
fn random_access_survives_interleaved_flushes_and_clears() {
    // `clear_cache` discards everything written since the last `flush_cache` (I5), so the oracle
    // has to track both "what the array should read" and "what the last flush committed" —
    // a `clear` rewinds the former to the latter rather than to whatever was set most recently.
    let dims = [9_u32, 9, 9];
    let mut array = Array3::<f32>::new(dims, 16.0).unwrap();
    let mut oracle = vec![0.0_f32; dims.iter().map(|&n| n as usize).product()];
    let mut flushed = oracle.clone();

    let mut rng = StdRng::seed_from_u64(7);

    for step in 0..2_000 {
        let coords = [
            rng.random_range(0..dims[0]),
            rng.random_range(0..dims[1]),
            rng.random_range(0..dims[2]),
        ];
        let index = (coords[0] + coords[1] * dims[0] + coords[2] * dims[0] * dims[1]) as usize;

        let value = rng.random_range(-10.0..10.0);
        array.set(coords, value);
        oracle[index] = value;

        if step % 97 == 0 {
            array.flush_cache();
            flushed = oracle.clone();
        }

        if step % 251 == 0 {
            array.clear_cache();
            oracle = flushed.clone();
        }

        let got = array.get(coords);
        assert!((got - oracle[index]).abs() < 1.0, "mismatch at {:?}", coords);
    }
}
