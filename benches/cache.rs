#[macro_use]
extern crate bencher;

use bencher::Bencher;
use compressed_array::prelude::*;

fn sequential_writes(bench: &mut Bencher) {
    let dims = [64_u32, 64];
    bench.iter(|| {
        let mut array = Array2::<f32>::new(dims, 16.0).unwrap();
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                array.set([x, y], (x + y) as f32);
            }
        }

        bencher::black_box(array.compressed_size());
    })
}

fn sequential_reads_from_a_cold_cache(bench: &mut Bencher) {
    let dims = [64_u32, 64];
    let mut array = Array2::<f32>::new(dims, 16.0).unwrap();
    for y in 0..dims[1] {
        for x in 0..dims[0] {
            array.set([x, y], (x + y) as f32);
        }
    }
    array.flush_cache();

    bench.iter(|| {
        array.clear_cache();
        let mut sum = 0.0_f32;
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                sum += array.get([x, y]);
            }
        }

        bencher::black_box(sum);
    })
}

fn bulk_round_trip(bench: &mut Bencher) {
    let dims = [64_u32, 64];
    let src: Vec<f32> = (0..dims[0] as usize * dims[1] as usize).map(|i| i as f32).collect();
    let mut dst = vec![0.0_f32; src.len()];

    bench.iter(|| {
        let mut array = Array2::<f32>::new(dims, 16.0).unwrap();
        array.set_all(&src);
        array.get_all(&mut dst);
        bencher::black_box(&dst);
    })
}

benchmark_group!(cache, sequential_writes, sequential_reads_from_a_cold_cache, bulk_round_trip);
benchmark_main!(cache);
