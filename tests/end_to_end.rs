//! Whole-array scenarios exercising the façade on top of the cache/store/codec core.

use compressed_array::prelude::*;

#[test]
fn scalar_writes_and_reads_agree_before_any_flush() {
    let mut array = Array2::<f64>::new([12, 12], 24.0).unwrap();

    for y in 0..12 {
        for x in 0..12 {
            array.set([x, y], (x + y * 12) as f64);
        }
    }

    for y in 0..12 {
        for x in 0..12 {
            assert!((array.get([x, y]) - (x + y * 12) as f64).abs() < 1e-3);
        }
    }
}

#[test]
fn flushing_does_not_change_what_reads_observe() {
    let mut array = Array3::<f32>::new([9, 9, 9], 16.0).unwrap();
    for i in 0..9 {
        array.set([i, i, i], i as f32 * 2.0);
    }

    let before: Vec<f32> = (0..9).map(|i| array.get([i, i, i])).collect();
    array.flush_cache();
    let after: Vec<f32> = (0..9).map(|i| array.get([i, i, i])).collect();

    assert_eq!(before, after);
}

#[test]
fn clear_cache_discards_writes_made_since_the_last_flush() {
    let mut array = Array2::<f64>::new([12, 12], 24.0).unwrap();
    array.set([1, 1], 5.0);
    array.flush_cache();
    let committed = array.compressed_data().to_vec();

    array.set([1, 1], 999.0); // dirty, never flushed
    array.clear_cache();

    assert!((array.get([1, 1]) - 5.0).abs() < 1e-3);
    assert_eq!(array.compressed_data(), committed.as_slice());
}

#[test]
fn set_rate_preserves_committed_content_across_a_reallocation() {
    let mut array = Array2::<f64>::new([16, 16], 32.0).unwrap();
    array.set([5, 5], 3.25);
    array.flush_cache();

    let actual_rate = array.set_rate(12.0);
    assert!(actual_rate >= 12.0);
    assert!((array.get([5, 5]) - 3.25).abs() < 1e-2);
}

#[test]
fn resize_without_clear_still_zero_fills_the_enlarged_region() {
    let mut array = Array1::<i32>::new([8], 16.0).unwrap();
    array.set([3], 100);
    array.resize([16], false).unwrap();

    assert_eq!(array.get([3]), 0);
    for i in 8..16 {
        assert_eq!(array.get([i]), 0);
    }
}

#[test]
fn compressed_size_grows_monotonically_with_the_rate() {
    let mut low = Array2::<f32>::new([32, 32], 4.0).unwrap();
    let mut high = Array2::<f32>::new([32, 32], 32.0).unwrap();
    assert!(low.compressed_size() < high.compressed_size());
}

#[test]
fn deep_copy_is_independent_of_the_source_afterward() {
    let mut source = Array2::<f64>::new([8, 8], 16.0).unwrap();
    source.set([0, 0], 1.0);

    let mut copy = Array2::<f64>::new([8, 8], 16.0).unwrap();
    copy.deep_copy_from(&mut source);

    source.set([0, 0], 2.0);
    assert!((copy.get([0, 0]) - 1.0).abs() < 1e-6);
    assert!((source.get([0, 0]) - 2.0).abs() < 1e-6);
}

#[test]
fn a_1d_array_round_trips_through_bulk_access() {
    let mut array = Array1::<f64>::new([37], 20.0).unwrap();
    let src: Vec<f64> = (0..37).map(|i| (i as f64).sin()).collect();
    array.set_all(&src);

    let mut dst = vec![0.0_f64; 37];
    array.get_all(&mut dst);

    for (a, b) in src.iter().zip(dst.iter()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn a_4d_array_covers_a_block_that_spans_every_axis_border() {
    let mut array = Array4::<f32>::new([5, 5, 5, 5], 8.0).unwrap();
    array.set([4, 4, 4, 4], 7.0);
    assert!((array.get([4, 4, 4, 4]) - 7.0).abs() < 1.0);
}
