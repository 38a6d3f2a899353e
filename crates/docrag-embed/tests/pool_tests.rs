use candle_core::{DType, Device, Tensor};
use docrag_embed::masked_mean_l2;

fn pooled(hidden: &[f32], shape: (usize, usize, usize), mask: &[u32]) -> Vec<Vec<f32>> {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(hidden, shape, &dev).unwrap();
    let m = Tensor::from_slice(mask, (shape.0, shape.1), &dev).unwrap();
    masked_mean_l2(&h, &m).unwrap().to_vec2().unwrap()
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    for (a, b) in actual.iter().zip(expected) {
        assert!((a - b).abs() < 1e-5, "got {:?}, want {:?}", actual, expected);
    }
}

#[test]
fn padded_tokens_do_not_count() {
    let rows = pooled(&[3.0, 4.0, 100.0, 100.0], (1, 2, 2), &[1, 0]);
    assert_close(&rows[0], &[0.6, 0.8]);
}

#[test]
fn each_row_is_averaged_and_normalized_separately() {
    // Row 0 keeps both tokens, row 1 only its first.
    let hidden = [1.0, 0.0, 0.0, 1.0, 0.0, 2.0, 9.0, 9.0];
    let rows = pooled(&hidden, (2, 2, 2), &[1, 1, 1, 0]);
    let h = std::f32::consts::FRAC_1_SQRT_2;
    assert_close(&rows[0], &[h, h]);
    assert_close(&rows[1], &[0.0, 1.0]);
}

#[test]
fn rank_two_hidden_state_is_rejected() {
    let dev = Device::Cpu;
    let h = Tensor::zeros((2, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((2, 1), DType::U32, &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
