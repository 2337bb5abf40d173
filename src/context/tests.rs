use ndarray::{Array, IxDyn};

use crate::context::{Backend, ExecutionContext};
use crate::tensor::Tensor;

/// 每个元素写入 `旧值 + 1000a + 100b + 10c + d`，便于核对多维索引
fn encode(index: &[usize], old: f64) -> f64 {
    old + index
        .iter()
        .fold(0usize, |acc, &i| acc * 10 + i) as f64
}

#[test]
fn test_update_rank4_parallel_matches_serial() {
    let shape = [2, 3, 4, 5];
    let mut serial = Tensor::zeros(&shape);
    let mut parallel = Tensor::zeros(&shape);
    serial.fill(0.5);
    parallel.fill(0.5);

    ExecutionContext::serial().update(&mut serial, encode);
    ExecutionContext::parallel().update(&mut parallel, encode);

    assert_eq!(serial, parallel);
    assert_eq!(parallel[[0, 0, 0, 0]], 0.5);
    assert_eq!(parallel[[1, 2, 3, 4]], 1234.5);
    assert_eq!(parallel[[0, 1, 0, 3]], 103.5);
}

#[test]
fn test_update_array_usize() {
    let mut array: Array<usize, IxDyn> = Array::zeros(IxDyn(&[3, 4]));
    ExecutionContext::parallel().update_array(&mut array, |index, _| index[0] * 4 + index[1]);
    for (k, value) in array.iter().enumerate() {
        assert_eq!(*value, k);
    }
}

#[test]
fn test_default_backend_and_seed() {
    let ctx = ExecutionContext::default();
    assert_eq!(ctx.backend(), Backend::Parallel);
    assert_eq!(ctx.seed(), None);

    let ctx = ExecutionContext::serial().with_seed(5);
    assert_eq!(ctx.backend(), Backend::Serial);
    assert_eq!(ctx.seed(), Some(5));
}
