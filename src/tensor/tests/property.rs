use crate::tensor::Tensor;

#[test]
fn test_fill_and_fill_zero() {
    let mut tensor = Tensor::zeros(&[3, 4]);
    tensor.fill(2.);
    assert_eq!(tensor.sum(), 24.);
    tensor.fill_zero();
    assert_eq!(tensor.sum(), 0.);
}

#[test]
fn test_is_finite() {
    let mut tensor = Tensor::zeros(&[3]);
    assert!(tensor.is_finite());
    tensor[[1]] = f64::NAN;
    assert!(!tensor.is_finite());
    tensor[[1]] = f64::INFINITY;
    assert!(!tensor.is_finite());
}

#[test]
fn test_is_same_shape() {
    let a = Tensor::zeros(&[1, 4]);
    let b = Tensor::zeros(&[4]);
    assert!(!a.is_same_shape(&b));
    assert!(a.is_same_shape(&Tensor::zeros(&[1, 4])));
}
