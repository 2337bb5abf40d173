use crate::tensor::{Tensor, flat_index, from_linear, to_linear, unflat_index, unravel_index};

#[test]
fn test_linear_round_trip() {
    // 4x4网格中的(1,1)、(0,3)、(2,0)、(2,2)
    assert_eq!(to_linear(1, 1, 4), 5);
    assert_eq!(to_linear(0, 3, 4), 3);
    assert_eq!(to_linear(2, 0, 4), 8);
    assert_eq!(to_linear(2, 2, 4), 10);
    assert_eq!(from_linear(5, 4), (1, 1));
    assert_eq!(from_linear(10, 4), (2, 2));
}

#[test]
fn test_flat_index_matches_row_major_order() {
    let data: Vec<f64> = (0..2 * 3 * 4).map(|x| x as f64).collect();
    let tensor = Tensor::new(&data, &[2, 3, 4]).unwrap();
    for c in 0..2 {
        for r in 0..3 {
            for col in 0..4 {
                let k = flat_index(c, r, col, 3, 4);
                assert_eq!(tensor[[c, r, col]], k as f64);
                assert_eq!(unflat_index(k, 3, 4), (c, r, col));
            }
        }
    }
    assert_eq!(tensor.to_vec(), data);
}

#[test]
fn test_index_mut() {
    let mut tensor = Tensor::zeros(&[2, 2]);
    tensor[[1, 0]] = 3.5;
    assert_eq!(tensor[[1, 0]], 3.5);
    let index: &[usize] = &[1, 0];
    assert_eq!(tensor[index], 3.5);
    assert_eq!(tensor.sum(), 3.5);
}

#[test]
#[should_panic]
fn test_index_out_of_range() {
    let tensor = Tensor::zeros(&[2, 2]);
    let _ = tensor[[2, 0]];
}

#[test]
fn test_unravel_index_matches_row_major_order() {
    let shape = [2, 3, 4, 5];
    let data: Vec<f64> = (0..120).map(|x| x as f64).collect();
    let tensor = Tensor::new(&data, &shape).unwrap();
    for k in 0..120 {
        let index = unravel_index(k, &shape);
        assert_eq!(tensor[&index[..]], k as f64);
    }
    assert_eq!(unravel_index(0, &shape), vec![0, 0, 0, 0]);
    assert_eq!(unravel_index(119, &shape), vec![1, 2, 3, 4]);
    assert_eq!(unravel_index(7, &[10]), vec![7]);
}
