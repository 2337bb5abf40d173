mod layer_conv;

use crate::tensor::Tensor;

/// 测试用：由嵌套数据构造张量
fn tensor(data: &[f64], shape: &[usize]) -> Tensor {
    Tensor::new(data, shape).unwrap()
}
