//! 数据变换函数
//!
//! 提供常用的数据预处理操作，如归一化、one-hot 编码等。

use crate::data::error::DataError;
use crate::tensor::Tensor;

/// 将 0-255 像素值归一化到 0-1
///
/// # 参数
/// - `pixels`: 原始像素，按行优先排列
/// - `shape`: 输出张量的形状，元素个数须与`pixels`长度一致
pub fn normalize_pixels(pixels: &[u8], shape: &[usize]) -> Result<Tensor, DataError> {
    let data: Vec<f64> = pixels.iter().map(|&p| f64::from(p) / 255.0).collect();
    Tensor::new(&data, shape).map_err(|_| DataError::ShapeMismatch {
        expected: shape.to_vec(),
        got: vec![pixels.len()],
    })
}

/// 将类别索引转换为 one-hot 编码，形状 [num_classes]
///
/// # 示例
/// ```ignore
/// let label = one_hot(2, 3)?;
/// // 结果: [0, 0, 1]
/// ```
pub fn one_hot(class: usize, num_classes: usize) -> Result<Tensor, DataError> {
    if class >= num_classes {
        return Err(DataError::FormatError(format!(
            "类别 {class} 超出范围 0..{num_classes}"
        )));
    }
    let mut tensor = Tensor::zeros(&[num_classes]);
    tensor[[class]] = 1.0;
    Ok(tensor)
}
