/*
 * @Description  : 损失与评估指标
 */

use crate::nn::NnError;
use crate::tensor::Tensor;

/// 避免 ln(0) 的偏移量
pub const CROSS_ENTROPY_EPSILON: f64 = 1e-10;

/// 交叉熵：`-Σ target[i] * ln(pred[i] + ε)`
pub fn cross_entropy(prediction: &Tensor, target: &Tensor) -> Result<f64, NnError> {
    NnError::check_shape("交叉熵", target.shape(), prediction.shape())?;
    Ok(-prediction
        .iter()
        .zip(target.iter())
        .map(|(p, t)| t * (p + CROSS_ENTROPY_EPSILON).ln())
        .sum::<f64>())
}

/// 最大值所在的线性索引；按顺序串行扫描，并列时取第一个。空张量返回`None`
pub fn argmax(tensor: &Tensor) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in tensor.iter().enumerate() {
        match best {
            Some((_, max)) if value <= max => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

/// 预测类别与目标类别（均取 argmax）是否一致
pub fn is_correct(prediction: &Tensor, target: &Tensor) -> Result<bool, NnError> {
    NnError::check_shape("准确率", target.shape(), prediction.shape())?;
    match (argmax(prediction), argmax(target)) {
        (Some(p), Some(t)) => Ok(p == t),
        _ => Err(NnError::InvalidArgument("不能对空张量求 argmax".to_string())),
    }
}
