use ndarray::{Array, IxDyn};
use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::errors::TensorError;

mod index;
mod print;
mod property;

pub use index::{flat_index, from_linear, to_linear, unflat_index, unravel_index};

#[cfg(test)]
mod tests;

/// 定义张量的结构体。网络中各层的激活值、梯度、权重、偏置均用它存储。
/// 注：形状在构造时确定并随数据一起保存，此后所有运算都不会改变张量的形状。
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Array<f64, IxDyn>,
}

impl Tensor {
    /// 用给定数据创建一个张量，`data`按行优先（row-major）排列；
    /// 若为向量，`shape`为[n]；若为矩阵，`shape`为[n,m]；若为多通道特征图，`shape`为[c,h,w]。
    /// 注：`data`的长度必须和`shape`中所有元素的乘积相等，否则返回错误。
    pub fn new(data: &[f64], shape: &[usize]) -> Result<Tensor, TensorError> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(TensorError::DataLengthMismatch {
                len: data.len(),
                expected,
                shape: shape.to_vec(),
            });
        }
        let data = Array::from_shape_vec(IxDyn(shape), data.to_vec()).map_err(|_| {
            TensorError::InconsistentShape {
                expected: shape.to_vec(),
                got: vec![data.len()],
            }
        })?;
        Ok(Tensor { data })
    }

    /// 创建一个全零张量
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            data: Array::zeros(IxDyn(shape)),
        }
    }

    /// 创建一个随机张量，其值在[-scale, scale)的区间内均匀分布。
    /// 用于Xavier风格的权重初始化：`scale = sqrt(6 / (fan_in + fan_out))`。
    pub fn new_uniform<R: Rng + ?Sized>(rng: &mut R, scale: f64, shape: &[usize]) -> Tensor {
        let between = Uniform::new(-1.0, 1.0);
        let data = Array::from_shape_simple_fn(IxDyn(shape), || between.sample(&mut *rng) * scale);
        Tensor { data }
    }
}

// 仅在crate内部使用的方法
impl Tensor {
    pub(crate) fn array_mut(&mut self) -> &mut Array<f64, IxDyn> {
        &mut self.data
    }
}
