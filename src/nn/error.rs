/*
 * @Description  : nn 模块的错误类型
 */

use thiserror::Error;

use crate::errors::TensorError;

/// 网络构建、前向/反向传播、训练过程中的错误
#[derive(Error, Debug, PartialEq)]
pub enum NnError {
    /// 层的超参数不合法（如卷积核大于输入、池化窗口为0）
    #[error("{layer}层参数无效：{message}")]
    InvalidLayer { layer: String, message: String },

    /// 传入层的张量形状与层期望的不一致
    #[error("{layer}层形状不匹配：期望{expected:?}，实际{got:?}")]
    ShapeMismatch {
        layer: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// 未做数值稳定处理的softmax溢出，产生了NaN或Inf
    #[error("{layer}层出现数值不稳定（NaN/Inf）：{detail}")]
    NumericInstability { layer: String, detail: String },

    /// 训练/测试接口收到的参数不合法
    #[error("参数无效：{0}")]
    InvalidArgument(String),

    /// 配置文件读取或解析失败
    #[error("配置错误：{0}")]
    ConfigError(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

impl NnError {
    pub(crate) fn invalid_layer(layer: &str, message: impl Into<String>) -> Self {
        Self::InvalidLayer {
            layer: layer.to_string(),
            message: message.into(),
        }
    }

    /// 若`got`与`expected`不一致，返回`ShapeMismatch`
    pub(crate) fn check_shape(layer: &str, expected: &[usize], got: &[usize]) -> Result<(), Self> {
        if expected == got {
            Ok(())
        } else {
            Err(Self::ShapeMismatch {
                layer: layer.to_string(),
                expected: expected.to_vec(),
                got: got.to_vec(),
            })
        }
    }
}
