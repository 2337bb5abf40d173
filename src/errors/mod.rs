use thiserror::Error;

/// 张量层面的错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
    #[error("数据长度{len}与形状{shape:?}（元素个数{expected}）不一致")]
    DataLengthMismatch {
        len: usize,
        expected: usize,
        shape: Vec<usize>,
    },
    #[error("形状不一致：期望{expected:?}，实际{got:?}")]
    InconsistentShape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
}
