//! 数据加载模块
//!
//! # 主要组件
//!
//! - [`MnistDataset`]: MNIST 手写数字数据集（IDX 格式，支持 .gz 压缩）
//! - [`transforms`]: 数据变换函数（像素归一化、one-hot）
//! - [`DataError`]: 数据加载错误类型
//!
//! # 使用示例
//!
//! ```ignore
//! use only_cnn::data::MnistDataset;
//!
//! let dataset = MnistDataset::load("data/mnist", true)?;
//! let (images, labels) = dataset.range(0, 5000)?;
//! train(&ctx, &mut cnn, images, labels, &opts)?;
//! ```

pub mod datasets;
pub mod error;
pub mod transforms;


// Re-exports
pub use datasets::MnistDataset;
pub use error::DataError;
