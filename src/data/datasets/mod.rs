//! 内置数据集
//!
//! - MNIST：手写数字分类

mod mnist;

pub use mnist::{MNIST_CLASSES, MnistDataset};
