//! # Only CNN
//!
//! `only_cnn`项目用纯rust实现一个5层卷积神经网络
//! （卷积 → 最大池化 → 卷积 → 最大池化 → 全连接softmax），
//! 以逐样本随机梯度下降在[MNIST](http://yann.lecun.com/exdb/mnist/)手写数字数据集上训练与测试。
//!
//! 前向、反向传播与参数更新都表达为“逐元素”核函数，
//! 由[`context::ExecutionContext`]选择串行或Rayon并行执行，两者结果逐位一致。
//!

pub mod context;
pub mod data;
pub mod errors;
pub mod nn;
pub mod tensor;
