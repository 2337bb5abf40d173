/*
 * @Description  : 负责卷积神经网络（CNN）的构建、训练与测试
 */

pub mod config;
mod error;
pub mod layer;
pub mod loss;
mod network;
mod train;

pub use config::{CnnConfig, TrainOptions};
pub use error::NnError;
pub use layer::{ConvLayer, OutputLayer, PoolLayer, PoolMode};
pub use loss::{argmax, cross_entropy, is_correct};
pub use network::Cnn;
pub use train::{TrainReport, test, train};

#[cfg(test)]
mod tests;
