/*
 * @Description  : 网络结构与训练参数
 *
 * 默认值即 MNIST 上的固定设置：28x28 输入，5x5 卷积核，6/12 通道，2x2 池化，1 个 epoch，
 * 学习率在一个 epoch 内从 0.03 线性衰减到 0.001，训练 5000 张、测试 10000 张
 */

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::nn::NnError;

pub const DEFAULT_INPUT_SIZE: (usize, usize) = (28, 28);
pub const DEFAULT_KERNEL_SIZE: usize = 5;
pub const DEFAULT_CONV1_CHANNELS: usize = 6;
pub const DEFAULT_CONV2_CHANNELS: usize = 12;
pub const DEFAULT_POOL_SIZE: usize = 2;
pub const DEFAULT_CLASSES: usize = 10;

/// 网络结构参数
///
/// 拓扑固定为 Conv1 → Pool1 → Conv2 → Pool2 → Output，这里只决定各层尺寸
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CnnConfig {
    /// 输入图像 (H, W)
    pub input_size: (usize, usize),
    pub input_channels: usize,
    pub kernel_size: usize,
    pub conv1_channels: usize,
    pub conv2_channels: usize,
    pub pool_size: usize,
    pub classes: usize,
}

impl Default for CnnConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            input_channels: 1,
            kernel_size: DEFAULT_KERNEL_SIZE,
            conv1_channels: DEFAULT_CONV1_CHANNELS,
            conv2_channels: DEFAULT_CONV2_CHANNELS,
            pool_size: DEFAULT_POOL_SIZE,
            classes: DEFAULT_CLASSES,
        }
    }
}

/// 训练参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    pub epochs: usize,
    /// 每个 epoch 第一个样本的学习率
    pub initial_learning_rate: f64,
    /// 每个 epoch 最后一个样本的学习率
    pub final_learning_rate: f64,
    pub train_samples: usize,
    pub test_samples: usize,
    /// 测试样本在数据集中的起始位置
    pub test_offset: usize,
    /// 权重初始化的随机种子，`None`则取系统熵
    pub seed: Option<u64>,
    /// 每隔多少个样本输出一次 info 级别的训练日志
    pub log_every: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 1,
            initial_learning_rate: 0.03,
            final_learning_rate: 0.001,
            train_samples: 5000,
            test_samples: 10000,
            test_offset: 30000,
            seed: None,
            log_every: 500,
        }
    }
}

impl TrainOptions {
    /// 第`n`个样本（从0计）的学习率：在一个 epoch 内线性衰减
    ///
    /// `α = α0 - (α0 - α1) * n / (train_num - 1)`；`train_num <= 1`时恒为`α0`
    pub fn learning_rate(&self, n: usize, train_num: usize) -> f64 {
        if train_num <= 1 {
            return self.initial_learning_rate;
        }
        let decay = self.initial_learning_rate - self.final_learning_rate;
        self.initial_learning_rate - decay * n as f64 / (train_num - 1) as f64
    }

    /// 从 JSON 文件读取，缺省字段取默认值
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, NnError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NnError::ConfigError(format!("读取{}失败: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, NnError> {
        serde_json::from_str(text).map_err(|e| NnError::ConfigError(format!("解析 JSON 失败: {e}")))
    }
}
