/*
 * @Description  : 2D 池化层（窗口不重叠，步长 = 窗口边长 P）
 *
 * 设计决策：
 * - 不混合通道：输入、输出通道数相同
 * - 最大池化记录每个输出位置的最大值在 (outH*P, outW*P) 网格中的线性索引，用于反向传播时路由梯度
 * - 输出尺寸为 floor(输入/P)，除不尽时余下的行列在前向时直接丢弃
 */

use ndarray::{Array, IxDyn};
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::nn::NnError;
use crate::tensor::{Tensor, from_linear, to_linear};

const LAYER: &str = "池化";

/// 池化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PoolMode {
    #[default]
    Max,
    Average,
}

/// 池化层
#[derive(Debug, Clone)]
pub struct PoolLayer {
    input_size: (usize, usize),
    output_size: (usize, usize),
    pool_size: usize,
    channels: usize,
    mode: PoolMode,

    // 每个样本的中间量，形状均为 [C, outH, outW]
    activation: Tensor,
    grad: Tensor,
    /// 最大值位置缓存（平均池化时不使用，恒为0）
    max_position: Array<usize, IxDyn>,

    /// 上采样后的梯度 [C, outH*P, outW*P]
    upsampled_grad: Tensor,
}

impl PoolLayer {
    pub fn new(
        input_size: (usize, usize),
        pool_size: usize,
        channels: usize,
        mode: PoolMode,
    ) -> Result<Self, NnError> {
        let (input_h, input_w) = input_size;
        if pool_size == 0 {
            return Err(NnError::invalid_layer(LAYER, "池化窗口尺寸须≥1"));
        }
        if channels == 0 {
            return Err(NnError::invalid_layer(LAYER, "通道数须≥1"));
        }
        if pool_size > input_h || pool_size > input_w {
            return Err(NnError::invalid_layer(
                LAYER,
                format!("池化窗口 {pool_size}x{pool_size} 超出输入尺寸 {input_h}x{input_w}"),
            ));
        }
        if input_h % pool_size != 0 || input_w % pool_size != 0 {
            log::warn!(
                "池化输入 {input_h}x{input_w} 不能被窗口 {pool_size} 整除，余下的行列将被丢弃"
            );
        }

        let output_h = input_h / pool_size;
        let output_w = input_w / pool_size;
        let output_shape = [channels, output_h, output_w];

        Ok(Self {
            input_size,
            output_size: (output_h, output_w),
            pool_size,
            channels,
            mode,
            activation: Tensor::zeros(&output_shape),
            grad: Tensor::zeros(&output_shape),
            max_position: Array::zeros(IxDyn(&output_shape)),
            upsampled_grad: Tensor::zeros(&[channels, output_h * pool_size, output_w * pool_size]),
        })
    }

    /// 前向传播
    pub fn forward(&mut self, ctx: &ExecutionContext, input: &Tensor) -> Result<(), NnError> {
        NnError::check_shape(
            LAYER,
            &[self.channels, self.input_size.0, self.input_size.1],
            input.shape(),
        )?;

        let p = self.pool_size;
        let grid_w = self.output_size.1 * p;
        match self.mode {
            PoolMode::Max => {
                // 窗口内按行优先扫描，严格大于才替换，故并列时取第一个
                ctx.update_array(&mut self.max_position, |index, _| {
                    let (i, r, c) = (index[0], index[1], index[2]);
                    let mut best = to_linear(r * p, c * p, grid_w);
                    let mut max = input[[i, r * p, c * p]];
                    for m in r * p..r * p + p {
                        for n in c * p..c * p + p {
                            if input[[i, m, n]] > max {
                                max = input[[i, m, n]];
                                best = to_linear(m, n, grid_w);
                            }
                        }
                    }
                    best
                });

                let max_position = &self.max_position;
                ctx.update(&mut self.activation, |index, _| {
                    let (row, col) = from_linear(max_position[index], grid_w);
                    input[[index[0], row, col]]
                });
            }
            PoolMode::Average => {
                let area = (p * p) as f64;
                ctx.update(&mut self.activation, |index, _| {
                    let (i, r, c) = (index[0], index[1], index[2]);
                    let mut sum = 0.0;
                    for m in r * p..r * p + p {
                        for n in c * p..c * p + p {
                            sum += input[[i, m, n]];
                        }
                    }
                    sum / area
                });
            }
        }
        Ok(())
    }

    /// 将池化梯度上采样到 (outH*P, outW*P)：
    /// 最大池化只在缓存的最大值位置放梯度，其余为0；平均池化把梯度均分到整个窗口
    pub fn upsample_grad(&mut self, ctx: &ExecutionContext) {
        let p = self.pool_size;
        let grid_w = self.output_size.1 * p;
        let grad = &self.grad;
        match self.mode {
            PoolMode::Max => {
                let max_position = &self.max_position;
                ctx.update(&mut self.upsampled_grad, |index, _| {
                    let (i, r, c) = (index[0], index[1], index[2]);
                    let pooled = [i, r / p, c / p];
                    if max_position[&pooled[..]] == to_linear(r, c, grid_w) {
                        grad[pooled]
                    } else {
                        0.
                    }
                });
            }
            PoolMode::Average => {
                let area = (p * p) as f64;
                ctx.update(&mut self.upsampled_grad, |index, _| {
                    grad[[index[0], index[1] / p, index[2] / p]] / area
                });
            }
        }
    }

    /// 清零本样本的中间量（activation、grad、最大值位置、上采样缓冲）
    pub fn clear(&mut self) {
        self.activation.fill_zero();
        self.grad.fill_zero();
        self.max_position.fill(0);
        self.upsampled_grad.fill_zero();
    }
}

// 属性
impl PoolLayer {
    pub const fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    pub const fn output_size(&self) -> (usize, usize) {
        self.output_size
    }

    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    pub const fn mode(&self) -> PoolMode {
        self.mode
    }

    /// [C, outH, outW]
    pub fn output_shape(&self) -> Vec<usize> {
        vec![self.channels, self.output_size.0, self.output_size.1]
    }

    pub fn activation(&self) -> &Tensor {
        &self.activation
    }

    pub fn grad(&self) -> &Tensor {
        &self.grad
    }

    /// 最大值位置缓存，值为 (outH*P, outW*P) 网格中的行优先线性索引
    pub fn max_position(&self, channel: usize, row: usize, col: usize) -> usize {
        self.max_position[&[channel, row, col][..]]
    }

    pub fn upsampled_grad(&self) -> &Tensor {
        &self.upsampled_grad
    }

    pub(crate) fn grad_mut(&mut self) -> &mut Tensor {
        &mut self.grad
    }
}
