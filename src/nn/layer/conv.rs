/*
 * @Description  : 卷积层（valid 模式，无填充，步长 1）+ ReLU
 *
 * 设计决策：
 * - 卷积核形状为 [C_in, C_out, K, K]，前向时先对所有输入通道求和，再加偏置、过激活
 * - 前向传播把结果累加到当前的 `pre_activation` 上，因此每个样本结束后必须调用 `clear`
 * - 反向传播所需的翻转核、零填充梯度缓冲在构造时一次性分配，跨样本复用
 */

use rand::Rng;

use crate::context::ExecutionContext;
use crate::nn::NnError;
use crate::nn::layer::PoolLayer;
use crate::tensor::Tensor;

const LAYER: &str = "卷积";

#[inline]
fn relu(x: f64) -> f64 {
    if x <= 0. { 0. } else { x }
}

/// ReLU 的导数：激活值大于0时为1，否则为0
#[inline]
fn relu_derivative(activation: f64) -> f64 {
    if activation > 0. { 1. } else { 0. }
}

/// 卷积层
#[derive(Debug, Clone)]
pub struct ConvLayer {
    input_size: (usize, usize), // (H, W)
    output_size: (usize, usize), // (H-K+1, W-K+1)
    kernel_size: usize,
    in_channels: usize,
    out_channels: usize,

    /// [C_in, C_out, K, K]
    kernel: Tensor,
    /// [C_out]
    bias: Tensor,

    // 每个样本的中间量，形状均为 [C_out, outH, outW]
    pre_activation: Tensor,
    activation: Tensor,
    grad: Tensor,

    // 反向传播缓冲
    /// 旋转180°后的卷积核 [C_in, C_out, K, K]
    flipped_kernel: Tensor,
    /// 四周各补 K-1 个零的梯度 [C_out, outH+2K-2, outW+2K-2]
    padded_grad: Tensor,
}

impl ConvLayer {
    /// 创建卷积层，并以`[-1,1) * sqrt(6 / (K²(C_in+C_out)))`均匀初始化卷积核，偏置为0
    ///
    /// # 参数
    /// - `input_size`: 输入特征图尺寸 (H, W)
    /// - `kernel_size`: 卷积核边长 K
    /// - `in_channels` / `out_channels`: 输入、输出通道数
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        input_size: (usize, usize),
        kernel_size: usize,
        in_channels: usize,
        out_channels: usize,
    ) -> Result<Self, NnError> {
        let (input_h, input_w) = input_size;
        if kernel_size == 0 {
            return Err(NnError::invalid_layer(LAYER, "卷积核尺寸须≥1"));
        }
        if in_channels == 0 || out_channels == 0 {
            return Err(NnError::invalid_layer(
                LAYER,
                format!("通道数须≥1，得到 {in_channels}→{out_channels}"),
            ));
        }
        if kernel_size > input_h || kernel_size > input_w {
            return Err(NnError::invalid_layer(
                LAYER,
                format!("卷积核 {kernel_size}x{kernel_size} 超出输入尺寸 {input_h}x{input_w}"),
            ));
        }

        let output_h = input_h - kernel_size + 1;
        let output_w = input_w - kernel_size + 1;
        let kernel_shape = [in_channels, out_channels, kernel_size, kernel_size];
        let output_shape = [out_channels, output_h, output_w];

        let fan = (kernel_size * kernel_size * (in_channels + out_channels)) as f64;
        let kernel = Tensor::new_uniform(rng, (6.0 / fan).sqrt(), &kernel_shape);

        Ok(Self {
            input_size,
            output_size: (output_h, output_w),
            kernel_size,
            in_channels,
            out_channels,
            kernel,
            bias: Tensor::zeros(&[out_channels]),
            pre_activation: Tensor::zeros(&output_shape),
            activation: Tensor::zeros(&output_shape),
            grad: Tensor::zeros(&output_shape),
            flipped_kernel: Tensor::zeros(&kernel_shape),
            padded_grad: Tensor::zeros(&[
                out_channels,
                output_h + 2 * kernel_size - 2,
                output_w + 2 * kernel_size - 2,
            ]),
        })
    }

    /// 前向传播
    ///
    /// `pre[i,r,c] += Σ_j Σ_{x,y} input[j,r+x,c+y] * kernel[j,i,x,y]`，
    /// `act[i,r,c] = max(0, pre[i,r,c] + bias[i])`
    pub fn forward(&mut self, ctx: &ExecutionContext, input: &Tensor) -> Result<(), NnError> {
        NnError::check_shape(LAYER, &self.input_shape(), input.shape())?;

        let k = self.kernel_size;
        let in_channels = self.in_channels;
        let kernel = &self.kernel;
        ctx.update(&mut self.pre_activation, |index, pre| {
            let (i, r, c) = (index[0], index[1], index[2]);
            let mut sum = 0.0;
            for j in 0..in_channels {
                for x in 0..k {
                    for y in 0..k {
                        sum += input[[j, r + x, c + y]] * kernel[[j, i, x, y]];
                    }
                }
            }
            pre + sum
        });

        let pre_activation = &self.pre_activation;
        let bias = &self.bias;
        ctx.update(&mut self.activation, |index, _| {
            relu(pre_activation[index] + bias[[index[0]]])
        });
        Ok(())
    }

    /// 池化层 → 本层：把池化层的梯度按最大值位置上采样，再乘以本层 ReLU 的导数
    pub fn backprop_from_pool(
        &mut self,
        ctx: &ExecutionContext,
        pool: &mut PoolLayer,
    ) -> Result<(), NnError> {
        NnError::check_shape(
            LAYER,
            &self.output_shape(),
            &[pool.channels(), pool.input_size().0, pool.input_size().1],
        )?;
        pool.upsample_grad(ctx);

        let upsampled = pool.upsampled_grad();
        let (up_h, up_w) = (upsampled.shape()[1], upsampled.shape()[2]);
        let activation = &self.activation;
        ctx.update(&mut self.grad, |index, _| {
            let (i, r, c) = (index[0], index[1], index[2]);
            // 池化时被截掉的余数行列没有梯度
            if r >= up_h || c >= up_w {
                return 0.;
            }
            upsampled[[i, r, c]] * relu_derivative(activation[[i, r, c]])
        });
        Ok(())
    }

    /// 本层 → 前一个池化层：`dest.grad[i] += Σ_j full_corr(flip(kernel[i,j]), pad(grad[j]))`
    ///
    /// 即“翻转卷积核后与补零梯度做全相关”，结果尺寸恰为本层输入尺寸 (H, W)
    pub fn backprop_into_pool(
        &mut self,
        ctx: &ExecutionContext,
        dest: &mut PoolLayer,
    ) -> Result<(), NnError> {
        NnError::check_shape(LAYER, &self.input_shape(), dest.output_shape().as_slice())?;

        let k = self.kernel_size;
        let (out_h, out_w) = self.output_size;

        // 1. 翻转卷积核
        let kernel = &self.kernel;
        ctx.update(&mut self.flipped_kernel, |index, _| {
            kernel[[index[0], index[1], k - 1 - index[2], k - 1 - index[3]]]
        });

        // 2. 梯度四周补 K-1 个零
        let grad = &self.grad;
        ctx.update(&mut self.padded_grad, |index, _| {
            let (j, x, y) = (index[0], index[1], index[2]);
            if x < k - 1 || y < k - 1 || x - (k - 1) >= out_h || y - (k - 1) >= out_w {
                0.
            } else {
                grad[[j, x - (k - 1), y - (k - 1)]]
            }
        });

        // 3. 全相关并在输出通道上累加
        let out_channels = self.out_channels;
        let flipped = &self.flipped_kernel;
        let padded = &self.padded_grad;
        ctx.update(dest.grad_mut(), |index, d| {
            let (i, x, y) = (index[0], index[1], index[2]);
            let mut sum = 0.0;
            for j in 0..out_channels {
                for m in 0..k {
                    for n in 0..k {
                        sum += padded[[j, x + m, y + n]] * flipped[[i, j, m, n]];
                    }
                }
            }
            d + sum
        });
        Ok(())
    }

    /// 参数更新
    ///
    /// - `kernel[j,i,r,c] -= lr * Σ_{x,y} grad[i,x,y] * input[j,r+x,c+y]`
    /// - `bias[i] -= lr * Σ_{x,y} grad[i,x,y]`
    pub fn apply_gradients(
        &mut self,
        ctx: &ExecutionContext,
        input: &Tensor,
        learning_rate: f64,
    ) -> Result<(), NnError> {
        NnError::check_shape(LAYER, &self.input_shape(), input.shape())?;

        let (out_h, out_w) = self.output_size;
        let grad = &self.grad;
        ctx.update(&mut self.kernel, |index, w| {
            let (j, i, r, c) = (index[0], index[1], index[2], index[3]);
            let mut sum = 0.0;
            for x in 0..out_h {
                for y in 0..out_w {
                    sum += grad[[i, x, y]] * input[[j, r + x, c + y]];
                }
            }
            w - learning_rate * sum
        });

        ctx.update(&mut self.bias, |index, b| {
            let i = index[0];
            let mut sum = 0.0;
            for x in 0..out_h {
                for y in 0..out_w {
                    sum += grad[[i, x, y]];
                }
            }
            b - learning_rate * sum
        });
        Ok(())
    }

    /// 清零本样本的中间量（pre_activation、activation、grad）
    pub fn clear(&mut self) {
        self.pre_activation.fill_zero();
        self.activation.fill_zero();
        self.grad.fill_zero();
    }
}

// 属性
impl ConvLayer {
    pub const fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    pub const fn output_size(&self) -> (usize, usize) {
        self.output_size
    }

    pub const fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub const fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub const fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// [C_in, H, W]
    pub fn input_shape(&self) -> Vec<usize> {
        vec![self.in_channels, self.input_size.0, self.input_size.1]
    }

    /// [C_out, outH, outW]
    pub fn output_shape(&self) -> Vec<usize> {
        vec![self.out_channels, self.output_size.0, self.output_size.1]
    }

    pub fn kernel(&self) -> &Tensor {
        &self.kernel
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    pub fn pre_activation(&self) -> &Tensor {
        &self.pre_activation
    }

    pub fn activation(&self) -> &Tensor {
        &self.activation
    }

    pub fn grad(&self) -> &Tensor {
        &self.grad
    }

    pub fn flipped_kernel(&self) -> &Tensor {
        &self.flipped_kernel
    }

    /// 替换卷积核，形状须为 [C_in, C_out, K, K]
    pub fn set_kernel(&mut self, kernel: Tensor) -> Result<(), NnError> {
        NnError::check_shape(LAYER, self.kernel.shape(), kernel.shape())?;
        self.kernel = kernel;
        Ok(())
    }

    /// 替换偏置，形状须为 [C_out]
    pub fn set_bias(&mut self, bias: Tensor) -> Result<(), NnError> {
        NnError::check_shape(LAYER, self.bias.shape(), bias.shape())?;
        self.bias = bias;
        Ok(())
    }

    pub(crate) fn grad_mut(&mut self) -> &mut Tensor {
        &mut self.grad
    }
}
