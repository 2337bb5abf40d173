/*
 * @Description  : 全连接 + Softmax 输出层
 *
 * 设计决策：
 * - 输入为最后一个池化层的 [C, H, W] 特征图，按行优先展平为 N 维向量
 * - softmax 不减去最大值，直接对原始值取指数；溢出产生的 NaN/Inf 会被检测并以错误返回
 * - softmax + 交叉熵的梯度直接取 `预测 - 目标`
 */

use rand::Rng;

use crate::context::ExecutionContext;
use crate::nn::NnError;
use crate::nn::layer::PoolLayer;
use crate::tensor::{Tensor, flat_index};

const LAYER: &str = "输出";

/// 输出层
#[derive(Debug, Clone)]
pub struct OutputLayer {
    /// 输入特征图的形状 [C, H, W]
    input_shape: [usize; 3],
    input_num: usize,
    output_num: usize,

    /// [M, N]
    weights: Tensor,
    /// [M]
    bias: Tensor,

    // 每个样本的中间量，形状均为 [M]
    pre_activation: Tensor,
    activation: Tensor,
    grad: Tensor,
}

impl OutputLayer {
    /// 创建输出层，权重以`[-1,1) * sqrt(6 / (M+N))`均匀初始化，偏置为0
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        input_shape: [usize; 3],
        output_num: usize,
    ) -> Result<Self, NnError> {
        let input_num = input_shape.iter().product::<usize>();
        if input_num == 0 || output_num == 0 {
            return Err(NnError::invalid_layer(
                LAYER,
                format!("输入形状 {input_shape:?} 与输出单元数 {output_num} 都不能为0"),
            ));
        }

        let scale = (6.0 / (input_num + output_num) as f64).sqrt();
        Ok(Self {
            input_shape,
            input_num,
            output_num,
            weights: Tensor::new_uniform(rng, scale, &[output_num, input_num]),
            bias: Tensor::zeros(&[output_num]),
            pre_activation: Tensor::zeros(&[output_num]),
            activation: Tensor::zeros(&[output_num]),
            grad: Tensor::zeros(&[output_num]),
        })
    }

    /// 前向传播：`pre = W·x`，`act = softmax(pre + bias)`
    ///
    /// 若 softmax 结果含 NaN/Inf，激活值仍会写入，但返回`NumericInstability`
    pub fn forward(&mut self, ctx: &ExecutionContext, input: &Tensor) -> Result<(), NnError> {
        NnError::check_shape(LAYER, &self.input_shape, input.shape())?;

        let x = input.to_vec();
        let input_num = self.input_num;
        let weights = &self.weights;
        ctx.update(&mut self.pre_activation, |index, _| {
            let i = index[0];
            (0..input_num).map(|k| weights[[i, k]] * x[k]).sum::<f64>()
        });

        // softmax 是跨输出单元的归约，按固定顺序串行求和
        let exps: Vec<f64> = (0..self.output_num)
            .map(|i| (self.pre_activation[[i]] + self.bias[[i]]).exp())
            .collect();
        let sum: f64 = exps.iter().sum();
        for (i, e) in exps.into_iter().enumerate() {
            self.activation[[i]] = e / sum;
        }

        if !self.activation.is_finite() {
            return Err(NnError::NumericInstability {
                layer: LAYER.to_string(),
                detail: format!("softmax 分母为 {sum}，预激活值为\n{}", self.pre_activation),
            });
        }
        Ok(())
    }

    /// 反向传播起点：`error[i] = act[i] - target[i]`，同时作为本层的梯度
    pub fn seed_gradient(
        &mut self,
        ctx: &ExecutionContext,
        target: &Tensor,
        error: &mut Tensor,
    ) -> Result<(), NnError> {
        NnError::check_shape(LAYER, &[self.output_num], target.shape())?;
        NnError::check_shape(LAYER, &[self.output_num], error.shape())?;

        let activation = &self.activation;
        ctx.update(error, |index, _| activation[index] - target[index]);
        let error = &*error;
        ctx.update(&mut self.grad, |index, _| error[index]);
        Ok(())
    }

    /// 本层 → 前一个池化层：`dest.grad[c,r,col] += Σ_j grad[j] * W[j, flat(c,r,col)]`
    pub fn backprop_into_pool(
        &self,
        ctx: &ExecutionContext,
        dest: &mut PoolLayer,
    ) -> Result<(), NnError> {
        NnError::check_shape(LAYER, &self.input_shape, &dest.output_shape())?;

        let [_, rows, cols] = self.input_shape;
        let output_num = self.output_num;
        let grad = &self.grad;
        let weights = &self.weights;
        ctx.update(dest.grad_mut(), |index, d| {
            let k = flat_index(index[0], index[1], index[2], rows, cols);
            d + (0..output_num).map(|j| grad[[j]] * weights[[j, k]]).sum::<f64>()
        });
        Ok(())
    }

    /// 参数更新：`W[i,j] -= lr * grad[i] * x[j]`，`bias[i] -= lr * grad[i]`
    pub fn apply_gradients(
        &mut self,
        ctx: &ExecutionContext,
        input: &Tensor,
        learning_rate: f64,
    ) -> Result<(), NnError> {
        NnError::check_shape(LAYER, &self.input_shape, input.shape())?;

        let x = input.to_vec();
        let grad = &self.grad;
        ctx.update(&mut self.weights, |index, w| {
            w - learning_rate * grad[[index[0]]] * x[index[1]]
        });
        ctx.update(&mut self.bias, |index, b| b - learning_rate * grad[index]);
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
impl OutputLayer {
    pub const fn input_shape(&self) -> [usize; 3] {
        self.input_shape
    }

    pub const fn input_num(&self) -> usize {
        self.input_num
    }

    pub const fn output_num(&self) -> usize {
        self.output_num
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
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

    /// 替换权重，形状须为 [M, N]
    pub fn set_weights(&mut self, weights: Tensor) -> Result<(), NnError> {
        NnError::check_shape(LAYER, self.weights.shape(), weights.shape())?;
        self.weights = weights;
        Ok(())
    }

    /// 替换偏置，形状须为 [M]
    pub fn set_bias(&mut self, bias: Tensor) -> Result<(), NnError> {
        NnError::check_shape(LAYER, self.bias.shape(), bias.shape())?;
        self.bias = bias;
        Ok(())
    }

    pub(crate) fn grad_mut(&mut self) -> &mut Tensor {
        &mut self.grad
    }
}
