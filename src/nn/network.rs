/*
 * @Description  : 5 层卷积神经网络 Conv1 → Pool1 → Conv2 → Pool2 → Output
 *
 * 每个训练样本依次经过四个阶段：前向传播 → 反向传播 → 参数更新 → 清零中间量。
 * 各层只通过显式传入的（源层，目标层）参数交换数据，网络中不保存任何层间引用。
 */

use crate::context::ExecutionContext;
use crate::nn::config::CnnConfig;
use crate::nn::layer::{ConvLayer, OutputLayer, PoolLayer, PoolMode};
use crate::nn::loss::{argmax, cross_entropy};
use crate::nn::NnError;
use crate::tensor::Tensor;

/// 卷积神经网络
#[derive(Debug, Clone)]
pub struct Cnn {
    conv1: ConvLayer,
    pool1: PoolLayer,
    conv2: ConvLayer,
    pool2: PoolLayer,
    output: OutputLayer,
    /// 本样本的输出误差 `预测 - 目标`
    error: Tensor,
}

impl Cnn {
    /// 按配置构建网络并初始化权重（随机数来自`ctx`）
    pub fn new(ctx: &ExecutionContext, config: &CnnConfig) -> Result<Self, NnError> {
        let mut rng = ctx.rng();

        let conv1 = ConvLayer::new(
            &mut rng,
            config.input_size,
            config.kernel_size,
            config.input_channels,
            config.conv1_channels,
        )?;
        let pool1 = PoolLayer::new(
            conv1.output_size(),
            config.pool_size,
            conv1.out_channels(),
            PoolMode::Max,
        )?;
        let conv2 = ConvLayer::new(
            &mut rng,
            pool1.output_size(),
            config.kernel_size,
            pool1.channels(),
            config.conv2_channels,
        )?;
        let pool2 = PoolLayer::new(
            conv2.output_size(),
            config.pool_size,
            conv2.out_channels(),
            PoolMode::Max,
        )?;
        let (rows, cols) = pool2.output_size();
        let output = OutputLayer::new(&mut rng, [pool2.channels(), rows, cols], config.classes)?;

        log::debug!(
            "网络结构：输入 {:?} → conv1 {:?} → pool1 {:?} → conv2 {:?} → pool2 {:?} → 输出 {}→{}",
            conv1.input_shape(),
            conv1.output_shape(),
            pool1.output_shape(),
            conv2.output_shape(),
            pool2.output_shape(),
            output.input_num(),
            output.output_num()
        );

        Ok(Self {
            error: Tensor::zeros(&[output.output_num()]),
            conv1,
            pool1,
            conv2,
            pool2,
            output,
        })
    }

    /// 前向传播，返回输出层的 softmax 概率
    pub fn forward(&mut self, ctx: &ExecutionContext, input: &Tensor) -> Result<&Tensor, NnError> {
        self.conv1.forward(ctx, input)?;
        self.pool1.forward(ctx, self.conv1.activation())?;
        self.conv2.forward(ctx, self.pool1.activation())?;
        self.pool2.forward(ctx, self.conv2.activation())?;
        self.output.forward(ctx, self.pool2.activation())?;
        log::trace!("输出概率：\n{}", self.output.activation());
        Ok(self.output.activation())
    }

    /// 反向传播：从输出误差出发，逐层把梯度传回 conv1
    pub fn backward(&mut self, ctx: &ExecutionContext, target: &Tensor) -> Result<(), NnError> {
        self.output.seed_gradient(ctx, target, &mut self.error)?;
        self.output.backprop_into_pool(ctx, &mut self.pool2)?;
        self.conv2.backprop_from_pool(ctx, &mut self.pool2)?;
        self.conv2.backprop_into_pool(ctx, &mut self.pool1)?;
        self.conv1.backprop_from_pool(ctx, &mut self.pool1)?;
        Ok(())
    }

    /// 用本样本的梯度更新两个卷积层和输出层的参数
    pub fn apply_gradients(
        &mut self,
        ctx: &ExecutionContext,
        input: &Tensor,
        learning_rate: f64,
    ) -> Result<(), NnError> {
        self.conv1.apply_gradients(ctx, input, learning_rate)?;
        self.conv2
            .apply_gradients(ctx, self.pool1.activation(), learning_rate)?;
        self.output
            .apply_gradients(ctx, self.pool2.activation(), learning_rate)?;
        Ok(())
    }

    /// 清零所有层的中间量，为下一个样本做准备；参数不受影响
    pub fn clear(&mut self) {
        self.conv1.clear();
        self.pool1.clear();
        self.conv2.clear();
        self.pool2.clear();
        self.output.clear();
        self.error.fill_zero();
    }

    /// 对一个样本完整走一遍训练流程，返回该样本的交叉熵损失
    pub fn train_step(
        &mut self,
        ctx: &ExecutionContext,
        input: &Tensor,
        target: &Tensor,
        learning_rate: f64,
    ) -> Result<f64, NnError> {
        let result = self.train_step_inner(ctx, input, target, learning_rate);
        self.clear();
        result
    }

    fn train_step_inner(
        &mut self,
        ctx: &ExecutionContext,
        input: &Tensor,
        target: &Tensor,
        learning_rate: f64,
    ) -> Result<f64, NnError> {
        self.forward(ctx, input)?;
        self.backward(ctx, target)?;
        self.apply_gradients(ctx, input, learning_rate)?;
        cross_entropy(self.output.activation(), target)
    }

    /// 仅前向传播，返回预测类别
    pub fn predict(&mut self, ctx: &ExecutionContext, input: &Tensor) -> Result<usize, NnError> {
        let result = self.forward(ctx, input).and_then(|probs| {
            argmax(probs).ok_or_else(|| NnError::InvalidArgument("输出为空".to_string()))
        });
        self.clear();
        result
    }
}

// 属性
impl Cnn {
    pub fn conv1(&self) -> &ConvLayer {
        &self.conv1
    }

    pub fn pool1(&self) -> &PoolLayer {
        &self.pool1
    }

    pub fn conv2(&self) -> &ConvLayer {
        &self.conv2
    }

    pub fn pool2(&self) -> &PoolLayer {
        &self.pool2
    }

    pub fn output(&self) -> &OutputLayer {
        &self.output
    }

    pub fn error(&self) -> &Tensor {
        &self.error
    }

    pub fn conv1_mut(&mut self) -> &mut ConvLayer {
        &mut self.conv1
    }

    pub fn conv2_mut(&mut self) -> &mut ConvLayer {
        &mut self.conv2
    }

    pub fn output_mut(&mut self) -> &mut OutputLayer {
        &mut self.output
    }
}
