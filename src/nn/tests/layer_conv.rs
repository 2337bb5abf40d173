/*
 * @Description  : ConvLayer 单元测试
 *
 * 测试策略：
 * 1. 构造参数校验与输出尺寸
 * 2. 前向传播（与手算结果对照、偏置只加一次、累加语义）
 * 3. 反向传播（ReLU 门控、翻转卷积核全相关）
 * 4. 参数更新
 */

use super::tensor;
use crate::context::ExecutionContext;
use crate::nn::{ConvLayer, NnError, PoolLayer, PoolMode};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

/// 3x3 输入 1..9，2x2 卷积核 [[1,2],[3,4]]，单通道
fn hand_layer() -> Result<ConvLayer, NnError> {
    let mut rng = ExecutionContext::serial().with_seed(0).rng();
    let mut conv = ConvLayer::new(&mut rng, (3, 3), 2, 1, 1)?;
    conv.set_kernel(tensor(&[1., 2., 3., 4.], &[1, 1, 2, 2]))?;
    Ok(conv)
}

fn hand_input() -> Tensor {
    tensor(&[1., 2., 3., 4., 5., 6., 7., 8., 9.], &[1, 3, 3])
}

// ==================== 构造 ====================

#[test]
fn test_conv_default_sizes() -> Result<(), NnError> {
    let mut rng = ExecutionContext::serial().with_seed(1).rng();
    let conv1 = ConvLayer::new(&mut rng, (28, 28), 5, 1, 6)?;
    assert_eq!(conv1.output_size(), (24, 24));
    assert_eq!(conv1.kernel().shape(), &[1, 6, 5, 5]);
    assert_eq!(conv1.bias().shape(), &[6]);
    assert_eq!(conv1.output_shape(), vec![6, 24, 24]);

    let conv2 = ConvLayer::new(&mut rng, (12, 12), 5, 6, 12)?;
    assert_eq!(conv2.output_size(), (8, 8));
    assert_eq!(conv2.kernel().shape(), &[6, 12, 5, 5]);
    Ok(())
}

#[test]
fn test_conv_init_range() -> Result<(), NnError> {
    let mut rng = ExecutionContext::serial().with_seed(2).rng();
    let conv = ConvLayer::new(&mut rng, (12, 12), 5, 6, 12)?;
    let scale = (6.0_f64 / (25.0 * 18.0)).sqrt();
    assert!(conv.kernel().iter().all(|w| w.abs() <= scale));
    assert_eq!(conv.bias().sum(), 0.);
    Ok(())
}

#[test]
fn test_conv_invalid_params() {
    let mut rng = ExecutionContext::serial().with_seed(0).rng();
    assert!(matches!(
        ConvLayer::new(&mut rng, (4, 4), 5, 1, 1),
        Err(NnError::InvalidLayer { .. })
    ));
    assert!(matches!(
        ConvLayer::new(&mut rng, (8, 3), 4, 1, 1),
        Err(NnError::InvalidLayer { .. })
    ));
    assert!(matches!(
        ConvLayer::new(&mut rng, (4, 4), 0, 1, 1),
        Err(NnError::InvalidLayer { .. })
    ));
    assert!(matches!(
        ConvLayer::new(&mut rng, (4, 4), 2, 0, 1),
        Err(NnError::InvalidLayer { .. })
    ));
}

#[test]
fn test_conv_set_kernel_wrong_shape() -> Result<(), NnError> {
    let mut conv = hand_layer()?;
    let result = conv.set_kernel(Tensor::zeros(&[1, 1, 3, 3]));
    assert!(matches!(result, Err(NnError::ShapeMismatch { .. })));
    Ok(())
}

// ==================== 前向传播 ====================

#[test]
fn test_conv_forward_by_hand() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut conv = hand_layer()?;
    conv.set_bias(tensor(&[-50.], &[1]))?;
    conv.forward(&ctx, &hand_input())?;

    // 1*1+2*2+4*3+5*4 = 37，其余窗口依次平移
    assert_eq!(conv.pre_activation(), &tensor(&[37., 47., 67., 77.], &[1, 2, 2]));
    assert_eq!(conv.activation(), &tensor(&[0., 0., 17., 27.], &[1, 2, 2]));
    Ok(())
}

#[test]
fn test_conv_forward_bias_added_once() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut rng = ctx.rng();
    let mut conv = ConvLayer::new(&mut rng, (1, 1), 1, 2, 1)?;
    conv.set_kernel(tensor(&[1., 1.], &[2, 1, 1, 1]))?;
    conv.set_bias(tensor(&[0.5], &[1]))?;
    conv.forward(&ctx, &tensor(&[1., 2.], &[2, 1, 1]))?;

    // 两个输入通道先求和，偏置只加一次
    assert_eq!(conv.pre_activation()[[0, 0, 0]], 3.);
    assert_eq!(conv.activation()[[0, 0, 0]], 3.5);
    Ok(())
}

#[test]
fn test_conv_forward_accumulates_until_clear() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut conv = hand_layer()?;
    conv.forward(&ctx, &hand_input())?;
    conv.forward(&ctx, &hand_input())?;
    assert_eq!(conv.pre_activation(), &tensor(&[74., 94., 134., 154.], &[1, 2, 2]));

    conv.clear();
    conv.forward(&ctx, &hand_input())?;
    assert_eq!(conv.pre_activation(), &tensor(&[37., 47., 67., 77.], &[1, 2, 2]));
    Ok(())
}

#[test]
fn test_conv_forward_shape_mismatch() -> Result<(), NnError> {
    let mut conv = hand_layer()?;
    let result = conv.forward(&ExecutionContext::serial(), &Tensor::zeros(&[1, 4, 4]));
    assert!(matches!(result, Err(NnError::ShapeMismatch { .. })));
    Ok(())
}

// ==================== 反向传播 ====================

#[test]
fn test_conv_backprop_from_pool_relu_gating() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut rng = ctx.rng();
    let mut conv = ConvLayer::new(&mut rng, (4, 4), 1, 1, 1)?;
    conv.set_kernel(tensor(&[1.], &[1, 1, 1, 1]))?;
    conv.set_bias(tensor(&[-4.5], &[1]))?;
    #[rustfmt::skip]
    let input = tensor(&[
        1., 3., 2., 4.,
        5., 6., 1., 0.,
        9., 2., 8., 7.,
        0., 1., 3., 4.,
    ], &[1, 4, 4]);
    conv.forward(&ctx, &input)?;

    let mut pool = PoolLayer::new((4, 4), 2, 1, PoolMode::Max)?;
    pool.forward(&ctx, conv.activation())?;
    *pool.grad_mut() = tensor(&[1., 2., 3., 4.], &[1, 2, 2]);
    conv.backprop_from_pool(&ctx, &mut pool)?;

    // 右上窗口激活全为0，最大值取 (0,2)，但 ReLU 导数为0，梯度被截断
    let grad = conv.grad();
    assert_eq!(grad[[0, 1, 1]], 1.);
    assert_eq!(grad[[0, 2, 0]], 3.);
    assert_eq!(grad[[0, 2, 2]], 4.);
    assert_eq!(grad[[0, 0, 2]], 0.);
    assert_eq!(grad.sum(), 8.);
    Ok(())
}

#[test]
fn test_conv_backprop_into_pool_full_correlation() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut conv = hand_layer()?;
    *conv.grad_mut() = tensor(&[1., 0., 0., 2.], &[1, 2, 2]);

    let mut dest = PoolLayer::new((6, 6), 2, 1, PoolMode::Max)?;
    conv.backprop_into_pool(&ctx, &mut dest)?;

    assert_eq!(conv.flipped_kernel(), &tensor(&[4., 3., 2., 1.], &[1, 1, 2, 2]));
    #[rustfmt::skip]
    let expected = tensor(&[
        1., 2., 0.,
        3., 6., 4.,
        0., 6., 8.,
    ], &[1, 3, 3]);
    assert_eq!(dest.grad(), &expected);

    // 目标梯度是累加的
    conv.backprop_into_pool(&ctx, &mut dest)?;
    assert_eq!(dest.grad().sum(), 2. * expected.sum());
    Ok(())
}

#[test]
fn test_conv_backprop_into_pool_sums_output_channels() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut rng = ctx.rng();
    let mut conv = ConvLayer::new(&mut rng, (2, 2), 1, 1, 2)?;
    conv.set_kernel(tensor(&[2., 3.], &[1, 2, 1, 1]))?;
    *conv.grad_mut() = tensor(&[1., 1., 1., 1., 1., 1., 1., 1.], &[2, 2, 2]);

    let mut dest = PoolLayer::new((2, 2), 1, 1, PoolMode::Max)?;
    conv.backprop_into_pool(&ctx, &mut dest)?;
    assert!(dest.grad().iter().all(|&g| g == 5.));
    Ok(())
}

#[test]
fn test_conv_backprop_into_pool_shape_mismatch() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut conv = hand_layer()?;
    let mut dest = PoolLayer::new((8, 8), 2, 1, PoolMode::Max)?;
    let result = conv.backprop_into_pool(&ctx, &mut dest);
    assert!(matches!(result, Err(NnError::ShapeMismatch { .. })));
    Ok(())
}

// ==================== 参数更新 ====================

#[test]
fn test_conv_apply_gradients() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut conv = hand_layer()?;
    conv.set_bias(tensor(&[0.5], &[1]))?;
    *conv.grad_mut() = tensor(&[1., 0., 0., 0.], &[1, 2, 2]);
    conv.apply_gradients(&ctx, &hand_input(), 0.1)?;

    // 只有 grad[0,0] 非零，故 kernel[r,c] -= 0.1 * input[r,c]
    let kernel = conv.kernel();
    assert_abs_diff_eq!(kernel[[0, 0, 0, 0]], 0.9, epsilon = 1e-12);
    assert_abs_diff_eq!(kernel[[0, 0, 0, 1]], 1.8, epsilon = 1e-12);
    assert_abs_diff_eq!(kernel[[0, 0, 1, 0]], 2.6, epsilon = 1e-12);
    assert_abs_diff_eq!(kernel[[0, 0, 1, 1]], 3.5, epsilon = 1e-12);
    // 偏置是“减去”而非“覆盖”：0.5 - 0.1*1
    assert_abs_diff_eq!(conv.bias()[[0]], 0.4, epsilon = 1e-12);
    Ok(())
}

#[test]
fn test_conv_zero_grad_leaves_params() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut conv = hand_layer()?;
    conv.set_bias(tensor(&[0.5], &[1]))?;
    let kernel = conv.kernel().clone();
    conv.apply_gradients(&ctx, &hand_input(), 0.1)?;
    assert_eq!(conv.kernel(), &kernel);
    assert_eq!(conv.bias()[[0]], 0.5);
    Ok(())
}

// ==================== 清零 / 后端一致性 ====================

#[test]
fn test_conv_clear_keeps_params() -> Result<(), NnError> {
    let ctx = ExecutionContext::serial();
    let mut conv = hand_layer()?;
    conv.forward(&ctx, &hand_input())?;
    let kernel = conv.kernel().clone();
    for _ in 0..2 {
        conv.clear();
        assert_eq!(conv.pre_activation().sum(), 0.);
        assert_eq!(conv.activation().sum(), 0.);
        assert_eq!(conv.grad().sum(), 0.);
        assert_eq!(conv.kernel(), &kernel);
    }
    Ok(())
}

#[test]
fn test_conv_parallel_matches_serial() -> Result<(), NnError> {
    let mut rng = ExecutionContext::serial().with_seed(7).rng();
    let mut serial = ConvLayer::new(&mut rng, (12, 12), 5, 3, 4)?;
    let mut parallel = serial.clone();
    let input = Tensor::new_uniform(&mut rng, 1.0, &[3, 12, 12]);

    serial.forward(&ExecutionContext::serial(), &input)?;
    parallel.forward(&ExecutionContext::parallel(), &input)?;
    assert_eq!(serial.pre_activation(), parallel.pre_activation());
    assert_eq!(serial.activation(), parallel.activation());
    Ok(())
}

#[test]
fn test_conv_apply_gradients_parallel_matches_serial() -> Result<(), NnError> {
    let mut rng = ExecutionContext::serial().with_seed(8).rng();
    let mut serial = ConvLayer::new(&mut rng, (10, 10), 3, 2, 3)?;
    let input = Tensor::new_uniform(&mut rng, 1.0, &[2, 10, 10]);
    *serial.grad_mut() = Tensor::new_uniform(&mut rng, 1.0, &[3, 8, 8]);
    let mut parallel = serial.clone();

    // 卷积核为 4 阶张量 [C_in, C_out, K, K]
    serial.apply_gradients(&ExecutionContext::serial(), &input, 0.05)?;
    parallel.apply_gradients(&ExecutionContext::parallel(), &input, 0.05)?;
    assert_eq!(serial.kernel(), parallel.kernel());
    assert_eq!(serial.bias(), parallel.bias());
    Ok(())
}
