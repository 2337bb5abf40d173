/*
 * @Description  : 训练与测试循环
 *
 * 逐样本 SGD（不做批处理）；学习率由样本序号直接算出，不保存为可变状态
 */

use std::time::Instant;

use crate::context::ExecutionContext;
use crate::nn::config::TrainOptions;
use crate::nn::loss::argmax;
use crate::nn::network::Cnn;
use crate::nn::NnError;
use crate::tensor::Tensor;

/// 训练结果
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    /// 每个 epoch 内每个样本的损失，长度为 `epochs * train_samples`
    pub losses: Vec<f64>,
    pub epochs: usize,
    pub samples_per_epoch: usize,
}

impl TrainReport {
    /// 全部样本的平均损失
    pub fn mean_loss(&self) -> f64 {
        if self.losses.is_empty() {
            return 0.;
        }
        self.losses.iter().sum::<f64>() / self.losses.len() as f64
    }

    /// 第`epoch`个 epoch 的平均损失
    pub fn epoch_mean_loss(&self, epoch: usize) -> Option<f64> {
        let start = epoch.checked_mul(self.samples_per_epoch)?;
        let end = start.checked_add(self.samples_per_epoch)?;
        let losses = self.losses.get(start..end)?;
        if losses.is_empty() {
            return None;
        }
        Some(losses.iter().sum::<f64>() / losses.len() as f64)
    }
}

fn check_samples(images: &[Tensor], labels: &[Tensor], count: usize) -> Result<(), NnError> {
    if images.len() != labels.len() {
        return Err(NnError::InvalidArgument(format!(
            "图像数量 {} 与标签数量 {} 不一致",
            images.len(),
            labels.len()
        )));
    }
    if count == 0 || count > images.len() {
        return Err(NnError::InvalidArgument(format!(
            "样本数须在 1..={} 之间，得到 {count}",
            images.len()
        )));
    }
    Ok(())
}

/// 训练：`epochs × train_samples` 次（前向、反向、更新、清零）
///
/// 使用前`opts.train_samples`个样本
pub fn train(
    ctx: &ExecutionContext,
    cnn: &mut Cnn,
    images: &[Tensor],
    labels: &[Tensor],
    opts: &TrainOptions,
) -> Result<TrainReport, NnError> {
    let train_num = opts.train_samples;
    check_samples(images, labels, train_num)?;

    let start = Instant::now();
    let mut losses = Vec::with_capacity(opts.epochs * train_num);
    for epoch in 0..opts.epochs {
        let mut epoch_loss = 0.;
        for n in 0..train_num {
            let alpha = opts.learning_rate(n, train_num);
            let loss = cnn.train_step(ctx, &images[n], &labels[n], alpha)?;
            epoch_loss += loss;
            losses.push(loss);

            log::debug!("epoch={epoch}, n={n}, loss={loss}, alpha={alpha}");
            if opts.log_every > 0 && (n + 1) % opts.log_every == 0 {
                log::info!(
                    "epoch {epoch}: {}/{train_num}，近期平均损失 {:.4}，学习率 {alpha:.5}",
                    n + 1,
                    losses[losses.len() - opts.log_every..].iter().sum::<f64>()
                        / opts.log_every as f64
                );
            }
        }
        log::info!(
            "epoch {epoch} 完成：平均损失 {:.4}，累计耗时 {:.1}s",
            epoch_loss / train_num as f64,
            start.elapsed().as_secs_f32()
        );
    }

    Ok(TrainReport {
        losses,
        epochs: opts.epochs,
        samples_per_epoch: train_num,
    })
}

/// 测试：仅做前向传播，返回错误率 `错误数 / count`
///
/// 使用前`count`个样本
pub fn test(
    ctx: &ExecutionContext,
    cnn: &mut Cnn,
    images: &[Tensor],
    labels: &[Tensor],
    count: usize,
) -> Result<f64, NnError> {
    check_samples(images, labels, count)?;

    let mut incorrect = 0usize;
    for n in 0..count {
        let predicted = cnn.predict(ctx, &images[n])?;
        let expected = argmax(&labels[n])
            .ok_or_else(|| NnError::InvalidArgument(format!("第{n}个标签为空")))?;
        if predicted == expected {
            log::trace!("n:{n}，识别成功");
        } else {
            incorrect += 1;
            log::debug!("n:{n}，识别失败：预测 {predicted}，实际 {expected}");
        }
    }
    log::info!("测试完成：{incorrect}/{count} 个样本识别失败");
    Ok(incorrect as f64 / count as f64)
}
