//! # MNIST 卷积神经网络示例
//!
//! 5 层 CNN：Conv(5x5, 6) → MaxPool(2) → Conv(5x5, 12) → MaxPool(2) → 全连接 Softmax(10)
//! - 逐样本 SGD，学习率在一个 epoch 内从 0.03 线性衰减到 0.001
//! - 用训练集前 5000 张训练，再用训练集第 30000..40000 张测试
//!
//! ## 运行
//! ```bash
//! RUST_LOG=info cargo run --release --example mnist_cnn -- <数据目录> [训练参数.json]
//! ```
//!
//! ## 数据集
//! 数据目录下需有 `train-images-idx3-ubyte`、`train-labels-idx1-ubyte`（或对应的 .gz 文件）

use std::error::Error;
use std::time::Instant;

use only_cnn::context::ExecutionContext;
use only_cnn::data::MnistDataset;
use only_cnn::nn::{Cnn, CnnConfig, TrainOptions, test, train};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    println!("=== MNIST 卷积神经网络示例 ===\n");

    let mut args = std::env::args().skip(1);
    let data_dir = args.next().ok_or("用法: mnist_cnn <数据目录> [训练参数.json]")?;
    let opts = match args.next() {
        Some(path) => TrainOptions::from_json_file(path)?,
        None => TrainOptions::default(),
    };

    // 1. 加载数据
    println!("[1/4] 加载 MNIST 数据集...");
    let load_start = Instant::now();
    let dataset = MnistDataset::load(&data_dir, true)?;
    println!(
        "  ✓ 共 {} 样本 ({:.1}s)",
        dataset.len(),
        load_start.elapsed().as_secs_f32()
    );

    // 2. 配置
    let config = CnnConfig::default();
    println!("\n[2/4] 配置：");
    println!("  - Epochs: {}", opts.epochs);
    println!("  - 训练样本: {}", opts.train_samples);
    println!(
        "  - 测试样本: {} (从第 {} 个开始)",
        opts.test_samples, opts.test_offset
    );
    println!(
        "  - 学习率: {} → {}",
        opts.initial_learning_rate, opts.final_learning_rate
    );

    // 3. 训练
    let ctx = match opts.seed {
        Some(seed) => ExecutionContext::parallel().with_seed(seed),
        None => ExecutionContext::parallel(),
    };
    let mut cnn = Cnn::new(&ctx, &config)?;
    println!(
        "\n  网络: {:?} → {:?} → {:?} → {:?} → {:?} → {}",
        cnn.conv1().input_shape(),
        cnn.conv1().output_shape(),
        cnn.pool1().output_shape(),
        cnn.conv2().output_shape(),
        cnn.pool2().output_shape(),
        cnn.output().output_num()
    );

    println!("\n[3/4] 开始训练...");
    let train_start = Instant::now();
    let (train_images, train_labels) = dataset.range(0, opts.train_samples)?;
    let report = train(&ctx, &mut cnn, train_images, train_labels, &opts)?;
    for epoch in 0..report.epochs {
        if let Some(loss) = report.epoch_mean_loss(epoch) {
            println!("  Epoch {:2}: loss = {:.4}", epoch + 1, loss);
        }
    }
    println!("  ✓ 训练耗时 {:.1}s", train_start.elapsed().as_secs_f32());

    // 4. 测试
    println!("\n[4/4] 测试...");
    let test_start = Instant::now();
    let (test_images, test_labels) = dataset.range(opts.test_offset, opts.test_samples)?;
    let error_rate = test(&ctx, &mut cnn, test_images, test_labels, opts.test_samples)?;
    println!("  ✓ 测试耗时 {:.1}s", test_start.elapsed().as_secs_f32());

    println!("\n识别成功率: {:.2}%", (1.0 - error_rate) * 100.0);
    Ok(())
}
