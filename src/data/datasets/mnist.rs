//! MNIST 手写数字数据集
//!
//! 支持：
//! - IDX 二进制格式解析（支持 .gz 压缩）
//! - 像素归一化 (0-255 → 0-1)
//! - 标签 one-hot 编码

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use rayon::prelude::*;

use crate::data::error::DataError;
use crate::data::transforms::{normalize_pixels, one_hot};
use crate::tensor::Tensor;

/// 类别数（数字 0-9）
pub const MNIST_CLASSES: usize = 10;

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

/// 每个文件可能的命名：官方的连字符命名，以及部分镜像使用的点号命名
const TRAIN_FILES: ([&str; 2], [&str; 2]) = (
    ["train-images-idx3-ubyte", "train-images.idx3-ubyte"],
    ["train-labels-idx1-ubyte", "train-labels.idx1-ubyte"],
);
const TEST_FILES: ([&str; 2], [&str; 2]) = (
    ["t10k-images-idx3-ubyte", "t10k-images.idx3-ubyte"],
    ["t10k-labels-idx1-ubyte", "t10k-labels.idx1-ubyte"],
);

/// MNIST 手写数字数据集
///
/// 官方数据包含 60,000 个训练样本和 10,000 个测试样本，
/// 每个样本是 28x28 的灰度图像，标签为 0-9。
/// 图像逐个保存为 [1, rows, cols]，标签逐个保存为 one-hot [10]。
#[derive(Debug, Clone)]
pub struct MnistDataset {
    images: Vec<Tensor>,
    labels: Vec<Tensor>,
    rows: usize,
    cols: usize,
}

impl MnistDataset {
    /// 从目录加载
    ///
    /// # 参数
    /// - `root`: 数据目录
    /// - `train`: true=训练集, false=测试集
    ///
    /// 每个文件依次尝试未压缩和 .gz 两种形式
    pub fn load(root: impl AsRef<Path>, train: bool) -> Result<Self, DataError> {
        let root = root.as_ref();
        let (images_names, labels_names) = if train { TRAIN_FILES } else { TEST_FILES };

        let images_path = find_file(root, &images_names)?;
        let labels_path = find_file(root, &labels_names)?;
        Self::from_files(images_path, labels_path)
    }

    /// 从指定的图像文件、标签文件加载
    pub fn from_files(
        images_path: impl AsRef<Path>,
        labels_path: impl AsRef<Path>,
    ) -> Result<Self, DataError> {
        let images_path = images_path.as_ref();
        let labels_path = labels_path.as_ref();

        let raw_images = parse_idx_images(&mut open_idx(images_path)?)?;
        let raw_labels = parse_idx_labels(&mut open_idx(labels_path)?)?;

        if raw_images.count != raw_labels.len() {
            return Err(DataError::ShapeMismatch {
                expected: vec![raw_images.count],
                got: vec![raw_labels.len()],
            });
        }

        let (rows, cols) = (raw_images.rows, raw_images.cols);
        let pixels_per_image = rows * cols;
        let images = raw_images
            .pixels
            .par_chunks_exact(pixels_per_image)
            .map(|pixels| normalize_pixels(pixels, &[1, rows, cols]))
            .collect::<Result<Vec<_>, _>>()?;
        let labels = raw_labels
            .iter()
            .map(|&label| one_hot(usize::from(label), MNIST_CLASSES))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "已加载 {} 个样本（{rows}x{cols}）：{}",
            images.len(),
            images_path.display()
        );
        Ok(Self {
            images,
            labels,
            rows,
            cols,
        })
    }

    /// 返回数据集中的样本数量
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// 数据集是否为空
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// 获取第 index 个样本
    ///
    /// # 返回
    /// (image, label) 元组
    /// - image: [1, rows, cols]
    /// - label: [10] (one-hot)
    pub fn get(&self, index: usize) -> Result<(&Tensor, &Tensor), DataError> {
        match (self.images.get(index), self.labels.get(index)) {
            (Some(image), Some(label)) => Ok((image, label)),
            _ => Err(DataError::IndexOutOfBounds {
                index,
                len: self.len(),
            }),
        }
    }

    /// 从`start`开始的连续`count`个样本
    pub fn range(&self, start: usize, count: usize) -> Result<(&[Tensor], &[Tensor]), DataError> {
        let end = start.saturating_add(count);
        if end > self.len() {
            return Err(DataError::IndexOutOfBounds {
                index: end.saturating_sub(1),
                len: self.len(),
            });
        }
        Ok((&self.images[start..end], &self.labels[start..end]))
    }

    /// 输入的形状 [1, rows, cols]
    pub fn input_shape(&self) -> Vec<usize> {
        vec![1, self.rows, self.cols]
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// 获取所有图像
    pub fn images(&self) -> &[Tensor] {
        &self.images
    }

    /// 获取所有标签
    pub fn labels(&self) -> &[Tensor] {
        &self.labels
    }
}

/// 按候选文件名依次查找：先未压缩，再 .gz
fn find_file(dir: &Path, names: &[&str]) -> Result<PathBuf, DataError> {
    for name in names {
        let path = dir.join(name);
        if path.exists() {
            return Ok(path);
        }
        let gz_path = dir.join(format!("{name}.gz"));
        if gz_path.exists() {
            return Ok(gz_path);
        }
    }
    Err(DataError::FileNotFound(dir.join(names[0])))
}

/// 打开 IDX 文件，扩展名为 .gz 时透明解压
fn open_idx(path: &Path) -> Result<Box<dyn Read>, DataError> {
    let file = File::open(path).map_err(|_| DataError::FileNotFound(path.to_path_buf()))?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

fn read_exact(reader: &mut dyn Read, buf: &mut [u8], what: &str) -> Result<(), DataError> {
    reader
        .read_exact(buf)
        .map_err(|e| DataError::FormatError(format!("读取{what}失败: {e}")))
}

/// 读取头部声明的`size`字节数据体；缓冲区随实际读到的数据增长，不按声明大小预先分配
fn read_body(reader: &mut dyn Read, size: usize, what: &str) -> Result<Vec<u8>, DataError> {
    let mut body = Vec::new();
    reader
        .take(size as u64)
        .read_to_end(&mut body)
        .map_err(|e| DataError::FormatError(format!("读取{what}失败: {e}")))?;
    if body.len() != size {
        return Err(DataError::FormatError(format!(
            "{what}被截断: 头部声明 {size} 字节，实际 {} 字节",
            body.len()
        )));
    }
    Ok(body)
}

/// 读取大端序 u32
fn read_u32(reader: &mut dyn Read, what: &str) -> Result<u32, DataError> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes, what)?;
    Ok(u32::from_be_bytes(bytes))
}

fn check_magic(reader: &mut dyn Read, expected: u32) -> Result<(), DataError> {
    let magic = read_u32(reader, "magic number")?;
    if magic != expected {
        return Err(DataError::FormatError(format!(
            "无效的 magic number: {magic} (期望 {expected})"
        )));
    }
    Ok(())
}

struct RawImages {
    count: usize,
    rows: usize,
    cols: usize,
    pixels: Vec<u8>,
}

/// 解析 IDX 图像文件
///
/// IDX 格式：
/// - [0-3] magic number (0x00000803 = 2051)
/// - [4-7] number of images
/// - [8-11] number of rows
/// - [12-15] number of columns
/// - [16+] pixel data (unsigned byte)
fn parse_idx_images(reader: &mut dyn Read) -> Result<RawImages, DataError> {
    check_magic(reader, IMAGES_MAGIC)?;
    let count = read_u32(reader, "图像数量")? as usize;
    let rows = read_u32(reader, "行数")? as usize;
    let cols = read_u32(reader, "列数")? as usize;
    if rows == 0 || cols == 0 {
        return Err(DataError::FormatError(format!(
            "无效的图像尺寸: {rows}x{cols}"
        )));
    }

    let size = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| DataError::FormatError(format!("图像数据过大: {count}x{rows}x{cols}")))?;
    let pixels = read_body(reader, size, "像素数据")?;
    Ok(RawImages {
        count,
        rows,
        cols,
        pixels,
    })
}

/// 解析 IDX 标签文件
///
/// IDX 格式：
/// - [0-3] magic number (0x00000801 = 2049)
/// - [4-7] number of labels
/// - [8+] label data (unsigned byte, 0-9)
fn parse_idx_labels(reader: &mut dyn Read) -> Result<Vec<u8>, DataError> {
    check_magic(reader, LABELS_MAGIC)?;
    let count = read_u32(reader, "标签数量")? as usize;

    read_body(reader, count, "标签数据")
}
