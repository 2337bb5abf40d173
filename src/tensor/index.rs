use std::ops::{Index, IndexMut};

use super::Tensor;

// 线性索引与多维索引的换算（一律行优先）。
// 池化层的最大值位置缓存、输出层的权重寻址、特征图的展平都只通过这里换算。

/// `(row, col)` → 线性索引，`cols`为每行的元素个数
pub const fn to_linear(row: usize, col: usize, cols: usize) -> usize {
    row * cols + col
}

/// 线性索引 → `(row, col)`
pub const fn from_linear(index: usize, cols: usize) -> (usize, usize) {
    (index / cols, index % cols)
}

/// 形状为`[_, rows, cols]`的特征图中`(channel, row, col)`展平后的索引
pub const fn flat_index(channel: usize, row: usize, col: usize, rows: usize, cols: usize) -> usize {
    to_linear(channel * rows + row, col, cols)
}

/// `flat_index`的逆运算，返回`(channel, row, col)`
pub const fn unflat_index(index: usize, rows: usize, cols: usize) -> (usize, usize, usize) {
    let (channel_row, col) = from_linear(index, cols);
    (channel_row / rows, channel_row % rows, col)
}

/// 行优先线性索引 → 任意阶的多维索引，`shape`为张量形状
pub fn unravel_index(mut index: usize, shape: &[usize]) -> Vec<usize> {
    let mut multi = vec![0; shape.len()];
    for (axis, &len) in shape.iter().enumerate().rev() {
        if len > 0 {
            multi[axis] = index % len;
            index /= len;
        }
    }
    multi
}

impl<const N: usize> Index<[usize; N]> for Tensor {
    type Output = f64;

    fn index(&self, index: [usize; N]) -> &Self::Output {
        &self.data[&index[..]]
    }
}

impl<const N: usize> IndexMut<[usize; N]> for Tensor {
    fn index_mut(&mut self, index: [usize; N]) -> &mut Self::Output {
        &mut self.data[&index[..]]
    }
}

impl Index<&[usize]> for Tensor {
    type Output = f64;

    fn index(&self, index: &[usize]) -> &Self::Output {
        &self.data[index]
    }
}
