/*
 * @Description  : 本文件仅包含一些属性方法，除`fill`系列外不包含任何会修改张量的方法
 */

use super::Tensor;

impl Tensor {
    /// 张量的形状，如：向量为[n]，矩阵为[n,m]，特征图为[c,h,w]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 张量的维（dim）数、阶（rank）数
    pub fn dimension(&self) -> usize {
        self.data.ndim()
    }

    /// 计算张量中所有元素的数量
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 判断两个张量的形状是否严格一致
    pub fn is_same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    /// 所有元素之和
    pub fn sum(&self) -> f64 {
        self.data.sum()
    }

    /// 是否所有元素都是有限值（即不含NaN、±Inf）
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// 按行优先顺序遍历所有元素
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.data.iter()
    }

    /// 按行优先顺序展平为`Vec`
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// 将所有元素置为`value`
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// 将所有元素置零
    pub fn fill_zero(&mut self) {
        self.fill(0.);
    }
}
