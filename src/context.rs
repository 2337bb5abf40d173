/*
 * @Description  : 执行上下文：并行后端与随机种子
 *
 * 设计决策：
 * - 不使用任何进程级的全局初始化，上下文在构造网络和调用每个核函数时显式传入
 * - 核函数统一表达为“逐元素计算”：每个输出元素只由一个任务写入，
 *   跨通道的求和都在该任务内部串行完成，因此并行与串行后端结果完全一致
 * - 并行后端使用 Rayon：张量均为标准（行优先）布局，按连续切片逐元素并行，
 *   线性下标经`unravel_index`还原为多维索引
 */

use ndarray::{Array, Dimension, IxDyn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::tensor::{Tensor, unravel_index};

/// 核函数的调度后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// 单线程按行优先顺序执行
    Serial,
    /// Rayon 线程池并行执行
    #[default]
    Parallel,
}

/// 执行上下文
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    backend: Backend,
    seed: Option<u64>,
}

impl ExecutionContext {
    pub fn new(backend: Backend, seed: Option<u64>) -> Self {
        Self { backend, seed }
    }

    /// 单线程上下文
    pub fn serial() -> Self {
        Self::new(Backend::Serial, None)
    }

    /// 并行上下文
    pub fn parallel() -> Self {
        Self::new(Backend::Parallel, None)
    }

    /// 固定随机种子，使权重初始化可复现
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub const fn backend(&self) -> Backend {
        self.backend
    }

    pub const fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// 创建随机数生成器：有种子时结果确定，否则取系统熵
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// 对张量的每个元素执行一次核函数：`kernel(多维索引, 旧值) -> 新值`。
    /// 核函数内不得依赖其他元素的新值。
    pub fn update<F>(&self, tensor: &mut Tensor, kernel: F)
    where
        F: Fn(&[usize], f64) -> f64 + Sync + Send,
    {
        self.update_array(tensor.array_mut(), kernel);
    }

    /// 与`update`相同，但作用于任意元素类型的数组（如池化层的最大值位置缓存）
    pub(crate) fn update_array<A, F>(&self, array: &mut Array<A, IxDyn>, kernel: F)
    where
        A: Copy + Send + Sync,
        F: Fn(&[usize], A) -> A + Sync + Send,
    {
        match self.backend {
            Backend::Serial => Self::update_serial(array, &kernel),
            Backend::Parallel => {
                let shape = array.shape().to_vec();
                match array.as_slice_mut() {
                    Some(values) => values.par_iter_mut().enumerate().for_each(|(i, value)| {
                        let index = unravel_index(i, &shape);
                        *value = kernel(&index, *value);
                    }),
                    // 非标准布局（本crate内不会出现）退回串行
                    None => Self::update_serial(array, &kernel),
                }
            }
        }
    }

    fn update_serial<A, F>(array: &mut Array<A, IxDyn>, kernel: &F)
    where
        A: Copy,
        F: Fn(&[usize], A) -> A,
    {
        for (index, value) in array.indexed_iter_mut() {
            *value = kernel(index.slice(), *value);
        }
    }
}

#[cfg(test)]
mod tests;
