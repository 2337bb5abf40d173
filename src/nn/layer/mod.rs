/*
 * @Description  : Layer 模块：网络中用到的三种层
 *
 * 每一层独占自己的张量（参数与中间量），只通过显式传入的（源层，目标层）参数与相邻层交换数据
 */

mod conv;
mod output;
mod pool;

pub use conv::ConvLayer;
pub use output::OutputLayer;
pub use pool::{PoolLayer, PoolMode};
