// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess.rs - 后处理：候选框生成、NMS、坐标还原、深度归一化、Top-K
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

mod depth;
mod detection;
mod nms;
mod proposal;
mod remap;
mod topk;

pub use self::depth::{DEPTH_EMA_WEIGHT, DepthFrame, DepthState, normalize_depth};
pub use self::detection::{DetectResult, Detection, Keypoint, Rect};
pub use self::nms::{NmsMode, nms};
pub use self::proposal::{
  DEFAULT_STRIDES, DFL_REG_MAX, HeadLayout, ProposalParams, StrideDescriptor, TensorView,
  generate_proposals,
};
pub use self::remap::remap_detections;
pub use self::topk::{Score, top_k};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostprocessError {
  #[error("张量 {tensor} 形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    tensor: String,
    expected: Vec<usize>,
    actual: Vec<usize>,
  },
  #[error("缺少第 {0} 个输出张量")]
  MissingOutput(usize),
}

impl PostprocessError {
  pub fn shape_mismatch(tensor: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
    PostprocessError::ShapeMismatch {
      tensor: tensor.into(),
      expected: expected.to_vec(),
      actual: actual.to_vec(),
    }
  }
}
