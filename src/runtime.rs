// 该文件是 Shanan （山南西风） 项目的一部分。
// src/runtime.rs - 推理运行时接口
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

use crate::{frame::NhwcFrame, postprocess::TensorView};

mod replay;
pub use self::replay::ReplayRunner;

#[cfg(feature = "rknpu_runtime")]
mod rknpu_runner;
#[cfg(feature = "rknpu_runtime")]
pub use self::rknpu_runner::RknpuRunner;

#[derive(Error, Debug)]
pub enum RuntimeError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("张量文件 {path} 损坏: {reason}")]
  MalformedDump { path: String, reason: String },
  #[error("输出数量不匹配: 期望 {expected}, 实际 {actual}")]
  OutputCountMismatch { expected: usize, actual: usize },
  #[error("推理后端错误: {0}")]
  Backend(String),
}

/// 一次推理的全部输出，按索引访问
pub trait OutputTensors {
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn tensor(&self, index: usize) -> Option<TensorView<'_>>;
}

/// 同步推理接口：输入一帧网络输入，返回所有输出张量
pub trait InferenceRunner {
  type Outputs: OutputTensors;
  type Error: std::error::Error + Send + Sync + 'static;

  fn run(&mut self, input: &NhwcFrame) -> Result<Self::Outputs, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnedTensor {
  pub data: Vec<f32>,
  pub shape: Vec<usize>,
}

impl OwnedTensor {
  pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
    Self { data, shape }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnedOutputs {
  tensors: Vec<OwnedTensor>,
}

impl OwnedOutputs {
  pub fn new(tensors: Vec<OwnedTensor>) -> Self {
    Self { tensors }
  }
}

impl From<Vec<OwnedTensor>> for OwnedOutputs {
  fn from(tensors: Vec<OwnedTensor>) -> Self {
    Self::new(tensors)
  }
}

impl OutputTensors for OwnedOutputs {
  fn len(&self) -> usize {
    self.tensors.len()
  }

  fn tensor(&self, index: usize) -> Option<TensorView<'_>> {
    self
      .tensors
      .get(index)
      .map(|t| TensorView::new(&t.data, &t.shape))
  }
}
