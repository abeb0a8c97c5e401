// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use crate::{
  postprocess::{DepthFrame, DetectResult, PostprocessError, Score},
  preprocess::PreprocessError,
};

mod config;
mod detector;
pub mod labels;

pub use self::config::{ModelConfig, ModelFamily};
pub use self::detector::Detector;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;

  /// 当前帧推理失败时代替结果输出
  fn empty_output(&self) -> Self::Output;
}

/// 单帧推理结果，随模型族而不同
#[derive(Debug, Clone)]
pub enum Prediction {
  Detections(DetectResult),
  Depth(DepthFrame),
  Classes(Vec<Score>),
}

impl Prediction {
  pub fn detections(&self) -> Option<&DetectResult> {
    match self {
      Prediction::Detections(result) => Some(result),
      _ => None,
    }
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("后处理错误: {0}")]
  Postprocess(#[from] PostprocessError),
  #[error("推理运行错误: {0}")]
  Runtime(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型参数错误: {key} = {value}")]
  InvalidParameter { key: String, value: String },
}
