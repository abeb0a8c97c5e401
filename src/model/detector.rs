// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/detector.rs - 通用模型：预处理、推理与解码
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

use image::{GrayImage, RgbImage};
use tracing::debug;

use super::{Model, ModelConfig, ModelError, ModelFamily, Prediction};
use crate::{
  postprocess::{
    DepthFrame, DepthState, DetectResult, HeadLayout, PostprocessError, ProposalParams,
    generate_proposals, nms, normalize_depth, remap_detections, top_k,
  },
  preprocess::TransformParams,
  runtime::{InferenceRunner, OutputTensors},
};

/// 按模型族组合预处理、推理后端与后处理
///
/// 每个实例持有自己的深度统计量，多路视频流应各自创建实例。
pub struct Detector<R> {
  config: ModelConfig,
  runner: R,
  depth_state: DepthState,
}

impl<R> Detector<R> {
  pub fn new(config: ModelConfig, runner: R) -> Self {
    Self {
      config,
      runner,
      depth_state: DepthState::new(),
    }
  }

  pub fn config(&self) -> &ModelConfig {
    &self.config
  }

  pub fn depth_state(&self) -> &DepthState {
    &self.depth_state
  }

  /// 当前帧无法解码时使用的空结果
  pub fn empty_prediction(&self) -> Prediction {
    match self.config.family {
      ModelFamily::Detection(_) | ModelFamily::Pose(_) => {
        Prediction::Detections(DetectResult::default())
      }
      ModelFamily::Depth => {
        let (smoothed_min, smoothed_max) = self.depth_state.smoothed().unwrap_or((0.0, 0.0));
        Prediction::Depth(DepthFrame {
          image: GrayImage::new(
            self.config.preprocess.input_width,
            self.config.preprocess.input_height,
          ),
          raw_min: 0.0,
          raw_max: 0.0,
          smoothed_min,
          smoothed_max,
          degenerate: true,
        })
      }
      ModelFamily::Classification { .. } => Prediction::Classes(Vec::new()),
    }
  }

  /// 解码一帧推理输出
  pub fn decode<O: OutputTensors>(
    &mut self,
    outputs: &O,
    params: &TransformParams,
  ) -> Result<Prediction, ModelError> {
    match self.config.family {
      ModelFamily::Detection(head) | ModelFamily::Pose(head) => {
        self.decode_detections(&head, outputs, params)
      }
      ModelFamily::Depth => {
        let tensor = outputs.tensor(0).ok_or(PostprocessError::MissingOutput(0))?;
        let Some(&[height, width]) = tensor.trailing_dims(2) else {
          return Err(
            PostprocessError::shape_mismatch("depth", &self.config.output_shapes()[0], tensor.shape())
              .into(),
          );
        };
        let frame = normalize_depth(tensor.data(), height, width, &mut self.depth_state)?;
        Ok(Prediction::Depth(frame))
      }
      ModelFamily::Classification { num_classes, top_k: k } => {
        let tensor = outputs.tensor(0).ok_or(PostprocessError::MissingOutput(0))?;
        if tensor.data().len() != num_classes {
          return Err(
            PostprocessError::shape_mismatch("scores", &[num_classes], tensor.shape()).into(),
          );
        }
        let ranked = top_k(tensor.data(), k);
        debug!("分类结果: {:?}", ranked);
        Ok(Prediction::Classes(ranked))
      }
    }
  }

  fn decode_detections<O: OutputTensors>(
    &self,
    head: &HeadLayout,
    outputs: &O,
    params: &TransformParams,
  ) -> Result<Prediction, ModelError> {
    let proposal_params = ProposalParams {
      prob_threshold: self.config.prob_threshold,
      input_width: self.config.preprocess.input_width as f32,
      input_height: self.config.preprocess.input_height as f32,
    };
    let num_strides = self.config.strides.len();

    // 任一尺度解码失败则整帧丢弃
    let mut proposals = Vec::new();
    for (idx, stride) in self.config.strides.iter().enumerate() {
      let feat = outputs
        .tensor(idx)
        .ok_or(PostprocessError::MissingOutput(idx))?;
      let kps = match head.keypoint_channels() {
        Some(_) => Some(
          outputs
            .tensor(num_strides + idx)
            .ok_or(PostprocessError::MissingOutput(num_strides + idx))?,
        ),
        None => None,
      };
      let count = generate_proposals(head, stride, feat, kps, &proposal_params, &mut proposals)?;
      debug!("尺度 {}: {} 个候选框", stride.stride, count);
    }

    let mut objects = nms(proposals, self.config.nms_threshold, self.config.nms_mode);
    remap_detections(&mut objects, params);
    debug!("检测到 {} 个目标", objects.len());
    Ok(Prediction::Detections(objects.into()))
  }
}

impl<R: InferenceRunner> Model for Detector<R> {
  type Input = RgbImage;
  type Output = Prediction;
  type Error = ModelError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (frame, params) = self.config.preprocess.apply(input)?;
    debug!(
      "预处理完成: 缩放 {:.4}, 偏移 ({:.1}, {:.1})",
      params.scale, params.offset_x, params.offset_y
    );

    let outputs = self
      .runner
      .run(&frame)
      .map_err(|e| ModelError::Runtime(e.to_string()))?;

    self.decode(&outputs, &params)
  }

  fn empty_output(&self) -> Self::Output {
    self.empty_prediction()
  }
}
