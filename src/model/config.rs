// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/config.rs - 模型族与模型配置
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

use std::str::FromStr;

use tracing::{debug, info};
use url::Url;

use super::{
  ModelError,
  labels::{COCO_CLASSES, HAND_CLASSES, WHOLEBODY17_CLASSES},
};
use crate::{
  FromUrl, decoded_path,
  frame::ChannelOrder,
  postprocess::{DEFAULT_STRIDES, DFL_REG_MAX, HeadLayout, NmsMode, StrideDescriptor},
  preprocess::Preprocess,
  query_flag, query_value,
};

/// 模型族，在模型加载时确定，决定使用哪种解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
  /// 仅检测框
  Detection(HeadLayout),
  /// 检测框 + 关键点
  Pose(HeadLayout),
  /// 单通道深度图
  Depth,
  /// 分类分数向量
  Classification { num_classes: usize, top_k: usize },
}

impl ModelFamily {
  /// 检测类模型的检测头
  pub fn head(&self) -> Option<&HeadLayout> {
    match self {
      ModelFamily::Detection(head) | ModelFamily::Pose(head) => Some(head),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
  pub path: String,
  pub family: ModelFamily,
  pub preprocess: Preprocess,
  pub strides: Vec<StrideDescriptor>,
  pub prob_threshold: f32,
  pub nms_threshold: f32,
  pub nms_mode: NmsMode,
  pub labels: &'static [&'static str],
}

/// URL 方案对应的默认值
struct FamilyDefaults {
  dfl: bool,
  kind: FamilyKind,
  num_classes: usize,
  num_keypoints: usize,
  input_height: u32,
  input_width: u32,
  prob_threshold: f32,
  nms_threshold: f32,
  order: ChannelOrder,
  labels: &'static [&'static str],
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FamilyKind {
  Detection,
  Depth,
  Classification,
}

const DEFAULT_TOP_K: usize = 5;
const DEFAULT_CLASSIFY_CLASSES: usize = 1000;

fn defaults_for(scheme: &str) -> Option<FamilyDefaults> {
  let detection = FamilyDefaults {
    dfl: true,
    kind: FamilyKind::Detection,
    num_classes: COCO_CLASSES.len(),
    num_keypoints: 0,
    input_height: 640,
    input_width: 640,
    prob_threshold: 0.45,
    nms_threshold: 0.45,
    order: ChannelOrder::Bgr,
    labels: &COCO_CLASSES,
  };

  let defaults = match scheme {
    "yolo11" | "yolov8" => detection,
    "yolov9" => FamilyDefaults {
      num_classes: WHOLEBODY17_CLASSES.len(),
      input_height: 480,
      input_width: 640,
      prob_threshold: 0.40,
      nms_threshold: 0.25,
      labels: &WHOLEBODY17_CLASSES,
      ..detection
    },
    "yolo11-pose" => FamilyDefaults {
      num_classes: HAND_CLASSES.len(),
      num_keypoints: 21,
      labels: &HAND_CLASSES,
      ..detection
    },
    "anchor-free" => FamilyDefaults {
      dfl: false,
      num_classes: 1,
      prob_threshold: 0.5,
      labels: &[],
      ..detection
    },
    "depth" => FamilyDefaults {
      kind: FamilyKind::Depth,
      num_classes: 0,
      input_height: 256,
      input_width: 384,
      order: ChannelOrder::Rgb,
      labels: &[],
      ..detection
    },
    "classify" => FamilyDefaults {
      kind: FamilyKind::Classification,
      num_classes: DEFAULT_CLASSIFY_CLASSES,
      input_height: 224,
      input_width: 224,
      labels: &[],
      ..detection
    },
    _ => return None,
  };
  Some(defaults)
}

fn parse_query<T: FromStr>(url: &Url, key: &str) -> Result<Option<T>, ModelError> {
  match query_value(url, key) {
    None => Ok(None),
    Some(value) => value
      .parse::<T>()
      .map(Some)
      .map_err(|_| ModelError::InvalidParameter {
        key: key.to_string(),
        value,
      }),
  }
}

/// 解析 `HxW`，例如 `480x640`
fn parse_size(url: &Url) -> Result<Option<(u32, u32)>, ModelError> {
  let Some(value) = query_value(url, "size") else {
    return Ok(None);
  };
  let parsed = value
    .split_once(['x', 'X'])
    .and_then(|(h, w)| Some((h.trim().parse::<u32>().ok()?, w.trim().parse::<u32>().ok()?)))
    .filter(|&(h, w)| h > 0 && w > 0);
  match parsed {
    Some(size) => Ok(Some(size)),
    None => Err(ModelError::InvalidParameter {
      key: "size".to_string(),
      value,
    }),
  }
}

impl FromUrl for ModelConfig {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let scheme = url.scheme();
    let defaults = defaults_for(scheme).ok_or_else(|| {
      ModelError::ModelPathError(format!(
        "不支持的模型方案 {}，可选: yolo11, yolov8, yolov9, yolo11-pose, anchor-free, depth, classify",
        scheme
      ))
    })?;

    let path = decoded_path(url);
    let num_classes = parse_query(url, "classes")?.unwrap_or(defaults.num_classes);
    let num_keypoints = parse_query(url, "keypoints")?.unwrap_or(defaults.num_keypoints);
    let prob_threshold = parse_query(url, "threshold")?.unwrap_or(defaults.prob_threshold);
    let nms_threshold = parse_query(url, "nms")?.unwrap_or(defaults.nms_threshold);
    let (input_height, input_width) =
      parse_size(url)?.unwrap_or((defaults.input_height, defaults.input_width));
    let pad_value = parse_query(url, "pad")?;
    let order = match query_value(url, "order") {
      None => defaults.order,
      Some(value) => ChannelOrder::parse(&value).ok_or(ModelError::InvalidParameter {
        key: "order".to_string(),
        value,
      })?,
    };
    let nms_mode = if query_flag(url, "agnostic") {
      NmsMode::Agnostic
    } else {
      NmsMode::ClassAware
    };

    let family = match defaults.kind {
      FamilyKind::Detection => {
        let head = if defaults.dfl {
          HeadLayout::Dfl {
            reg_max: DFL_REG_MAX,
            num_classes,
            num_keypoints,
          }
        } else {
          HeadLayout::Objectness {
            num_classes,
            num_keypoints,
          }
        };
        if num_keypoints > 0 {
          ModelFamily::Pose(head)
        } else {
          ModelFamily::Detection(head)
        }
      }
      FamilyKind::Depth => ModelFamily::Depth,
      FamilyKind::Classification => ModelFamily::Classification {
        num_classes,
        top_k: parse_query(url, "topk")?.unwrap_or(DEFAULT_TOP_K),
      },
    };

    let mut preprocess = match family {
      ModelFamily::Classification { .. } => Preprocess::center_crop(input_height, input_width),
      _ => Preprocess::letterbox(input_height, input_width),
    }
    .with_order(order);
    if let Some(pad_value) = pad_value {
      preprocess = preprocess.with_pad_value(pad_value);
    }

    let strides = match family {
      ModelFamily::Detection(_) | ModelFamily::Pose(_) => {
        StrideDescriptor::for_input(input_height, input_width, &DEFAULT_STRIDES)
      }
      _ => Vec::new(),
    };

    // 标签表只在类别数一致时使用
    let labels = if defaults.labels.len() == num_classes {
      defaults.labels
    } else {
      &[]
    };

    info!(
      "模型配置: {} ({}), 输入 {}x{}, 阈值 {}, NMS {}",
      path, scheme, input_height, input_width, prob_threshold, nms_threshold
    );
    debug!("模型族: {:?}", family);

    Ok(ModelConfig {
      path,
      family,
      preprocess,
      strides,
      prob_threshold,
      nms_threshold,
      nms_mode,
      labels,
    })
  }
}

impl ModelConfig {
  /// 推理后端应当给出的各输出张量形状
  ///
  /// 检测类：每个尺度一个 `[1, gh, gw, C]`，姿态模型的关键点张量排在所有检测框张量之后。
  pub fn output_shapes(&self) -> Vec<Vec<usize>> {
    match &self.family {
      ModelFamily::Detection(head) | ModelFamily::Pose(head) => {
        let mut shapes: Vec<Vec<usize>> = self
          .strides
          .iter()
          .map(|s| vec![1, s.grid_height, s.grid_width, head.box_channels()])
          .collect();
        if let Some(channels) = head.keypoint_channels() {
          shapes.extend(
            self
              .strides
              .iter()
              .map(|s| vec![1, s.grid_height, s.grid_width, channels]),
          );
        }
        shapes
      }
      ModelFamily::Depth => vec![vec![
        1,
        1,
        self.preprocess.input_height as usize,
        self.preprocess.input_width as usize,
      ]],
      ModelFamily::Classification { num_classes, .. } => vec![vec![1, *num_classes]],
    }
  }

  pub fn label(&self, class_id: usize) -> Option<&'static str> {
    super::labels::label_of(self.labels, class_id)
  }
}
