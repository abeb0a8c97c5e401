// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/record.rs - 推理结果的 JSON 记录
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

use serde_json::{Value, json};

use crate::{
  model::{Prediction, labels::label_of},
  postprocess::{DepthFrame, DetectResult, Score},
};

pub fn detections_record(result: &DetectResult, labels: &[&'static str]) -> Value {
  let items: Vec<Value> = result
    .items
    .iter()
    .map(|det| {
      let keypoints: Vec<Value> = det
        .keypoints
        .iter()
        .map(|kp| json!([kp.x, kp.y, kp.score]))
        .collect();
      json!({
        "class_id": det.class_id,
        "label": label_of(labels, det.class_id),
        "score": det.score,
        "bbox": [det.rect.x, det.rect.y, det.rect.right(), det.rect.bottom()],
        "keypoints": keypoints,
      })
    })
    .collect();
  json!({ "detections": items })
}

pub fn depth_record(depth: &DepthFrame) -> Value {
  json!({
    "depth": {
      "width": depth.image.width(),
      "height": depth.image.height(),
      "raw_min": depth.raw_min,
      "raw_max": depth.raw_max,
      "smoothed_min": depth.smoothed_min,
      "smoothed_max": depth.smoothed_max,
      "degenerate": depth.degenerate,
    }
  })
}

pub fn scores_record(scores: &[Score], labels: &[&'static str]) -> Value {
  let items: Vec<Value> = scores
    .iter()
    .map(|s| {
      json!({
        "index": s.index,
        "label": label_of(labels, s.index),
        "score": s.score,
      })
    })
    .collect();
  json!({ "classes": items })
}

pub fn prediction_record(prediction: &Prediction, labels: &[&'static str]) -> Value {
  match prediction {
    Prediction::Detections(result) => detections_record(result, labels),
    Prediction::Depth(depth) => depth_record(depth),
    Prediction::Classes(scores) => scores_record(scores, labels),
  }
}
