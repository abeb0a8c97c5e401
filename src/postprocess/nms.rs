// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use tracing::debug;

use super::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NmsMode {
  /// 仅同类别之间互相抑制
  #[default]
  ClassAware,
  /// 不区分类别
  Agnostic,
}

/// 非极大值抑制
///
/// 按置信度降序稳定排序，分数相同时保留先生成的候选框。面积为 0 的候选框
/// 直接丢弃。IoU 严格大于 `iou_threshold` 时抑制。
pub fn nms(candidates: Vec<Detection>, iou_threshold: f32, mode: NmsMode) -> Vec<Detection> {
  let total = candidates.len();
  let mut detections: Vec<Detection> = candidates
    .into_iter()
    .filter(|det| det.rect.area() > 0.0)
    .collect();

  // 按置信度降序排序
  detections.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut suppressed = vec![false; detections.len()];
  let mut keep = Vec::new();

  for i in 0..detections.len() {
    if suppressed[i] {
      continue;
    }
    keep.push(i);

    let best = &detections[i];
    for j in (i + 1)..detections.len() {
      if suppressed[j] {
        continue;
      }
      let other = &detections[j];
      if mode == NmsMode::ClassAware && other.class_id != best.class_id {
        continue;
      }
      if best.rect.iou(&other.rect) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!("NMS: {} 个候选框保留 {} 个", total, keep.len());

  let mut keep = keep.into_iter().peekable();
  detections
    .into_iter()
    .enumerate()
    .filter_map(|(idx, det)| {
      if keep.peek() == Some(&idx) {
        keep.next();
        Some(det)
      } else {
        None
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::postprocess::Rect;

  fn det(x0: f32, y0: f32, x1: f32, y1: f32, class_id: usize, score: f32) -> Detection {
    Detection::new(Rect::from_corners(x0, y0, x1, y1), class_id, score)
  }

  fn sample() -> Vec<Detection> {
    vec![
      det(0.0, 0.0, 100.0, 100.0, 0, 0.7),
      det(5.0, 5.0, 100.0, 100.0, 0, 0.9),
      det(10.0, 0.0, 110.0, 100.0, 1, 0.8),
      det(200.0, 200.0, 260.0, 260.0, 0, 0.6),
      det(50.0, 0.0, 150.0, 100.0, 0, 0.65),
      det(210.0, 205.0, 260.0, 260.0, 0, 0.55),
    ]
  }

  #[test]
  fn keeps_highest_score_per_cluster() {
    let kept = nms(sample(), 0.5, NmsMode::ClassAware);
    let scores: Vec<f32> = kept.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![0.9, 0.8, 0.65, 0.6]);
  }

  #[test]
  fn agnostic_mode_suppresses_across_classes() {
    let kept = nms(sample(), 0.5, NmsMode::Agnostic);
    let scores: Vec<f32> = kept.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![0.9, 0.65, 0.6]);
  }

  #[test]
  fn equal_scores_keep_first_generated() {
    let candidates = vec![
      det(0.0, 0.0, 80.0, 80.0, 0, 0.9),
      det(0.0, 0.0, 64.0, 80.0, 0, 0.9),
    ];
    let kept = nms(candidates, 0.5, NmsMode::ClassAware);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].rect.width, 80.0);
  }

  #[test]
  fn degenerate_boxes_are_dropped() {
    let candidates = vec![
      det(10.0, 10.0, 10.0, 50.0, 0, 0.99),
      det(0.0, 0.0, 40.0, 40.0, 0, 0.5),
    ];
    let kept = nms(candidates, 0.0, NmsMode::ClassAware);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, 0.5);
  }

  #[test]
  fn nms_is_idempotent() {
    for threshold in [0.1f32, 0.3, 0.5, 0.7] {
      let once = nms(sample(), threshold, NmsMode::ClassAware);
      let twice = nms(once.clone(), threshold, NmsMode::ClassAware);
      assert_eq!(once, twice);
    }
  }

  #[test]
  fn higher_threshold_keeps_at_least_as_many() {
    let mut last = 0;
    for threshold in [0.0f32, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
      let kept = nms(sample(), threshold, NmsMode::Agnostic).len();
      assert!(kept >= last, "threshold {threshold}: {kept} < {last}");
      last = kept;
    }
    assert_eq!(last, 6);
  }

  #[test]
  fn keypoints_travel_with_their_box() {
    use crate::postprocess::Keypoint;
    let kp = Keypoint {
      x: 1.0,
      y: 2.0,
      score: 0.9,
    };
    let candidates = vec![
      det(0.0, 0.0, 10.0, 10.0, 0, 0.4),
      det(0.0, 0.0, 10.0, 10.0, 0, 0.8).with_keypoints(vec![kp]),
    ];
    let kept = nms(candidates, 0.5, NmsMode::ClassAware);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].keypoints, vec![kp]);
  }
}
