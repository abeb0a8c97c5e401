// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/detection.rs - 检测结果定义
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

/// 轴对齐矩形，坐标空间由所处阶段决定（网络输入或原图）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  /// 左上角 x 坐标
  pub x: f32,
  /// 左上角 y 坐标
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Rect {
  /// 由两个角点构造，宽高不小于 0
  pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
    Self {
      x: x0,
      y: y0,
      width: (x1 - x0).max(0.0),
      height: (y1 - y0).max(0.0),
    }
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  pub fn intersection_area(&self, other: &Rect) -> f32 {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());
    (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
  }

  /// 计算两个矩形的 IoU
  pub fn iou(&self, other: &Rect) -> f32 {
    let intersection = self.intersection_area(other);
    let union = self.area() + other.area() - intersection;
    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 关键点 (x, y, 可见度)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub score: f32,
}

/// 单个检测目标
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub rect: Rect,
  /// 类别索引
  pub class_id: usize,
  /// 置信度，范围 [0, 1]
  pub score: f32,
  /// 关键点，数量由模型决定；纯检测模型为空
  pub keypoints: Vec<Keypoint>,
}

impl Detection {
  pub fn new(rect: Rect, class_id: usize, score: f32) -> Self {
    Self {
      rect,
      class_id,
      score,
      keypoints: Vec::new(),
    }
  }

  pub fn with_keypoints(mut self, keypoints: Vec<Keypoint>) -> Self {
    self.keypoints = keypoints;
    self
  }
}

/// 一帧的最终检测结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn iou_of_partial_overlap() {
    let a = Rect::from_corners(0.0, 0.0, 80.0, 80.0);
    let b = Rect::from_corners(0.0, 0.0, 64.0, 80.0);
    assert!((a.iou(&b) - 0.8).abs() < 1e-6);
    assert_eq!(a.iou(&b), b.iou(&a));
  }

  #[test]
  fn iou_of_disjoint_and_degenerate() {
    let a = Rect::from_corners(0.0, 0.0, 10.0, 10.0);
    let b = Rect::from_corners(20.0, 20.0, 30.0, 30.0);
    assert_eq!(a.iou(&b), 0.0);

    let empty = Rect::from_corners(5.0, 5.0, 5.0, 5.0);
    assert_eq!(empty.area(), 0.0);
    assert_eq!(empty.iou(&empty), 0.0);
  }

  #[test]
  fn inverted_corners_give_empty_rect() {
    let r = Rect::from_corners(10.0, 10.0, 4.0, 2.0);
    assert_eq!(r.width, 0.0);
    assert_eq!(r.height, 0.0);
  }
}
