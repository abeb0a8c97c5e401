// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/depth.rs - 深度图滑动平均归一化
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

use image::GrayImage;
use tracing::debug;

use super::PostprocessError;

/// 滑动平均中上一帧的权重
pub const DEPTH_EMA_WEIGHT: f32 = 0.5;

/// 每路视频流各自持有的深度统计量
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthState {
  smoothed: Option<(f32, f32)>,
}

impl DepthState {
  pub fn new() -> Self {
    Self::default()
  }

  /// 平滑后的 (min, max)，尚未处理任何帧时为 `None`
  pub fn smoothed(&self) -> Option<(f32, f32)> {
    self.smoothed
  }

  pub fn reset(&mut self) {
    self.smoothed = None;
  }

  fn update(&mut self, raw_min: f32, raw_max: f32) -> (f32, f32) {
    let next = match self.smoothed {
      None => (raw_min, raw_max),
      Some((min, max)) => (
        DEPTH_EMA_WEIGHT * min + (1.0 - DEPTH_EMA_WEIGHT) * raw_min,
        DEPTH_EMA_WEIGHT * max + (1.0 - DEPTH_EMA_WEIGHT) * raw_max,
      ),
    };
    self.smoothed = Some(next);
    next
  }
}

/// 归一化后的 8 位深度图
#[derive(Debug, Clone)]
pub struct DepthFrame {
  pub image: GrayImage,
  pub raw_min: f32,
  pub raw_max: f32,
  pub smoothed_min: f32,
  pub smoothed_max: f32,
  /// 取值范围退化，输出全 0
  pub degenerate: bool,
}

/// 将单通道深度输出映射到 0..=255，并更新 `state`
pub fn normalize_depth(
  raw: &[f32],
  height: usize,
  width: usize,
  state: &mut DepthState,
) -> Result<DepthFrame, PostprocessError> {
  if raw.len() != height * width {
    return Err(PostprocessError::shape_mismatch(
      "depth",
      &[height, width],
      &[raw.len()],
    ));
  }

  let (raw_min, raw_max) = raw
    .iter()
    .copied()
    .filter(|v| v.is_finite())
    .fold(None, |acc: Option<(f32, f32)>, v| match acc {
      None => Some((v, v)),
      Some((min, max)) => Some((min.min(v), max.max(v))),
    })
    .unwrap_or((0.0, 0.0));

  let (smoothed_min, smoothed_max) = state.update(raw_min, raw_max);
  let range = smoothed_max - smoothed_min;
  let degenerate = raw_min == raw_max || !(range > 0.0);
  debug!(
    "深度范围: 原始 [{:.4}, {:.4}], 平滑 [{:.4}, {:.4}]",
    raw_min, raw_max, smoothed_min, smoothed_max
  );

  let image = GrayImage::from_fn(width as u32, height as u32, |x, y| {
    if degenerate {
      return image::Luma([0]);
    }
    let v = raw[y as usize * width + x as usize];
    let scaled = if v.is_finite() {
      (255.0 * (v - smoothed_min) / range).round().clamp(0.0, 255.0)
    } else {
      0.0
    };
    image::Luma([scaled as u8])
  });

  Ok(DepthFrame {
    image,
    raw_min,
    raw_max,
    smoothed_min,
    smoothed_max,
    degenerate,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn first_frame_uses_raw_bounds() {
    let mut state = DepthState::new();
    let raw = [1.0, 2.0, 3.0, 5.0];
    let frame = normalize_depth(&raw, 2, 2, &mut state).unwrap();

    assert_eq!(state.smoothed(), Some((1.0, 5.0)));
    assert_eq!(frame.smoothed_min, frame.raw_min);
    assert_eq!(frame.smoothed_max, frame.raw_max);
    assert!(!frame.degenerate);
    assert_eq!(frame.image.get_pixel(0, 0).0[0], 0);
    assert_eq!(frame.image.get_pixel(1, 1).0[0], 255);
    assert_eq!(frame.image.get_pixel(0, 1).0[0], 128);
  }

  #[test]
  fn later_frames_are_smoothed() {
    let mut state = DepthState::new();
    normalize_depth(&[0.0, 10.0], 1, 2, &mut state).unwrap();
    let frame = normalize_depth(&[2.0, 4.0], 1, 2, &mut state).unwrap();

    assert_eq!(frame.smoothed_min, 1.0);
    assert_eq!(frame.smoothed_max, 7.0);
    // (2 - 1) / 6 * 255 = 42.5, (4 - 1) / 6 * 255 = 127.5
    assert_eq!(frame.image.get_pixel(0, 0).0[0], 43);
    assert_eq!(frame.image.get_pixel(1, 0).0[0], 128);
  }

  #[test]
  fn values_outside_smoothed_range_saturate() {
    let mut state = DepthState::new();
    normalize_depth(&[4.0, 6.0], 1, 2, &mut state).unwrap();
    let frame = normalize_depth(&[0.0, 20.0], 1, 2, &mut state).unwrap();
    // 平滑范围 [2, 13]
    assert_eq!(frame.image.get_pixel(0, 0).0[0], 0);
    assert_eq!(frame.image.get_pixel(1, 0).0[0], 255);
  }

  #[test]
  fn flat_frame_is_all_zero() {
    let mut state = DepthState::new();
    let frame = normalize_depth(&[3.0; 6], 2, 3, &mut state).unwrap();
    assert!(frame.degenerate);
    assert_eq!(frame.smoothed_min, 3.0);
    assert_eq!(frame.smoothed_max, 3.0);
    assert!(frame.image.pixels().all(|p| p.0[0] == 0));

    // 已有统计量时，平坦帧仍然输出全 0
    let mut state = DepthState::new();
    normalize_depth(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 2, 3, &mut state).unwrap();
    let frame = normalize_depth(&[3.0; 6], 2, 3, &mut state).unwrap();
    assert!(frame.degenerate);
    assert!(frame.image.pixels().all(|p| p.0[0] == 0));
  }

  #[test]
  fn independent_states_do_not_interfere() {
    let mut a = DepthState::new();
    let mut b = DepthState::new();
    normalize_depth(&[0.0, 10.0], 1, 2, &mut a).unwrap();
    normalize_depth(&[100.0, 200.0], 1, 2, &mut b).unwrap();
    assert_eq!(a.smoothed(), Some((0.0, 10.0)));
    assert_eq!(b.smoothed(), Some((100.0, 200.0)));
  }

  #[test]
  fn length_mismatch_is_rejected() {
    let mut state = DepthState::new();
    let err = normalize_depth(&[1.0, 2.0, 3.0], 2, 2, &mut state).unwrap_err();
    assert!(matches!(err, PostprocessError::ShapeMismatch { .. }));
    assert_eq!(state.smoothed(), None);
  }
}
