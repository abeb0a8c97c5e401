// 该文件是 Shanan （山南西风） 项目的一部分。
// src/preprocess.rs - Letterbox / 中心裁剪预处理
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

use std::borrow::Cow;

use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::debug;

use crate::frame::{ChannelOrder, NhwcFrame};

/// Letterbox 默认填充值（灰色）
pub const DEFAULT_PAD_VALUE: u8 = 114;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
  #[error("无效帧: {width}x{height}")]
  InvalidFrame { width: u32, height: u32 },
}

/// 缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
  /// 保持比例缩放，四周填充
  #[default]
  Letterbox,
  /// 保持比例放大覆盖目标后居中裁剪
  CenterCrop,
}

/// 预处理变换参数，仅对同一帧有效
///
/// `offset` 在 letterbox 模式下是左/上填充量，在中心裁剪模式下是裁剪原点。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
  pub mode: ResizeMode,
  pub scale: f32,
  pub offset_x: f32,
  pub offset_y: f32,
  pub source_width: u32,
  pub source_height: u32,
}

impl TransformParams {
  /// 原图坐标 -> 网络输入坐标
  pub fn to_network(&self, x: f32, y: f32) -> (f32, f32) {
    match self.mode {
      ResizeMode::Letterbox => (x * self.scale + self.offset_x, y * self.scale + self.offset_y),
      ResizeMode::CenterCrop => (x * self.scale - self.offset_x, y * self.scale - self.offset_y),
    }
  }

  /// 网络输入坐标 -> 原图坐标（不截断）
  pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
    match self.mode {
      ResizeMode::Letterbox => (
        (x - self.offset_x) / self.scale,
        (y - self.offset_y) / self.scale,
      ),
      ResizeMode::CenterCrop => (
        (x + self.offset_x) / self.scale,
        (y + self.offset_y) / self.scale,
      ),
    }
  }

  /// 网络输入坐标 -> 原图坐标，并截断到原图范围内
  pub fn to_source_clamped(&self, x: f32, y: f32) -> (f32, f32) {
    let (sx, sy) = self.to_source(x, y);
    (
      sx.clamp(0.0, self.source_width as f32),
      sy.clamp(0.0, self.source_height as f32),
    )
  }
}

/// 预处理配置，在模型加载时确定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocess {
  pub input_height: u32,
  pub input_width: u32,
  pub mode: ResizeMode,
  pub order: ChannelOrder,
  pub pad_value: u8,
}

impl Preprocess {
  pub fn letterbox(input_height: u32, input_width: u32) -> Self {
    Self {
      input_height,
      input_width,
      mode: ResizeMode::Letterbox,
      order: ChannelOrder::Rgb,
      pad_value: DEFAULT_PAD_VALUE,
    }
  }

  pub fn center_crop(input_height: u32, input_width: u32) -> Self {
    Self {
      mode: ResizeMode::CenterCrop,
      ..Self::letterbox(input_height, input_width)
    }
  }

  pub fn with_order(mut self, order: ChannelOrder) -> Self {
    self.order = order;
    self
  }

  pub fn with_pad_value(mut self, pad_value: u8) -> Self {
    self.pad_value = pad_value;
    self
  }

  /// 将原图变换为网络输入，同时返回逆变换所需的参数
  pub fn apply(&self, image: &RgbImage) -> Result<(NhwcFrame, TransformParams), PreprocessError> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 || self.input_width == 0 || self.input_height == 0 {
      return Err(PreprocessError::InvalidFrame {
        width: src_w,
        height: src_h,
      });
    }

    match self.mode {
      ResizeMode::Letterbox => Ok(self.letterbox_image(image)),
      ResizeMode::CenterCrop => Ok(self.center_crop_image(image)),
    }
  }

  fn letterbox_image(&self, image: &RgbImage) -> (NhwcFrame, TransformParams) {
    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = (self.input_width, self.input_height);

    let scale = (dst_w as f32 / src_w as f32).min(dst_h as f32 / src_h as f32);
    let resize_w = ((src_w as f32 * scale).round() as u32).clamp(1, dst_w);
    let resize_h = ((src_h as f32 * scale).round() as u32).clamp(1, dst_h);

    let left = (dst_w - resize_w) / 2;
    let top = (dst_h - resize_h) / 2;
    debug!(
      "Letterbox: {}x{} -> {}x{}, 缩放 {:.4}, 填充 左 {} 上 {}",
      src_w, src_h, resize_w, resize_h, scale, left, top
    );

    let resized = resize_to(image, resize_w, resize_h);
    let mut frame = NhwcFrame::filled(dst_h as usize, dst_w as usize, self.pad_value, self.order);
    for (x, y, pixel) in resized.enumerate_pixels() {
      frame.put_rgb((left + x) as usize, (top + y) as usize, pixel.0);
    }

    let params = TransformParams {
      mode: ResizeMode::Letterbox,
      scale,
      offset_x: left as f32,
      offset_y: top as f32,
      source_width: src_w,
      source_height: src_h,
    };
    (frame, params)
  }

  fn center_crop_image(&self, image: &RgbImage) -> (NhwcFrame, TransformParams) {
    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = (self.input_width, self.input_height);

    // 裁剪窗口在原图坐标下计算，只缩放窗口内的像素
    let scale = (dst_w as f32 / src_w as f32).max(dst_h as f32 / src_h as f32);
    let crop_w = ((dst_w as f32 / scale).round() as u32).clamp(1, src_w);
    let crop_h = ((dst_h as f32 / scale).round() as u32).clamp(1, src_h);
    let crop_x = (src_w - crop_w) / 2;
    let crop_y = (src_h - crop_h) / 2;
    debug!(
      "中心裁剪: {}x{} 中 ({}, {}) 起 {}x{} -> {}x{}, 缩放 {:.4}",
      src_w, src_h, crop_x, crop_y, crop_w, crop_h, dst_w, dst_h, scale
    );

    let window = imageops::crop_imm(image, crop_x, crop_y, crop_w, crop_h).to_image();
    let resized = resize_to(&window, dst_w, dst_h);
    let mut frame = NhwcFrame::filled(dst_h as usize, dst_w as usize, self.pad_value, self.order);
    for (x, y, pixel) in resized.enumerate_pixels() {
      frame.put_rgb(x as usize, y as usize, pixel.0);
    }

    let params = TransformParams {
      mode: ResizeMode::CenterCrop,
      scale,
      offset_x: crop_x as f32 * scale,
      offset_y: crop_y as f32 * scale,
      source_width: src_w,
      source_height: src_h,
    };
    (frame, params)
  }
}

fn resize_to(image: &RgbImage, width: u32, height: u32) -> Cow<'_, RgbImage> {
  if image.dimensions() == (width, height) {
    Cow::Borrowed(image)
  } else {
    Cow::Owned(imageops::resize(
      image,
      width,
      height,
      FilterType::Triangle,
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn corners(w: u32, h: u32) -> [(f32, f32); 4] {
    let (w, h) = (w as f32, h as f32);
    [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
  }

  #[test]
  fn letterbox_wide_image_into_square_canvas() {
    let image = RgbImage::from_pixel(640, 360, Rgb([200, 10, 20]));
    let (frame, params) = Preprocess::letterbox(640, 640).apply(&image).unwrap();

    assert_eq!(params.scale, 1.0);
    assert_eq!(params.offset_x, 0.0);
    assert_eq!(params.offset_y, 140.0);
    assert_eq!(frame.height(), 640);
    assert_eq!(frame.width(), 640);

    // 上下各 140 行填充
    assert_eq!(frame.pixel(0, 0), [114, 114, 114]);
    assert_eq!(frame.pixel(320, 139), [114, 114, 114]);
    assert_eq!(frame.pixel(320, 140), [200, 10, 20]);
    assert_eq!(frame.pixel(320, 499), [200, 10, 20]);
    assert_eq!(frame.pixel(320, 500), [114, 114, 114]);
  }

  #[test]
  fn letterbox_corners_are_invertible() {
    let sizes = [(640, 360), (1920, 1080), (480, 640), (1001, 7), (33, 517), (640, 640)];
    let targets = [(640, 640), (480, 640), (256, 384)];
    for &(sw, sh) in &sizes {
      for &(th, tw) in &targets {
        let image = RgbImage::new(sw, sh);
        let (_, params) = Preprocess::letterbox(th, tw).apply(&image).unwrap();
        for (x, y) in corners(sw, sh) {
          let (nx, ny) = params.to_network(x, y);
          assert!(nx >= -1.0 && nx <= tw as f32 + 1.0);
          assert!(ny >= -1.0 && ny <= th as f32 + 1.0);
          let (bx, by) = params.to_source_clamped(nx, ny);
          assert!((bx - x).abs() <= 1.0, "{sw}x{sh} -> {tw}x{th}: x {x} -> {bx}");
          assert!((by - y).abs() <= 1.0, "{sw}x{sh} -> {tw}x{th}: y {y} -> {by}");
        }
      }
    }
  }

  #[test]
  fn center_crop_covers_target() {
    let image = RgbImage::from_pixel(320, 240, Rgb([1, 2, 3]));
    let (frame, params) = Preprocess::center_crop(224, 224).apply(&image).unwrap();

    assert_eq!(params.mode, ResizeMode::CenterCrop);
    assert!((params.scale - 224.0 / 240.0).abs() < 1e-6);
    assert_eq!(params.offset_y, 0.0);
    // 原图中裁剪 240x240，原点 x = 40
    assert!((params.offset_x - 40.0 * params.scale).abs() < 1e-4);
    // 中心裁剪没有填充
    assert_eq!(frame.pixel(0, 0), [1, 2, 3]);
    assert_eq!(frame.pixel(223, 223), [1, 2, 3]);

    let (cx, cy) = params.to_source(112.0, 112.0);
    assert!((cx - 160.0).abs() <= 1.0);
    assert!((cy - 120.0).abs() <= 1.0);
  }

  #[test]
  fn center_crop_of_extreme_aspect_stays_bounded() {
    let mut image = RgbImage::from_pixel(1, 4000, Rgb([0, 0, 0]));
    image.put_pixel(0, 1999, Rgb([250, 250, 250]));
    let (frame, params) = Preprocess::center_crop(224, 224).apply(&image).unwrap();

    assert_eq!((frame.width(), frame.height()), (224, 224));
    assert_eq!(params.scale, 224.0);
    assert_eq!(params.offset_y, 1999.0 * 224.0);
    // 1x1 窗口取自原图中心
    assert_eq!(frame.pixel(0, 0), [250, 250, 250]);
    assert_eq!(frame.pixel(223, 223), [250, 250, 250]);
    let (cx, cy) = params.to_source(112.0, 112.0);
    assert!((cx - 0.5).abs() <= 1.0);
    assert!((cy - 2000.0).abs() <= 1.0);
  }

  #[test]
  fn channel_order_is_applied() {
    let image = RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]));
    let pre = Preprocess::letterbox(8, 8).with_order(ChannelOrder::Bgr);
    let (frame, _) = pre.apply(&image).unwrap();
    assert_eq!(frame.pixel(4, 4), [0, 0, 255]);
  }

  #[test]
  fn zero_area_frame_is_rejected() {
    let image = RgbImage::new(0, 10);
    let err = Preprocess::letterbox(640, 640).apply(&image).unwrap_err();
    assert_eq!(err, PreprocessError::InvalidFrame { width: 0, height: 10 });
  }
}
