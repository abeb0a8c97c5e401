// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 绘制检测结果与深度图
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

use image::{GrayImage, Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};

use crate::postprocess::{DepthFrame, DetectResult};

const BOX_THICKNESS: i32 = 2;
const KEYPOINT_RADIUS: i32 = 3;
/// 可见度大于该值的关键点才绘制
pub const KEYPOINT_VISIBILITY: f32 = 0.5;
const KEYPOINT_COLOR: [u8; 3] = [255, 0, 0];

// 按类别循环使用
const PALETTE: [[u8; 3]; 8] = [
  [0, 0, 255],
  [0, 255, 0],
  [255, 128, 0],
  [255, 0, 255],
  [0, 255, 255],
  [255, 255, 0],
  [128, 0, 255],
  [0, 128, 255],
];

/// 21 点手部骨架：腕部 0，拇指 1-4，食指 5-8，中指 9-12，无名指 13-16，小指 17-20
const HAND_SKELETON: [(usize, usize); 23] = [
  (0, 1),
  (1, 2),
  (2, 3),
  (3, 4),
  (0, 5),
  (5, 6),
  (6, 7),
  (7, 8),
  (0, 9),
  (9, 10),
  (10, 11),
  (11, 12),
  (0, 13),
  (13, 14),
  (14, 15),
  (15, 16),
  (0, 17),
  (17, 18),
  (18, 19),
  (19, 20),
  (5, 9),
  (9, 13),
  (13, 17),
];

/// COCO 17 点人体骨架
const BODY_SKELETON: [(usize, usize); 19] = [
  (15, 13),
  (13, 11),
  (16, 14),
  (14, 12),
  (11, 12),
  (5, 11),
  (6, 12),
  (5, 6),
  (5, 7),
  (6, 8),
  (7, 9),
  (8, 10),
  (1, 2),
  (0, 1),
  (0, 2),
  (1, 3),
  (2, 4),
  (3, 5),
  (4, 6),
];

const LIMB_COLOR: [u8; 3] = [51, 153, 255];

/// 按关键点数量选择骨架，未知布局不连线
pub fn skeleton_for(num_keypoints: usize) -> &'static [(usize, usize)] {
  match num_keypoints {
    21 => &HAND_SKELETON,
    17 => &BODY_SKELETON,
    _ => &[],
  }
}

pub struct Draw {
  thickness: i32,
  keypoint_radius: i32,
  keypoint_visibility: f32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      keypoint_radius: KEYPOINT_RADIUS,
      keypoint_visibility: KEYPOINT_VISIBILITY,
    }
  }
}

impl Draw {
  pub fn class_color(class_id: usize) -> [u8; 3] {
    PALETTE[class_id % PALETTE.len()]
  }

  /// 在原图上绘制检测框和关键点，坐标为原图像素坐标
  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    for det in result.items.iter() {
      let color = Rgb(Self::class_color(det.class_id));
      let x_min = (det.rect.x.floor() as i32).clamp(0, w - 1);
      let y_min = (det.rect.y.floor() as i32).clamp(0, h - 1);
      let x_max = (det.rect.right().ceil() as i32).clamp(0, w - 1);
      let y_max = (det.rect.bottom().ceil() as i32).clamp(0, h - 1);

      for t in 0..self.thickness {
        let (x0, y0, x1, y1) = (x_min + t, y_min + t, x_max - t, y_max - t);
        if x0 >= x1 || y0 >= y1 {
          break;
        }
        let rect = imageproc::rect::Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
        draw_hollow_rect_mut(image, rect, color);
      }

      for &(a, b) in skeleton_for(det.keypoints.len()) {
        let (ka, kb) = (&det.keypoints[a], &det.keypoints[b]);
        if ka.score > self.keypoint_visibility && kb.score > self.keypoint_visibility {
          draw_line_segment_mut(image, (ka.x, ka.y), (kb.x, kb.y), Rgb(LIMB_COLOR));
        }
      }

      for kp in det.keypoints.iter() {
        if kp.score > self.keypoint_visibility {
          draw_filled_circle_mut(
            image,
            (kp.x.round() as i32, kp.y.round() as i32),
            self.keypoint_radius,
            Rgb(KEYPOINT_COLOR),
          );
        }
      }
    }
  }
}

// magma 色表的采样点
const MAGMA: [[u8; 3]; 6] = [
  [0, 0, 4],
  [59, 15, 112],
  [140, 41, 129],
  [222, 73, 104],
  [254, 159, 109],
  [252, 253, 191],
];

pub fn magma(value: u8) -> Rgb<u8> {
  let pos = value as f32 / 255.0 * (MAGMA.len() - 1) as f32;
  let lo = (pos.floor() as usize).min(MAGMA.len() - 2);
  let t = pos - lo as f32;
  let (a, b) = (MAGMA[lo], MAGMA[lo + 1]);
  let mix = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
  Rgb([mix(0), mix(1), mix(2)])
}

pub fn colorize_depth(depth: &GrayImage) -> RgbImage {
  RgbImage::from_fn(depth.width(), depth.height(), |x, y| {
    magma(depth.get_pixel(x, y).0[0])
  })
}

/// 左侧原图，右侧缩放到原图大小的伪彩色深度图
pub fn side_by_side_depth(frame: &RgbImage, depth: &DepthFrame) -> RgbImage {
  let (w, h) = frame.dimensions();
  let resized = imageops::resize(&depth.image, w, h, imageops::FilterType::Triangle);
  let colored = colorize_depth(&resized);

  let mut canvas = RgbImage::new(w * 2, h);
  imageops::replace(&mut canvas, frame, 0, 0);
  imageops::replace(&mut canvas, &colored, w as i64, 0);
  canvas
}
