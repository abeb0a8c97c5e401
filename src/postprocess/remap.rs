// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/remap.rs - 坐标还原到原图
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

use super::{Detection, Rect};
use crate::preprocess::TransformParams;

/// 将网络输入坐标系下的检测结果原地还原到原图坐标系
///
/// 结果被截断到原图范围内；`params` 必须来自同一帧的预处理。
pub fn remap_detections(detections: &mut [Detection], params: &TransformParams) {
  for det in detections.iter_mut() {
    let (x0, y0) = params.to_source_clamped(det.rect.x, det.rect.y);
    let (x1, y1) = params.to_source_clamped(det.rect.right(), det.rect.bottom());
    det.rect = Rect::from_corners(x0, y0, x1, y1);

    for kp in det.keypoints.iter_mut() {
      let (x, y) = params.to_source_clamped(kp.x, kp.y);
      kp.x = x;
      kp.y = y;
    }
  }
}
