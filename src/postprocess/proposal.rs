// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/proposal.rs - 无锚框候选框生成
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

use super::{Detection, Keypoint, PostprocessError, Rect};

pub const DEFAULT_STRIDES: [u32; 3] = [8, 16, 32];
pub const DFL_REG_MAX: usize = 16;

/// 输出张量的只读视图，生命周期不超过一次推理
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
  data: &'a [f32],
  shape: &'a [usize],
}

impl<'a> TensorView<'a> {
  pub fn new(data: &'a [f32], shape: &'a [usize]) -> Self {
    Self { data, shape }
  }

  pub fn data(&self) -> &'a [f32] {
    self.data
  }

  pub fn shape(&self) -> &'a [usize] {
    self.shape
  }

  /// 返回最后 `n` 个维度，前导维度之积必须为 1（即 batch = 1）
  pub fn trailing_dims(&self, n: usize) -> Option<&'a [usize]> {
    if self.shape.len() < n {
      return None;
    }
    let (leading, trailing) = self.shape.split_at(self.shape.len() - n);
    if leading.iter().product::<usize>() != 1 {
      return None;
    }
    Some(trailing)
  }

  /// 校验张量为 `grid_h × grid_w × channels` 排布并返回数据
  pub fn grid(
    &self,
    tensor: &str,
    grid_h: usize,
    grid_w: usize,
    channels: usize,
  ) -> Result<&'a [f32], PostprocessError> {
    let expected = [grid_h, grid_w, channels];
    match self.trailing_dims(3) {
      Some(dims) if dims == expected && self.data.len() == grid_h * grid_w * channels => {
        Ok(self.data)
      }
      _ => Err(PostprocessError::shape_mismatch(tensor, &expected, self.shape)),
    }
  }
}

/// 单个输出尺度的描述，随模型加载确定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrideDescriptor {
  pub stride: u32,
  pub grid_height: usize,
  pub grid_width: usize,
}

impl StrideDescriptor {
  pub fn new(stride: u32, grid_height: usize, grid_width: usize) -> Self {
    Self {
      stride,
      grid_height,
      grid_width,
    }
  }

  /// 按网络输入尺寸推导各尺度的网格大小
  pub fn for_input(input_height: u32, input_width: u32, strides: &[u32]) -> Vec<Self> {
    strides
      .iter()
      .map(|&stride| {
        Self::new(
          stride,
          (input_height / stride) as usize,
          (input_width / stride) as usize,
        )
      })
      .collect()
  }

  pub fn cells(&self) -> usize {
    self.grid_height * self.grid_width
  }
}

/// 检测头的通道排布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadLayout {
  /// 每个网格: `l t r b | obj | C 类概率 | 3K 关键点`，数值已经过 sigmoid
  Objectness {
    num_classes: usize,
    num_keypoints: usize,
  },
  /// 每个网格: `4 × reg_max 分布 | C 类 logits`；关键点位于单独张量 `3K`
  Dfl {
    reg_max: usize,
    num_classes: usize,
    num_keypoints: usize,
  },
}

impl HeadLayout {
  pub fn num_classes(&self) -> usize {
    match *self {
      HeadLayout::Objectness { num_classes, .. } | HeadLayout::Dfl { num_classes, .. } => {
        num_classes
      }
    }
  }

  pub fn num_keypoints(&self) -> usize {
    match *self {
      HeadLayout::Objectness { num_keypoints, .. } | HeadLayout::Dfl { num_keypoints, .. } => {
        num_keypoints
      }
    }
  }

  /// 主张量的通道数
  pub fn box_channels(&self) -> usize {
    match *self {
      HeadLayout::Objectness {
        num_classes,
        num_keypoints,
      } => 5 + num_classes + 3 * num_keypoints,
      HeadLayout::Dfl {
        reg_max,
        num_classes,
        ..
      } => 4 * reg_max + num_classes,
    }
  }

  /// 独立关键点张量的通道数
  pub fn keypoint_channels(&self) -> Option<usize> {
    match *self {
      HeadLayout::Dfl { num_keypoints, .. } if num_keypoints > 0 => Some(3 * num_keypoints),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProposalParams {
  pub prob_threshold: f32,
  pub input_width: f32,
  pub input_height: f32,
}

/// 解码一个尺度的输出，将候选框追加到 `proposals`，返回新增数量
///
/// 形状校验失败时不会追加任何候选框。网格按行优先顺序扫描。
pub fn generate_proposals(
  layout: &HeadLayout,
  stride: &StrideDescriptor,
  feat: TensorView<'_>,
  kps: Option<TensorView<'_>>,
  params: &ProposalParams,
  proposals: &mut Vec<Detection>,
) -> Result<usize, PostprocessError> {
  let before = proposals.len();
  let name = format!("stride {}", stride.stride);
  let data = feat.grid(
    &name,
    stride.grid_height,
    stride.grid_width,
    layout.box_channels(),
  )?;

  match *layout {
    HeadLayout::Objectness {
      num_classes,
      num_keypoints,
    } => decode_objectness(data, num_classes, num_keypoints, stride, params, proposals),
    HeadLayout::Dfl {
      reg_max,
      num_classes,
      num_keypoints,
    } => {
      let kps_data = match (layout.keypoint_channels(), kps) {
        (Some(channels), Some(view)) => Some(view.grid(
          &format!("stride {} keypoints", stride.stride),
          stride.grid_height,
          stride.grid_width,
          channels,
        )?),
        (Some(channels), None) => {
          return Err(PostprocessError::shape_mismatch(
            format!("stride {} keypoints", stride.stride),
            &[stride.grid_height, stride.grid_width, channels],
            &[],
          ));
        }
        (None, _) => None,
      };
      decode_dfl(
        data,
        kps_data,
        reg_max,
        num_classes,
        num_keypoints,
        stride,
        params,
        proposals,
      )
    }
  }

  let added = proposals.len() - before;
  debug!("尺度 {}: 生成 {} 个候选框", stride.stride, added);
  Ok(added)
}

fn decode_objectness(
  data: &[f32],
  num_classes: usize,
  num_keypoints: usize,
  stride: &StrideDescriptor,
  params: &ProposalParams,
  proposals: &mut Vec<Detection>,
) {
  let channels = 5 + num_classes + 3 * num_keypoints;
  let s = stride.stride as f32;

  for gy in 0..stride.grid_height {
    for gx in 0..stride.grid_width {
      let offset = (gy * stride.grid_width + gx) * channels;
      let cell = &data[offset..offset + channels];

      let objectness = cell[4];
      let (class_id, score) = if num_classes <= 1 {
        (0, objectness)
      } else {
        let (class_id, prob) = argmax(&cell[5..5 + num_classes]);
        (class_id, objectness * prob)
      };

      // NaN 也在这里被过滤
      if !(score >= params.prob_threshold) {
        continue;
      }

      let (fx, fy) = (gx as f32, gy as f32);
      let x0 = ((fx - cell[0].max(0.0)) * s).clamp(0.0, params.input_width);
      let y0 = ((fy - cell[1].max(0.0)) * s).clamp(0.0, params.input_height);
      let x1 = ((fx + cell[2].max(0.0)) * s).clamp(0.0, params.input_width);
      let y1 = ((fy + cell[3].max(0.0)) * s).clamp(0.0, params.input_height);

      let kps_base = 5 + num_classes;
      let keypoints = (0..num_keypoints)
        .map(|k| {
          let kp = &cell[kps_base + 3 * k..kps_base + 3 * k + 3];
          Keypoint {
            x: kp[0] * s + fx * s,
            y: kp[1] * s + fy * s,
            score: kp[2],
          }
        })
        .collect();

      proposals.push(
        Detection::new(Rect::from_corners(x0, y0, x1, y1), class_id, score)
          .with_keypoints(keypoints),
      );
    }
  }
}

#[allow(clippy::too_many_arguments)]
fn decode_dfl(
  data: &[f32],
  kps_data: Option<&[f32]>,
  reg_max: usize,
  num_classes: usize,
  num_keypoints: usize,
  stride: &StrideDescriptor,
  params: &ProposalParams,
  proposals: &mut Vec<Detection>,
) {
  let reg_channels = 4 * reg_max;
  let channels = reg_channels + num_classes;
  let kps_channels = 3 * num_keypoints;
  let s = stride.stride as f32;

  for gy in 0..stride.grid_height {
    for gx in 0..stride.grid_width {
      let idx = gy * stride.grid_width + gx;
      let cell = &data[idx * channels..(idx + 1) * channels];

      let (class_id, logit) = argmax(&cell[reg_channels..]);
      let score = sigmoid(logit);
      if !(score >= params.prob_threshold) {
        continue;
      }

      let mut dist = [0.0f32; 4];
      for (k, d) in dist.iter_mut().enumerate() {
        *d = dfl_expectation(&cell[k * reg_max..(k + 1) * reg_max]) * s;
      }

      let (fx, fy) = (gx as f32, gy as f32);
      let cx = (fx + 0.5) * s;
      let cy = (fy + 0.5) * s;
      let x0 = (cx - dist[0]).clamp(0.0, params.input_width);
      let y0 = (cy - dist[1]).clamp(0.0, params.input_height);
      let x1 = (cx + dist[2]).clamp(0.0, params.input_width);
      let y1 = (cy + dist[3]).clamp(0.0, params.input_height);

      let keypoints = match kps_data {
        Some(kps) => {
          let kcell = &kps[idx * kps_channels..(idx + 1) * kps_channels];
          kcell
            .chunks_exact(3)
            .map(|kp| Keypoint {
              x: (kp[0] * 2.0 + fx) * s,
              y: (kp[1] * 2.0 + fy) * s,
              score: sigmoid(kp[2]),
            })
            .collect()
        }
        None => Vec::new(),
      };

      proposals.push(
        Detection::new(Rect::from_corners(x0, y0, x1, y1), class_id, score)
          .with_keypoints(keypoints),
      );
    }
  }
}

/// 返回最大值的索引与数值，相等时取靠前者
fn argmax(values: &[f32]) -> (usize, f32) {
  let mut best = (0usize, f32::NEG_INFINITY);
  for (i, &v) in values.iter().enumerate() {
    if v > best.1 {
      best = (i, v);
    }
  }
  best
}

/// 对分布做 softmax 后求期望
fn dfl_expectation(bins: &[f32]) -> f32 {
  let max = bins.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let mut sum = 0.0f32;
  let mut weighted = 0.0f32;
  for (i, &b) in bins.iter().enumerate() {
    let e = (b - max).exp();
    sum += e;
    weighted += e * i as f32;
  }
  if sum > 0.0 { weighted / sum } else { 0.0 }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
  use super::*;

  const PARAMS: ProposalParams = ProposalParams {
    prob_threshold: 0.5,
    input_width: 640.0,
    input_height: 640.0,
  };

  fn objectness_grid(gh: usize, gw: usize, channels: usize, cells: &[(usize, &[f32])]) -> Vec<f32> {
    let mut data = vec![0.0; gh * gw * channels];
    for &(idx, values) in cells {
      data[idx * channels..idx * channels + values.len()].copy_from_slice(values);
    }
    data
  }

  #[test]
  fn grid_sizes_follow_input() {
    let strides = StrideDescriptor::for_input(480, 640, &DEFAULT_STRIDES);
    assert_eq!(strides[0], StrideDescriptor::new(8, 60, 80));
    assert_eq!(strides[1], StrideDescriptor::new(16, 30, 40));
    assert_eq!(strides[2], StrideDescriptor::new(32, 15, 20));
  }

  #[test]
  fn objectness_box_is_decoded_in_stride_units() {
    let layout = HeadLayout::Objectness {
      num_classes: 1,
      num_keypoints: 0,
    };
    let stride = StrideDescriptor::new(16, 4, 4);
    // 第 (1, 2) 个网格
    let data = objectness_grid(4, 4, 6, &[(6, &[1.0, 0.5, 2.0, 3.0, 0.8, 1.0])]);
    let shape = [1, 4, 4, 6];

    let mut out = Vec::new();
    let added =
      generate_proposals(&layout, &stride, TensorView::new(&data, &shape), None, &PARAMS, &mut out)
        .unwrap();

    assert_eq!(added, 1);
    let det = &out[0];
    assert_eq!(det.class_id, 0);
    assert!((det.score - 0.8).abs() < 1e-6);
    assert_eq!(det.rect, Rect::from_corners(16.0, 8.0, 64.0, 64.0));
    assert!(det.keypoints.is_empty());
  }

  #[test]
  fn objectness_negative_extents_are_clipped() {
    let layout = HeadLayout::Objectness {
      num_classes: 1,
      num_keypoints: 0,
    };
    let stride = StrideDescriptor::new(8, 2, 2);
    let data = objectness_grid(2, 2, 6, &[(0, &[-3.0, -1.0, 100.0, 1.0, 0.9, 1.0])]);
    let shape = [2, 2, 6];

    let mut out = Vec::new();
    let params = ProposalParams {
      input_width: 16.0,
      input_height: 16.0,
      ..PARAMS
    };
    generate_proposals(&layout, &stride, TensorView::new(&data, &shape), None, &params, &mut out)
      .unwrap();

    let rect = out[0].rect;
    assert_eq!(rect.x, 0.0);
    assert_eq!(rect.y, 0.0);
    assert_eq!(rect.right(), 16.0);
    assert_eq!(rect.bottom(), 8.0);
    assert!(rect.width >= 0.0 && rect.height >= 0.0);
  }

  #[test]
  fn objectness_multi_class_multiplies_foreground() {
    let layout = HeadLayout::Objectness {
      num_classes: 3,
      num_keypoints: 0,
    };
    let stride = StrideDescriptor::new(8, 1, 2);
    let data = objectness_grid(
      1,
      2,
      8,
      &[
        (0, &[1.0, 1.0, 1.0, 1.0, 0.9, 0.1, 0.7, 0.2]),
        // 0.9 * 0.5 低于阈值
        (1, &[1.0, 1.0, 1.0, 1.0, 0.9, 0.5, 0.1, 0.2]),
      ],
    );
    let shape = [1, 1, 2, 8];

    let mut out = Vec::new();
    generate_proposals(&layout, &stride, TensorView::new(&data, &shape), None, &PARAMS, &mut out)
      .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].class_id, 1);
    assert!((out[0].score - 0.63).abs() < 1e-6);
  }

  #[test]
  fn objectness_keypoints_are_offset_from_cell_origin() {
    let layout = HeadLayout::Objectness {
      num_classes: 1,
      num_keypoints: 2,
    };
    let stride = StrideDescriptor::new(32, 2, 2);
    let data = objectness_grid(
      2,
      2,
      12,
      &[(3, &[0.5, 0.5, 0.5, 0.5, 0.95, 1.0, 0.25, 0.5, 0.9, -0.5, 0.0, 0.1])],
    );
    let shape = [1, 2, 2, 12];

    let mut out = Vec::new();
    generate_proposals(&layout, &stride, TensorView::new(&data, &shape), None, &PARAMS, &mut out)
      .unwrap();

    let kps = &out[0].keypoints;
    assert_eq!(kps.len(), 2);
    assert_eq!(kps[0], Keypoint { x: 40.0, y: 48.0, score: 0.9 });
    assert_eq!(kps[1], Keypoint { x: 16.0, y: 32.0, score: 0.1 });
  }

  #[test]
  fn dfl_box_and_keypoints() {
    let layout = HeadLayout::Dfl {
      reg_max: DFL_REG_MAX,
      num_classes: 2,
      num_keypoints: 1,
    };
    let stride = StrideDescriptor::new(8, 2, 2);
    let channels = layout.box_channels();
    assert_eq!(channels, 66);

    let mut data = vec![-10.0f32; 4 * channels];
    // 第 3 个网格 (gx = 1, gy = 1)，四个方向的距离分别为 2, 3, 4, 5 个 stride
    let cell = &mut data[3 * channels..4 * channels];
    for (k, bin) in [2usize, 3, 4, 5].into_iter().enumerate() {
      for b in 0..DFL_REG_MAX {
        cell[k * DFL_REG_MAX + b] = if b == bin { 30.0 } else { 0.0 };
      }
    }
    cell[64] = -2.0;
    cell[65] = 4.0;

    let mut kps = vec![0.0f32; 4 * 3];
    kps[9] = 0.5;
    kps[10] = -0.25;
    kps[11] = 0.0;
    let shape = [1, 2, 2, channels];
    let kps_shape = [1, 2, 2, 3];

    let mut out = Vec::new();
    generate_proposals(
      &layout,
      &stride,
      TensorView::new(&data, &shape),
      Some(TensorView::new(&kps, &kps_shape)),
      &PARAMS,
      &mut out,
    )
    .unwrap();

    assert_eq!(out.len(), 1);
    let det = &out[0];
    assert_eq!(det.class_id, 1);
    assert!((det.score - sigmoid(4.0)).abs() < 1e-6);
    // 中心 (12, 12)
    let r = det.rect;
    assert!((r.x - 0.0).abs() < 1e-3);
    assert!((r.y - 0.0).abs() < 1e-3);
    assert!((r.right() - 44.0).abs() < 1e-3);
    assert!((r.bottom() - 52.0).abs() < 1e-3);

    assert_eq!(det.keypoints.len(), 1);
    assert!((det.keypoints[0].x - 16.0).abs() < 1e-5);
    assert!((det.keypoints[0].y - 4.0).abs() < 1e-5);
    assert!((det.keypoints[0].score - 0.5).abs() < 1e-6);
  }

  #[test]
  fn dfl_pose_without_keypoint_tensor_is_rejected() {
    let layout = HeadLayout::Dfl {
      reg_max: DFL_REG_MAX,
      num_classes: 1,
      num_keypoints: 21,
    };
    let stride = StrideDescriptor::new(32, 1, 1);
    let data = vec![0.0f32; layout.box_channels()];
    let shape = [1, 1, 1, layout.box_channels()];
    let mut out = Vec::new();
    let err = generate_proposals(
      &layout,
      &stride,
      TensorView::new(&data, &shape),
      None,
      &PARAMS,
      &mut out,
    )
    .unwrap_err();
    assert!(matches!(err, PostprocessError::ShapeMismatch { .. }));
    assert!(out.is_empty());
  }

  #[test]
  fn wrong_channel_count_is_shape_mismatch() {
    let layout = HeadLayout::Objectness {
      num_classes: 80,
      num_keypoints: 0,
    };
    let stride = StrideDescriptor::new(8, 2, 2);
    let data = vec![0.9f32; 2 * 2 * 84];
    let shape = [1, 2, 2, 84];
    let mut out = Vec::new();
    let err = generate_proposals(
      &layout,
      &stride,
      TensorView::new(&data, &shape),
      None,
      &PARAMS,
      &mut out,
    )
    .unwrap_err();

    assert_eq!(
      err,
      PostprocessError::ShapeMismatch {
        tensor: "stride 8".to_string(),
        expected: vec![2, 2, 85],
        actual: vec![1, 2, 2, 84],
      }
    );
  }

  #[test]
  fn lower_threshold_never_yields_fewer_candidates() {
    let layout = HeadLayout::Objectness {
      num_classes: 1,
      num_keypoints: 0,
    };
    let stride = StrideDescriptor::new(8, 4, 4);
    let mut data = vec![0.0f32; 16 * 6];
    for i in 0..16 {
      data[i * 6 + 2] = 1.0;
      data[i * 6 + 3] = 1.0;
      data[i * 6 + 4] = i as f32 / 16.0;
    }
    let shape = [4, 4, 6];

    let mut last = 0;
    for t in [0.9f32, 0.7, 0.5, 0.3, 0.1, 0.0] {
      let mut out = Vec::new();
      let params = ProposalParams {
        prob_threshold: t,
        ..PARAMS
      };
      generate_proposals(&layout, &stride, TensorView::new(&data, &shape), None, &params, &mut out)
        .unwrap();
      assert!(out.len() >= last);
      last = out.len();
    }
    assert_eq!(last, 16);
  }
}
