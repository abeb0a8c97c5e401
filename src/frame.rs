// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - NHWC 网络输入帧定义
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

const RGB_CHANNELS: usize = 3;

/// 网络期望的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

impl ChannelOrder {
  pub fn parse(value: &str) -> Option<Self> {
    match value.to_ascii_lowercase().as_str() {
      "rgb" => Some(ChannelOrder::Rgb),
      "bgr" => Some(ChannelOrder::Bgr),
      _ => None,
    }
  }
}

/// NHWC 排布的 8 位三通道网络输入
#[derive(Debug, Clone)]
pub struct NhwcFrame {
  data: Box<[u8]>,
  height: usize,
  width: usize,
  order: ChannelOrder,
}

impl NhwcFrame {
  /// 创建指定尺寸、以 `fill` 填充的帧
  pub fn filled(height: usize, width: usize, fill: u8, order: ChannelOrder) -> Self {
    let size = RGB_CHANNELS * height * width;
    Self {
      data: vec![fill; size].into_boxed_slice(),
      height,
      width,
      order,
    }
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn channel_order(&self) -> ChannelOrder {
    self.order
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  /// 读取 (x, y) 处的像素，按帧自身的通道顺序返回
  pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
    let idx = (y * self.width + x) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 写入一个 RGB 像素，必要时交换为 BGR
  pub fn put_rgb(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
    let idx = (y * self.width + x) * RGB_CHANNELS;
    let [r, g, b] = rgb;
    let pixel = match self.order {
      ChannelOrder::Rgb => [r, g, b],
      ChannelOrder::Bgr => [b, g, r],
    };
    self.data[idx..idx + RGB_CHANNELS].copy_from_slice(&pixel);
  }
}

impl AsMut<[u8]> for NhwcFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}
