// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/v4l2.rs - V4L2 摄像头输入
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

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use v4l::{
  FourCC, buffer::Type, io::mmap::Stream, io::traits::CaptureStream, prelude::*, video::Capture,
};

use crate::{FromUrl, FromUrlWithScheme, decoded_path, query_value};

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4l2InputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无法打开设备 {0}: {1}")]
  DeviceError(String, std::io::Error),
  #[error("无法创建捕获流: {0}")]
  StreamError(std::io::Error),
  #[error("无效参数: {0}")]
  InvalidParameter(String),
}

/// YUYV 摄像头，逐帧转换为 RGB
pub struct V4l2Input {
  stream: Stream<'static>,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for V4l2Input {
  const SCHEME: &'static str = "v4l";
}

fn dimension(url: &Url, key: &str, default: u32) -> Result<u32, V4l2InputError> {
  match query_value(url, key) {
    None => Ok(default),
    Some(value) => value
      .parse()
      .map_err(|_| V4l2InputError::InvalidParameter(format!("{} = {}", key, value))),
  }
}

impl FromUrl for V4l2Input {
  type Error = V4l2InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4l2InputError::SchemeMismatch);
    }

    // v4l:///dev/video0
    let path = decoded_path(url);
    let device_path = if path.is_empty() || path == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      path
    };
    let width = dimension(url, "width", DEFAULT_WIDTH)?;
    let height = dimension(url, "height", DEFAULT_HEIGHT)?;

    Self::open(&device_path, width, height)
  }
}

impl V4l2Input {
  pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, V4l2InputError> {
    info!("打开摄像头: {}", device_path);
    let device = Device::with_path(device_path)
      .map_err(|e| V4l2InputError::DeviceError(device_path.to_string(), e))?;

    let mut format = device
      .format()
      .map_err(|e| V4l2InputError::DeviceError(device_path.to_string(), e))?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device
      .set_format(&format)
      .map_err(|e| V4l2InputError::DeviceError(device_path.to_string(), e))?;
    info!("摄像头格式: {}x{} {}", format.width, format.height, format.fourcc);

    let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
      .map_err(V4l2InputError::StreamError)?;

    Ok(Self {
      stream,
      width: format.width,
      height: format.height,
    })
  }
}

/// YUYV 4:2:2 转 RGB
pub(crate) fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Option<RgbImage> {
  let mut rgb = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;
    for y in [chunk[0] as f32, chunk[2] as f32] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb.truncate((width * height * 3) as usize);
  RgbImage::from_raw(width, height, rgb)
}

impl Iterator for V4l2Input {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self.stream.next() {
      Ok((buffer, _meta)) => {
        let image = yuyv_to_rgb(buffer, self.width, self.height);
        if image.is_none() {
          error!("摄像头数据长度不足: {} 字节", buffer.len());
        }
        image
      }
      Err(e) => {
        error!("无法捕获帧: {}", e);
        None
      }
    }
  }
}
