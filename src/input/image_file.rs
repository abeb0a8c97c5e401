// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/image_file.rs - 读取单张图像文件
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, decoded_path, query_value};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("无效的重复次数: {0}")]
  InvalidRepeat(String),
}

/// 单张图像作为输入，`?repeat=N` 时重复输出 N 次
pub struct ImageFileInput {
  image: RgbImage,
  remaining: usize,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let repeat = match query_value(url, "repeat") {
      None => 1,
      Some(value) => value
        .parse::<usize>()
        .map_err(|_| ImageFileInputError::InvalidRepeat(value))?,
    };

    let path = decoded_path(url);
    info!("读取图像文件: {}", path);
    let image = ImageReader::open(&path)?.decode()?.to_rgb8();

    Ok(Self::from_image(image, repeat))
  }
}

impl ImageFileInput {
  pub fn from_image(image: RgbImage, repeat: usize) -> Self {
    Self {
      image,
      remaining: repeat,
    }
  }
}

impl Iterator for ImageFileInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    Some(self.image.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn repeats_the_same_frame() {
    let image = RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3]));
    let frames: Vec<RgbImage> = ImageFileInput::from_image(image.clone(), 3).collect();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| *f == image));
  }

  #[test]
  fn reads_png_from_url() {
    let path = std::env::temp_dir().join(format!("shanan-input-{}.png", std::process::id()));
    RgbImage::from_pixel(5, 2, image::Rgb([10, 20, 30]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}?repeat=2", path.display())).unwrap();
    let frames: Vec<RgbImage> = ImageFileInput::from_url(&url).unwrap().collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].dimensions(), (5, 2));
    assert_eq!(frames[0].get_pixel(4, 1).0, [10, 20, 30]);

    std::fs::remove_file(&path).unwrap();
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("folder:///tmp").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemeMismatch)
    ));
  }
}
