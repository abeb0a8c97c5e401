// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/directory.rs - 按文件名顺序读取目录中的图像
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

use std::{collections::VecDeque, path::PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, decoded_path};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 目录中的图像序列，按文件名字典序输出，无法解码的文件被跳过
pub struct DirectoryInput {
  pending: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(DirectoryInputError::SchemeMismatch);
    }
    Self::open(decoded_path(url))
  }
}

impl DirectoryInput {
  pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DirectoryInputError> {
    let dir = dir.into();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if path.is_file() && is_image {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图像", dir.display(), files.len());

    Ok(Self {
      pending: files.into(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      let decoded = ImageReader::open(&path)
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode());
      match decoded {
        Ok(image) => {
          debug!("读取图像: {}", path.display());
          return Some(image.to_rgb8());
        }
        Err(e) => warn!("跳过无法读取的文件 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yields_images_in_lexical_order() {
    let dir = std::env::temp_dir().join(format!("shanan-folder-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    RgbImage::from_pixel(2, 2, image::Rgb([2, 0, 0]))
      .save(dir.join("b.png"))
      .unwrap();
    RgbImage::from_pixel(3, 1, image::Rgb([1, 0, 0]))
      .save(dir.join("a.png"))
      .unwrap();
    std::fs::write(dir.join("c.png"), b"not an image").unwrap();
    std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

    let url = Url::parse(&format!("folder://{}", dir.display())).unwrap();
    let input = DirectoryInput::from_url(&url).unwrap();
    assert_eq!(input.remaining(), 3);

    let frames: Vec<RgbImage> = input.collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].get_pixel(0, 0).0, [1, 0, 0]);
    assert_eq!(frames[1].get_pixel(0, 0).0, [2, 0, 0]);

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
