// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存为图像文件
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, decoded_path,
  output::{PublishSink, VIDEO_STREAM},
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 每次发布覆盖同一个文件
///
/// `/video` 写入 URL 指定的路径，其他流写入 `<stem>-<stream>.jpg`。
pub struct SaveImageFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(decoded_path(uri)),
    })
  }
}

impl SaveImageFileOutput {
  pub fn stream_path(&self, stream: &str) -> PathBuf {
    if stream == VIDEO_STREAM {
      return self.path.clone();
    }
    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    let name = stream.trim_matches('/').replace('/', "-");
    self.path.with_file_name(format!("{}-{}.jpg", stem, name))
  }
}

impl PublishSink for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn publish(
    &self,
    stream: &str,
    jpeg: &[u8],
    _record: Option<&serde_json::Value>,
  ) -> Result<(), Self::Error> {
    let path = self.stream_path(stream);
    if let Some(parent) = Path::new(&path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&path, jpeg)?;
    info!("保存图像到文件: {}", path.display());
    Ok(())
  }
}
