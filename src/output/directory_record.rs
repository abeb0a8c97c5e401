// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 按时间归档到目录
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
use std::sync::Mutex;

use chrono::{DateTime, Datelike, Local};
use thiserror::Error;
use tracing::debug;

use crate::{FromUrl, FromUrlWithScheme, decoded_path, output::PublishSink, query_flag};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 将每个流的帧写入 `<dir>/<stream>/YYYY/MM/DD/HH-MM-SS-XXXX.jpg`
///
/// `?record` 时在图像旁写入同名 `.json` 结果文件。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: bool,
  frame_counter: Mutex<u16>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    Ok(Self::new(decoded_path(uri), query_flag(uri, "record")))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, record: bool) -> Self {
    Self {
      directory: directory.into(),
      record,
      frame_counter: Mutex::new(0),
    }
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self, stream: &str, now: DateTime<Local>) -> Result<PathBuf, std::io::Error> {
    let stream_dir = stream.trim_matches('/');
    let directory = self
      .directory
      .join(if stream_dir.is_empty() { "default" } else { stream_dir })
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.jpg",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }
}

impl PublishSink for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn publish(
    &self,
    stream: &str,
    jpeg: &[u8],
    record: Option<&serde_json::Value>,
  ) -> Result<(), Self::Error> {
    let path = self.frame_path(stream, Local::now())?;
    std::fs::write(&path, jpeg)?;
    debug!("写入 {}", path.display());

    if self.record
      && let Some(record) = record
    {
      std::fs::write(path.with_extension("json"), serde_json::to_vec_pretty(record)?)?;
    }
    Ok(())
  }
}
