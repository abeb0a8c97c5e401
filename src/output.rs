// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 结果渲染与发布
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

use image::{RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use url::Url;

use crate::FromUrl;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

/// 按名称区分的图像流接收端
pub trait PublishSink {
  type Error;

  /// 发布一帧 JPEG 数据，`record` 为可选的结构化结果
  fn publish(
    &self,
    stream: &str,
    jpeg: &[u8],
    record: Option<&serde_json::Value>,
  ) -> Result<(), Self::Error>;
}

/// 推流使用的 JPEG 质量
pub const JPEG_QUALITY: u8 = 70;

/// 渲染后的画面
pub const VIDEO_STREAM: &str = "/video";
/// 未经处理的原始画面
pub const FRAME_STREAM: &str = "/frame";

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
  let mut buffer = Vec::new();
  JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(image)?;
  Ok(buffer)
}

pub mod draw;
pub mod record;

mod stream;
pub use self::stream::{StreamOutput, StreamOutputError};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[cfg(feature = "mjpeg_server")]
mod mjpeg;
#[cfg(feature = "mjpeg_server")]
pub use self::mjpeg::{MjpegOutput, MjpegOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[cfg(feature = "mjpeg_server")]
  #[error("MJPEG 推流错误: {0}")]
  MjpegOutputError(#[from] MjpegOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
  #[cfg(feature = "mjpeg_server")]
  MjpegOutput(MjpegOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(any(
      feature = "save_image_file",
      feature = "directory_record",
      feature = "mjpeg_server"
    ))]
    use crate::FromUrlWithScheme;

    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      #[cfg(feature = "mjpeg_server")]
      MjpegOutput::SCHEME => {
        let output = MjpegOutput::from_url(url)?;
        Ok(OutputWrapper::MjpegOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl PublishSink for OutputWrapper {
  type Error = OutputError;

  fn publish(
    &self,
    stream: &str,
    jpeg: &[u8],
    record: Option<&serde_json::Value>,
  ) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .publish(stream, jpeg, record)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .publish(stream, jpeg, record)
        .map_err(OutputError::from),
      #[cfg(feature = "mjpeg_server")]
      OutputWrapper::MjpegOutput(output) => output
        .publish(stream, jpeg, record)
        .map_err(OutputError::from),
      #[allow(unreachable_patterns)]
      _ => {
        let _ = (stream, jpeg, record);
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn jpeg_roundtrip_keeps_dimensions() {
    let image = RgbImage::from_pixel(16, 8, image::Rgb([200, 100, 50]));
    let bytes = encode_jpeg(&image, JPEG_QUALITY).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 8));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://127.0.0.1/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(_))
    ));
  }
}
