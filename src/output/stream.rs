// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/stream.rs - 按模型族合成画面并发布
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
use tracing::{debug, info, warn};

use super::{
  FRAME_STREAM, JPEG_QUALITY, PublishSink, Render, VIDEO_STREAM,
  draw::{Draw, side_by_side_depth},
  encode_jpeg,
  record::prediction_record,
};
use crate::model::{Prediction, labels::label_of};

#[derive(Error, Debug)]
pub enum StreamOutputError<E: std::error::Error + 'static> {
  #[error("JPEG 编码错误: {0}")]
  EncodeError(#[from] image::ImageError),
  #[error("发布错误: {0}")]
  SinkError(#[source] E),
}

/// 将推理结果画到帧上，编码为 JPEG 后发布到接收端
pub struct StreamOutput<S> {
  sink: S,
  draw: Draw,
  labels: &'static [&'static str],
  quality: u8,
}

impl<S> StreamOutput<S> {
  pub fn new(sink: S, labels: &'static [&'static str]) -> Self {
    Self {
      sink,
      draw: Draw::default(),
      labels,
      quality: JPEG_QUALITY,
    }
  }

  pub fn with_quality(mut self, quality: u8) -> Self {
    self.quality = quality;
    self
  }

  pub fn sink(&self) -> &S {
    &self.sink
  }
}

impl<S, E> StreamOutput<S>
where
  S: PublishSink<Error = E>,
  E: std::error::Error + 'static,
{
  fn send(
    &self,
    stream: &str,
    image: &RgbImage,
    record: Option<&serde_json::Value>,
  ) -> Result<(), StreamOutputError<E>> {
    let jpeg = encode_jpeg(image, self.quality)?;
    debug!("发布 {}: {} 字节", stream, jpeg.len());
    self
      .sink
      .publish(stream, &jpeg, record)
      .map_err(StreamOutputError::SinkError)
  }
}

impl<S, E> Render<RgbImage, Prediction> for StreamOutput<S>
where
  S: PublishSink<Error = E>,
  E: std::error::Error + 'static,
{
  type Error = StreamOutputError<E>;

  fn render_result(&self, frame: &RgbImage, result: &Prediction) -> Result<(), Self::Error> {
    if frame.width() == 0 || frame.height() == 0 {
      warn!("空帧 {}x{} 不发布", frame.width(), frame.height());
      return Ok(());
    }
    let record = prediction_record(result, self.labels);
    match result {
      Prediction::Detections(detections) => {
        let mut canvas = frame.clone();
        self.draw.draw_detections(&mut canvas, detections);
        self.send(VIDEO_STREAM, &canvas, Some(&record))
      }
      Prediction::Depth(depth) => {
        self.send(FRAME_STREAM, frame, None)?;
        let canvas = side_by_side_depth(frame, depth);
        self.send(VIDEO_STREAM, &canvas, Some(&record))
      }
      Prediction::Classes(scores) => {
        for (rank, score) in scores.iter().enumerate() {
          info!(
            "Top {}: {} ({}) = {:.4}",
            rank + 1,
            score.index,
            label_of(self.labels, score.index).unwrap_or("-"),
            score.score
          );
        }
        self.send(VIDEO_STREAM, frame, Some(&record))
      }
    }
  }
}
