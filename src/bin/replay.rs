// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/replay.rs - 对保存的推理输出做后处理
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

use anyhow::Result;
use clap::Parser;
use image::RgbImage;
use thiserror::Error;
use url::Url;

use shanan_ax::{
  FromUrl,
  input::InputWrapper,
  model::{Detector, ModelConfig, Prediction},
  output::{
    OutputError, OutputWrapper, Render, StreamOutput, StreamOutputError, record::prediction_record,
  },
  runtime::ReplayRunner,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// 回放参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型配置，例如 yolo11-pose:///hand.axmodel
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 保存的输出张量目录，例如 replay:///data/dump
  #[arg(long, value_name = "DUMP")]
  pub dump: Url,
  /// 原图，用于坐标还原；缺省时按网络输入尺寸处理
  #[arg(long, value_name = "SOURCE")]
  pub input: Option<Url>,
  /// 可选的渲染输出
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

#[derive(Error, Debug)]
enum ReplayOutputError {
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("渲染输出错误: {0}")]
  StreamError(#[from] StreamOutputError<OutputError>),
}

/// 打印每帧的 JSON 结果，并可选地渲染到输出
struct ReplayOutput {
  labels: &'static [&'static str],
  stream: Option<StreamOutput<OutputWrapper>>,
}

impl Render<RgbImage, Prediction> for ReplayOutput {
  type Error = ReplayOutputError;

  fn render_result(&self, frame: &RgbImage, result: &Prediction) -> Result<(), Self::Error> {
    println!(
      "{}",
      serde_json::to_string_pretty(&prediction_record(result, self.labels))?
    );
    if let Some(stream) = &self.stream {
      stream.render_result(frame, result)?;
    }
    Ok(())
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let config = ModelConfig::from_url(&args.model)?;
  let labels = config.labels;
  let (input_width, input_height) = (
    config.preprocess.input_width,
    config.preprocess.input_height,
  );
  let runner = ReplayRunner::from_url(&args.dump)?;
  let model = Detector::new(config, runner);

  let frames: Box<dyn Iterator<Item = RgbImage>> = match &args.input {
    Some(url) => Box::new(InputWrapper::from_url(url)?),
    None => {
      info!("未指定原图，使用 {}x{} 空白帧", input_width, input_height);
      Box::new(std::iter::once(RgbImage::new(input_width, input_height)))
    }
  };
  let stream = match &args.output {
    Some(url) => Some(StreamOutput::new(OutputWrapper::from_url(url)?, labels)),
    None => None,
  };
  let output = ReplayOutput { labels, stream };

  ContinuousTask::new()
    .with_frame_number(args.frame_number)
    .run_task(frames, model, output)?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use shanan_ax::postprocess::DetectResult;

  #[test]
  fn replay_output_prints_without_render_target() {
    let output = ReplayOutput {
      labels: &[],
      stream: None,
    };
    output
      .render_result(
        &RgbImage::new(4, 4),
        &Prediction::Detections(DetectResult::default()),
      )
      .unwrap();
  }
}
