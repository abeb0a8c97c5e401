// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/ax_stream.rs - 摄像头/图像推理并推流
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
use url::Url;

use shanan_ax::{
  FromUrl,
  input::InputWrapper,
  model::{Detector, ModelConfig},
  output::{OutputWrapper, StreamOutput},
  runtime::RknpuRunner,
  task::{ContinuousTask, OneShotTask, Task},
};
use tracing::info;

/// 推理推流参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型，例如 yolo11:///models/yolo11s.rknn?threshold=0.5
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源：image://、folder:// 或 v4l://
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出：mjpeg://0.0.0.0:7777、image:// 或 folder://
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 只处理第一帧，出错时直接退出
  #[arg(long)]
  pub one_shot: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = ModelConfig::from_url(&args.model)?;
  let runner = RknpuRunner::load(&config.path, config.output_shapes())?;
  let labels = config.labels;
  let model = Detector::new(config, runner);

  let input = InputWrapper::from_url(&args.input)?;
  let output = StreamOutput::new(OutputWrapper::from_url(&args.output)?, labels);

  if args.one_shot {
    OneShotTask.run_task(input, model, output)?;
  } else {
    ContinuousTask::new()
      .with_frame_number(args.frame_number)
      .run_task(input, model, output)?;
  }

  Ok(())
}
