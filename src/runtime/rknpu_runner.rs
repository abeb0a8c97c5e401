// 该文件是 Shanan （山南西风） 项目的一部分。
// src/runtime/rknpu_runner.rs - RKNPU 推理后端
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info};

use super::{InferenceRunner, OwnedOutputs, OwnedTensor, RuntimeError};
use crate::frame::NhwcFrame;

const RKNPU_NUM_INPUTS: u32 = 1;

impl From<rknpu::Error> for RuntimeError {
  fn from(err: rknpu::Error) -> Self {
    RuntimeError::Backend(err.to_string())
  }
}

/// 基于 RKNN 上下文的推理后端
///
/// 输出形状由模型配置给出，后端只校验元素个数。
pub struct RknpuRunner {
  context: Context,
  shapes: Vec<Vec<usize>>,
}

impl RknpuRunner {
  pub fn load(model_path: &str, shapes: Vec<Vec<usize>>) -> Result<Self, RuntimeError> {
    info!("加载模型文件: {}", model_path);
    let model_data = std::fs::read(model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, InitFlags::default())?;

    let num_inputs = context.num_inputs()?;
    let num_outputs = context.num_outputs()?;
    debug!("模型输入数量: {}, 输出数量: {}", num_inputs, num_outputs);

    if num_inputs != RKNPU_NUM_INPUTS {
      error!("预期模型输入数量为 {}, 实际为 {}", RKNPU_NUM_INPUTS, num_inputs);
      return Err(RuntimeError::Backend(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNPU_NUM_INPUTS, num_inputs
      )));
    }
    if num_outputs as usize != shapes.len() {
      error!("预期模型输出数量为 {}, 实际为 {}", shapes.len(), num_outputs);
      return Err(RuntimeError::OutputCountMismatch {
        expected: shapes.len(),
        actual: num_outputs as usize,
      });
    }

    info!("模型加载完成");
    Ok(Self { context, shapes })
  }
}

impl InferenceRunner for RknpuRunner {
  type Outputs = OwnedOutputs;
  type Error = RuntimeError;

  fn run(&mut self, input: &NhwcFrame) -> Result<Self::Outputs, Self::Error> {
    debug!("设置模型输入");
    self
      .context
      .set_input(0, input.as_nhwc(), TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    let output = self.context.get_outputs()?;
    let mut tensors = Vec::with_capacity(self.shapes.len());
    for (idx, shape) in self.shapes.iter().enumerate() {
      let data = output.get_f32(idx)?.to_vec();
      debug!("输出 {}: {} 个元素", idx, data.len());
      tensors.push(OwnedTensor::new(data, shape.clone()));
    }
    Ok(OwnedOutputs::new(tensors))
  }
}
