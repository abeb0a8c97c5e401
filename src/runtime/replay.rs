// 该文件是 Shanan （山南西风） 项目的一部分。
// src/runtime/replay.rs - 回放已保存的推理输出
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

use tracing::{debug, info};
use url::Url;

use super::{InferenceRunner, OwnedOutputs, OwnedTensor, RuntimeError};
use crate::{FromUrl, FromUrlWithScheme, decoded_path, frame::NhwcFrame};

const SHAPES_FILE: &str = "shapes.json";

/// 从目录读取一组输出张量，每次推理都返回同一组结果
///
/// 目录结构：
/// - `shapes.json`：形如 `[[1, 80, 80, 6], [1, 40, 40, 6]]` 的形状列表
/// - `output_<i>.bin`：第 i 个输出，小端 f32
pub struct ReplayRunner {
  dir: PathBuf,
  outputs: OwnedOutputs,
}

impl ReplayRunner {
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, RuntimeError> {
    let dir = dir.as_ref().to_path_buf();
    info!("加载回放数据: {}", dir.display());

    let shapes_path = dir.join(SHAPES_FILE);
    let shapes_text = std::fs::read_to_string(&shapes_path)?;
    let shapes: Vec<Vec<usize>> =
      serde_json::from_str(&shapes_text).map_err(|e| RuntimeError::MalformedDump {
        path: shapes_path.display().to_string(),
        reason: e.to_string(),
      })?;

    let mut tensors = Vec::with_capacity(shapes.len());
    for (idx, shape) in shapes.into_iter().enumerate() {
      let path = dir.join(format!("output_{}.bin", idx));
      let bytes = std::fs::read(&path)?;
      let data = decode_f32_le(&bytes).ok_or_else(|| RuntimeError::MalformedDump {
        path: path.display().to_string(),
        reason: format!("字节数 {} 不是 4 的倍数", bytes.len()),
      })?;

      let expected: usize = shape.iter().product();
      if data.len() != expected {
        return Err(RuntimeError::MalformedDump {
          path: path.display().to_string(),
          reason: format!("形状 {:?} 需要 {} 个元素, 实际 {}", shape, expected, data.len()),
        });
      }
      debug!("输出 {}: 形状 {:?}", idx, shape);
      tensors.push(OwnedTensor::new(data, shape));
    }

    info!("回放数据包含 {} 个输出", tensors.len());
    Ok(Self {
      dir,
      outputs: OwnedOutputs::new(tensors),
    })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn outputs(&self) -> &OwnedOutputs {
    &self.outputs
  }
}

fn decode_f32_le(bytes: &[u8]) -> Option<Vec<f32>> {
  if bytes.len() % 4 != 0 {
    return None;
  }
  Some(
    bytes
      .chunks_exact(4)
      .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
      .collect(),
  )
}

impl FromUrlWithScheme for ReplayRunner {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayRunner {
  type Error = RuntimeError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RuntimeError::SchemeMismatch(format!(
        "期望 {}, 实际 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::open(decoded_path(url))
  }
}

impl InferenceRunner for ReplayRunner {
  type Outputs = OwnedOutputs;
  type Error = RuntimeError;

  fn run(&mut self, input: &NhwcFrame) -> Result<Self::Outputs, Self::Error> {
    debug!("回放推理输出, 输入 {}x{}", input.width(), input.height());
    Ok(self.outputs.clone())
  }
}
