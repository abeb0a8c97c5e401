// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/mjpeg.rs - HTTP MJPEG 推流
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

use std::{
  collections::HashMap,
  convert::Infallible,
  net::SocketAddr,
  sync::{Arc, Mutex, MutexGuard},
};

use axum::{
  Router,
  body::{Body, Bytes},
  extract::{Path, State},
  http::header,
  response::IntoResponse,
  routing::get,
};
use thiserror::Error;
use tokio::{runtime::Runtime, sync::watch};
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::PublishSink};

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 7777;

const BOUNDARY: &str = "frame";
const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

#[derive(Error, Debug)]
pub enum MjpegOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每个流只保留最新一帧，慢客户端直接跳帧
#[derive(Clone, Default)]
struct Channels {
  inner: Arc<Mutex<HashMap<String, watch::Sender<Option<Bytes>>>>>,
}

impl Channels {
  fn lock(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<Option<Bytes>>>> {
    self
      .inner
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn subscribe(&self, stream: &str) -> watch::Receiver<Option<Bytes>> {
    self
      .lock()
      .entry(stream.to_string())
      .or_insert_with(|| watch::channel(None).0)
      .subscribe()
  }

  fn send(&self, stream: &str, jpeg: Bytes) {
    let mut channels = self.lock();
    match channels.get(stream) {
      Some(tx) => {
        tx.send_replace(Some(jpeg));
      }
      None => {
        channels.insert(stream.to_string(), watch::channel(Some(jpeg)).0);
      }
    }
  }
}

fn multipart_part(jpeg: &[u8]) -> Bytes {
  let header = format!(
    "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
    BOUNDARY,
    jpeg.len()
  );
  let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
  part.extend_from_slice(header.as_bytes());
  part.extend_from_slice(jpeg);
  part.extend_from_slice(b"\r\n");
  Bytes::from(part)
}

async fn stream_handler(
  State(channels): State<Channels>,
  Path(stream): Path<String>,
) -> impl IntoResponse {
  let name = format!("/{}", stream);
  debug!("MJPEG 客户端订阅 {}", name);
  let rx = channels.subscribe(&name);

  // 先发送当前帧，之后每次更新发送一帧
  let parts = futures::stream::unfold((rx, true), |(mut rx, mut first)| async move {
    loop {
      if !first && rx.changed().await.is_err() {
        return None;
      }
      first = false;
      let frame = rx.borrow_and_update().clone();
      if let Some(jpeg) = frame {
        return Some((Ok::<_, Infallible>(multipart_part(&jpeg)), (rx, false)));
      }
    }
  });

  (
    [(header::CONTENT_TYPE, MULTIPART_CONTENT_TYPE)],
    Body::from_stream(parts),
  )
}

/// 以 `multipart/x-mixed-replace` 推送各个流，`GET /video` 订阅 `/video`
pub struct MjpegOutput {
  channels: Channels,
  local_addr: SocketAddr,
  // 服务在该运行时的工作线程上运行，随输出一起释放
  _runtime: Runtime,
}

impl FromUrlWithScheme for MjpegOutput {
  const SCHEME: &'static str = "mjpeg";
}

impl FromUrl for MjpegOutput {
  type Error = MjpegOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(MjpegOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let host = uri.host_str().unwrap_or("0.0.0.0");
    Self::bind(host, uri.port().unwrap_or(DEFAULT_PORT))
  }
}

impl MjpegOutput {
  pub fn bind(host: &str, port: u16) -> Result<Self, MjpegOutputError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .worker_threads(2)
      .thread_name("mjpeg-server")
      .enable_all()
      .build()?;
    let listener = runtime.block_on(tokio::net::TcpListener::bind((host, port)))?;
    let local_addr = listener.local_addr()?;

    let channels = Channels::default();
    let app = Router::new()
      .route("/*stream", get(stream_handler))
      .with_state(channels.clone());
    runtime.spawn(async move {
      if let Err(e) = axum::serve(listener, app).await {
        error!("MJPEG 服务异常退出: {}", e);
      }
    });
    info!("MJPEG 服务启动于 http://{}", local_addr);

    Ok(Self {
      channels,
      local_addr,
      _runtime: runtime,
    })
  }

  pub fn local_addr(&self) -> SocketAddr {
    self.local_addr
  }
}

impl PublishSink for MjpegOutput {
  type Error = MjpegOutputError;

  fn publish(
    &self,
    stream: &str,
    jpeg: &[u8],
    _record: Option<&serde_json::Value>,
  ) -> Result<(), Self::Error> {
    self.channels.send(stream, Bytes::copy_from_slice(jpeg));
    Ok(())
  }
}
