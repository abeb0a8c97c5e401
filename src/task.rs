// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 逐帧处理任务
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

use std::{sync::mpsc, thread, time::Duration};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 推理一帧，失败时记录警告并使用空结果
fn infer_or_empty<M>(model: &mut M, frame: &M::Input, frame_index: usize) -> M::Output
where
  M: Model,
  M::Error: std::fmt::Display,
{
  match model.infer(frame) {
    Ok(result) => result,
    Err(e) => {
      warn!("第 {} 帧处理失败，输出空结果: {}", frame_index, e);
      model.empty_output()
    }
  }
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

#[derive(Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self::new()
  }
}

impl ContinuousTask {
  /// 运行时安装 Ctrl-C 处理函数
  pub fn new() -> Self {
    Self {
      frame_number: None,
      handle_interrupt: true,
    }
  }

  /// 不安装 Ctrl-C 处理函数，用于同一进程内多次运行
  pub fn without_interrupt() -> Self {
    Self {
      frame_number: None,
      handle_interrupt: false,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 是否安装 Ctrl-C 处理函数，进程内只能安装一次
  pub fn with_interrupt_handler(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }

  fn install_interrupt(&self) -> Result<mpsc::Receiver<()>, ctrlc::Error> {
    let (tx, rx) = mpsc::channel();
    if self.handle_interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }
    Ok(rx)
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = self.install_interrupt()?;

    let mut frame_index = 0usize;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);
      let result = infer_or_empty(&mut model, &frame, frame_index);
      let elapsed_a = now.elapsed();
      if let Err(e) = output.render_result(&frame, &result) {
        warn!("第 {} 帧发布失败，继续处理: {}", frame_index, e);
      }
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;

  #[derive(Debug, thiserror::Error)]
  #[error("odd frame")]
  struct OddFrame;

  /// 奇数帧失败的模型
  struct Parity;

  impl Model for Parity {
    type Input = u32;
    type Output = Option<u32>;
    type Error = OddFrame;

    fn infer(&mut self, input: &u32) -> Result<Option<u32>, OddFrame> {
      if input % 2 == 1 { Err(OddFrame) } else { Ok(Some(*input)) }
    }

    fn empty_output(&self) -> Option<u32> {
      None
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<Option<u32>>>,
  }

  impl Render<u32, Option<u32>> for &Collect {
    type Error = std::convert::Infallible;

    fn render_result(&self, _frame: &u32, result: &Option<u32>) -> Result<(), Self::Error> {
      self.seen.borrow_mut().push(*result);
      Ok(())
    }
  }

  #[test]
  fn failed_frames_render_empty_results() {
    let collect = Collect::default();
    ContinuousTask::without_interrupt()
      .run_task(0u32..4, Parity, &collect)
      .unwrap();
    assert_eq!(*collect.seen.borrow(), vec![Some(0), None, Some(2), None]);
  }

  #[test]
  fn default_installs_interrupt_handler() {
    assert!(ContinuousTask::default().handle_interrupt);
    assert!(!ContinuousTask::without_interrupt().handle_interrupt);
  }

  #[test]
  fn stops_after_frame_number() {
    let collect = Collect::default();
    ContinuousTask::without_interrupt()
      .with_frame_number(Some(2))
      .run_task(0u32..10, Parity, &collect)
      .unwrap();
    assert_eq!(collect.seen.borrow().len(), 2);
  }

  #[derive(Debug, thiserror::Error)]
  #[error("sink closed")]
  struct SinkClosed;

  /// 值为 2 的帧发布失败
  #[derive(Default)]
  struct Flaky {
    seen: RefCell<Vec<u32>>,
  }

  impl Render<u32, Option<u32>> for &Flaky {
    type Error = SinkClosed;

    fn render_result(&self, frame: &u32, _result: &Option<u32>) -> Result<(), Self::Error> {
      if *frame == 2 {
        return Err(SinkClosed);
      }
      self.seen.borrow_mut().push(*frame);
      Ok(())
    }
  }

  #[test]
  fn render_failures_do_not_stop_the_loop() {
    let flaky = Flaky::default();
    ContinuousTask::without_interrupt()
      .run_task(0u32..5, Parity, &flaky)
      .unwrap();
    assert_eq!(*flaky.seen.borrow(), vec![0, 1, 3, 4]);
  }

  #[test]
  fn one_shot_propagates_errors() {
    let collect = Collect::default();
    assert!(OneShotTask.run_task(1u32..2, Parity, &collect).is_err());
    assert!(OneShotTask.run_task(4u32..5, Parity, &collect).is_ok());
    assert_eq!(*collect.seen.borrow(), vec![Some(4)]);
  }
}
