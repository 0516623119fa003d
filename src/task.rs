// 该文件是 Paopao （泡泡） 项目的一部分。
// src/task.rs - 检测任务
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

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::{input::InferenceOutput, model::DetectionResult, output::Render, pipeline::Detector};

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: &Detector, output: O) -> Result<(), Self::Error>;
}

fn detect_frame(
  detector: &Detector,
  frame: &InferenceOutput,
) -> Result<DetectionResult, anyhow::Error> {
  let result = detector.detect(
    &frame.raw,
    frame.protos.as_ref(),
    frame.image_width,
    frame.image_height,
  )?;
  Ok(result)
}

pub struct OneShotTask;

impl<RE, I, O> Task<I, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = InferenceOutput>,
  O: Render<InferenceOutput, DetectionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: &Detector, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入张量"))?;
    info!("输入张量读取成功，开始解码...");
    let now = Instant::now();
    let result = detect_frame(detector, &frame)?;
    let elapsed = now.elapsed();
    info!("解码完成，检测到 {} 个气泡，耗时: {:.2?}", result.len(), elapsed);
    output.render_result(&frame, &result)?;

    Ok(())
  }
}

/// 对同一输入重复解码，统计平均耗时
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  /// 至少重复 3 次，前两次作为预热不计入平均值
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(3);
    self
  }
}

impl<RE, I, O> Task<I, O> for RepeatShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = InferenceOutput>,
  O: Render<InferenceOutput, DetectionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: &Detector, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入张量"))?;
    info!("输入张量读取成功，开始重复解码 {} 次...", self.repeat);

    let mut times = Vec::with_capacity(self.repeat);
    let mut last = None;
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = detect_frame(detector, &frame)?;
      let elapsed = now.elapsed();
      info!("({})解码完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
      last = Some(result);
    }

    if let Some(result) = last {
      output.render_result(&frame, &result)?;
    }

    warn!(
      "平均解码时间: {:.2?}",
      times.iter().skip(2).sum::<Duration>() / (times.len() - 2) as u32
    );

    Ok(())
  }
}
