// 该文件是 Paopao （泡泡） 项目的一部分。
// src/bin/decode_oneshot.rs - 单次解码
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

use paopao::{
  Detector, FromUrl,
  args::DecodeArgs,
  output::JsonRecordOutput,
  task::{OneShotTask, Task},
};
use tracing::info;

/// Paopao 单次解码参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub decode: DecodeArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输出路径: {}", args.decode.output);

  let input = args.decode.load_input()?;
  let detector = Detector::new(args.decode.config());
  let output = JsonRecordOutput::from_url(&args.decode.output)?;

  OneShotTask.run_task(std::iter::once(input), &detector, output)?;

  Ok(())
}
