// 该文件是 Paopao （泡泡） 项目的一部分。
// src/args.rs - 命令行参数配置
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

use clap::Args;
use tracing::info;
use url::Url;

use crate::{
  config::{DEFAULT_INPUT_SIZE, DetectConfig},
  input::{InferenceOutput, TensorFileInputError},
};

/// 解码参数
#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
  /// 检测输出张量，形如 tensor:///out0.bin?shape=1,37,8400
  #[arg(long, value_name = "TENSOR")]
  pub detections: Url,

  /// 原型掩码张量，形如 tensor:///out1.bin?shape=1,32,160,160
  #[arg(long, value_name = "TENSOR")]
  pub protos: Option<Url>,

  /// 输出路径
  /// 支持格式:
  /// - 文件: json:///path/to/result.json[?pretty]
  /// - 标准输出: stdout:
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
  pub output: Url,

  /// 原图宽度
  #[arg(long, value_name = "PIXELS")]
  pub width: u32,

  /// 原图高度
  #[arg(long, value_name = "PIXELS")]
  pub height: u32,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.3", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 模型输入边长
  #[arg(long, default_value_t = DEFAULT_INPUT_SIZE, value_name = "PIXELS")]
  pub input_size: u32,
}

impl DecodeArgs {
  pub fn config(&self) -> DetectConfig {
    DetectConfig::default()
      .with_input_size(self.input_size)
      .with_confidence_threshold(self.confidence)
      .with_nms_threshold(self.nms_threshold)
  }

  pub fn load_input(&self) -> Result<InferenceOutput, TensorFileInputError> {
    info!("检测张量: {}", self.detections);
    match &self.protos {
      Some(protos) => info!("原型掩码: {}", protos),
      None => info!("未提供原型掩码，跳过轮廓提取"),
    }
    info!("原图尺寸: {}x{}", self.width, self.height);
    InferenceOutput::load(
      &self.detections,
      self.protos.as_ref(),
      self.width,
      self.height,
    )
  }
}
