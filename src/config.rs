// 该文件是 Paopao （泡泡） 项目的一部分。
// src/config.rs - 检测参数配置
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

/// 模型输入边长（正方形）
pub const DEFAULT_INPUT_SIZE: u32 = 640;
/// 置信度阈值
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;
/// NMS IoU 阈值
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.5;
/// 掩码二值化阈值
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.5;
/// 轮廓提取时的采样步长
pub const DEFAULT_POLYGON_STRIDE: usize = 2;

/// 框坐标 + 置信度
pub const BOX_FEATURES: usize = 5;
/// 原型掩码数量
pub const NUM_PROTOTYPES: usize = 32;

/// 检测流水线配置
///
/// 所有阈值由调用方决定，这里只提供默认值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectConfig {
  pub input_size: u32,
  pub confidence_threshold: f32,
  pub nms_threshold: f32,
  pub mask_threshold: f32,
  pub polygon_stride: usize,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      input_size: DEFAULT_INPUT_SIZE,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      mask_threshold: DEFAULT_MASK_THRESHOLD,
      polygon_stride: DEFAULT_POLYGON_STRIDE,
    }
  }
}

impl DetectConfig {
  pub fn with_input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn with_mask_threshold(mut self, threshold: f32) -> Self {
    self.mask_threshold = threshold;
    self
  }

  /// 步长为 0 时按 1 处理
  pub fn with_polygon_stride(mut self, stride: usize) -> Self {
    self.polygon_stride = stride.max(1);
    self
  }
}
