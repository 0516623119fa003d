// 该文件是 Paopao （泡泡） 项目的一部分。
// src/model.rs - 检测结果数据模型
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

use serde::{Deserialize, Serialize};

use crate::polygon::Polygon;

/// 轮廓提取失败时渲染层使用的椭圆裁剪
pub const ELLIPSE_CLIP_PATH: &str = "ellipse(50% 50% at 50% 50%)";

/// 角点形式的边界框
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl BBox {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 由中心点形式构造
  pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self {
      x1: cx - w / 2.0,
      y1: cy - h / 2.0,
      x2: cx + w / 2.0,
      y2: cy + h / 2.0,
    }
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  /// 退化框（宽或高不为正）面积为 0
  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  pub fn is_degenerate(&self) -> bool {
    !(self.width() > 0.0 && self.height() > 0.0)
  }

  /// 各坐标分别截断到 `[0, width] × [0, height]`
  pub fn clamp(&self, width: f32, height: f32) -> Self {
    Self {
      x1: self.x1.clamp(0.0, width),
      y1: self.y1.clamp(0.0, height),
      x2: self.x2.clamp(0.0, width),
      y2: self.y2.clamp(0.0, height),
    }
  }
}

/// 解码后、NMS 前的候选检测
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDetection {
  /// 原图像素坐标
  pub bbox: BBox,
  pub confidence: f32,
  pub mask_coeffs: Vec<f32>,
}

/// 最终检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
  /// 中心点与宽高，按原图尺寸归一化到 0..1
  pub center_x: f32,
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
  pub confidence: f32,
  /// 原图像素坐标，也是下游翻译缓存的键
  pub bbox_pixels: BBox,
  /// 掩码裁剪区域内的百分比坐标
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub polygon_path: Option<Polygon>,
}

impl Detection {
  pub fn new(
    bbox: BBox,
    confidence: f32,
    polygon_path: Option<Polygon>,
    image_width: u32,
    image_height: u32,
  ) -> Self {
    let (w, h) = (image_width as f32, image_height as f32);
    let bbox_pixels = bbox.clamp(w, h);
    Self {
      center_x: (bbox_pixels.x1 + bbox_pixels.x2) / 2.0 / w,
      center_y: (bbox_pixels.y1 + bbox_pixels.y2) / 2.0 / h,
      width: bbox_pixels.width() / w,
      height: bbox_pixels.height() / h,
      confidence: confidence.clamp(0.0, 1.0),
      bbox_pixels,
      polygon_path,
    }
  }

  /// CSS clip-path，没有轮廓时退回椭圆
  pub fn clip_path(&self) -> String {
    match &self.polygon_path {
      Some(polygon) => polygon.to_clip_path(),
      None => ELLIPSE_CLIP_PATH.to_string(),
    }
  }
}

/// 单张图像的检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
  pub detections: Vec<Detection>,
  pub image_width: u32,
  pub image_height: u32,
  pub inference_time_ms: f64,
}

impl DetectionResult {
  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  pub fn len(&self) -> usize {
    self.detections.len()
  }
}
