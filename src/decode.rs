// 该文件是 Paopao （泡泡） 项目的一部分。
// src/decode.rs - 检测头输出解码
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

use tracing::debug;

use crate::{
  geometry::{LetterboxTransform, Point},
  model::{BBox, CandidateDetection},
  tensor::RawDetectionTensor,
};

/// 将检测张量解码为原图坐标下的候选检测
///
/// 置信度低于阈值（或为 NaN）的候选框被跳过。框坐标截断到原图范围，
/// 退化框同样保留，由调用方处理。
pub fn decode_candidates(
  raw: &RawDetectionTensor,
  transform: &LetterboxTransform,
  image_width: u32,
  image_height: u32,
  confidence_threshold: f32,
) -> Vec<CandidateDetection> {
  let (w, h) = (image_width as f32, image_height as f32);
  let mut candidates = Vec::new();

  for i in 0..raw.num_boxes() {
    let confidence = raw.feature_at(RawDetectionTensor::CONFIDENCE, i);
    if confidence.is_nan() || confidence < confidence_threshold {
      continue;
    }

    let model_box = BBox::from_center(
      raw.feature_at(RawDetectionTensor::CX, i),
      raw.feature_at(RawDetectionTensor::CY, i),
      raw.feature_at(RawDetectionTensor::W, i),
      raw.feature_at(RawDetectionTensor::H, i),
    );
    let top_left = transform.to_original(Point::new(model_box.x1, model_box.y1));
    let bottom_right = transform.to_original(Point::new(model_box.x2, model_box.y2));
    let bbox = BBox::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y).clamp(w, h);

    candidates.push(CandidateDetection {
      bbox,
      confidence: confidence.clamp(0.0, 1.0),
      mask_coeffs: raw.mask_coeffs(i),
    });
  }

  debug!(
    "解码 {} 个候选框, {} 个通过置信度阈值 {}",
    raw.num_boxes(),
    candidates.len(),
    confidence_threshold
  );
  candidates
}
