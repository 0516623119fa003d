// 该文件是 Paopao （泡泡） 项目的一部分。
// src/pipeline.rs - 检测流水线
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

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  config::DetectConfig,
  decode::decode_candidates,
  geometry::compute_transform,
  mask::reconstruct_mask,
  model::{BBox, Detection, DetectionResult},
  nms::suppress_indices,
  polygon::{Polygon, extract_polygon},
  tensor::{PrototypeMaskTensor, RawDetectionTensor, TensorError, check_prototypes},
};

#[derive(Error, Debug, PartialEq)]
pub enum DetectError {
  #[error("张量错误: {0}")]
  Tensor(#[from] TensorError),
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidImageSize { width: u32, height: u32 },
  #[error("模型输入尺寸无效: {0}")]
  InvalidInputSize(u32),
}

/// 气泡检测器，持有一份检测配置
#[derive(Debug, Clone, Default)]
pub struct Detector {
  config: DetectConfig,
}

impl Detector {
  pub fn new(config: DetectConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  /// 解码 → 掩码重建 → 轮廓提取 → NMS
  ///
  /// 没有原型掩码时所有检测的 `polygon_path` 为空；单个检测轮廓提取失败
  /// 只影响该检测。
  pub fn detect(
    &self,
    raw: &RawDetectionTensor,
    protos: Option<&PrototypeMaskTensor>,
    image_width: u32,
    image_height: u32,
  ) -> Result<DetectionResult, DetectError> {
    let start = Instant::now();
    let config = &self.config;

    if image_width == 0 || image_height == 0 {
      error!("图像尺寸无效: {}x{}", image_width, image_height);
      return Err(DetectError::InvalidImageSize {
        width: image_width,
        height: image_height,
      });
    }
    if config.input_size == 0 {
      error!("模型输入尺寸无效: {}", config.input_size);
      return Err(DetectError::InvalidInputSize(config.input_size));
    }
    if let Some(protos) = protos {
      check_prototypes(raw, protos)?;
    }

    let transform = compute_transform(image_width, image_height, config.input_size);
    debug!("letterbox 变换: {:?}", transform);

    let mut candidates = decode_candidates(
      raw,
      &transform,
      image_width,
      image_height,
      config.confidence_threshold,
    );
    let decoded = candidates.len();
    candidates.retain(|c| !c.bbox.is_degenerate());
    if candidates.len() < decoded {
      debug!("丢弃 {} 个退化框", decoded - candidates.len());
    }

    let mut polygons: Vec<Option<Polygon>> = candidates
      .iter()
      .enumerate()
      .map(|(i, candidate)| {
        let protos = protos?;
        let mask = reconstruct_mask(candidate, protos, &transform);
        match extract_polygon(mask.view(), config.mask_threshold, config.polygon_stride) {
          Ok(polygon) => Some(polygon),
          Err(e) => {
            debug!("候选框 {} 轮廓提取失败: {}", i, e);
            None
          }
        }
      })
      .collect();

    let boxes: Vec<BBox> = candidates.iter().map(|c| c.bbox).collect();
    let scores: Vec<f32> = candidates.iter().map(|c| c.confidence).collect();
    let keep = suppress_indices(&boxes, &scores, config.nms_threshold);

    let detections: Vec<Detection> = keep
      .into_iter()
      .map(|i| {
        let candidate = &candidates[i];
        Detection::new(
          candidate.bbox,
          candidate.confidence,
          polygons[i].take(),
          image_width,
          image_height,
        )
      })
      .collect();

    let inference_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(
      "检测完成: {} 个气泡, 耗时 {:.2} ms",
      detections.len(),
      inference_time_ms
    );

    Ok(DetectionResult {
      detections,
      image_width,
      image_height,
      inference_time_ms,
    })
  }
}

/// 使用默认配置与给定阈值执行一次检测
pub fn detect(
  raw: &RawDetectionTensor,
  protos: Option<&PrototypeMaskTensor>,
  original_width: u32,
  original_height: u32,
  confidence_threshold: f32,
  nms_threshold: f32,
) -> Result<DetectionResult, DetectError> {
  let config = DetectConfig::default()
    .with_confidence_threshold(confidence_threshold)
    .with_nms_threshold(nms_threshold);
  Detector::new(config).detect(raw, protos, original_width, original_height)
}
