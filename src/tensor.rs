// 该文件是 Paopao （泡泡） 项目的一部分。
// src/tensor.rs - 模型输出张量
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

use ndarray::{Array2, Array3, ArrayView3};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::BOX_FEATURES;

#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
  #[error("{name} 张量维度错误: 期望 {expected} 维, 实际形状 {shape:?}")]
  RankMismatch {
    name: &'static str,
    expected: usize,
    shape: Vec<usize>,
  },
  #[error("{name} 张量批大小必须为 1, 实际形状 {shape:?}")]
  BatchMismatch {
    name: &'static str,
    shape: Vec<usize>,
  },
  #[error("{name} 张量数据长度不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际 {actual} 个")]
  LengthMismatch {
    name: &'static str,
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
  #[error("检测张量特征数过少: 至少需要 {expected}, 实际 {actual}")]
  TooFewFeatures { expected: usize, actual: usize },
  #[error("原型掩码张量存在空维度: {shape:?}")]
  EmptyPrototype { shape: Vec<usize> },
  #[error("掩码系数数量 {coeffs} 与原型掩码数量 {prototypes} 不一致")]
  PrototypeMismatch { coeffs: usize, prototypes: usize },
  #[error("{name} 张量形状 {shape:?} 的元素数溢出")]
  ShapeOverflow { name: &'static str, shape: Vec<usize> },
}

fn check_shape(
  name: &'static str,
  shape: &[usize],
  rank: usize,
  len: usize,
) -> Result<(), TensorError> {
  if shape.len() != rank {
    error!("{} 张量维度错误: {:?}", name, shape);
    return Err(TensorError::RankMismatch {
      name,
      expected: rank,
      shape: shape.to_vec(),
    });
  }
  if shape[0] != 1 {
    error!("{} 张量批大小错误: {:?}", name, shape);
    return Err(TensorError::BatchMismatch {
      name,
      shape: shape.to_vec(),
    });
  }
  let expected = shape
    .iter()
    .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    .ok_or_else(|| {
      error!("{} 张量形状溢出: {:?}", name, shape);
      TensorError::ShapeOverflow {
        name,
        shape: shape.to_vec(),
      }
    })?;
  if expected != len {
    error!("{} 张量数据长度错误: 期望 {}, 实际 {}", name, expected, len);
    return Err(TensorError::LengthMismatch {
      name,
      shape: shape.to_vec(),
      expected,
      actual: len,
    });
  }
  Ok(())
}

/// 检测头输出 `[1, features, num_boxes]`，按通道优先存储
///
/// 每个特征占据连续的 `num_boxes` 个元素：
/// `[cx, cy, w, h, confidence, mask_coeff_0 ..]`，坐标位于模型输入空间。
#[derive(Debug, Clone)]
pub struct RawDetectionTensor {
  data: Array2<f32>,
}

impl RawDetectionTensor {
  pub const CX: usize = 0;
  pub const CY: usize = 1;
  pub const W: usize = 2;
  pub const H: usize = 3;
  pub const CONFIDENCE: usize = 4;

  pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
    check_shape("检测", shape, 3, data.len())?;
    let (features, num_boxes) = (shape[1], shape[2]);
    if features < BOX_FEATURES {
      error!("检测张量特征数过少: {}", features);
      return Err(TensorError::TooFewFeatures {
        expected: BOX_FEATURES,
        actual: features,
      });
    }

    let len = data.len();
    let data = Array2::from_shape_vec((features, num_boxes), data).map_err(|_| {
      TensorError::LengthMismatch {
        name: "检测",
        shape: shape.to_vec(),
        expected: features * num_boxes,
        actual: len,
      }
    })?;
    debug!("检测张量: {} 个特征, {} 个候选框", features, num_boxes);
    Ok(Self { data })
  }

  pub fn num_features(&self) -> usize {
    self.data.nrows()
  }

  pub fn num_boxes(&self) -> usize {
    self.data.ncols()
  }

  pub fn num_mask_coeffs(&self) -> usize {
    self.num_features() - BOX_FEATURES
  }

  /// 读取第 `box_index` 个候选框的第 `feature` 个特征
  ///
  /// 等价于平坦缓冲区上的 `feature * num_boxes + box_index`。
  #[inline]
  pub fn feature_at(&self, feature: usize, box_index: usize) -> f32 {
    self.data[[feature, box_index]]
  }

  pub fn mask_coeffs(&self, box_index: usize) -> Vec<f32> {
    (BOX_FEATURES..self.num_features())
      .map(|feature| self.feature_at(feature, box_index))
      .collect()
  }
}

/// 原型掩码 `[1, num_prototypes, mask_h, mask_w]`
#[derive(Debug, Clone)]
pub struct PrototypeMaskTensor {
  data: Array3<f32>,
}

impl PrototypeMaskTensor {
  pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
    check_shape("原型掩码", shape, 4, data.len())?;
    let (c, h, w) = (shape[1], shape[2], shape[3]);
    if c == 0 || h == 0 || w == 0 {
      error!("原型掩码张量存在空维度: {:?}", shape);
      return Err(TensorError::EmptyPrototype {
        shape: shape.to_vec(),
      });
    }

    let len = data.len();
    let data = Array3::from_shape_vec((c, h, w), data).map_err(|_| {
      TensorError::LengthMismatch {
        name: "原型掩码",
        shape: shape.to_vec(),
        expected: c * h * w,
        actual: len,
      }
    })?;
    debug!("原型掩码: {} 个, 尺寸 {}x{}", c, w, h);
    Ok(Self { data })
  }

  pub fn num_prototypes(&self) -> usize {
    self.data.dim().0
  }

  pub fn height(&self) -> usize {
    self.data.dim().1
  }

  pub fn width(&self) -> usize {
    self.data.dim().2
  }

  pub fn view(&self) -> ArrayView3<'_, f32> {
    self.data.view()
  }
}

/// 检查检测张量与原型掩码是否匹配
pub fn check_prototypes(
  raw: &RawDetectionTensor,
  protos: &PrototypeMaskTensor,
) -> Result<(), TensorError> {
  if raw.num_mask_coeffs() != protos.num_prototypes() {
    error!(
      "掩码系数数量 {} 与原型掩码数量 {} 不一致",
      raw.num_mask_coeffs(),
      protos.num_prototypes()
    );
    return Err(TensorError::PrototypeMismatch {
      coeffs: raw.num_mask_coeffs(),
      prototypes: protos.num_prototypes(),
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn feature_at_follows_channel_major_stride() {
    // 2 个候选框, 6 个特征
    let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
    let raw = RawDetectionTensor::from_shape_vec(&[1, 6, 2], data).unwrap();

    assert_eq!(raw.num_boxes(), 2);
    assert_eq!(raw.num_mask_coeffs(), 1);
    assert_eq!(raw.feature_at(RawDetectionTensor::CX, 1), 1.0);
    assert_eq!(raw.feature_at(RawDetectionTensor::CONFIDENCE, 0), 8.0);
    assert_eq!(raw.mask_coeffs(1), vec![11.0]);
  }

  #[test]
  fn rejects_wrong_rank() {
    let err = RawDetectionTensor::from_shape_vec(&[37, 2], vec![0.0; 74]).unwrap_err();
    assert!(matches!(err, TensorError::RankMismatch { expected: 3, .. }));
  }

  #[test]
  fn rejects_batch_other_than_one() {
    let err = RawDetectionTensor::from_shape_vec(&[2, 5, 1], vec![0.0; 10]).unwrap_err();
    assert!(matches!(err, TensorError::BatchMismatch { .. }));
  }

  #[test]
  fn rejects_length_mismatch() {
    let err = RawDetectionTensor::from_shape_vec(&[1, 37, 4], vec![0.0; 10]).unwrap_err();
    assert_eq!(
      err,
      TensorError::LengthMismatch {
        name: "检测",
        shape: vec![1, 37, 4],
        expected: 148,
        actual: 10,
      }
    );
  }

  #[test]
  fn rejects_overflowing_shape() {
    let err = RawDetectionTensor::from_shape_vec(&[1, usize::MAX, 2], vec![0.0; 4]).unwrap_err();
    assert_eq!(
      err,
      TensorError::ShapeOverflow {
        name: "检测",
        shape: vec![1, usize::MAX, 2],
      }
    );

    let err =
      PrototypeMaskTensor::from_shape_vec(&[1, usize::MAX, 2, 2], vec![0.0; 4]).unwrap_err();
    assert!(matches!(err, TensorError::ShapeOverflow { .. }));
  }

  #[test]
  fn rejects_too_few_features() {
    let err = RawDetectionTensor::from_shape_vec(&[1, 4, 1], vec![0.0; 4]).unwrap_err();
    assert!(matches!(err, TensorError::TooFewFeatures { .. }));
  }

  #[test]
  fn prototype_count_must_match_coefficients() {
    let raw = RawDetectionTensor::from_shape_vec(&[1, 37, 1], vec![0.0; 37]).unwrap();
    let ok = PrototypeMaskTensor::from_shape_vec(&[1, 32, 2, 2], vec![0.0; 128]).unwrap();
    let bad = PrototypeMaskTensor::from_shape_vec(&[1, 16, 2, 2], vec![0.0; 64]).unwrap();

    assert!(check_prototypes(&raw, &ok).is_ok());
    assert_eq!(
      check_prototypes(&raw, &bad),
      Err(TensorError::PrototypeMismatch {
        coeffs: 32,
        prototypes: 16
      })
    );
  }

  #[test]
  fn rejects_empty_prototype_grid() {
    let err = PrototypeMaskTensor::from_shape_vec(&[1, 32, 0, 160], vec![]).unwrap_err();
    assert!(matches!(err, TensorError::EmptyPrototype { .. }));
  }
}
