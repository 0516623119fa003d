// 该文件是 Paopao （泡泡） 项目的一部分。
// src/mask.rs - 实例掩码重建
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

use ndarray::{Array2, ArrayView2, Axis, s};
use tracing::trace;

use crate::{
  geometry::{LetterboxTransform, Point},
  model::CandidateDetection,
  tensor::PrototypeMaskTensor,
};

/// 原型掩码网格上的裁剪窗口 `[x0, x1) × [y0, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRoi {
  pub x0: usize,
  pub y0: usize,
  pub x1: usize,
  pub y1: usize,
}

impl MaskRoi {
  pub fn width(&self) -> usize {
    self.x1.saturating_sub(self.x0)
  }

  pub fn height(&self) -> usize {
    self.y1.saturating_sub(self.y0)
  }

  pub fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }
}

/// 裁剪后的软掩码，`data` 以 `[y, x]` 索引，取值位于 (0, 1)
#[derive(Debug, Clone, PartialEq)]
pub struct MaskCrop {
  pub roi: MaskRoi,
  pub data: Array2<f32>,
}

impl MaskCrop {
  pub fn width(&self) -> usize {
    self.data.ncols()
  }

  pub fn height(&self) -> usize {
    self.data.nrows()
  }

  pub fn view(&self) -> ArrayView2<'_, f32> {
    self.data.view()
  }
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 原图像素框映射到原型掩码网格，最小角向下取整、最大角向上取整
pub fn mask_roi(
  candidate: &CandidateDetection,
  transform: &LetterboxTransform,
  mask_w: usize,
  mask_h: usize,
) -> MaskRoi {
  let bbox = &candidate.bbox;
  let tl = transform.to_mask_grid(Point::new(bbox.x1, bbox.y1), mask_w, mask_h);
  let br = transform.to_mask_grid(Point::new(bbox.x2, bbox.y2), mask_w, mask_h);

  let (mw, mh) = (mask_w as f32, mask_h as f32);
  MaskRoi {
    x0: tl.x.floor().clamp(0.0, mw) as usize,
    y0: tl.y.floor().clamp(0.0, mh) as usize,
    x1: br.x.ceil().clamp(0.0, mw) as usize,
    y1: br.y.ceil().clamp(0.0, mh) as usize,
  }
}

/// 重建单个候选检测的软掩码
///
/// 先裁剪再做系数加权求和，只在框内计算，候选框很多时代价仍与框面积成正比。
pub fn reconstruct_mask(
  candidate: &CandidateDetection,
  protos: &PrototypeMaskTensor,
  transform: &LetterboxTransform,
) -> MaskCrop {
  let roi = mask_roi(candidate, transform, protos.width(), protos.height());
  if roi.is_empty() {
    trace!("候选框 {:?} 在原型网格上的裁剪区域为空", candidate.bbox);
    return MaskCrop {
      roi,
      data: Array2::zeros((0, 0)),
    };
  }

  let view = protos.view();
  let cropped = view.slice(s![.., roi.y0..roi.y1, roi.x0..roi.x1]);

  let mut data = Array2::<f32>::zeros((roi.height(), roi.width()));
  for (proto, &coeff) in cropped.axis_iter(Axis(0)).zip(candidate.mask_coeffs.iter()) {
    data.scaled_add(coeff, &proto);
  }
  data.mapv_inplace(sigmoid);

  trace!("重建掩码: 裁剪区域 {:?}", roi);
  MaskCrop { roi, data }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::NUM_PROTOTYPES, geometry::compute_transform, model::BBox};

  fn candidate(bbox: BBox, coeffs: Vec<f32>) -> CandidateDetection {
    CandidateDetection {
      bbox,
      confidence: 0.9,
      mask_coeffs: coeffs,
    }
  }

  #[test]
  fn sigmoid_of_zero_is_half() {
    assert_eq!(sigmoid(0.0), 0.5);
    assert!(sigmoid(20.0) > 0.999);
    assert!(sigmoid(-20.0) < 0.001);
  }

  #[test]
  fn zero_prototypes_give_uniform_half() {
    let t = compute_transform(640, 640, 640);
    let protos =
      PrototypeMaskTensor::from_shape_vec(&[1, NUM_PROTOTYPES, 160, 160], vec![0.0; 32 * 160 * 160])
        .unwrap();
    let c = candidate(BBox::new(100.0, 200.0, 300.0, 260.0), vec![1.5; NUM_PROTOTYPES]);

    let mask = reconstruct_mask(&c, &protos, &t);
    assert_eq!(mask.roi, MaskRoi { x0: 25, y0: 50, x1: 75, y1: 65 });
    assert_eq!((mask.width(), mask.height()), (50, 15));
    assert!(mask.data.iter().all(|&v| v == 0.5));
  }

  #[test]
  fn roi_uses_letterbox_and_mask_scale() {
    // scale 0.32, offset_x 160; 原图 x 375 -> 模型 280 -> 网格 70
    let t = compute_transform(1000, 2000, 640);
    let c = candidate(BBox::new(375.0, 250.0, 625.0, 375.0), vec![]);
    let roi = mask_roi(&c, &t, 160, 160);

    assert_eq!(roi.x0, 70);
    assert_eq!(roi.x1, 90);
    assert_eq!(roi.y0, 20);
    assert_eq!(roi.y1, 30);
  }

  #[test]
  fn weighted_sum_only_inside_crop() {
    // 2 个原型 4x4：原型 0 为列号，原型 1 恒为 1
    let mut data = Vec::new();
    for _y in 0..4 {
      for x in 0..4 {
        data.push(x as f32);
      }
    }
    data.extend(std::iter::repeat_n(1.0, 16));
    let protos = PrototypeMaskTensor::from_shape_vec(&[1, 2, 4, 4], data).unwrap();

    // 输入 8x8, 网格 4x4 => 每个网格单元 2 像素
    let t = compute_transform(8, 8, 8);
    let c = candidate(BBox::new(2.0, 2.0, 6.0, 4.0), vec![2.0, -3.0]);
    let mask = reconstruct_mask(&c, &protos, &t);

    assert_eq!(mask.roi, MaskRoi { x0: 1, y0: 1, x1: 3, y1: 2 });
    assert_eq!(mask.data.dim(), (1, 2));
    assert_eq!(mask.data[[0, 0]], sigmoid(2.0 * 1.0 - 3.0));
    assert_eq!(mask.data[[0, 1]], sigmoid(2.0 * 2.0 - 3.0));
  }

  #[test]
  fn degenerate_box_gives_empty_crop() {
    let t = compute_transform(640, 640, 640);
    let protos = PrototypeMaskTensor::from_shape_vec(&[1, 1, 4, 4], vec![0.0; 16]).unwrap();
    let c = candidate(BBox::new(300.0, 300.0, 300.0, 300.0), vec![1.0]);

    let mask = reconstruct_mask(&c, &protos, &t);
    assert!(mask.roi.is_empty());
    assert_eq!(mask.data.len(), 0);
  }
}
