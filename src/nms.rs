// 该文件是 Paopao （泡泡） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use crate::model::{BBox, CandidateDetection};

/// 计算两个边界框的 IoU，并集面积不为正时返回 0
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  let x1 = a.x1.max(b.x1);
  let y1 = a.y1.max(b.y1);
  let x2 = a.x2.min(b.x2);
  let y2 = a.y2.min(b.y2);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 贪心 NMS，返回保留下来的下标（按置信度降序）
///
/// 与已保留框的 IoU 严格大于 `nms_threshold` 的框被抑制。
pub fn suppress_indices(boxes: &[BBox], scores: &[f32], nms_threshold: f32) -> Vec<usize> {
  let n = boxes.len().min(scores.len());
  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let mut suppressed = vec![false; n];
  let mut keep = Vec::new();

  for (rank, &i) in order.iter().enumerate() {
    if suppressed[i] {
      continue;
    }
    keep.push(i);

    for &j in &order[rank + 1..] {
      if !suppressed[j] && iou(&boxes[i], &boxes[j]) > nms_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!("NMS: {} 个候选框保留 {} 个", n, keep.len());
  keep
}

/// 对候选检测做贪心 NMS
pub fn suppress(candidates: Vec<CandidateDetection>, nms_threshold: f32) -> Vec<CandidateDetection> {
  let boxes: Vec<BBox> = candidates.iter().map(|c| c.bbox).collect();
  let scores: Vec<f32> = candidates.iter().map(|c| c.confidence).collect();
  let keep = suppress_indices(&boxes, &scores, nms_threshold);

  let mut slots: Vec<Option<CandidateDetection>> = candidates.into_iter().map(Some).collect();
  keep.into_iter().filter_map(|i| slots[i].take()).collect()
}
