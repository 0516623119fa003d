// 该文件是 Paopao （泡泡） 项目的一部分。
// src/geometry.rs - Letterbox 坐标变换
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

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 原图与模型输入（正方形画布）之间的 letterbox 变换
///
/// 原图等比缩放 `scale` 后居中放入 `input_size × input_size` 的画布，
/// 两侧各填充 `offset_x` / `offset_y`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  pub scale: f32,
  pub offset_x: f32,
  pub offset_y: f32,
  pub input_size: u32,
}

/// 根据原图尺寸计算 letterbox 变换
pub fn compute_transform(
  original_width: u32,
  original_height: u32,
  input_size: u32,
) -> LetterboxTransform {
  let size = input_size as f32;
  let (w, h) = (original_width as f32, original_height as f32);

  let scale = (size / w).min(size / h);
  let scaled_w = w * scale;
  let scaled_h = h * scale;

  LetterboxTransform {
    scale,
    offset_x: (size - scaled_w) / 2.0,
    offset_y: (size - scaled_h) / 2.0,
    input_size,
  }
}

impl LetterboxTransform {
  pub fn new(original_width: u32, original_height: u32, input_size: u32) -> Self {
    compute_transform(original_width, original_height, input_size)
  }

  /// 模型输入空间 -> 原图空间
  pub fn to_original(&self, p: Point) -> Point {
    Point {
      x: (p.x - self.offset_x) / self.scale,
      y: (p.y - self.offset_y) / self.scale,
    }
  }

  /// 原图空间 -> 模型输入空间
  pub fn to_model_space(&self, p: Point) -> Point {
    Point {
      x: self.offset_x + p.x * self.scale,
      y: self.offset_y + p.y * self.scale,
    }
  }

  /// 原图空间 -> 原型掩码网格（`mask_w × mask_h`）
  pub fn to_mask_grid(&self, p: Point, mask_w: usize, mask_h: usize) -> Point {
    let size = self.input_size as f32;
    let m = self.to_model_space(p);
    Point {
      x: m.x * (mask_w as f32 / size),
      y: m.y * (mask_h as f32 / size),
    }
  }
}
