// 该文件是 Paopao （泡泡） 项目的一部分。
// src/polygon.rs - 掩码轮廓提取
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

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// 构成多边形所需的最少点数
pub const MIN_POLYGON_POINTS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolygonError {
  #[error("轮廓点数不足: 至少需要 3 个, 实际 {0} 个")]
  TooFewPoints(usize),
  #[error("clip-path 解析错误: {0}")]
  Parse(String),
}

/// 掩码裁剪区域内的百分比坐标，序列化为 `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct PolygonPoint {
  pub x: f32,
  pub y: f32,
}

impl PolygonPoint {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

impl From<[f32; 2]> for PolygonPoint {
  fn from([x, y]: [f32; 2]) -> Self {
    Self { x, y }
  }
}

impl From<PolygonPoint> for [f32; 2] {
  fn from(p: PolygonPoint) -> Self {
    [p.x, p.y]
  }
}

/// 有序闭合多边形，至少 3 个点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PolygonPoint>", into = "Vec<PolygonPoint>")]
pub struct Polygon {
  points: Vec<PolygonPoint>,
}

impl Polygon {
  pub fn new(points: Vec<PolygonPoint>) -> Result<Self, PolygonError> {
    if points.len() < MIN_POLYGON_POINTS {
      return Err(PolygonError::TooFewPoints(points.len()));
    }
    Ok(Self { points })
  }

  pub fn points(&self) -> &[PolygonPoint] {
    &self.points
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  /// 至少 3 个点，恒为 `false`；与 `len` 成对提供
  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, PolygonPoint> {
    self.points.iter()
  }

  /// CSS `polygon(x% y%, ...)` 形式
  pub fn to_clip_path(&self) -> String {
    self.to_string()
  }
}

impl TryFrom<Vec<PolygonPoint>> for Polygon {
  type Error = PolygonError;

  fn try_from(points: Vec<PolygonPoint>) -> Result<Self, Self::Error> {
    Polygon::new(points)
  }
}

impl From<Polygon> for Vec<PolygonPoint> {
  fn from(polygon: Polygon) -> Self {
    polygon.points
  }
}

impl<'a> IntoIterator for &'a Polygon {
  type Item = &'a PolygonPoint;
  type IntoIter = std::slice::Iter<'a, PolygonPoint>;

  fn into_iter(self) -> Self::IntoIter {
    self.points.iter()
  }
}

impl fmt::Display for Polygon {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "polygon(")?;
    for (i, p) in self.points.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}% {}%", p.x, p.y)?;
    }
    write!(f, ")")
  }
}

fn parse_percent(token: &str) -> Result<f32, PolygonError> {
  token
    .strip_suffix('%')
    .ok_or_else(|| PolygonError::Parse(format!("缺少百分号: {}", token)))?
    .parse::<f32>()
    .map_err(|e| PolygonError::Parse(format!("{}: {}", token, e)))
}

impl FromStr for Polygon {
  type Err = PolygonError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let body = s
      .trim()
      .strip_prefix("polygon(")
      .and_then(|rest| rest.strip_suffix(')'))
      .ok_or_else(|| PolygonError::Parse(format!("不是 polygon(...) 形式: {}", s)))?;

    let points = body
      .split(',')
      .map(|pair| {
        let mut tokens = pair.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
          (Some(x), Some(y), None) => Ok(PolygonPoint::new(parse_percent(x)?, parse_percent(y)?)),
          _ => Err(PolygonError::Parse(format!("坐标对格式错误: {}", pair.trim()))),
        }
      })
      .collect::<Result<Vec<_>, _>>()?;

    Polygon::new(points)
  }
}

/// 从裁剪后的软掩码提取轮廓
///
/// `mask` 以 `[y, x]` 索引。按 `stride` 采样，值严格大于 `threshold` 且至少一个
/// 四邻域（越界视为背景）不大于 `threshold` 的点视为边界点。边界点按质心极角排序。
///
/// 极角排序只对星形区域得到简单多边形，带尾巴的气泡可能自交。
pub fn extract_polygon(
  mask: ArrayView2<'_, f32>,
  threshold: f32,
  stride: usize,
) -> Result<Polygon, PolygonError> {
  let (h, w) = mask.dim();
  if w == 0 || h == 0 {
    return Err(PolygonError::TooFewPoints(0));
  }

  let inside = |x: isize, y: isize| {
    x >= 0
      && y >= 0
      && (x as usize) < w
      && (y as usize) < h
      && mask[[y as usize, x as usize]] > threshold
  };

  let mut points = Vec::new();
  for y in (0..h).step_by(stride.max(1)) {
    for x in (0..w).step_by(stride.max(1)) {
      let (xi, yi) = (x as isize, y as isize);
      if !inside(xi, yi) {
        continue;
      }
      let on_edge = !inside(xi - 1, yi)
        || !inside(xi + 1, yi)
        || !inside(xi, yi - 1)
        || !inside(xi, yi + 1);
      if on_edge {
        points.push(PolygonPoint::new(
          x as f32 / w as f32 * 100.0,
          y as f32 / h as f32 * 100.0,
        ));
      }
    }
  }

  trace!("掩码 {}x{} 提取到 {} 个边界点", w, h, points.len());
  if points.len() < MIN_POLYGON_POINTS {
    return Err(PolygonError::TooFewPoints(points.len()));
  }

  let n = points.len() as f32;
  let cx = points.iter().map(|p| p.x).sum::<f32>() / n;
  let cy = points.iter().map(|p| p.y).sum::<f32>() / n;
  points.sort_by(|a, b| {
    let angle_a = (a.y - cy).atan2(a.x - cx);
    let angle_b = (b.y - cy).atan2(b.x - cx);
    angle_a.total_cmp(&angle_b)
  });

  Polygon::new(points)
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array2;

  fn disk(size: usize, radius: f32) -> Array2<f32> {
    let c = (size as f32 - 1.0) / 2.0;
    Array2::from_shape_fn((size, size), |(y, x)| {
      let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt();
      if d <= radius { 0.9 } else { 0.1 }
    })
  }

  #[test]
  fn disk_yields_angularly_sorted_polygon() {
    let mask = disk(40, 12.0);
    let polygon = extract_polygon(mask.view(), 0.5, 2).unwrap();
    assert!(polygon.len() >= MIN_POLYGON_POINTS);

    let n = polygon.len() as f32;
    let cx = polygon.iter().map(|p| p.x).sum::<f32>() / n;
    let cy = polygon.iter().map(|p| p.y).sum::<f32>() / n;
    let angles: Vec<f32> = polygon
      .iter()
      .map(|p| (p.y - cy).atan2(p.x - cx))
      .collect();
    assert!(angles.windows(2).all(|w| w[0] <= w[1] + 1e-4));

    for p in &polygon {
      assert!((0.0..100.0).contains(&p.x));
      assert!((0.0..100.0).contains(&p.y));
    }
  }

  #[test]
  fn value_equal_to_threshold_is_background() {
    let mask = Array2::from_elem((10, 10), 0.5f32);
    assert_eq!(
      extract_polygon(mask.view(), 0.5, 2),
      Err(PolygonError::TooFewPoints(0))
    );
  }

  #[test]
  fn full_mask_traces_crop_border() {
    // 越界视为背景，因此整块前景的边界落在裁剪框边缘
    let mask = Array2::from_elem((10, 10), 0.5f32);
    let polygon = extract_polygon(mask.view(), 0.4, 2).unwrap();

    // 步长 2 时采样 0,2,4,6,8；只有第 0 行/列与越界相邻
    assert_eq!(polygon.len(), 9);
    assert!(!polygon.is_empty());
    assert_eq!(polygon.iter().count(), (&polygon).into_iter().count());
    assert!(polygon.iter().all(|p| p.x == 0.0 || p.y == 0.0));
  }

  #[test]
  fn empty_mask_fails() {
    let mask = Array2::<f32>::zeros((0, 0));
    assert_eq!(
      extract_polygon(mask.view(), 0.5, 2),
      Err(PolygonError::TooFewPoints(0))
    );
  }

  #[test]
  fn tiny_blob_fails_observably() {
    let mut mask = Array2::<f32>::zeros((8, 8));
    mask[[2, 2]] = 1.0;
    assert_eq!(
      extract_polygon(mask.view(), 0.5, 2),
      Err(PolygonError::TooFewPoints(1))
    );
  }

  #[test]
  fn clip_path_round_trip_keeps_point_set() {
    let polygon = extract_polygon(disk(30, 9.0).view(), 0.5, 2).unwrap();
    let text = polygon.to_clip_path();
    assert!(text.starts_with("polygon("));

    let parsed: Polygon = text.parse().unwrap();
    let mut a: Vec<[f32; 2]> = polygon.iter().map(|&p| p.into()).collect();
    let mut b: Vec<[f32; 2]> = parsed.iter().map(|&p| p.into()).collect();
    a.sort_by(|l, r| l[0].total_cmp(&r[0]).then(l[1].total_cmp(&r[1])));
    b.sort_by(|l, r| l[0].total_cmp(&r[0]).then(l[1].total_cmp(&r[1])));
    assert_eq!(a, b);
  }

  #[test]
  fn json_round_trip_keeps_point_set() {
    let polygon = extract_polygon(disk(24, 7.0).view(), 0.5, 2).unwrap();
    let json = serde_json::to_string(&polygon).unwrap();
    assert!(json.starts_with("[["));

    let back: Polygon = serde_json::from_str(&json).unwrap();
    assert_eq!(back, polygon);
  }

  #[test]
  fn rejects_malformed_clip_path() {
    assert!(matches!(
      "circle(10%)".parse::<Polygon>(),
      Err(PolygonError::Parse(_))
    ));
    assert!(matches!(
      "polygon(10% 20%, 30%)".parse::<Polygon>(),
      Err(PolygonError::Parse(_))
    ));
    assert_eq!(
      "polygon(10% 20%, 30% 40%)".parse::<Polygon>(),
      Err(PolygonError::TooFewPoints(2))
    );
    assert!(serde_json::from_str::<Polygon>("[[1.0, 2.0]]").is_err());
  }
}
