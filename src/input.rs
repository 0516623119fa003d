// 该文件是 Paopao （泡泡） 项目的一部分。
// src/input.rs - 张量文件输入
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

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  tensor::{PrototypeMaskTensor, RawDetectionTensor, TensorError},
};

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("缺少 shape 查询参数")]
  MissingShape,
  #[error("shape 参数无效: {0}")]
  InvalidShape(String),
  #[error("路径解码错误: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("文件长度 {0} 不是 4 字节的整数倍")]
  TruncatedData(usize),
  #[error("张量错误: {0}")]
  Tensor(#[from] TensorError),
}

/// 以小端 f32 保存的原始张量文件
///
/// URL 形如 `tensor:///path/to/output0.bin?shape=1,37,8400`。
#[derive(Debug, Clone)]
pub struct TensorFileInput {
  shape: Vec<usize>,
  data: Vec<f32>,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

fn parse_shape(value: &str) -> Result<Vec<usize>, TensorFileInputError> {
  value
    .split(',')
    .map(|dim| {
      dim
        .trim()
        .parse::<usize>()
        .map_err(|e| TensorFileInputError::InvalidShape(format!("{}: {}", value, e)))
    })
    .collect()
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let shape = url
      .query_pairs()
      .find(|(k, _)| k == "shape")
      .map(|(_, v)| parse_shape(&v))
      .ok_or(TensorFileInputError::MissingShape)??;

    let path = urlencoding::decode(url.path())?;
    info!("读取张量文件: {}", path);
    let bytes = std::fs::read(path.as_ref())?;
    let data = decode_f32_le(&bytes)?;
    debug!("张量形状 {:?}, {} 个元素", shape, data.len());

    Ok(TensorFileInput { shape, data })
  }
}

/// 小端字节序列 -> f32
pub fn decode_f32_le(bytes: &[u8]) -> Result<Vec<f32>, TensorFileInputError> {
  if bytes.len() % 4 != 0 {
    return Err(TensorFileInputError::TruncatedData(bytes.len()));
  }
  Ok(
    bytes
      .chunks_exact(4)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect(),
  )
}

impl TensorFileInput {
  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn into_detection(self) -> Result<RawDetectionTensor, TensorError> {
    RawDetectionTensor::from_shape_vec(&self.shape, self.data)
  }

  pub fn into_prototypes(self) -> Result<PrototypeMaskTensor, TensorError> {
    PrototypeMaskTensor::from_shape_vec(&self.shape, self.data)
  }
}

/// 一次推理的全部输出，以及原图尺寸
#[derive(Debug, Clone)]
pub struct InferenceOutput {
  pub raw: RawDetectionTensor,
  pub protos: Option<PrototypeMaskTensor>,
  pub image_width: u32,
  pub image_height: u32,
}

impl InferenceOutput {
  pub fn load(
    detections: &Url,
    protos: Option<&Url>,
    image_width: u32,
    image_height: u32,
  ) -> Result<Self, TensorFileInputError> {
    let raw = TensorFileInput::from_url(detections)?.into_detection()?;
    let protos = match protos {
      Some(url) => Some(TensorFileInput::from_url(url)?.into_prototypes()?),
      None => None,
    };

    Ok(InferenceOutput {
      raw,
      protos,
      image_width,
      image_height,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  fn write_tensor(name: &str, values: &[f32]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("paopao-{}-{}.bin", std::process::id(), name));
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(&path, bytes).unwrap();
    path
  }

  fn tensor_url(path: &std::path::Path, shape: &str) -> Url {
    Url::parse(&format!("tensor://{}?shape={}", path.display(), shape)).unwrap()
  }

  #[test]
  fn loads_detection_tensor_from_url() {
    let values: Vec<f32> = (0..10).map(|v| v as f32 * 0.5).collect();
    let path = write_tensor("detection", &values);

    let input = TensorFileInput::from_url(&tensor_url(&path, "1,5,2")).unwrap();
    assert_eq!(input.shape(), &[1, 5, 2]);
    let raw = input.into_detection().unwrap();
    assert_eq!(raw.num_boxes(), 2);
    assert_eq!(raw.feature_at(RawDetectionTensor::CONFIDENCE, 1), 4.5);

    std::fs::remove_file(path).ok();
  }

  #[test]
  fn inference_output_without_prototypes() {
    let path = write_tensor("inference", &[0.0; 37 * 3]);
    let output = InferenceOutput::load(&tensor_url(&path, "1,37,3"), None, 1000, 2000).unwrap();
    assert!(output.protos.is_none());
    assert_eq!(output.raw.num_mask_coeffs(), 32);
    std::fs::remove_file(path).ok();
  }

  #[test]
  fn rejects_other_schemes_and_missing_shape() {
    let url = Url::parse("file:///tmp/x.bin?shape=1,5,1").unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url),
      Err(TensorFileInputError::SchemeMismatch(_))
    ));

    let url = Url::parse("tensor:///tmp/x.bin").unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url),
      Err(TensorFileInputError::MissingShape)
    ));

    let url = Url::parse("tensor:///tmp/x.bin?shape=1,a,3").unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url),
      Err(TensorFileInputError::InvalidShape(_))
    ));
  }

  #[test]
  fn rejects_truncated_bytes() {
    assert!(matches!(
      decode_f32_le(&[0, 0, 128]),
      Err(TensorFileInputError::TruncatedData(3))
    ));
    assert_eq!(decode_f32_le(&1.5f32.to_le_bytes()).unwrap(), vec![1.5]);
  }
}
