// 该文件是 Paopao （泡泡） 项目的一部分。
// src/output.rs - 检测结果输出
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

use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::InferenceOutput, model::DetectionResult};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("路径解码错误: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordTarget {
  File(PathBuf),
  Stdout,
}

/// 以 JSON 记录检测结果
///
/// - `json:///path/to/result.json[?pretty]` 写入文件
/// - `stdout:[?pretty]` 打印到标准输出
#[derive(Debug, Clone)]
pub struct JsonRecordOutput {
  target: RecordTarget,
  pretty: bool,
}

const STDOUT_SCHEME: &str = "stdout";

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let pretty = url.query_pairs().any(|(k, _)| k == "pretty");
    let target = match url.scheme() {
      Self::SCHEME => RecordTarget::File(PathBuf::from(
        urlencoding::decode(url.path())?.into_owned(),
      )),
      STDOUT_SCHEME => RecordTarget::Stdout,
      other => {
        error!("URI 方案不匹配: {}", other);
        return Err(JsonRecordOutputError::SchemeMismatch(other.to_string()));
      }
    };

    Ok(JsonRecordOutput { target, pretty })
  }
}

impl JsonRecordOutput {
  pub fn target(&self) -> &RecordTarget {
    &self.target
  }

  pub fn to_json(&self, result: &DetectionResult) -> Result<String, serde_json::Error> {
    if self.pretty {
      serde_json::to_string_pretty(result)
    } else {
      serde_json::to_string(result)
    }
  }
}

impl Render<InferenceOutput, DetectionResult> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(
    &self,
    frame: &InferenceOutput,
    result: &DetectionResult,
  ) -> Result<(), Self::Error> {
    let json = self.to_json(result)?;
    match &self.target {
      RecordTarget::File(path) => {
        std::fs::write(path, json)?;
        info!(
          "{}x{} 图像的 {} 个检测结果已写入 {}",
          frame.image_width,
          frame.image_height,
          result.len(),
          path.display()
        );
      }
      RecordTarget::Stdout => {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", json)?;
      }
    }
    Ok(())
  }
}
