// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/ocr.rs - 文字识别
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

use image::GrayImage;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RecognitionError {
  #[error("无法启动识别引擎 {program}: {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },
  #[error("识别引擎执行失败 ({status}): {stderr}")]
  Engine { status: String, stderr: String },
  #[error("识别输出不是有效的 UTF-8: {0}")]
  Utf8(#[from] std::string::FromUtf8Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("识别引擎地址错误: {0}")]
  EngineUrl(String),
}

/// 单行文字识别引擎，返回未经处理的原始文本
#[cfg_attr(test, mockall::automock)]
pub trait TextRecognizer: Send + Sync {
  fn recognize(&self, image: &GrayImage) -> Result<String, RecognitionError>;
}

/// 识别并去掉首尾空白，空字符串表示没有识别到文字
pub fn recognize_text(
  recognizer: &dyn TextRecognizer,
  image: &GrayImage,
) -> Result<String, RecognitionError> {
  debug!("开始文字识别: {}x{}", image.width(), image.height());
  let raw = recognizer.recognize(image)?;
  let text = raw.trim().to_string();
  info!("文字识别完成: {:?} (原始输出 {:?})", text, raw);
  Ok(text)
}

#[cfg(feature = "tesseract_ocr")]
mod tesseract;
#[cfg(feature = "tesseract_ocr")]
pub use self::tesseract::{SINGLE_LINE_PSM, TesseractCli};
