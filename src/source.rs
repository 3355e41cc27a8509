// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/source.rs - 上传图像读取
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

use std::path::Path;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::{debug, error};

/// 上传界面接受的文件扩展名
pub const UPLOAD_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum ImageInputError {
  #[error("图像数据为空")]
  Empty,
  #[error("不支持的图像类型: {0}")]
  UnsupportedType(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 内存中的图像及其原始文件编码
#[derive(Debug, Clone)]
pub struct SourceImage {
  pixels: DynamicImage,
  format: Option<ImageFormat>,
}

impl From<DynamicImage> for SourceImage {
  fn from(pixels: DynamicImage) -> Self {
    Self {
      pixels,
      format: None,
    }
  }
}

impl SourceImage {
  pub fn new(pixels: DynamicImage, format: Option<ImageFormat>) -> Self {
    Self { pixels, format }
  }

  pub fn pixels(&self) -> &DynamicImage {
    &self.pixels
  }

  pub fn format(&self) -> Option<ImageFormat> {
    self.format
  }

  pub fn width(&self) -> u32 {
    self.pixels.width()
  }

  pub fn height(&self) -> u32 {
    self.pixels.height()
  }

  pub fn channels(&self) -> u8 {
    self.pixels.color().channel_count()
  }

  /// 按内容探测格式并解码
  pub fn decode(bytes: &[u8]) -> Result<Self, ImageInputError> {
    if bytes.is_empty() {
      return Err(ImageInputError::Empty);
    }

    let format = image::guess_format(bytes)?;
    let pixels = image::load_from_memory_with_format(bytes, format)?;
    debug!(
      "解码图像: {:?} {}x{}",
      format,
      pixels.width(),
      pixels.height()
    );

    Ok(Self {
      pixels,
      format: Some(format),
    })
  }

  /// 读取上传的图像文件，只接受 JPEG 与 PNG
  pub fn open_upload(path: &Path) -> Result<Self, ImageInputError> {
    let extension = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| ext.to_ascii_lowercase())
      .unwrap_or_default();

    if !UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
      error!("上传文件扩展名不受支持: {}", path.display());
      return Err(ImageInputError::UnsupportedType(extension));
    }

    let bytes = std::fs::read(path)?;
    let image = Self::decode(&bytes)?;

    match image.format {
      Some(ImageFormat::Jpeg) | Some(ImageFormat::Png) => Ok(image),
      other => Err(ImageInputError::UnsupportedType(format!("{:?}", other))),
    }
  }
}
