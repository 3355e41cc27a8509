// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/codec.rs - 图像传输编码
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

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, error};

use crate::source::{ImageInputError, SourceImage};

/// 原始编码未知时使用的无损格式
pub const DEFAULT_TRANSPORT_FORMAT: ImageFormat = ImageFormat::Png;

#[derive(Error, Debug)]
pub enum CodecError {
  #[error("未提供图像")]
  InvalidInput,
  #[error("图像编码失败 ({format:?}): {source}")]
  Encode {
    format: ImageFormat,
    source: image::ImageError,
  },
  #[error("base64 解码失败: {0}")]
  Base64(#[from] base64::DecodeError),
  #[error("图像解码失败: {0}")]
  Decode(#[from] ImageInputError),
}

/// 按图像原始文件编码序列化后转为 base64，不修改源图像
pub fn image_to_base64(image: Option<&SourceImage>) -> Result<String, CodecError> {
  let image = image.ok_or_else(|| {
    error!("没有可编码的图像");
    CodecError::InvalidInput
  })?;

  let format = image.format().unwrap_or(DEFAULT_TRANSPORT_FORMAT);
  let mut buffer = Cursor::new(Vec::new());
  image
    .pixels()
    .write_to(&mut buffer, format)
    .map_err(|source| CodecError::Encode { format, source })?;

  let encoded = BASE64.encode(buffer.get_ref());
  debug!(
    "图像编码为 {:?}: {} 字节, base64 长度 {}",
    format,
    buffer.get_ref().len(),
    encoded.len()
  );
  Ok(encoded)
}

pub fn base64_to_image(encoded: &str) -> Result<SourceImage, CodecError> {
  let bytes = BASE64.decode(encoded.trim())?;
  Ok(SourceImage::decode(&bytes)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

  fn gradient() -> RgbImage {
    RgbImage::from_fn(16, 9, |x, y| Rgb([(x * 15) as u8, (y * 28) as u8, 77]))
  }

  #[test]
  fn absent_image_is_invalid_input() {
    assert!(matches!(
      image_to_base64(None),
      Err(CodecError::InvalidInput)
    ));
  }

  #[test]
  fn png_round_trip_keeps_pixels() {
    let source = SourceImage::new(
      DynamicImage::ImageRgb8(gradient()),
      Some(ImageFormat::Png),
    );
    let encoded = image_to_base64(Some(&source)).unwrap();
    let decoded = base64_to_image(&encoded).unwrap();

    assert_eq!(decoded.format(), Some(ImageFormat::Png));
    assert_eq!(decoded.pixels().to_rgb8(), gradient());
  }

  #[test]
  fn unknown_format_defaults_to_png() {
    let pixels = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 128]));
    let source = SourceImage::from(DynamicImage::ImageRgba8(pixels.clone()));

    let decoded = base64_to_image(&image_to_base64(Some(&source)).unwrap()).unwrap();
    assert_eq!(decoded.format(), Some(DEFAULT_TRANSPORT_FORMAT));
    assert_eq!(decoded.pixels().to_rgba8(), pixels);
  }

  #[test]
  fn jpeg_source_stays_jpeg() {
    let source = SourceImage::new(
      DynamicImage::ImageRgb8(gradient()),
      Some(ImageFormat::Jpeg),
    );
    let decoded = base64_to_image(&image_to_base64(Some(&source)).unwrap()).unwrap();
    assert_eq!(decoded.format(), Some(ImageFormat::Jpeg));
    assert_eq!((decoded.width(), decoded.height()), (16, 9));
  }

  #[test]
  fn encoding_does_not_touch_source() {
    let source = SourceImage::new(DynamicImage::ImageRgb8(gradient()), None);
    let before = source.pixels().clone();
    image_to_base64(Some(&source)).unwrap();
    assert_eq!(source.pixels(), &before);
  }

  #[test]
  fn rejects_malformed_base64() {
    assert!(matches!(
      base64_to_image("@@not-base64@@"),
      Err(CodecError::Base64(_))
    ));
  }
}
