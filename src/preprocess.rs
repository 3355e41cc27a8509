// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/preprocess.rs - 车牌图像预处理
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

use image::{
  DynamicImage, GrayImage, RgbImage,
  imageops::{self, FilterType},
};
use imageproc::{contrast::equalize_histogram, distance_transform::Norm, morphology::dilate};
use tracing::{debug, info, warn};

/// 放大倍数
pub const UPSCALE_FACTOR: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessOptions {
  /// 3x3 膨胀的迭代次数，0 表示不膨胀
  pub dilate_iterations: u32,
}

/// 去掉 alpha 通道；非三通道图像返回 `None`
pub fn normalize_channels(crop: &DynamicImage) -> Option<RgbImage> {
  match crop {
    DynamicImage::ImageRgb8(rgb) => Some(rgb.clone()),
    DynamicImage::ImageRgba8(_) => {
      debug!("RGBA 转换为 RGB");
      Some(crop.to_rgb8())
    }
    DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgb32F(_) => Some(crop.to_rgb8()),
    DynamicImage::ImageRgba16(_) | DynamicImage::ImageRgba32F(_) => {
      debug!("RGBA 转换为 RGB");
      Some(crop.to_rgb8())
    }
    _ => None,
  }
}

/// 放大、灰度化并做直方图均衡
pub fn equalize_plate(crop: &DynamicImage) -> Option<GrayImage> {
  let Some(rgb) = normalize_channels(crop) else {
    warn!("输入不是有效的彩色图像: {:?}", crop.color());
    return None;
  };

  if rgb.width() == 0 || rgb.height() == 0 {
    warn!("裁剪区域为空: {}x{}", rgb.width(), rgb.height());
    return None;
  }

  let resized = imageops::resize(
    &rgb,
    rgb.width() * UPSCALE_FACTOR,
    rgb.height() * UPSCALE_FACTOR,
    FilterType::Triangle,
  );
  debug!("放大后尺寸: {}x{}", resized.width(), resized.height());

  let gray = imageops::grayscale(&resized);
  let equalized = equalize_histogram(&gray);
  debug!("灰度与均衡完成: {}x{}", equalized.width(), equalized.height());

  Some(equalized)
}

/// 以 3x3 方形结构元素重复膨胀
pub fn dilate_plate(image: GrayImage, iterations: u32) -> GrayImage {
  (0..iterations).fold(image, |acc, _| dilate(&acc, Norm::LInf, 1))
}

/// 完整预处理流程，无法处理时返回 `None`
pub fn preprocess_plate(crop: &DynamicImage, options: &PreprocessOptions) -> Option<GrayImage> {
  let equalized = equalize_plate(crop)?;
  let dilated = dilate_plate(equalized, options.dilate_iterations);
  info!(
    "车牌预处理完成: {}x{} (膨胀 {} 次)",
    dilated.width(),
    dilated.height(),
    options.dilate_iterations
  );
  Some(dilated)
}
