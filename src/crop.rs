// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/crop.rs - 检测区域裁剪
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

use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::detection::{Detection, DetectionSet, SelectionPolicy};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
  #[error("没有检测结果可供裁剪")]
  NoDetectionFound,
}

/// 按检测框裁剪，越界部分先限制到图像范围内
pub fn crop_detection(image: &DynamicImage, detection: &Detection) -> DynamicImage {
  let bbox = detection.bounding_box();
  let region = bbox.clamp_to(image.width(), image.height());

  if region.is_empty() {
    warn!("检测框 {:?} 在图像 {}x{} 之外", bbox, image.width(), image.height());
  } else {
    debug!("裁剪区域: {:?} (原始检测框 {:?})", region, bbox);
  }

  image.crop_imm(region.x, region.y, region.width, region.height)
}

/// 从车牌检测结果中按策略选出一个并裁剪
pub fn crop_plate(
  image: &DynamicImage,
  plates: &DetectionSet,
  policy: SelectionPolicy,
) -> Result<DynamicImage, CropError> {
  let plate = plates.select(policy).ok_or(CropError::NoDetectionFound)?;
  if plates.len() > 1 {
    debug!("检测到 {} 个车牌, 按 {:?} 策略选取", plates.len(), policy);
  }
  Ok(crop_detection(image, plate))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::PLATE_CLASS;
  use image::{GenericImageView, Rgb, RgbImage};

  fn canvas() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(100, 80, |x, y| {
      Rgb([x as u8, y as u8, 0])
    }))
  }

  fn plate(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Detection {
    Detection::new(x, y, w, h, PLATE_CLASS, confidence).unwrap()
  }

  #[test]
  fn crops_inside_image() {
    let crop = crop_detection(&canvas(), &plate(50.0, 50.0, 20.0, 10.0, 0.9));
    assert_eq!(crop.dimensions(), (20, 10));
    assert_eq!(crop.to_rgb8().get_pixel(0, 0), &Rgb([40, 45, 0]));
    assert_eq!(crop.to_rgb8().get_pixel(19, 9), &Rgb([59, 54, 0]));
  }

  #[test]
  fn clamps_partially_outside_box() {
    let crop = crop_detection(&canvas(), &plate(95.0, 2.0, 20.0, 10.0, 0.9));
    assert_eq!(crop.dimensions(), (15, 7));
    assert_eq!(crop.to_rgb8().get_pixel(0, 0), &Rgb([85, 0, 0]));
  }

  #[test]
  fn fully_outside_box_yields_empty_region() {
    let crop = crop_detection(&canvas(), &plate(400.0, 300.0, 20.0, 10.0, 0.9));
    assert_eq!(crop.width() * crop.height(), 0);
  }

  #[test]
  fn empty_set_is_an_error() {
    assert_eq!(
      crop_plate(&canvas(), &DetectionSet::empty(), SelectionPolicy::First),
      Err(CropError::NoDetectionFound)
    );
  }

  #[test]
  fn policy_picks_the_region() {
    let plates = DetectionSet::from(vec![
      plate(20.0, 20.0, 10.0, 10.0, 0.3),
      plate(70.0, 60.0, 10.0, 10.0, 0.8),
    ]);

    let first = crop_plate(&canvas(), &plates, SelectionPolicy::First).unwrap();
    assert_eq!(first.to_rgb8().get_pixel(0, 0), &Rgb([15, 15, 0]));

    let best = crop_plate(&canvas(), &plates, SelectionPolicy::MaxConfidence).unwrap();
    assert_eq!(best.to_rgb8().get_pixel(0, 0), &Rgb([65, 55, 0]));
  }
}
