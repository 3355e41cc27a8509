// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::detection::{
  BoundingBox, Detection, DetectionRole, DetectionSet, PLATE_CLASS, VEHICLE_CLASS,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_MARGIN: i32 = 10; // 标签底部与边框顶部的距离
const LINE_THICKNESS: i32 = 2;
const LABEL_ANCHOR_MIN: i32 = i16::MIN as i32;
const LABEL_ANCHOR_MAX: i32 = i16::MAX as i32;

pub const VEHICLE_COLOR: Rgb<u8> = Rgb([0, 255, 0]); // 绿色
pub const PLATE_COLOR: Rgb<u8> = Rgb([0, 0, 255]); // 蓝色
pub const FALLBACK_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const SYSTEM_FONTS: [&str; 5] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 一组检测结果，可选地标记角色
#[derive(Debug, Clone, Copy)]
pub struct Layer<'a> {
  pub role: Option<DetectionRole>,
  pub detections: &'a DetectionSet,
}

impl<'a> Layer<'a> {
  pub fn tagged(role: DetectionRole, detections: &'a DetectionSet) -> Self {
    Self {
      role: Some(role),
      detections,
    }
  }

  pub fn untagged(detections: &'a DetectionSet) -> Self {
    Self {
      role: None,
      detections,
    }
  }
}

/// 标签文本，置信度保留两位小数
pub fn label_for(detection: &Detection, role: Option<DetectionRole>) -> String {
  let name = match role {
    Some(role) => role.label_prefix(),
    None => detection.class_name.as_str(),
  };
  format!("{} ({:.2})", name, detection.confidence)
}

/// 颜色由角色或类别决定
pub fn color_for(detection: &Detection, role: Option<DetectionRole>) -> Rgb<u8> {
  match role {
    Some(DetectionRole::Vehicle) => VEHICLE_COLOR,
    Some(DetectionRole::Plate) => PLATE_COLOR,
    None => match detection.class_name.as_str() {
      VEHICLE_CLASS => VEHICLE_COLOR,
      PLATE_CLASS => PLATE_COLOR,
      _ => FALLBACK_COLOR,
    },
  }
}

/// 可视化工具
pub struct Visualizer {
  /// 字体，缺失时只绘制边框
  font: Option<FontArc>,
  /// 字体大小
  font_scale: PxScale,
}

impl Default for Visualizer {
  fn default() -> Self {
    let font = SYSTEM_FONTS.iter().find_map(|path| {
      let data = std::fs::read(path).ok()?;
      FontArc::try_from_vec(data).ok()
    });
    if font.is_none() {
      warn!("未找到可用的系统字体, 标签文字将不会绘制");
    }
    Self::new(font)
  }
}

impl Visualizer {
  pub fn new(font: Option<FontArc>) -> Self {
    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }

  pub fn with_font_file(path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    Ok(Self::new(Some(font)))
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 在副本上绘制所有图层，源图像保持不变
  pub fn visualize(&self, image: &DynamicImage, layers: &[Layer<'_>]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for layer in layers {
      self.draw_layer(&mut canvas, layer);
    }
    canvas
  }

  pub fn draw_layer(&self, canvas: &mut RgbImage, layer: &Layer<'_>) {
    if layer.detections.is_empty() {
      debug!("检测结果为空, 跳过绘制");
      return;
    }

    for detection in layer.detections {
      let raw = detection.bounding_box();
      let bbox = on_canvas(canvas, &raw);
      let color = color_for(detection, layer.role);
      debug!("绘制边框 ({}, {}) ({}, {})", bbox.x1, bbox.y1, bbox.x2, bbox.y2);

      draw_box(canvas, &bbox, color);

      if let Some(font) = &self.font {
        let label = label_for(detection, layer.role);
        // 靠近上边缘时标签可能部分画出画布，锚点限制在 i16 范围内防止字形坐标溢出
        let text_x = raw.x1.clamp(LABEL_ANCHOR_MIN, LABEL_ANCHOR_MAX);
        let text_y = raw.y1.clamp(LABEL_ANCHOR_MIN, LABEL_ANCHOR_MAX)
          - LABEL_MARGIN
          - self.font_scale.y as i32;
        draw_text_mut(
          canvas,
          color,
          text_x,
          text_y,
          self.font_scale,
          font,
          &label,
        );
      }
    }
  }
}

// 画布外的边收到画布外一圈，既不溢出也不会在画布边缘多出一条线
fn on_canvas(canvas: &RgbImage, bbox: &BoundingBox) -> BoundingBox {
  let reach = |v: i32, limit: u32| -> i32 {
    let limit = i32::try_from(limit).unwrap_or(i32::MAX - LINE_THICKNESS);
    v.clamp(-LINE_THICKNESS, limit.saturating_add(LINE_THICKNESS))
  };
  BoundingBox {
    x1: reach(bbox.x1, canvas.width()),
    y1: reach(bbox.y1, canvas.height()),
    x2: reach(bbox.x2, canvas.width()),
    y2: reach(bbox.y2, canvas.height()),
  }
}

// 角点都包含在边框内，线宽向内加粗
fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
  for t in 0..LINE_THICKNESS {
    let width = bbox.width() + 1 - 2 * t;
    let height = bbox.height() + 1 - 2 * t;
    if width <= 0 || height <= 0 {
      break;
    }
    let rect = Rect::at(bbox.x1 + t, bbox.y1 + t).of_size(width as u32, height as u32);
    draw_hollow_rect_mut(canvas, rect, color);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn car() -> DetectionSet {
    DetectionSet::from(vec![
      Detection::new(50.0, 50.0, 20.0, 10.0, VEHICLE_CLASS, 0.87).unwrap(),
    ])
  }

  fn source() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 80, Rgb([20, 20, 20])))
  }

  #[test]
  fn label_has_two_decimals() {
    let set = car();
    let detection = &set.items()[0];
    assert_eq!(label_for(detection, None), "car (0.87)");
    assert_eq!(
      label_for(detection, Some(DetectionRole::Vehicle)),
      "Car (0.87)"
    );

    let plate = Detection::new(5.0, 5.0, 2.0, 2.0, PLATE_CLASS, 0.5).unwrap();
    assert_eq!(
      label_for(&plate, Some(DetectionRole::Plate)),
      "License Plate (0.50)"
    );
  }

  #[test]
  fn colors_follow_role_then_class() {
    let plate = Detection::new(5.0, 5.0, 2.0, 2.0, PLATE_CLASS, 0.5).unwrap();
    let truck = Detection::new(5.0, 5.0, 2.0, 2.0, "truck", 0.5).unwrap();

    assert_eq!(color_for(&plate, None), PLATE_COLOR);
    assert_eq!(color_for(&truck, None), FALLBACK_COLOR);
    assert_eq!(color_for(&truck, Some(DetectionRole::Vehicle)), VEHICLE_COLOR);
  }

  #[test]
  fn empty_set_leaves_image_unchanged() {
    let empty = DetectionSet::empty();
    let out = Visualizer::new(None).visualize(&source(), &[Layer::untagged(&empty)]);
    assert_eq!(out, source().to_rgb8());
  }

  #[test]
  fn draws_box_at_detection_corners() {
    let set = car();
    let image = source();
    let out = Visualizer::new(None).visualize(&image, &[Layer::untagged(&set)]);

    assert_eq!(out.get_pixel(40, 45), &VEHICLE_COLOR);
    assert_eq!(out.get_pixel(60, 55), &VEHICLE_COLOR);
    assert_eq!(out.get_pixel(60, 45), &VEHICLE_COLOR);
    assert_eq!(out.get_pixel(41, 50), &VEHICLE_COLOR);
    assert_eq!(out.get_pixel(50, 50), &Rgb([20, 20, 20]));
    assert_eq!(out.get_pixel(61, 50), &Rgb([20, 20, 20]));

    // 源图像未被修改
    assert_eq!(image, source());
  }

  #[test]
  fn box_past_the_edge_is_clipped() {
    let set = DetectionSet::from(vec![
      Detection::new(95.0, 2.0, 30.0, 30.0, PLATE_CLASS, 0.4).unwrap(),
    ]);
    let out = Visualizer::new(None).visualize(&source(), &[Layer::untagged(&set)]);
    assert_eq!(out.get_pixel(80, 17), &PLATE_COLOR);
  }

  #[test]
  fn huge_box_is_drawn_without_overflow() {
    let set = DetectionSet::from(vec![
      Detection::new(50.0, 50.0, 1.0e10, 10.0, VEHICLE_CLASS, 0.5).unwrap(),
    ]);
    let out = Visualizer::new(None).visualize(&source(), &[Layer::untagged(&set)]);

    // 左右两边在画布外，只剩上下两条线
    assert_eq!(out.get_pixel(0, 45), &VEHICLE_COLOR);
    assert_eq!(out.get_pixel(99, 55), &VEHICLE_COLOR);
    assert_eq!(out.get_pixel(0, 50), &Rgb([20, 20, 20]));
    assert_eq!(out.get_pixel(99, 50), &Rgb([20, 20, 20]));
  }

  #[test]
  fn label_is_drawn_above_the_box() {
    let Some(path) = SYSTEM_FONTS.iter().map(Path::new).find(|p| p.exists()) else {
      eprintln!("没有可用的系统字体, 跳过");
      return;
    };
    let visualizer = Visualizer::with_font_file(path).unwrap();
    assert!(visualizer.has_font());

    let set = DetectionSet::from(vec![
      Detection::new(50.0, 60.0, 20.0, 10.0, VEHICLE_CLASS, 0.87).unwrap(),
      Detection::new(50.0, 70.0, 1.0e10, 4.0, PLATE_CLASS, 0.4).unwrap(),
    ]);
    let background = source().to_rgb8();
    let out = visualizer.visualize(&source(), &[Layer::untagged(&set)]);

    let y1 = set.items()[0].bounding_box().y1;
    let changed = (0..(y1 - LABEL_MARGIN) as u32)
      .flat_map(|y| (0..out.width()).map(move |x| (x, y)))
      .any(|(x, y)| out.get_pixel(x, y) != background.get_pixel(x, y));
    assert!(changed);
  }
}
