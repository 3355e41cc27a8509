// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/detection.rs - 检测结果定义
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

/// 车辆检测模型的类别名
pub const VEHICLE_CLASS: &str = "car";
/// 车牌检测模型的类别名
pub const PLATE_CLASS: &str = "licenseplate";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidDetection {
  #[error("坐标或尺寸不是有限数值")]
  NonFinite,
  #[error("宽高不能为负: {width}x{height}")]
  NegativeSize { width: f32, height: f32 },
  #[error("置信度超出 [0, 1] 范围: {0}")]
  ConfidenceOutOfRange(f32),
  #[error("类别名称为空")]
  EmptyClass,
}

/// 单个检测目标，坐标为像素空间的中心点与宽高
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
  pub class_name: String,
  pub confidence: f32,
}

impl Detection {
  pub fn new(
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    class_name: impl Into<String>,
    confidence: f32,
  ) -> Result<Self, InvalidDetection> {
    let class_name = class_name.into();

    if ![x, y, width, height, confidence].iter().all(|v| v.is_finite()) {
      return Err(InvalidDetection::NonFinite);
    }
    if width < 0.0 || height < 0.0 {
      return Err(InvalidDetection::NegativeSize { width, height });
    }
    if !(0.0..=1.0).contains(&confidence) {
      return Err(InvalidDetection::ConfidenceOutOfRange(confidence));
    }
    if class_name.trim().is_empty() {
      return Err(InvalidDetection::EmptyClass);
    }

    Ok(Self {
      x,
      y,
      width,
      height,
      class_name,
      confidence,
    })
  }

  pub fn bounding_box(&self) -> BoundingBox {
    BoundingBox::from_center(self.x, self.y, self.width, self.height)
  }
}

/// 由中心点与宽高推导出的像素角点，不单独保存
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

/// 限制在图像范围内的矩形区域，宽或高可以为 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl PixelRegion {
  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

impl BoundingBox {
  // `as i32` 向零截断
  pub fn from_center(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x1: (x - width / 2.0) as i32,
      y1: (y - height / 2.0) as i32,
      x2: (x + width / 2.0) as i32,
      y2: (y + height / 2.0) as i32,
    }
  }

  // 超大检测框的角点会饱和到 i32 边界
  pub fn width(&self) -> i32 {
    self.x2.saturating_sub(self.x1)
  }

  pub fn height(&self) -> i32 {
    self.y2.saturating_sub(self.y1)
  }

  pub fn clamp_to(&self, width: u32, height: u32) -> PixelRegion {
    let (w, h) = (width as i64, height as i64);

    let x1 = (self.x1 as i64).clamp(0, w);
    let y1 = (self.y1 as i64).clamp(0, h);
    let x2 = (self.x2 as i64).clamp(0, w);
    let y2 = (self.y2 as i64).clamp(0, h);

    PixelRegion {
      x: x1 as u32,
      y: y1 as u32,
      width: (x2 - x1).max(0) as u32,
      height: (y2 - y1).max(0) as u32,
    }
  }
}

/// 一次推理调用返回的有序检测集合，空集合表示未检测到目标
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
  items: Box<[Detection]>,
}

impl From<Vec<Detection>> for DetectionSet {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

impl DetectionSet {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn items(&self) -> &[Detection] {
    &self.items
  }

  pub fn select(&self, policy: SelectionPolicy) -> Option<&Detection> {
    match policy {
      SelectionPolicy::First => self.items.first(),
      // 置信度相同时保留靠前的一个
      SelectionPolicy::MaxConfidence => self.items.iter().fold(None, |best, item| match best {
        Some(best) if best.confidence >= item.confidence => Some(best),
        _ => Some(item),
      }),
    }
  }
}

/// 多个检测结果时选取哪一个作为下游输入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SelectionPolicy {
  /// 按返回顺序取第一个
  #[default]
  First,
  /// 取置信度最高的一个
  MaxConfidence,
}

/// 检测集合的角色，决定绘制颜色与标签前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionRole {
  Vehicle,
  Plate,
}

impl DetectionRole {
  pub fn label_prefix(&self) -> &'static str {
    match self {
      DetectionRole::Vehicle => "Car",
      DetectionRole::Plate => "License Plate",
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      DetectionRole::Vehicle => "vehicle",
      DetectionRole::Plate => "plate",
    }
  }
}

impl std::fmt::Display for DetectionRole {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}
