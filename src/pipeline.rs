// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/pipeline.rs - 检测、裁剪、识别流程
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

use image::{GrayImage, RgbImage};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  crop::{CropError, crop_plate},
  detection::{DetectionRole, DetectionSet, SelectionPolicy},
  model::{DetectionClient, DetectionError, DetectionPair},
  ocr::{RecognitionError, TextRecognizer, recognize_text},
  output::draw::{Layer, Visualizer},
  preprocess::{PreprocessOptions, preprocess_plate},
  source::SourceImage,
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("未提供上传图像")]
  InvalidInput,
  #[error("检测服务错误: {0}")]
  Detection(#[from] DetectionError),
  /// 携带已完成的检测与标注结果
  #[error("未检测到车牌")]
  NoDetectionFound(Box<PipelineReport>),
  #[error("文字识别服务错误: {0}")]
  Recognition(#[from] RecognitionError),
}

/// 流程变体，在组装时选定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PipelineMode {
  /// 只调用两个检测器
  DetectOnly,
  /// 检测并绘制结果
  DetectVisualize,
  /// 检测、绘制、裁剪车牌并识别文字
  #[default]
  Full,
}

impl PipelineMode {
  pub fn visualizes(&self) -> bool {
    !matches!(self, PipelineMode::DetectOnly)
  }

  pub fn reads_plate(&self) -> bool {
    matches!(self, PipelineMode::Full)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
  pub mode: PipelineMode,
  pub selection: SelectionPolicy,
  pub preprocess: PreprocessOptions,
  pub concurrent_detection: bool,
}

/// 启动时构建一次的外部服务，之后只读
pub struct Services {
  pub detection: DetectionClient,
  pub recognizer: Box<dyn TextRecognizer>,
  pub visualizer: Visualizer,
}

/// 标注后的图像
#[derive(Debug, Clone)]
pub struct AnnotatedImages {
  pub combined: RgbImage,
  pub vehicles: RgbImage,
  pub plates: RgbImage,
}

#[derive(Debug, Clone)]
pub enum PlateOutcome {
  Recognized {
    text: String,
    preprocessed: GrayImage,
  },
  /// 裁剪结果无法预处理
  Unprocessable,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
  pub vehicles: DetectionSet,
  pub plates: DetectionSet,
  pub annotated: Option<AnnotatedImages>,
  pub plate: Option<PlateOutcome>,
}

impl PipelineReport {
  pub fn plate_text(&self) -> Option<&str> {
    match &self.plate {
      Some(PlateOutcome::Recognized { text, .. }) => Some(text),
      _ => None,
    }
  }

  pub fn preprocessed(&self) -> Option<&GrayImage> {
    match &self.plate {
      Some(PlateOutcome::Recognized { preprocessed, .. }) => Some(preprocessed),
      _ => None,
    }
  }
}

#[derive(Error, Debug)]
enum PlateError {
  #[error(transparent)]
  Crop(#[from] CropError),
  #[error(transparent)]
  Recognition(#[from] RecognitionError),
}

pub struct Pipeline {
  services: Services,
  options: PipelineOptions,
}

impl Pipeline {
  pub fn new(services: Services, options: PipelineOptions) -> Self {
    Self { services, options }
  }

  pub fn options(&self) -> &PipelineOptions {
    &self.options
  }

  pub fn run(&self, upload: Option<&SourceImage>) -> Result<PipelineReport, PipelineError> {
    let image = upload.ok_or(PipelineError::InvalidInput)?;
    info!(
      "开始处理图像: {}x{} ({:?})",
      image.width(),
      image.height(),
      self.options.mode
    );

    let now = std::time::Instant::now();
    let DetectionPair { vehicles, plates } = self
      .services
      .detection
      .detect_both(image, self.options.concurrent_detection)?;
    info!(
      "检测完成，耗时: {:.2?}, 车辆 {} 个, 车牌 {} 个",
      now.elapsed(),
      vehicles.len(),
      plates.len()
    );

    let annotated = self
      .options
      .mode
      .visualizes()
      .then(|| self.annotate(image, &vehicles, &plates));

    let mut report = PipelineReport {
      vehicles,
      plates,
      annotated,
      plate: None,
    };

    if self.options.mode.reads_plate() {
      match self.read_plate(image, &report.plates) {
        Ok(outcome) => report.plate = Some(outcome),
        Err(PlateError::Crop(CropError::NoDetectionFound)) => {
          return Err(PipelineError::NoDetectionFound(Box::new(report)));
        }
        Err(PlateError::Recognition(err)) => return Err(err.into()),
      }
    }

    Ok(report)
  }

  fn read_plate(
    &self,
    image: &SourceImage,
    plates: &DetectionSet,
  ) -> Result<PlateOutcome, PlateError> {
    let crop = crop_plate(image.pixels(), plates, self.options.selection)?;

    let Some(preprocessed) = preprocess_plate(&crop, &self.options.preprocess) else {
      warn!("车牌图像无法预处理, 跳过文字识别");
      return Ok(PlateOutcome::Unprocessable);
    };

    let text = recognize_text(self.services.recognizer.as_ref(), &preprocessed)?;
    Ok(PlateOutcome::Recognized { text, preprocessed })
  }

  fn annotate(
    &self,
    image: &SourceImage,
    vehicles: &DetectionSet,
    plates: &DetectionSet,
  ) -> AnnotatedImages {
    let visualizer = &self.services.visualizer;
    let pixels = image.pixels();

    AnnotatedImages {
      combined: visualizer.visualize(
        pixels,
        &[
          Layer::tagged(DetectionRole::Vehicle, vehicles),
          Layer::tagged(DetectionRole::Plate, plates),
        ],
      ),
      vehicles: visualizer.visualize(pixels, &[Layer::untagged(vehicles)]),
      plates: visualizer.visualize(pixels, &[Layer::untagged(plates)]),
    }
  }
}
