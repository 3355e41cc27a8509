// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/model.rs - 检测模型
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
use tracing::{debug, info};

use crate::{
  codec::{CodecError, image_to_base64},
  detection::{DetectionRole, DetectionSet, InvalidDetection},
  source::SourceImage,
};

#[derive(Error, Debug)]
pub enum DetectionError {
  #[error("图像编码失败: {0}")]
  Encode(#[from] CodecError),
  #[cfg(feature = "hosted_detector")]
  #[error("HTTP 请求失败: {0}")]
  Http(reqwest::Error),
  #[error("检测服务返回错误状态 {status}: {body}")]
  Status { status: u16, body: String },
  #[error("检测服务响应无效: {0}")]
  InvalidResponse(String),
  #[error("检测结果不合法: {0}")]
  InvalidDetection(#[from] InvalidDetection),
  #[error("模型地址错误: {0}")]
  ModelUrl(String),
  #[error("缺少检测服务 API 密钥")]
  MissingApiKey,
  #[error("{0} 检测线程异常退出")]
  WorkerPanicked(DetectionRole),
}

impl DetectionError {
  /// 请求地址带有 API 密钥，去掉后再保存
  #[cfg(feature = "hosted_detector")]
  pub(crate) fn http(err: reqwest::Error) -> Self {
    DetectionError::Http(err.without_url())
  }
}

/// 外部检测服务，输入为 base64 编码的图像
#[cfg_attr(test, mockall::automock)]
pub trait Detector: Send + Sync {
  fn detect(&self, encoded_image: &str) -> Result<DetectionSet, DetectionError>;
}

/// 车辆与车牌两次检测的结果，按名称分开保存
#[derive(Debug, Clone, Default)]
pub struct DetectionPair {
  pub vehicles: DetectionSet,
  pub plates: DetectionSet,
}

/// 车辆检测器与车牌检测器，启动时创建一次
pub struct DetectionClient {
  vehicle: Box<dyn Detector>,
  plate: Box<dyn Detector>,
}

impl DetectionClient {
  pub fn new(vehicle: Box<dyn Detector>, plate: Box<dyn Detector>) -> Self {
    Self { vehicle, plate }
  }

  fn detector(&self, role: DetectionRole) -> &dyn Detector {
    match role {
      DetectionRole::Vehicle => self.vehicle.as_ref(),
      DetectionRole::Plate => self.plate.as_ref(),
    }
  }

  fn run(&self, role: DetectionRole, encoded: &str) -> Result<DetectionSet, DetectionError> {
    debug!("调用 {} 检测服务", role);
    let result = self.detector(role).detect(encoded)?;
    info!("{} 检测完成: {} 个目标", role, result.len());
    Ok(result)
  }

  /// 调用单个检测器
  pub fn detect(
    &self,
    role: DetectionRole,
    image: &SourceImage,
  ) -> Result<DetectionSet, DetectionError> {
    let encoded = image_to_base64(Some(image))?;
    self.run(role, &encoded)
  }

  /// 对同一张图像调用两个检测器，`concurrent` 为真时并行执行
  pub fn detect_both(
    &self,
    image: &SourceImage,
    concurrent: bool,
  ) -> Result<DetectionPair, DetectionError> {
    let encoded = image_to_base64(Some(image))?;

    if !concurrent {
      let vehicles = self.run(DetectionRole::Vehicle, &encoded)?;
      let plates = self.run(DetectionRole::Plate, &encoded)?;
      return Ok(DetectionPair { vehicles, plates });
    }

    std::thread::scope(|scope| {
      let vehicle_task = scope.spawn(|| self.run(DetectionRole::Vehicle, &encoded));
      let plates = self.run(DetectionRole::Plate, &encoded);
      let vehicles = vehicle_task
        .join()
        .map_err(|_| DetectionError::WorkerPanicked(DetectionRole::Vehicle))?;

      Ok(DetectionPair {
        vehicles: vehicles?,
        plates: plates?,
      })
    })
  }
}

#[cfg(feature = "hosted_detector")]
mod hosted;
#[cfg(feature = "hosted_detector")]
pub use self::hosted::{HostedDetector, HostedDetectorBuilder};

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Detection;
  use image::{DynamicImage, RgbImage};

  fn image() -> SourceImage {
    SourceImage::from(DynamicImage::ImageRgb8(RgbImage::new(32, 24)))
  }

  fn single(class_name: &str) -> DetectionSet {
    DetectionSet::from(vec![
      Detection::new(10.0, 10.0, 8.0, 4.0, class_name, 0.9).unwrap(),
    ])
  }

  fn client(vehicles: DetectionSet, plates: DetectionSet) -> DetectionClient {
    let mut vehicle = MockDetector::new();
    vehicle
      .expect_detect()
      .times(1)
      .returning(move |_| Ok(vehicles.clone()));
    let mut plate = MockDetector::new();
    plate
      .expect_detect()
      .times(1)
      .returning(move |_| Ok(plates.clone()));
    DetectionClient::new(Box::new(vehicle), Box::new(plate))
  }

  #[test]
  fn results_stay_with_their_detector() {
    for concurrent in [false, true] {
      let client = client(single("car"), single("licenseplate"));
      let pair = client.detect_both(&image(), concurrent).unwrap();
      assert_eq!(pair.vehicles.items()[0].class_name, "car");
      assert_eq!(pair.plates.items()[0].class_name, "licenseplate");
    }
  }

  #[test]
  fn detectors_receive_base64_payload() {
    let mut vehicle = MockDetector::new();
    vehicle
      .expect_detect()
      .withf(|encoded| crate::codec::base64_to_image(encoded).is_ok())
      .times(1)
      .returning(|_| Ok(DetectionSet::empty()));
    let plate = MockDetector::new();

    let client = DetectionClient::new(Box::new(vehicle), Box::new(plate));
    let result = client.detect(DetectionRole::Vehicle, &image()).unwrap();
    assert!(result.is_empty());
  }

  #[test]
  fn service_failure_propagates() {
    let mut vehicle = MockDetector::new();
    vehicle.expect_detect().returning(|_| {
      Err(DetectionError::Status {
        status: 500,
        body: "boom".to_string(),
      })
    });
    let mut plate = MockDetector::new();
    plate
      .expect_detect()
      .returning(|_| Ok(DetectionSet::empty()));

    let client = DetectionClient::new(Box::new(vehicle), Box::new(plate));
    for concurrent in [false, true] {
      assert!(matches!(
        client.detect_both(&image(), concurrent),
        Err(DetectionError::Status { status: 500, .. })
      ));
    }
  }
}
