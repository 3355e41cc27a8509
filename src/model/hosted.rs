// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/model/hosted.rs - 托管推理服务检测器
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

use std::time::Duration;

use reqwest::{blocking::Client, header::CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl,
  detection::{Detection, DetectionSet},
  model::{DetectionError, Detector},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const API_KEY_PARAM: &str = "api_key";

/// 托管服务的响应外层，只关心 `predictions`
#[derive(Debug, Deserialize)]
struct HostedResponse {
  predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
  x: f32,
  y: f32,
  width: f32,
  height: f32,
  confidence: f32,
  #[serde(rename = "class")]
  class_name: String,
}

/// 在服务边界校验响应结构与字段取值
pub(crate) fn parse_predictions(body: &str) -> Result<DetectionSet, DetectionError> {
  let response: HostedResponse = serde_json::from_str(body).map_err(|e| {
    error!("检测服务响应结构不匹配: {}", e);
    DetectionError::InvalidResponse(e.to_string())
  })?;

  let items = response
    .predictions
    .into_iter()
    .map(|p| Detection::new(p.x, p.y, p.width, p.height, p.class_name, p.confidence))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(DetectionSet::from(items))
}

pub struct HostedDetectorBuilder {
  endpoint: Url,
  api_key: Option<String>,
  timeout: Duration,
}

impl FromUrl for HostedDetectorBuilder {
  type Error = DetectionError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != "http" && url.scheme() != "https" {
      return Err(DetectionError::ModelUrl(format!(
        "模型地址必须使用 http 或 https 方案, 实际为 {}",
        url.scheme()
      )));
    }

    if url.path().trim_matches('/').is_empty() {
      return Err(DetectionError::ModelUrl(format!(
        "模型地址缺少模型标识: {}",
        url
      )));
    }

    Ok(HostedDetectorBuilder {
      endpoint: url.clone(),
      api_key: None,
      timeout: DEFAULT_TIMEOUT,
    })
  }
}

impl HostedDetectorBuilder {
  pub fn api_key(mut self, api_key: &str) -> Self {
    self.api_key = Some(api_key.to_string());
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn build(self) -> Result<HostedDetector, DetectionError> {
    let api_key = self
      .api_key
      .filter(|key| !key.trim().is_empty())
      .ok_or(DetectionError::MissingApiKey)?;

    let model_id = self.endpoint.path().trim_matches('/').to_string();
    let mut endpoint = self.endpoint;
    endpoint
      .query_pairs_mut()
      .append_pair(API_KEY_PARAM, &api_key);

    let http = Client::builder()
      .timeout(self.timeout)
      .build()
      .map_err(DetectionError::http)?;
    info!(
      "检测模型已配置: {} (超时 {:?})",
      model_id, self.timeout
    );

    Ok(HostedDetector {
      http,
      endpoint,
      model_id,
    })
  }
}

/// 通过 HTTP 调用托管的目标检测模型
pub struct HostedDetector {
  http: Client,
  endpoint: Url,
  model_id: String,
}

impl HostedDetector {
  pub fn model_id(&self) -> &str {
    &self.model_id
  }
}

impl Detector for HostedDetector {
  fn detect(&self, encoded_image: &str) -> Result<DetectionSet, DetectionError> {
    debug!(
      "请求检测模型 {}: 负载 {} 字节",
      self.model_id,
      encoded_image.len()
    );

    let response = self
      .http
      .post(self.endpoint.clone())
      .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
      .body(encoded_image.to_owned())
      .send()
      .map_err(DetectionError::http)?;

    let status = response.status();
    let body = response.text().map_err(DetectionError::http)?;
    if !status.is_success() {
      error!("检测模型 {} 返回状态 {}", self.model_id, status);
      return Err(DetectionError::Status {
        status: status.as_u16(),
        body,
      });
    }

    parse_predictions(&body)
  }
}
