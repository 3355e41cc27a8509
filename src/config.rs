// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/config.rs - 项目参数配置
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

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  detection::SelectionPolicy,
  model::DetectionError,
  ocr::RecognitionError,
  output::draw::DrawError,
  pipeline::{PipelineMode, PipelineOptions},
  preprocess::PreprocessOptions,
};

pub const API_KEY_ENV: &str = "ROBOFLOW_API_KEY";
pub const DEFAULT_VEHICLE_MODEL: &str = "https://detect.roboflow.com/cartypes-zywky/1";
pub const DEFAULT_PLATE_MODEL: &str =
  "https://detect.roboflow.com/yolov7-license-plate-detection/3";
pub const DEFAULT_OCR_ENGINE: &str = "tesseract:///tesseract?psm=7";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("缺少检测服务凭据, 请设置环境变量 {API_KEY_ENV}")]
  MissingCredential,
  #[error("{name} 地址方案不匹配: 期望 {expected}, 实际 {actual}")]
  SchemeMismatch {
    name: &'static str,
    expected: &'static str,
    actual: String,
  },
  #[error("检测服务配置错误: {0}")]
  Detection(#[from] DetectionError),
  #[error("识别引擎配置错误: {0}")]
  Recognition(#[from] RecognitionError),
  #[error("字体加载失败: {0}")]
  Font(#[from] DrawError),
}

/// CrossPlate 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 待识别的图片（*.jpg, *.jpeg, *.png），缺省时不做处理
  #[arg(long, value_name = "FILE")]
  pub input: Option<PathBuf>,

  /// 结果输出目录
  #[arg(long, default_value = "output", value_name = "DIR")]
  pub output: PathBuf,

  /// 检测服务 API 密钥
  #[arg(long, env = API_KEY_ENV, hide_env_values = true, value_name = "KEY")]
  pub api_key: Option<String>,

  /// 车辆检测模型地址
  #[arg(long, default_value = DEFAULT_VEHICLE_MODEL, value_name = "URL")]
  pub vehicle_model: Url,

  /// 车牌检测模型地址
  #[arg(long, default_value = DEFAULT_PLATE_MODEL, value_name = "URL")]
  pub plate_model: Url,

  /// 文字识别引擎
  /// 格式: tesseract:///<程序路径>?psm=<模式>&lang=<语言>
  #[arg(long, default_value = DEFAULT_OCR_ENGINE, value_name = "URL")]
  pub ocr: Url,

  /// 处理流程
  #[arg(long, value_enum, default_value_t = PipelineMode::Full)]
  pub mode: PipelineMode,

  /// 多个车牌时的选取策略
  #[arg(long, value_enum, default_value_t = SelectionPolicy::First)]
  pub selection: SelectionPolicy,

  /// 车牌预处理时的膨胀次数
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub dilate_iterations: u32,

  /// 并行调用两个检测服务
  #[arg(long)]
  pub concurrent_detection: bool,

  /// 检测服务请求超时（秒）
  #[arg(long, default_value = "30", value_name = "SECONDS")]
  pub timeout_secs: u64,

  /// 标签字体文件（TTF），缺省时查找系统字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

/// 启动时加载一次的配置
#[derive(Debug, Clone)]
pub struct AppConfig {
  pub api_key: String,
  pub vehicle_model: Url,
  pub plate_model: Url,
  pub ocr: Url,
  pub timeout: Duration,
  pub font: Option<PathBuf>,
  pub input: Option<PathBuf>,
  pub output: PathBuf,
  pub options: PipelineOptions,
}

fn check_scheme(
  name: &'static str,
  url: &Url,
  expected: &'static [&'static str],
) -> Result<(), ConfigError> {
  if expected.contains(&url.scheme()) {
    return Ok(());
  }
  Err(ConfigError::SchemeMismatch {
    name,
    expected: expected[0],
    actual: url.scheme().to_string(),
  })
}

const HTTP_SCHEMES: &[&str] = &["https", "http"];
const OCR_SCHEMES: &[&str] = &["tesseract"];

impl AppConfig {
  pub fn from_args(args: Args) -> Result<Self, ConfigError> {
    let api_key = args
      .api_key
      .map(|key| key.trim().to_string())
      .filter(|key| !key.is_empty())
      .ok_or(ConfigError::MissingCredential)?;

    check_scheme("车辆检测模型", &args.vehicle_model, HTTP_SCHEMES)?;
    check_scheme("车牌检测模型", &args.plate_model, HTTP_SCHEMES)?;
    check_scheme("文字识别引擎", &args.ocr, OCR_SCHEMES)?;

    let config = AppConfig {
      api_key,
      vehicle_model: args.vehicle_model,
      plate_model: args.plate_model,
      ocr: args.ocr,
      timeout: Duration::from_secs(args.timeout_secs),
      font: args.font,
      input: args.input,
      output: args.output,
      options: PipelineOptions {
        mode: args.mode,
        selection: args.selection,
        preprocess: PreprocessOptions {
          dilate_iterations: args.dilate_iterations,
        },
        concurrent_detection: args.concurrent_detection,
      },
    };
    debug!("配置已加载: {:?}", config.options);
    Ok(config)
  }
}

/// 读取工作目录下的 `.env`，文件不存在时忽略
pub fn load_dotenv() {
  match dotenv::dotenv() {
    Ok(path) => info!("已加载环境文件 {}", path.display()),
    Err(err) => debug!("未加载 .env: {}", err),
  }
}

#[cfg(all(feature = "hosted_detector", feature = "tesseract_ocr"))]
pub fn build_services(config: &AppConfig) -> Result<crate::pipeline::Services, ConfigError> {
  use crate::{
    FromUrl,
    model::{DetectionClient, HostedDetectorBuilder},
    ocr::TesseractCli,
    output::draw::Visualizer,
    pipeline::Services,
  };

  let hosted = |url: &Url| -> Result<_, ConfigError> {
    let detector = HostedDetectorBuilder::from_url(url)?
      .api_key(&config.api_key)
      .timeout(config.timeout)
      .build()?;
    Ok(Box::new(detector))
  };

  let detection = DetectionClient::new(hosted(&config.vehicle_model)?, hosted(&config.plate_model)?);
  let recognizer = Box::new(TesseractCli::from_url(&config.ocr)?);
  let visualizer = match &config.font {
    Some(path) => Visualizer::with_font_file(path)?,
    None => Visualizer::default(),
  };

  Ok(Services {
    detection,
    recognizer,
    visualizer,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(extra: &[&str]) -> Result<AppConfig, ConfigError> {
    let mut argv = vec!["crossplate"];
    argv.extend_from_slice(extra);
    let args = Args::try_parse_from(argv).unwrap();
    AppConfig::from_args(args)
  }

  #[test]
  fn defaults_match_hosted_models() {
    let config = parse(&["--api-key", "secret"]).unwrap();
    assert_eq!(config.api_key, "secret");
    assert_eq!(config.vehicle_model.as_str(), DEFAULT_VEHICLE_MODEL);
    assert_eq!(config.plate_model.as_str(), DEFAULT_PLATE_MODEL);
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.output, PathBuf::from("output"));
    assert!(config.input.is_none());
    assert_eq!(config.options, PipelineOptions::default());
  }

  #[test]
  fn flags_fill_pipeline_options() {
    let config = parse(&[
      "--api-key",
      "secret",
      "--mode",
      "detect-visualize",
      "--selection",
      "max-confidence",
      "--dilate-iterations",
      "2",
      "--concurrent-detection",
      "--input",
      "car.jpg",
    ])
    .unwrap();

    assert_eq!(config.options.mode, PipelineMode::DetectVisualize);
    assert_eq!(config.options.selection, SelectionPolicy::MaxConfidence);
    assert_eq!(config.options.preprocess.dilate_iterations, 2);
    assert!(config.options.concurrent_detection);
    assert_eq!(config.input, Some(PathBuf::from("car.jpg")));
  }

  #[test]
  fn blank_key_is_missing_credential() {
    assert!(matches!(
      parse(&["--api-key", "  "]),
      Err(ConfigError::MissingCredential)
    ));
  }

  #[test]
  fn wrong_schemes_are_rejected() {
    assert!(matches!(
      parse(&["--api-key", "k", "--plate-model", "ftp://models/plate/3"]),
      Err(ConfigError::SchemeMismatch { actual, .. }) if actual == "ftp"
    ));
    assert!(matches!(
      parse(&["--api-key", "k", "--ocr", "https://ocr.example.com/v1"]),
      Err(ConfigError::SchemeMismatch { .. })
    ));
  }

  #[cfg(all(feature = "hosted_detector", feature = "tesseract_ocr"))]
  #[test]
  fn builds_services_without_network() {
    let config = parse(&["--api-key", "secret"]).unwrap();
    assert!(build_services(&config).is_ok());

    let config = parse(&["--api-key", "secret", "--font", "/nonexistent/font.ttf"]).unwrap();
    assert!(matches!(build_services(&config), Err(ConfigError::Font(_))));
  }
}
