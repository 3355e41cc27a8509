// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/ocr/tesseract.rs - Tesseract 命令行识别引擎
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

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
  process::Command,
};

use image::{GrayImage, ImageFormat};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  ocr::{RecognitionError, TextRecognizer},
};

/// 单行文本页面分割模式
pub const SINGLE_LINE_PSM: u8 = 7;
const DEFAULT_PROGRAM: &str = "tesseract";

/// 调用本地 `tesseract` 可执行文件识别文字
#[derive(Debug, Clone)]
pub struct TesseractCli {
  program: PathBuf,
  page_seg_mode: u8,
  language: Option<String>,
}

impl Default for TesseractCli {
  fn default() -> Self {
    Self {
      program: PathBuf::from(DEFAULT_PROGRAM),
      page_seg_mode: SINGLE_LINE_PSM,
      language: None,
    }
  }
}

impl FromUrlWithScheme for TesseractCli {
  const SCHEME: &'static str = "tesseract";
}

impl FromUrl for TesseractCli {
  type Error = RecognitionError;

  // tesseract:///tesseract?psm=7&lang=eng 或 tesseract:///usr/bin/tesseract
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecognitionError::EngineUrl(format!(
        "期望方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let path = url.path();
    let trimmed = path.trim_start_matches('/');
    let program = if trimmed.is_empty() {
      PathBuf::from(DEFAULT_PROGRAM)
    } else if trimmed.contains('/') {
      PathBuf::from(path)
    } else {
      // 单个名称通过 PATH 查找
      PathBuf::from(trimmed)
    };

    let mut engine = TesseractCli {
      program,
      ..Default::default()
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "psm" => {
          engine.page_seg_mode = value.parse().map_err(|_| {
            RecognitionError::EngineUrl(format!("无效的 psm 参数: {}", value))
          })?;
        }
        "lang" if !value.is_empty() => engine.language = Some(value.to_string()),
        _ => debug!("忽略未知参数: {}={}", key, value),
      }
    }

    Ok(engine)
  }
}

impl TesseractCli {
  pub fn program(&self) -> &Path {
    &self.program
  }

  pub fn page_seg_mode(&self) -> u8 {
    self.page_seg_mode
  }

  pub fn language(&self) -> Option<&str> {
    self.language.as_deref()
  }

  fn command_args(&self, input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
      input.as_os_str().to_owned(),
      "stdout".into(),
      "--psm".into(),
      self.page_seg_mode.to_string().into(),
    ];
    if let Some(language) = &self.language {
      args.push("-l".into());
      args.push(language.into());
    }
    args
  }
}

impl TextRecognizer for TesseractCli {
  fn recognize(&self, image: &GrayImage) -> Result<String, RecognitionError> {
    let input = tempfile::Builder::new()
      .prefix("crossplate-ocr-")
      .suffix(".png")
      .tempfile()?;
    image.save_with_format(input.path(), ImageFormat::Png)?;

    let args = self.command_args(input.path());
    debug!("执行 {} {:?}", self.program.display(), args);

    let output = Command::new(&self.program)
      .args(&args)
      .output()
      .map_err(|source| RecognitionError::Spawn {
        program: self.program.display().to_string(),
        source,
      })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      error!("识别引擎退出异常 {}: {}", output.status, stderr);
      return Err(RecognitionError::Engine {
        status: output.status.to_string(),
        stderr,
      });
    }

    let text = String::from_utf8(output.stdout)?;
    info!("识别引擎输出 {} 字节", text.len());
    Ok(text)
  }
}
