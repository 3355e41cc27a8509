// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/output/directory.rs - 目录记录输出
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
  io::ErrorKind,
  path::{Path, PathBuf},
};

use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::info;

use crate::{
  detection::{DetectionRole, DetectionSet},
  output::Render,
  pipeline::{PipelineReport, PlateOutcome},
};

#[derive(Error, Debug)]
pub enum DirectoryOutputError {
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 将一次处理的结果写入目录
///
/// 默认按 `YYYY/MM/DD/HH-MM-SS-mmm` 建立子目录，已存在时追加序号。
pub struct DirectoryOutput {
  directory: PathBuf,
  dated: bool,
}

impl DirectoryOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      dated: true,
    }
  }

  /// 直接写入给定目录，不建立日期子目录
  pub fn flat(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      dated: false,
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn run_directory(&self) -> Result<PathBuf, std::io::Error> {
    if !self.dated {
      std::fs::create_dir_all(&self.directory)?;
      return Ok(self.directory.clone());
    }

    let now = Local::now();
    let day = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&day)?;

    // 同一毫秒内的多次运行追加序号
    let stem = now.format("%H-%M-%S-%3f").to_string();
    let mut directory = day.join(&stem);
    let mut suffix = 0u32;
    loop {
      match std::fs::create_dir(&directory) {
        Ok(()) => return Ok(directory),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
          suffix += 1;
          directory = day.join(format!("{}-{}", stem, suffix));
        }
        Err(err) => return Err(err),
      }
    }
  }
}

fn push_records(records: &mut Vec<String>, role: DetectionRole, detections: &DetectionSet) {
  for item in detections {
    let bbox = item.bounding_box();
    records.push(format!(
      "{}, {}, {:.4}, {}, {}, {}, {}",
      role, item.class_name, item.confidence, bbox.x1, bbox.y1, bbox.x2, bbox.y2
    ));
  }
}

/// 文本记录：首行为车牌识别结果，随后每行一个检测框
pub fn format_records(report: &PipelineReport) -> String {
  let mut records = Vec::new();
  match &report.plate {
    Some(PlateOutcome::Recognized { text, .. }) => records.push(format!("plate_text: {}", text)),
    Some(PlateOutcome::Unprocessable) => records.push("plate_text: <unprocessable>".to_string()),
    None => {}
  }
  push_records(&mut records, DetectionRole::Vehicle, &report.vehicles);
  push_records(&mut records, DetectionRole::Plate, &report.plates);
  records.join("\n")
}

impl Render<PipelineReport> for DirectoryOutput {
  type Error = DirectoryOutputError;

  fn render_result(&self, report: &PipelineReport) -> Result<(), Self::Error> {
    let directory = self.run_directory()?;

    if let Some(annotated) = &report.annotated {
      annotated.combined.save(directory.join("combined.png"))?;
      annotated.vehicles.save(directory.join("vehicles.png"))?;
      annotated.plates.save(directory.join("plates.png"))?;
    }
    if let Some(preprocessed) = report.preprocessed() {
      preprocessed.save(directory.join("plate_crop.png"))?;
    }
    std::fs::write(directory.join("result.txt"), format_records(report))?;

    info!("结果已保存至 {}", directory.display());
    Ok(())
  }
}
