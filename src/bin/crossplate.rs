// 该文件是 CrossPlate （车牌识别） 项目的一部分。
// src/bin/crossplate.rs - 上传图片并识别车牌
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use crossplate::{
  config::{AppConfig, Args, build_services, load_dotenv},
  output::{DirectoryOutput, Render},
  pipeline::{Pipeline, PipelineError, PipelineReport, PlateOutcome},
  source::SourceImage,
};

fn show(report: &PipelineReport) {
  println!(
    "检测到车辆 {} 个, 车牌 {} 个",
    report.vehicles.len(),
    report.plates.len()
  );
  match &report.plate {
    Some(PlateOutcome::Recognized { text, .. }) => println!("车牌号码: {}", text),
    Some(PlateOutcome::Unprocessable) => println!("车牌图像无法处理 (could not process)"),
    None => {}
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();
  load_dotenv();

  let args = Args::parse();
  let config = AppConfig::from_args(args).context("配置无效")?;

  info!("车辆检测模型: {}", config.vehicle_model);
  info!("车牌检测模型: {}", config.plate_model);
  info!("文字识别引擎: {}", config.ocr);
  info!("输出目录: {}", config.output.display());

  let services = build_services(&config).context("初始化服务失败")?;
  let pipeline = Pipeline::new(services, config.options);
  let output = DirectoryOutput::new(&config.output);

  let Some(input) = &config.input else {
    info!("没有上传图片, 无需处理");
    return Ok(());
  };

  let upload = SourceImage::open_upload(input)
    .with_context(|| format!("无法读取上传图片 {}", input.display()))?;

  info!("开始处理...");
  let now = std::time::Instant::now();
  let report = match pipeline.run(Some(&upload)) {
    Ok(report) => report,
    Err(PipelineError::NoDetectionFound(partial)) => {
      error!("未检测到车牌, 跳过文字识别");
      println!("未检测到车牌 (no license plate found)");
      *partial
    }
    Err(err) => return Err(err).context("处理失败"),
  };
  info!("处理完成，耗时: {:.2?}", now.elapsed());

  show(&report);
  output
    .render_result(&report)
    .context("保存结果失败")?;

  Ok(())
}
