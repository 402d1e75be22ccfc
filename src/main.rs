// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 摄像头实时检测主程序
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

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, error::ErrorKind};
use tracing::{error, info, warn};

use shanan_live::{
  FromUrl,
  args::Args,
  engine::RknnEngineBuilder,
  input::{DEFAULT_CAMERA, GStreamerInputPipelineBuilder, camera_url},
  model::{Yolov5PostProcess, load_model},
  output::{GStreamerDisplay, draw::Draw},
  pipeline::{Pipeline, PipelineConfig},
  resize::CpuResizer,
  signal::Interrupt,
};

/// 启动失败时的退出码，即 -1
const EXIT_FAILURE: u8 = 255;

fn main() -> ExitCode {
  tracing_subscriber::fmt::init();

  let args = match Args::try_parse() {
    Ok(args) => args,
    Err(e) => {
      let _ = e.print();
      return match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::from(EXIT_FAILURE),
      };
    }
  };

  match run(args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{:#}", e);
      ExitCode::from(EXIT_FAILURE)
    }
  }
}

fn run(args: Args) -> Result<()> {
  info!("模型文件路径: {}", args.model.display());
  info!(
    "摄像头采集尺寸: {}x{}",
    args.capture_width, args.capture_height
  );

  let blob = load_model(&args.model)
    .with_context(|| format!("无法加载模型 {}", args.model.display()))?;
  info!("模型文件大小: {} 字节", blob.len());
  let engine = RknnEngineBuilder::new(blob).build()?;

  let mut pipeline = Pipeline::new(
    engine,
    CpuResizer::default(),
    Yolov5PostProcess,
    Draw::new()?,
    PipelineConfig::default(),
  )?;
  let shape = pipeline.input_shape();

  let url = camera_url(DEFAULT_CAMERA, args.capture_width, args.capture_height)?;
  let camera = GStreamerInputPipelineBuilder::from_url(&url)?.build()?;

  let interrupt = Interrupt::install().context("无法设置 Ctrl-C 处理函数")?;
  let mut display = GStreamerDisplay::new(shape.width, shape.height)?.with_interrupt(interrupt);

  let summary = pipeline.run(camera, &mut display)?;
  if !summary.quit_requested {
    warn!("摄像头输入已结束");
  }

  // 先关闭窗口与摄像头，再销毁推理上下文
  drop(display);
  drop(pipeline);
  info!("程序退出");
  Ok(())
}
