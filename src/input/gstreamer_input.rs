// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 摄像头输入
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

//! # GStreamer 摄像头输入
//!
//! 通过 `v4l2src` 以请求的分辨率打开摄像头，输出交错存储的 RGB 帧。
//!
//! ## 系统依赖
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 基本用法
//!
//! ```no_run
//! use shanan_live::{FromUrl, input::{GStreamerInputPipelineBuilder, camera_url}};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = camera_url("/dev/video0", 640, 480)?;
//! let input = GStreamerInputPipelineBuilder::from_url(&url)?.build()?;
//! for frame in input {
//!     println!("采集帧: {}x{}", frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, time::Instant};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, ImageDesc, PixelFormat},
};

/// 摄像头打开超时
const CAMERA_OPEN_TIMEOUT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum GStreamerInputError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("URI 缺少参数: {0}")]
  MissingParameter(&'static str),
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  #[error("Unsupported video format: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("无法打开摄像头 {device}: {reason}")]
  CameraOpen { device: String, reason: String },
}

pub enum GStreamerInputBuilderItem {
  CameraSource {
    camera: String,
    io_mode: Option<u32>,
    width: u32,
    height: u32,
    fps: Option<u32>,
  },
  TargetFormat {
    format: String,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::CameraSource {
        camera,
        io_mode,
        width,
        height,
        fps,
      } => {
        let io_mode_str = io_mode
          .map(|mode| format!(" io-mode={}", mode))
          .unwrap_or_default();
        let fps_str = fps
          .map(|fps| format!(",framerate={}/1", fps))
          .unwrap_or_default();
        format!(
          "v4l2src device={}{} ! video/x-raw,width={},height={}{}",
          camera, io_mode_str, width, height, fps_str
        )
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }
}

/// GStreamer 摄像头管道构建器
pub struct GStreamerInputPipelineBuilder {
  camera: String,
  items: Vec<GStreamerInputBuilderItem>,
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("camera") {
      error!(
        "URI scheme mismatch: expected '{}://camera', found '{}'",
        Self::SCHEME,
        url
      );
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let number = |key: &'static str| query.get(key).and_then(|v| v.parse::<u32>().ok());

    let camera = url.path().to_string();
    let width = number("width").ok_or(GStreamerInputError::MissingParameter("width"))?;
    let height = number("height").ok_or(GStreamerInputError::MissingParameter("height"))?;

    let items = vec![
      GStreamerInputBuilderItem::CameraSource {
        camera: camera.clone(),
        io_mode: number("io-mode"),
        width,
        height,
        fps: number("fps"),
      },
      GStreamerInputBuilderItem::TargetFormat {
        format: "RGB".to_string(),
      },
    ];

    Ok(GStreamerInputPipelineBuilder { camera, items })
  }
}

impl GStreamerInputPipelineBuilder {
  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let basic_pipeline = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    let full_pipeline = format!(
      "{} ! appsink max-buffers=2 drop=true name=sink",
      basic_pipeline
    );

    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    let camera_open = |reason: String| GStreamerInputError::CameraOpen {
      device: self.camera.clone(),
      reason,
    };

    pipeline
      .set_state(gst::State::Playing)
      .map_err(|e| camera_open(e.to_string()))?;

    // 等待状态切换完成，设备不可用时在这里失败
    let (result, _, _) = pipeline.state(gst::ClockTime::from_seconds(CAMERA_OPEN_TIMEOUT_SECS));
    if let Err(e) = result {
      let _ = pipeline.set_state(gst::State::Null);
      return Err(camera_open(e.to_string()));
    }

    info!("摄像头已打开: {}", self.camera);
    Ok(GStreamerInput { pipeline, appsink })
  }
}

/// GStreamer 摄像头输入，`Drop` 时停止管道
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self
      .appsink
      .pull_sample()
      .map_err(|e| {
        error!("Failed to pull sample: {}", e);
        e
      })
      .ok()?;
    let captured_at = Instant::now();

    convert_sample(sample, captured_at)
      .map_err(|e| {
        error!("Failed to fetch sample: {}", e);
        e
      })
      .ok()
  }
}

fn convert_sample(sample: gst::Sample, captured_at: Instant) -> Result<Frame, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let format = match video_info.format() {
    gst_video::VideoFormat::Rgb => PixelFormat::Rgb888,
    gst_video::VideoFormat::Bgr => PixelFormat::Bgr888,
    other => return Err(GStreamerInputError::UnsupportedFormat(other)),
  };

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let desc = ImageDesc::new(width, height, format);
  let row_bytes = width * format.channels();
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected_size = stride * height.saturating_sub(1) + row_bytes;
  if height == 0 || data.len() < expected_size {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  // 行对齐填充需要逐行去除
  let mut pixels = Vec::with_capacity(desc.byte_len());
  for row in data.chunks(stride).take(height) {
    pixels.extend_from_slice(&row[..row_bytes]);
  }

  Frame::new(desc, captured_at, pixels).ok_or(GStreamerInputError::BufferSizeMismatch {
    expected: desc.byte_len(),
    actual: data.len(),
  })
}
