// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/gstreamer_display.rs - GStreamer 实时显示窗口
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

//! # GStreamer 实时显示
//!
//! 将叠加了检测结果的 RGB 帧推入 `appsrc ! videoconvert ! autovideosink`。
//!
//! 以下任一情况视为用户请求退出：
//!
//! - 在显示窗口内按下任意键（视频 sink 向上游发送的导航事件）
//! - 显示窗口被关闭（管道总线上出现 Error 或 EOS）
//! - 收到 Ctrl-C（需通过 [`GStreamerDisplay::with_interrupt`] 安装）

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{frame::ResizedBuffer, output::FrameSink, signal::Interrupt};

/// 窗口标题，以标题标签发送给视频 sink
pub const WINDOW_NAME: &str = "Live";

#[derive(Error, Debug)]
pub enum GStreamerDisplayError {
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  #[error("无法监听窗口按键事件")]
  KeyWatchFailed,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("Buffer creation error")]
  BufferCreationError,
  #[error("帧尺寸 {actual:?} 与窗口尺寸 {expected:?} 不符")]
  FrameSizeMismatch {
    expected: (usize, usize),
    actual: (usize, usize),
  },
}

/// GStreamer 显示窗口，`Drop` 时停止管道
pub struct GStreamerDisplay {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  width: usize,
  height: usize,
  frame_count: u64,
  interrupt: Option<Interrupt>,
  key_pressed: Arc<AtomicBool>,
}

/// 导航事件中的按键按下
fn is_key_press(event: &gst::EventRef) -> bool {
  event.type_() == gst::EventType::Navigation
    && matches!(
      gst_video::NavigationEvent::parse(event),
      Ok(gst_video::NavigationEvent::KeyPress { .. })
    )
}

fn title_tags() -> gst::TagList {
  let mut tags = gst::TagList::new();
  tags
    .make_mut()
    .add::<gst::tags::Title>(&WINDOW_NAME, gst::TagMergeMode::Replace);
  tags
}

/// 在 appsrc 的输出端口上等待上游导航事件，按键后置位标志
fn watch_key_press(
  appsrc: &gst_app::AppSrc,
  key_pressed: Arc<AtomicBool>,
) -> Result<(), GStreamerDisplayError> {
  let pad = appsrc
    .static_pad("src")
    .ok_or(GStreamerDisplayError::KeyWatchFailed)?;
  pad
    .add_probe(gst::PadProbeType::EVENT_UPSTREAM, move |_, info| {
      if let Some(gst::PadProbeData::Event(ref event)) = info.data
        && is_key_press(event)
        && !key_pressed.swap(true, Ordering::SeqCst)
      {
        info!("窗口内按键，请求退出");
      }
      gst::PadProbeReturn::Ok
    })
    .ok_or(GStreamerDisplayError::KeyWatchFailed)?;
  Ok(())
}

impl GStreamerDisplay {
  pub fn new(width: usize, height: usize) -> Result<Self, GStreamerDisplayError> {
    gst::init()?;

    let pipeline_desc =
      "appsrc name=src is-live=true do-timestamp=true ! videoconvert ! autovideosink sync=false";
    info!("Creating display pipeline: {}", pipeline_desc);

    let pipeline = gst::parse::launch(pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerDisplayError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerDisplayError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerDisplayError::AppSrcConversionFailed)?;

    // 帧率不固定，由处理速度决定
    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field("framerate", gst::Fraction::new(0, 1))
      .build();
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    let key_pressed = Arc::new(AtomicBool::new(false));
    watch_key_press(&appsrc, key_pressed.clone())?;

    pipeline.set_state(gst::State::Playing)?;
    // 标题随第一帧送达视频 sink
    if !appsrc.send_event(gst::event::Tag::new(title_tags())) {
      warn!("无法设置窗口标题: {}", WINDOW_NAME);
    }
    info!("显示窗口已打开: {} ({}x{})", WINDOW_NAME, width, height);

    Ok(Self {
      pipeline,
      appsrc,
      width,
      height,
      frame_count: 0,
      interrupt: None,
      key_pressed,
    })
  }

  pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  fn push_frame(&mut self, data: &[u8]) -> Result<(), GStreamerDisplayError> {
    let mut buffer =
      gst::Buffer::with_size(data.len()).map_err(|_| GStreamerDisplayError::BufferCreationError)?;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerDisplayError::BufferCreationError)?;
      let mut buffer_map = buffer_ref.map_writable().map_err(|_| {
        GStreamerDisplayError::PipelineError("Failed to map buffer".to_string())
      })?;
      buffer_map.copy_from_slice(data);
    }

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerDisplayError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;
    self.frame_count += 1;

    Ok(())
  }

  // 窗口关闭时视频 sink 会在总线上报告错误
  fn window_closed(&self) -> bool {
    let Some(bus) = self.pipeline.bus() else {
      return false;
    };

    while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Eos]) {
      match msg.view() {
        gst::MessageView::Eos(..) => {
          info!("显示管道结束");
          return true;
        }
        gst::MessageView::Error(err) => {
          error!(
            "显示管道错误: {} ({:?})",
            err.error(),
            err.debug().map(|d| d.to_string())
          );
          return true;
        }
        _ => {}
      }
    }
    false
  }
}

impl FrameSink for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn present(&mut self, frame: &ResizedBuffer) -> Result<(), Self::Error> {
    if (frame.width(), frame.height()) != (self.width, self.height) {
      return Err(GStreamerDisplayError::FrameSizeMismatch {
        expected: (self.width, self.height),
        actual: (frame.width(), frame.height()),
      });
    }
    self.push_frame(frame.as_nhwc())
  }

  fn poll_quit(&mut self) -> bool {
    let interrupted = self
      .interrupt
      .as_ref()
      .is_some_and(Interrupt::triggered);
    interrupted || self.key_pressed.load(Ordering::SeqCst) || self.window_closed()
  }
}

impl Drop for GStreamerDisplay {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();

    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer display pipeline: {}", e);
    }

    info!("显示窗口已关闭，共显示 {} 帧", self.frame_count);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn navigation(event: &str) -> gst::Event {
    let structure = gst::Structure::builder("application/x-gst-navigation")
      .field("event", event)
      .field("key", "q")
      .build();
    gst::event::Navigation::new(structure)
  }

  #[test]
  fn any_key_press_requests_quit() {
    gst::init().unwrap();
    assert!(is_key_press(&navigation("key-press")));
  }

  #[test]
  fn other_events_are_ignored() {
    gst::init().unwrap();
    assert!(!is_key_press(&navigation("key-release")));
    assert!(!is_key_press(&gst::event::Eos::new()));
  }

  #[test]
  fn window_title_tag() {
    gst::init().unwrap();
    let tags = title_tags();
    assert_eq!(
      tags.get::<gst::tags::Title>().map(|title| title.get()),
      Some(WINDOW_NAME)
    );
  }
}
