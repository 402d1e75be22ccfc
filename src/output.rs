// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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

use crate::{frame::ResizedBuffer, model::DetectResult};

/// 将检测结果与帧率叠加绘制到缩放后的帧上
pub trait Render {
  type Error;
  fn render_result(
    &mut self,
    frame: &mut ResizedBuffer,
    result: &DetectResult,
    fps: f64,
  ) -> Result<(), Self::Error>;
}

/// 显示窗口
pub trait FrameSink {
  type Error;
  fn present(&mut self, frame: &ResizedBuffer) -> Result<(), Self::Error>;

  /// 用户请求退出时返回 `true`，每帧轮询一次
  fn poll_quit(&mut self) -> bool {
    false
  }
}

pub mod draw;

#[cfg(feature = "gstreamer_output")]
mod gstreamer_display;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_display::{GStreamerDisplay, GStreamerDisplayError, WINDOW_NAME};
