// 该文件是 Shanan （山南西风） 项目的一部分。
// src/fps.rs - 帧率计算
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

use std::time::{Duration, Instant};

/// 由相邻两帧的间隔计算瞬时帧率，保留一位小数，不做平滑
pub fn fps_from_interval(interval: Duration) -> f64 {
  let ms = interval.as_secs_f64() * 1000.0;
  if ms <= 0.0 {
    return 0.0;
  }
  ((1000.0 / ms) * 10.0).round() / 10.0
}

/// 一位小数，十位补零，如 `09.5`
pub fn format_fps(fps: f64) -> String {
  format!("{:04.1}", fps)
}

/// 记录上一帧的采集时间
#[derive(Debug, Clone, Copy)]
pub struct FpsMeter {
  prev: Instant,
}

impl FpsMeter {
  pub fn starting_at(start: Instant) -> Self {
    Self { prev: start }
  }

  pub fn tick(&mut self, captured_at: Instant) -> f64 {
    let fps = fps_from_interval(captured_at.saturating_duration_since(self.prev));
    self.prev = captured_at;
    fps
  }
}
