// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 采集帧与缩放缓冲区定义
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

use std::time::Instant;

use crate::engine::{TensorFormat, TensorType};

pub const RGB_CHANNELS: usize = 3;

/// 像素格式（均为 8 位交错存储）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Rgb888,
  Bgr888,
}

impl PixelFormat {
  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }
}

/// 图像描述：用于缩放前的兼容性检查
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
  pub width: usize,
  pub height: usize,
  pub format: PixelFormat,
}

impl ImageDesc {
  pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
    Self {
      width,
      height,
      format,
    }
  }

  pub fn byte_len(&self) -> usize {
    self.width * self.height * self.format.channels()
  }
}

/// 摄像头采集到的一帧
///
/// 帧在被缩放阶段消费之前归采集源所有，之后可被下一次采集覆盖。
#[derive(Debug, Clone)]
pub struct Frame {
  desc: ImageDesc,
  captured_at: Instant,
  data: Box<[u8]>,
}

impl Frame {
  /// 数据长度与描述不一致时返回 `None`
  pub fn new(desc: ImageDesc, captured_at: Instant, data: Vec<u8>) -> Option<Self> {
    if data.len() != desc.byte_len() {
      return None;
    }
    Some(Self {
      desc,
      captured_at,
      data: data.into_boxed_slice(),
    })
  }

  pub fn desc(&self) -> ImageDesc {
    self.desc
  }

  pub fn width(&self) -> usize {
    self.desc.width
  }

  pub fn height(&self) -> usize {
    self.desc.height
  }

  pub fn format(&self) -> PixelFormat {
    self.desc.format
  }

  pub fn captured_at(&self) -> Instant {
    self.captured_at
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }
}

/// 模型输入尺寸的复用缓冲区（NHWC, RGB888）
///
/// 初始化时分配一次，之后每帧由缩放阶段覆盖写入。
#[derive(Debug, Clone)]
pub struct ResizedBuffer {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl ResizedBuffer {
  pub fn with_shape(width: usize, height: usize) -> Self {
    let size = RGB_CHANNELS * width * height;
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn desc(&self) -> ImageDesc {
    ImageDesc::new(self.width, self.height, PixelFormat::Rgb888)
  }

  pub fn tensor_format(&self) -> TensorFormat {
    TensorFormat::NHWC
  }

  pub fn tensor_type(&self) -> TensorType {
    TensorType::UInt8
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for ResizedBuffer {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_rejects_mismatched_length() {
    let desc = ImageDesc::new(4, 2, PixelFormat::Rgb888);
    assert!(Frame::new(desc, Instant::now(), vec![0; 23]).is_none());
    let frame = Frame::new(desc, Instant::now(), vec![0; 24]).unwrap();
    assert_eq!(frame.as_bytes().len(), 24);
  }

  #[test]
  fn resized_buffer_is_zeroed_nhwc() {
    let buffer = ResizedBuffer::with_shape(8, 4);
    assert_eq!(buffer.as_nhwc().len(), 8 * 4 * 3);
    assert!(buffer.as_nhwc().iter().all(|&b| b == 0));
    assert_eq!(buffer.tensor_format(), TensorFormat::NHWC);
    assert_eq!(buffer.desc().byte_len(), 96);
  }
}
