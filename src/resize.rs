// 该文件是 Shanan （山南西风） 项目的一部分。
// src/resize.rs - 图像缩放与格式转换
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

use image::{ImageBuffer, Rgb, imageops::FilterType};
use thiserror::Error;

use crate::frame::{Frame, ImageDesc, PixelFormat, ResizedBuffer};

#[derive(Error, Debug)]
pub enum ResizeError {
  #[error("不支持的图像变换: {0}")]
  UnsupportedTransform(String),
  #[error("缩放失败: {0}")]
  Resize(String),
}

/// 2D 图像变换：格式转换 + 缩放
///
/// `resize` 同步执行，结果写入调用方持有的缓冲区。
pub trait HardwareResizer {
  fn check_compatible(&self, src: &ImageDesc, dst: &ImageDesc) -> Result<(), ResizeError>;

  fn resize(&mut self, src: &Frame, dst: &mut ResizedBuffer) -> Result<(), ResizeError>;
}

/// 基于 `image::imageops` 的缩放实现
#[derive(Debug, Clone, Copy)]
pub struct CpuResizer {
  filter: FilterType,
}

impl Default for CpuResizer {
  fn default() -> Self {
    Self {
      filter: FilterType::Triangle,
    }
  }
}

impl CpuResizer {
  pub fn with_filter(mut self, filter: FilterType) -> Self {
    self.filter = filter;
    self
  }
}

impl HardwareResizer for CpuResizer {
  fn check_compatible(&self, src: &ImageDesc, dst: &ImageDesc) -> Result<(), ResizeError> {
    if src.width == 0 || src.height == 0 || dst.width == 0 || dst.height == 0 {
      return Err(ResizeError::UnsupportedTransform(format!(
        "图像尺寸为零: {}x{} -> {}x{}",
        src.width, src.height, dst.width, dst.height
      )));
    }
    if dst.format != PixelFormat::Rgb888 {
      return Err(ResizeError::UnsupportedTransform(format!(
        "目标格式必须为 RGB888, 实际为 {:?}",
        dst.format
      )));
    }
    if u32::try_from(src.width).is_err() || u32::try_from(src.height).is_err() {
      return Err(ResizeError::UnsupportedTransform(format!(
        "源图像尺寸过大: {}x{}",
        src.width, src.height
      )));
    }
    Ok(())
  }

  fn resize(&mut self, src: &Frame, dst: &mut ResizedBuffer) -> Result<(), ResizeError> {
    let (src_w, src_h) = (src.width() as u32, src.height() as u32);
    let (dst_w, dst_h) = (dst.width() as u32, dst.height() as u32);

    let view = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(src_w, src_h, src.as_bytes())
      .ok_or_else(|| ResizeError::Resize("源图像数据长度与尺寸不符".to_string()))?;

    let target = dst.as_mut();
    if (src_w, src_h) == (dst_w, dst_h) {
      target.copy_from_slice(src.as_bytes());
    } else {
      let resized = image::imageops::resize(&view, dst_w, dst_h, self.filter);
      target.copy_from_slice(resized.as_raw());
    }

    if src.format() == PixelFormat::Bgr888 {
      for pixel in target.chunks_exact_mut(3) {
        pixel.swap(0, 2);
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::time::Instant;

  use super::*;

  fn solid_frame(width: usize, height: usize, format: PixelFormat, pixel: [u8; 3]) -> Frame {
    let data = pixel.repeat(width * height);
    Frame::new(ImageDesc::new(width, height, format), Instant::now(), data).unwrap()
  }

  #[test]
  fn downscale_solid_color() {
    let frame = solid_frame(8, 6, PixelFormat::Rgb888, [10, 20, 30]);
    let mut buffer = ResizedBuffer::with_shape(4, 3);
    let mut resizer = CpuResizer::default();
    resizer
      .check_compatible(&frame.desc(), &buffer.desc())
      .unwrap();
    resizer.resize(&frame, &mut buffer).unwrap();
    assert!(
      buffer
        .as_nhwc()
        .chunks_exact(3)
        .all(|p| p == [10, 20, 30])
    );
  }

  #[test]
  fn bgr_is_converted_to_rgb() {
    let frame = solid_frame(4, 4, PixelFormat::Bgr888, [1, 2, 3]);
    let mut buffer = ResizedBuffer::with_shape(4, 4);
    CpuResizer::default().resize(&frame, &mut buffer).unwrap();
    assert!(buffer.as_nhwc().chunks_exact(3).all(|p| p == [3, 2, 1]));
  }

  #[test]
  fn zero_sized_transform_is_unsupported() {
    let resizer = CpuResizer::default();
    let src = ImageDesc::new(0, 480, PixelFormat::Rgb888);
    let dst = ImageDesc::new(640, 640, PixelFormat::Rgb888);
    assert!(matches!(
      resizer.check_compatible(&src, &dst),
      Err(ResizeError::UnsupportedTransform(_))
    ));
  }

  #[test]
  fn non_rgb_destination_is_unsupported() {
    let resizer = CpuResizer::default();
    let src = ImageDesc::new(640, 480, PixelFormat::Rgb888);
    let dst = ImageDesc::new(640, 640, PixelFormat::Bgr888);
    assert!(resizer.check_compatible(&src, &dst).is_err());
  }
}
