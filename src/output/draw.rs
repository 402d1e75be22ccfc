// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{ImageBuffer, Rgb};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;

use crate::{
  fps::format_fps,
  frame::ResizedBuffer,
  model::{DetectItem, DetectResult},
  output::Render,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_OFFSET_Y: i32 = 12; // 标签基线位于框顶上方
const BOX_THICKNESS: i32 = 3;
const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const TEXT_COLOR: [u8; 3] = [255, 0, 0]; // 红色

const FPS_LABEL: &str = "FPS:";
const FPS_LABEL_ORIGIN: (i32, i32) = (15, 50);
const FPS_VALUE_ORIGIN: (i32, i32) = (90, 50);

type FrameView<'b> = ImageBuffer<Rgb<u8>, &'b mut [u8]>;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法加载嵌入的字体文件: {0}")]
  Font(#[from] InvalidFont),
  #[error("帧缓冲区长度与尺寸 {width}x{height} 不符")]
  BufferShape { width: usize, height: usize },
}

/// 检测框标签，如 `person 87.5%`
pub fn label_text(item: &DetectItem) -> String {
  format!("{} {:.1}%", item.label, item.score * 100.0)
}

pub struct Draw<'a> {
  font: FontRef<'a>,
  font_size: f32,
  box_color: [u8; 3],
  text_color: [u8; 3],
  thickness: i32,
}

impl Draw<'static> {
  pub fn new() -> Result<Self, DrawError> {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontRef::try_from_slice(font_data)?;

    Ok(Self {
      font,
      font_size: LABEL_FONT_SIZE,
      box_color: BOX_COLOR,
      text_color: TEXT_COLOR,
      thickness: BOX_THICKNESS,
    })
  }
}

impl Draw<'_> {
  // bbox 为像素坐标 [left, top, right, bottom]，边框向内加粗
  fn draw_bbox(&self, image: &mut FrameView<'_>, bbox: &[i32; 4]) {
    let (w, h) = (image.width() as i32, image.height() as i32);

    let x_min = bbox[0].clamp(0, w - 1);
    let y_min = bbox[1].clamp(0, h - 1);
    let x_max = bbox[2].clamp(0, w - 1);
    let y_max = bbox[3].clamp(0, h - 1);

    for t in 0..self.thickness {
      let width = x_max - x_min + 1 - 2 * t;
      let height = y_max - y_min + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.box_color));
    }
  }

  // (x, baseline) 为文本左下角，超出画面的部分会被裁掉
  fn draw_text(&self, image: &mut FrameView<'_>, text: &str, x: i32, baseline: i32) {
    let scale = PxScale::from(self.font_size);
    let top = baseline - self.font_size as i32;
    draw_text_mut(
      image,
      Rgb(self.text_color),
      x,
      top,
      scale,
      &self.font,
      text,
    );
  }
}

impl Render for Draw<'_> {
  type Error = DrawError;

  fn render_result(
    &mut self,
    frame: &mut ResizedBuffer,
    result: &DetectResult,
    fps: f64,
  ) -> Result<(), Self::Error> {
    let (width, height) = (frame.width(), frame.height());
    let mut image = FrameView::from_raw(width as u32, height as u32, frame.as_mut())
      .ok_or(DrawError::BufferShape { width, height })?;

    for item in result.iter() {
      self.draw_bbox(&mut image, &item.bbox);
      self.draw_text(
        &mut image,
        &label_text(item),
        item.bbox[0],
        item.bbox[1] - LABEL_OFFSET_Y,
      );
    }

    let (x, y) = FPS_LABEL_ORIGIN;
    self.draw_text(&mut image, FPS_LABEL, x, y);
    let (x, y) = FPS_VALUE_ORIGIN;
    self.draw_text(&mut image, &format_fps(fps), x, y);

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pixel(frame: &ResizedBuffer, x: usize, y: usize) -> [u8; 3] {
    let idx = (y * frame.width() + x) * 3;
    let data = frame.as_nhwc();
    [data[idx], data[idx + 1], data[idx + 2]]
  }

  fn person(bbox: [i32; 4]) -> DetectItem {
    DetectItem {
      class_id: 0,
      label: "person".to_string(),
      score: 0.875,
      bbox,
    }
  }

  #[test]
  fn label_uses_percent_with_one_decimal() {
    assert_eq!(label_text(&person([0, 0, 1, 1])), "person 87.5%");
  }

  #[test]
  fn box_is_hollow_and_three_pixels_thick() {
    let mut frame = ResizedBuffer::with_shape(200, 160);
    let result = DetectResult::from(vec![person([100, 100, 150, 150])]);
    let mut draw = Draw::new().unwrap();
    draw.render_result(&mut frame, &result, 25.0).unwrap();

    assert_eq!(pixel(&frame, 100, 100), BOX_COLOR);
    assert_eq!(pixel(&frame, 102, 125), BOX_COLOR);
    assert_eq!(pixel(&frame, 150, 150), BOX_COLOR);
    assert_eq!(pixel(&frame, 148, 125), BOX_COLOR);
    assert_eq!(pixel(&frame, 103, 125), [0, 0, 0]);
    assert_eq!(pixel(&frame, 125, 125), [0, 0, 0]);
  }

  #[test]
  fn fps_overlay_is_drawn_in_text_color() {
    let mut frame = ResizedBuffer::with_shape(160, 120);
    let mut draw = Draw::new().unwrap();
    draw
      .render_result(&mut frame, &DetectResult::default(), 30.0)
      .unwrap();

    let top = (50.0 - LABEL_FONT_SIZE) as usize;
    let mut drawn = 0;
    for y in top..=50 {
      for x in 15..90 {
        let [r, g, b] = pixel(&frame, x, y);
        if r > 0 {
          assert_eq!((g, b), (0, 0));
          drawn += 1;
        }
      }
    }
    assert!(drawn > 0);
  }

  #[test]
  fn out_of_frame_boxes_are_clipped() {
    let mut frame = ResizedBuffer::with_shape(64, 64);
    let result = DetectResult::from(vec![person([-20, -20, 200, 200])]);
    let mut draw = Draw::new().unwrap();
    draw.render_result(&mut frame, &result, 0.0).unwrap();
    assert_eq!(pixel(&frame, 0, 10), BOX_COLOR);
    assert_eq!(pixel(&frame, 63, 10), BOX_COLOR);
  }
}
