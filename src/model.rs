// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型加载与检测结果
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

mod coco;
mod loader;
mod postprocess;

pub use self::coco::{COCO_LABELS, coco_label};
pub use self::loader::{ModelBlob, ModelLoadError, load_model};
pub use self::postprocess::{DecodeError, DecodeParams, PostProcess};

#[cfg(feature = "model_yolov5")]
mod yolov5;
#[cfg(feature = "model_yolov5")]
pub use self::yolov5::Yolov5PostProcess;

/// 默认置信度阈值
pub const BOX_THRESH: f32 = 0.25;
/// 默认 NMS 交并比阈值
pub const NMS_THRESH: f32 = 0.45;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub label: String,
  pub score: f32,
  pub bbox: [i32; 4], // [left, top, right, bottom]，缩放后帧的像素坐标
}

/// 单帧检测结果，按置信度降序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}
