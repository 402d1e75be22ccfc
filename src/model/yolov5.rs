// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolov5.rs - YOLOv5 输出解码
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

use tracing::debug;

use crate::{
  engine::{OutputTensors, QuantParams, TensorView},
  model::{DecodeError, DecodeParams, DetectItem, DetectResult, PostProcess, coco_label},
};

const YOLOV5_NUM_OUTPUTS: usize = 3;
const YOLOV5_CLASS_NUM: usize = 80;
const YOLOV5_PROP_BOX_SIZE: usize = 5 + YOLOV5_CLASS_NUM;
const YOLOV5_ANCHORS_PER_HEAD: usize = 3;
const YOLOV5_MAX_OBJECTS: usize = 64;
const YOLOV5_STRIDES: [usize; 3] = [8, 16, 32];
const YOLOV5_ANCHORS: [[(f32, f32); 3]; 3] = [
  [(10.0, 13.0), (16.0, 30.0), (33.0, 23.0)],
  [(30.0, 61.0), (62.0, 45.0), (59.0, 119.0)],
  [(116.0, 90.0), (156.0, 198.0), (373.0, 326.0)],
];

/// 检测头张量的读取方式
///
/// 量化张量在 int8 域内比较阈值，只对通过筛选的格点做反量化。
trait HeadTensor {
  type Raw: PartialOrd + Copy;
  fn raw(&self, index: usize) -> Self::Raw;
  fn threshold(&self, value: f32) -> Self::Raw;
  fn value(&self, raw: Self::Raw) -> f32;
}

struct QuantizedHead<'a> {
  data: &'a [i8],
  quant: QuantParams,
}

impl HeadTensor for QuantizedHead<'_> {
  type Raw = i8;

  fn raw(&self, index: usize) -> i8 {
    self.data[index]
  }

  fn threshold(&self, value: f32) -> i8 {
    self.quant.quantize(value)
  }

  fn value(&self, raw: i8) -> f32 {
    self.quant.dequantize(raw)
  }
}

struct FloatHead<'a> {
  data: &'a [f32],
}

impl HeadTensor for FloatHead<'_> {
  type Raw = f32;

  fn raw(&self, index: usize) -> f32 {
    self.data[index]
  }

  fn threshold(&self, value: f32) -> f32 {
    value
  }

  fn value(&self, raw: f32) -> f32 {
    raw
  }
}

struct Grid {
  height: usize,
  width: usize,
  stride: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
  x: f32,
  y: f32,
  w: f32,
  h: f32,
  score: f32,
  class_id: usize,
}

impl Candidate {
  fn to_item(self, params: &DecodeParams) -> DetectItem {
    let (tw, th) = (params.target_width as f32, params.target_height as f32);
    let x1 = self.x;
    let y1 = self.y;
    let x2 = x1 + self.w;
    let y2 = y1 + self.h;

    DetectItem {
      class_id: self.class_id as u32,
      label: coco_label(self.class_id as u32).to_string(),
      score: self.score,
      bbox: [
        (x1.clamp(0.0, tw) / params.scale_w) as i32,
        (y1.clamp(0.0, th) / params.scale_h) as i32,
        (x2.clamp(0.0, tw) / params.scale_w) as i32,
        (y2.clamp(0.0, th) / params.scale_h) as i32,
      ],
    }
  }
}

fn process_head<T: HeadTensor>(
  tensor: &T,
  anchors: &[(f32, f32); 3],
  grid: &Grid,
  threshold: f32,
  candidates: &mut Vec<Candidate>,
) {
  let grid_len = grid.height * grid.width;
  let thres = tensor.threshold(threshold);
  let stride = grid.stride as f32;

  for (a, &(anchor_w, anchor_h)) in anchors.iter().enumerate() {
    let base = YOLOV5_PROP_BOX_SIZE * a * grid_len;
    for i in 0..grid.height {
      for j in 0..grid.width {
        let cell = base + i * grid.width + j;

        let box_confidence = tensor.raw(cell + 4 * grid_len);
        if box_confidence < thres {
          continue;
        }

        let mut class_id = 0usize;
        let mut max_prob = tensor.raw(cell + 5 * grid_len);
        for k in 1..YOLOV5_CLASS_NUM {
          let prob = tensor.raw(cell + (5 + k) * grid_len);
          if prob > max_prob {
            class_id = k;
            max_prob = prob;
          }
        }
        if max_prob <= thres {
          continue;
        }

        let box_x = tensor.value(tensor.raw(cell)) * 2.0 - 0.5;
        let box_y = tensor.value(tensor.raw(cell + grid_len)) * 2.0 - 0.5;
        let box_w = tensor.value(tensor.raw(cell + 2 * grid_len)) * 2.0;
        let box_h = tensor.value(tensor.raw(cell + 3 * grid_len)) * 2.0;

        let w = box_w * box_w * anchor_w;
        let h = box_h * box_h * anchor_h;

        candidates.push(Candidate {
          x: (box_x + j as f32) * stride - w / 2.0,
          y: (box_y + i as f32) * stride - h / 2.0,
          w,
          h,
          score: tensor.value(max_prob) * tensor.value(box_confidence),
          class_id,
        });
      }
    }
  }
}

/// 交并比，像素坐标按闭区间计算（宽高各加 1）
fn overlap(a: &Candidate, b: &Candidate) -> f32 {
  let w = ((a.x + a.w).min(b.x + b.w) - a.x.max(b.x) + 1.0).max(0.0);
  let h = ((a.y + a.h).min(b.y + b.h) - a.y.max(b.y) + 1.0).max(0.0);
  let inter = w * h;
  let union = (a.w + 1.0) * (a.h + 1.0) + (b.w + 1.0) * (b.h + 1.0) - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 同类别非极大值抑制，`candidates` 需已按分数降序排列
fn suppress(candidates: &[Candidate], nms_threshold: f32) -> Vec<bool> {
  let mut keep = vec![true; candidates.len()];
  for i in 0..candidates.len() {
    if !keep[i] {
      continue;
    }
    for j in (i + 1)..candidates.len() {
      if !keep[j] || candidates[j].class_id != candidates[i].class_id {
        continue;
      }
      if overlap(&candidates[i], &candidates[j]) > nms_threshold {
        keep[j] = false;
      }
    }
  }
  keep
}

/// 三个检测头（步长 8/16/32）、80 类的 YOLOv5 解码器
#[derive(Debug, Default, Clone, Copy)]
pub struct Yolov5PostProcess;

impl PostProcess for Yolov5PostProcess {
  fn expected_outputs(&self) -> Option<usize> {
    Some(YOLOV5_NUM_OUTPUTS)
  }

  fn decode(
    &self,
    outputs: &dyn OutputTensors,
    quant: &[QuantParams],
    params: &DecodeParams,
  ) -> Result<DetectResult, DecodeError> {
    if outputs.len() != YOLOV5_NUM_OUTPUTS {
      return Err(DecodeError::TensorCount {
        expected: YOLOV5_NUM_OUTPUTS,
        actual: outputs.len(),
      });
    }
    if quant.len() < YOLOV5_NUM_OUTPUTS {
      return Err(DecodeError::QuantCount {
        expected: YOLOV5_NUM_OUTPUTS,
        actual: quant.len(),
      });
    }

    let mut candidates = Vec::new();
    for (index, (anchors, &stride)) in YOLOV5_ANCHORS
      .iter()
      .zip(YOLOV5_STRIDES.iter())
      .enumerate()
    {
      let tensor = outputs
        .tensor(index)
        .map_err(|source| DecodeError::TensorRead { index, source })?;
      let grid = Grid {
        height: params.target_height / stride,
        width: params.target_width / stride,
        stride,
      };
      let expected = YOLOV5_ANCHORS_PER_HEAD * YOLOV5_PROP_BOX_SIZE * grid.height * grid.width;
      if tensor.len() != expected {
        return Err(DecodeError::TensorSize {
          index,
          expected,
          actual: tensor.len(),
        });
      }

      match tensor {
        TensorView::Int8(data) => {
          let head = QuantizedHead {
            data,
            quant: quant[index],
          };
          process_head(&head, anchors, &grid, params.conf_threshold, &mut candidates);
        }
        TensorView::Float32(data) => {
          let head = FloatHead { data };
          process_head(&head, anchors, &grid, params.conf_threshold, &mut candidates);
        }
      }
    }

    debug!("候选框数量: {}", candidates.len());
    if candidates.is_empty() {
      return Ok(DetectResult::default());
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let keep = suppress(&candidates, params.nms_threshold);

    let items: Vec<DetectItem> = candidates
      .iter()
      .zip(keep)
      .filter(|(_, keep)| *keep)
      .take(YOLOV5_MAX_OBJECTS)
      .map(|(candidate, _)| candidate.to_item(params))
      .collect();

    debug!("检测到 {} 个物体", items.len());
    Ok(DetectResult::from(items))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    engine::{EngineError, OutputTensor, OutputTensorSet, TensorData},
    model::{BOX_THRESH, NMS_THRESH},
  };

  const TARGET: usize = 64;

  fn params() -> DecodeParams {
    DecodeParams {
      target_width: TARGET,
      target_height: TARGET,
      conf_threshold: BOX_THRESH,
      nms_threshold: NMS_THRESH,
      scale_w: 1.0,
      scale_h: 1.0,
    }
  }

  fn head_len(stride: usize) -> (usize, usize) {
    let grid = TARGET / stride;
    (grid, YOLOV5_ANCHORS_PER_HEAD * YOLOV5_PROP_BOX_SIZE * grid * grid)
  }

  fn index(grid: usize, anchor: usize, channel: usize, i: usize, j: usize) -> usize {
    (YOLOV5_PROP_BOX_SIZE * anchor + channel) * grid * grid + i * grid + j
  }

  /// 第一个检测头 (2, 3) 格点上放置一个 person
  fn quantized_outputs(confidence: i8) -> OutputTensorSet {
    let tensors = YOLOV5_STRIDES
      .iter()
      .enumerate()
      .map(|(n, &stride)| {
        let (grid, len) = head_len(stride);
        let mut data = vec![-128i8; len];
        if n == 0 {
          for channel in 0..4 {
            data[index(grid, 0, channel, 2, 3)] = 0;
          }
          data[index(grid, 0, 4, 2, 3)] = confidence;
          data[index(grid, 0, 5, 2, 3)] = 127;
        }
        OutputTensor {
          index: n as u32,
          data: TensorData::Int8(data.into_boxed_slice()),
        }
      })
      .collect();
    OutputTensorSet::new(tensors)
  }

  fn quant() -> Vec<QuantParams> {
    vec![QuantParams::new(1.0 / 255.0, -128); 3]
  }

  #[test]
  fn decode_quantized_single_box() {
    let result = Yolov5PostProcess
      .decode(&quantized_outputs(127), &quant(), &params())
      .unwrap();
    assert_eq!(result.len(), 1);
    let item = &result.items[0];
    assert_eq!(item.class_id, 0);
    assert_eq!(item.label, "person");
    assert!((item.score - 1.0).abs() < 1e-3);
    assert_eq!(item.bbox, [22, 13, 33, 26]);
  }

  #[test]
  fn decode_is_deterministic() {
    let outputs = quantized_outputs(127);
    let first = Yolov5PostProcess.decode(&outputs, &quant(), &params()).unwrap();
    for _ in 0..5 {
      let again = Yolov5PostProcess.decode(&outputs, &quant(), &params()).unwrap();
      assert_eq!(first, again);
    }
  }

  #[test]
  fn low_confidence_is_filtered() {
    // 0.1 量化后低于 0.25 阈值
    let low = QuantParams::new(1.0 / 255.0, -128).quantize(0.1);
    let result = Yolov5PostProcess
      .decode(&quantized_outputs(low), &quant(), &params())
      .unwrap();
    assert!(result.is_empty());
  }

  #[test]
  fn decode_float_outputs() {
    let tensors = YOLOV5_STRIDES
      .iter()
      .enumerate()
      .map(|(n, &stride)| {
        let (grid, len) = head_len(stride);
        let mut data = vec![0.0f32; len];
        if n == 0 {
          for channel in 0..4 {
            data[index(grid, 0, channel, 2, 3)] = 0.5;
          }
          data[index(grid, 0, 4, 2, 3)] = 0.9;
          data[index(grid, 0, 5 + 2, 2, 3)] = 0.8;
        }
        OutputTensor {
          index: n as u32,
          data: TensorData::Float32(data.into_boxed_slice()),
        }
      })
      .collect();
    let outputs = OutputTensorSet::new(tensors);

    let result = Yolov5PostProcess
      .decode(&outputs, &[QuantParams::default(); 3], &params())
      .unwrap();
    assert_eq!(result.len(), 1);
    let item = &result.items[0];
    assert_eq!(item.class_id, 2);
    assert_eq!(item.label, "car");
    assert!((item.score - 0.72).abs() < 1e-5);
    assert_eq!(item.bbox, [23, 13, 33, 26]);
  }

  #[test]
  fn wrong_tensor_count_is_rejected() {
    let outputs = OutputTensorSet::new(vec![]);
    let err = Yolov5PostProcess
      .decode(&outputs, &quant(), &params())
      .unwrap_err();
    assert!(matches!(
      err,
      DecodeError::TensorCount {
        expected: 3,
        actual: 0
      }
    ));
  }

  #[test]
  fn wrong_tensor_size_is_rejected() {
    let tensors = (0..3)
      .map(|n| OutputTensor {
        index: n,
        data: TensorData::Int8(vec![0i8; 16].into_boxed_slice()),
      })
      .collect();
    let err = Yolov5PostProcess
      .decode(&OutputTensorSet::new(tensors), &quant(), &params())
      .unwrap_err();
    assert!(matches!(err, DecodeError::TensorSize { index: 0, .. }));
  }

  /// 声明 3 个输出但无法读取任何一个，模拟运行时缓冲区已失效
  struct UnreadableOutputs;

  impl OutputTensors for UnreadableOutputs {
    fn len(&self) -> usize {
      3
    }

    fn tensor(&self, index: usize) -> Result<TensorView<'_>, EngineError> {
      Err(EngineError::Output(format!("输出 {} 不可读", index)))
    }
  }

  #[test]
  fn unreadable_tensor_is_reported() {
    let err = Yolov5PostProcess
      .decode(&UnreadableOutputs, &quant(), &params())
      .unwrap_err();
    assert!(matches!(err, DecodeError::TensorRead { index: 0, .. }));
  }

  fn candidate(x: f32, score: f32, class_id: usize) -> Candidate {
    Candidate {
      x,
      y: 10.0,
      w: 20.0,
      h: 20.0,
      score,
      class_id,
    }
  }

  #[test]
  fn suppression_is_per_class() {
    let candidates = [
      candidate(10.0, 0.9, 0),
      candidate(12.0, 0.8, 0),
      candidate(12.0, 0.7, 1),
      candidate(100.0, 0.6, 0),
    ];
    assert_eq!(suppress(&candidates, NMS_THRESH), vec![true, false, true, true]);
  }

  #[test]
  fn overlap_of_identical_boxes_is_one() {
    let a = candidate(0.0, 1.0, 0);
    assert!((overlap(&a, &a) - 1.0).abs() < 1e-6);
    assert_eq!(overlap(&a, &candidate(500.0, 1.0, 0)), 0.0);
  }
}
