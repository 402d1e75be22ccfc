// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/postprocess.rs - 检测后处理接口
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

use thiserror::Error;

use crate::{
  engine::{EngineError, OutputTensors, QuantParams},
  model::DetectResult,
};

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("输出张量数量错误: 期望 {expected}, 实际 {actual}")]
  TensorCount { expected: usize, actual: usize },
  #[error("第 {index} 个输出张量大小错误: 期望 {expected}, 实际 {actual}")]
  TensorSize {
    index: usize,
    expected: usize,
    actual: usize,
  },
  #[error("量化参数数量错误: 期望 {expected}, 实际 {actual}")]
  QuantCount { expected: usize, actual: usize },
  #[error("无法读取第 {index} 个输出张量: {source}")]
  TensorRead {
    index: usize,
    #[source]
    source: EngineError,
  },
}

/// 解码参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
  /// 模型输入宽度
  pub target_width: usize,
  /// 模型输入高度
  pub target_height: usize,
  /// 置信度阈值
  pub conf_threshold: f32,
  /// NMS IOU 阈值
  pub nms_threshold: f32,
  /// 输出坐标 = 模型坐标 / scale
  pub scale_w: f32,
  pub scale_h: f32,
}

/// 将原始输出张量解码为检测框
///
/// 实现必须是纯函数：相同的输入张量与阈值总是得到相同的结果。
pub trait PostProcess {
  /// 需要的输出张量数量，`None` 表示不限
  fn expected_outputs(&self) -> Option<usize> {
    None
  }

  fn decode(
    &self,
    outputs: &dyn OutputTensors,
    quant: &[QuantParams],
    params: &DecodeParams,
  ) -> Result<DetectResult, DecodeError>;
}
