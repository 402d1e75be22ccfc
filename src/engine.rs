// 该文件是 Shanan （山南西风） 项目的一部分。
// src/engine.rs - NPU 推理引擎接口
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

//! # 推理引擎
//!
//! 流水线只通过 [`InferenceEngine`] 与 NPU 运行时交互：
//!
//! 1. 初始化后调用一次 [`InferenceEngine::io_attrs`] 查询输入输出张量属性；
//! 2. 每帧依次调用 `set_input` → `run` → `get_outputs`；
//! 3. 取得的 [`InferenceEngine::Outputs`] 持有运行时的输出缓冲区，
//!    必须在下一次 `run` 之前通过 `release_outputs` 按值归还给引擎。
//!
//! 引擎销毁即 `Drop`，销毁后不再有任何调用。

use thiserror::Error;

#[cfg(feature = "rknpu")]
mod rknn;
#[cfg(feature = "rknpu")]
pub use self::rknn::{DEFAULT_INPUT_SHAPE, RknnEngine, RknnEngineBuilder, RknnOutputs};

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("推理引擎初始化失败: {0}")]
  Init(String),
  #[error("张量属性查询失败: {0}")]
  Query(String),
  #[error("模型无效: {0}")]
  InvalidModel(String),
  #[error("输入绑定失败: {0}")]
  InputBind(String),
  #[error("推理执行失败: {0}")]
  Inference(String),
  #[error("获取输出失败: {0}")]
  Output(String),
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorFormat {
  NCHW,
  NHWC,
  Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
  Int8,
  UInt8,
  Float16,
  Float32,
}

/// 仿射量化参数：`real = (q - zero_point) * scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
  pub scale: f32,
  pub zero_point: i32,
}

impl Default for QuantParams {
  fn default() -> Self {
    Self {
      scale: 1.0,
      zero_point: 0,
    }
  }
}

impl QuantParams {
  pub fn new(scale: f32, zero_point: i32) -> Self {
    Self { scale, zero_point }
  }

  pub fn dequantize(&self, q: i8) -> f32 {
    (q as f32 - self.zero_point as f32) * self.scale
  }

  /// 饱和到 int8 范围，小数部分向零截断
  pub fn quantize(&self, value: f32) -> i8 {
    let q = value / self.scale + self.zero_point as f32;
    q.clamp(-128.0, 127.0) as i8
  }
}

/// 单个张量的静态描述，初始化后查询一次，进程生命周期内不变
#[derive(Debug, Clone, PartialEq)]
pub struct TensorAttr {
  pub index: u32,
  pub name: String,
  pub dims: Vec<u32>,
  pub format: TensorFormat,
  pub dtype: TensorType,
  pub quant: QuantParams,
}

impl TensorAttr {
  pub fn element_count(&self) -> usize {
    self.dims.iter().map(|&d| d as usize).product()
  }
}

/// 模型输入尺寸，由第一个输入张量推导
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInputShape {
  pub width: usize,
  pub height: usize,
  pub channels: usize,
}

impl TryFrom<&TensorAttr> for ModelInputShape {
  type Error = EngineError;

  fn try_from(attr: &TensorAttr) -> Result<Self, Self::Error> {
    let dims = match attr.dims.as_slice() {
      [n, a, b, c] => [*n as usize, *a as usize, *b as usize, *c as usize],
      other => {
        return Err(EngineError::InvalidModel(format!(
          "输入张量应为 4 维, 实际维度为 {:?}",
          other
        )));
      }
    };

    let shape = match attr.format {
      TensorFormat::NCHW => ModelInputShape {
        channels: dims[1],
        height: dims[2],
        width: dims[3],
      },
      // 未声明布局的输入按 NHWC 处理
      TensorFormat::NHWC | TensorFormat::Undefined => ModelInputShape {
        height: dims[1],
        width: dims[2],
        channels: dims[3],
      },
    };

    if shape.width == 0 || shape.height == 0 || shape.channels == 0 {
      return Err(EngineError::InvalidModel(format!(
        "输入张量尺寸无效: {:?}",
        attr.dims
      )));
    }

    Ok(shape)
  }
}

impl ModelInputShape {
  /// 按 NHWC、uint8 描述的输入张量属性
  pub fn nhwc_attr(&self, index: u32) -> TensorAttr {
    TensorAttr {
      index,
      name: format!("input{}", index),
      dims: vec![1, self.height as u32, self.width as u32, self.channels as u32],
      format: TensorFormat::NHWC,
      dtype: TensorType::UInt8,
      quant: QuantParams::default(),
    }
  }
}

/// 模型全部输入输出张量的属性
#[derive(Debug, Clone, PartialEq)]
pub struct IoAttrs {
  pub inputs: Vec<TensorAttr>,
  pub outputs: Vec<TensorAttr>,
}

impl IoAttrs {
  pub fn input_shape(&self) -> Result<ModelInputShape, EngineError> {
    let first = self
      .inputs
      .first()
      .ok_or_else(|| EngineError::InvalidModel("模型没有输入张量".to_string()))?;
    ModelInputShape::try_from(first)
  }

  pub fn output_quant(&self) -> Vec<QuantParams> {
    self.outputs.iter().map(|attr| attr.quant).collect()
  }
}

/// 输出张量数据：量化输出保持原始 int8，不做多余的浮点转换
#[derive(Debug, PartialEq)]
pub enum TensorData {
  Int8(Box<[i8]>),
  Float32(Box<[f32]>),
}

impl TensorData {
  pub fn len(&self) -> usize {
    match self {
      TensorData::Int8(data) => data.len(),
      TensorData::Float32(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn as_view(&self) -> TensorView<'_> {
    match self {
      TensorData::Int8(data) => TensorView::Int8(data),
      TensorData::Float32(data) => TensorView::Float32(data),
    }
  }
}

#[derive(Debug, PartialEq)]
pub struct OutputTensor {
  pub index: u32,
  pub data: TensorData,
}

/// 输出张量的只读视图，借用自引擎持有的缓冲区
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TensorView<'a> {
  Int8(&'a [i8]),
  Float32(&'a [f32]),
}

impl TensorView<'_> {
  pub fn len(&self) -> usize {
    match self {
      TensorView::Int8(data) => data.len(),
      TensorView::Float32(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 一次推理产生的全部输出
///
/// 实现类型不可克隆：引擎交出所有权，流水线用完后按值归还，
/// 归还即释放运行时缓冲区。
pub trait OutputTensors {
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn tensor(&self, index: usize) -> Result<TensorView<'_>, EngineError>;
}

/// 自持数据的输出集合
#[derive(Debug, PartialEq)]
pub struct OutputTensorSet {
  tensors: Vec<OutputTensor>,
}

impl OutputTensorSet {
  pub fn new(tensors: Vec<OutputTensor>) -> Self {
    Self { tensors }
  }
}

impl OutputTensors for OutputTensorSet {
  fn len(&self) -> usize {
    self.tensors.len()
  }

  fn tensor(&self, index: usize) -> Result<TensorView<'_>, EngineError> {
    self
      .tensors
      .get(index)
      .map(|tensor| tensor.data.as_view())
      .ok_or_else(|| EngineError::Output(format!("输出张量索引越界: {}", index)))
  }
}

pub trait InferenceEngine {
  type Outputs: OutputTensors;

  /// 输入输出张量属性，初始化时查询一次
  fn io_attrs(&self) -> Result<IoAttrs, EngineError>;

  fn set_input(
    &mut self,
    data: &[u8],
    format: TensorFormat,
    dtype: TensorType,
  ) -> Result<(), EngineError>;

  /// 同步阻塞执行一次前向推理
  fn run(&mut self) -> Result<(), EngineError>;

  fn get_outputs(&mut self) -> Result<Self::Outputs, EngineError>;

  fn release_outputs(&mut self, outputs: Self::Outputs) -> Result<(), EngineError>;
}
