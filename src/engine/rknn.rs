// 该文件是 Shanan （山南西风） 项目的一部分。
// src/engine/rknn.rs - 基于 rknpu 的推理引擎
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

//! RKNN 后端
//!
//! 绑定层只提供输入输出数量，不提供张量属性查询。输入尺寸由构建器给出，
//! 默认 640x640x3 NHWC uint8；输出一律按浮点读取，量化参数取默认值，
//! 张量长度由后处理在每帧校验。

use rknpu::{Context, InitFlags};
use tracing::{debug, error, info};

use crate::{
  engine::{
    EngineError, InferenceEngine, IoAttrs, ModelInputShape, OutputTensors, QuantParams,
    TensorAttr, TensorFormat, TensorType, TensorView,
  },
  model::ModelBlob,
};

pub const DEFAULT_INPUT_SHAPE: ModelInputShape = ModelInputShape {
  width: 640,
  height: 640,
  channels: 3,
};

pub struct RknnEngineBuilder {
  blob: ModelBlob,
  flags: InitFlags,
  input_shape: ModelInputShape,
}

impl RknnEngineBuilder {
  /// 模型数据的所有权交给构建器，上下文创建完成后即释放
  pub fn new(blob: ModelBlob) -> Self {
    Self {
      blob,
      flags: InitFlags::default(),
      input_shape: DEFAULT_INPUT_SHAPE,
    }
  }

  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  /// 模型输入尺寸，需与转换模型时的输入一致
  pub fn input_shape(mut self, input_shape: ModelInputShape) -> Self {
    self.input_shape = input_shape;
    self
  }

  pub fn build(self) -> Result<RknnEngine, EngineError> {
    info!("创建 RKNN 推理上下文");
    let context = Context::new(self.blob.as_bytes(), self.flags)
      .map_err(|e| EngineError::Init(e.to_string()))?;
    drop(self.blob);

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          info!("SDK 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          info!("驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(EngineError::Query(format!("无法查询 SDK 版本: {}", e)));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| EngineError::Query(format!("无法获取输入数量: {}", e)))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| EngineError::Query(format!("无法获取输出数量: {}", e)))?;
    info!("模型输入数量: {}, 输出数量: {}", num_inputs, num_outputs);

    let attrs = synthesize_attrs(num_inputs, num_outputs, self.input_shape);
    debug!("张量属性: {:?}", attrs);

    Ok(RknnEngine { context, attrs })
  }
}

fn synthesize_attrs(num_inputs: u32, num_outputs: u32, input_shape: ModelInputShape) -> IoAttrs {
  let inputs = (0..num_inputs)
    .map(|index| input_shape.nhwc_attr(index))
    .collect();
  let outputs = (0..num_outputs)
    .map(|index| TensorAttr {
      index,
      name: format!("output{}", index),
      dims: Vec::new(),
      format: TensorFormat::Undefined,
      dtype: TensorType::Float32,
      quant: QuantParams::default(),
    })
    .collect();
  IoAttrs { inputs, outputs }
}

/// 一次推理的输出，持有运行时缓冲区，归还引擎时释放
pub struct RknnOutputs {
  output: rknpu::Output,
  count: usize,
}

impl OutputTensors for RknnOutputs {
  fn len(&self) -> usize {
    self.count
  }

  fn tensor(&self, index: usize) -> Result<TensorView<'_>, EngineError> {
    let data = self
      .output
      .get_f32(index)
      .map_err(|e| EngineError::Output(format!("获取第 {} 个输出失败: {}", index, e)))?;
    Ok(TensorView::Float32(data))
  }
}

/// RKNN 推理上下文，`Drop` 时销毁
pub struct RknnEngine {
  context: Context,
  attrs: IoAttrs,
}

impl Drop for RknnEngine {
  fn drop(&mut self) {
    info!("销毁 RKNN 推理上下文");
  }
}

impl InferenceEngine for RknnEngine {
  type Outputs = RknnOutputs;

  fn io_attrs(&self) -> Result<IoAttrs, EngineError> {
    Ok(self.attrs.clone())
  }

  fn set_input(
    &mut self,
    data: &[u8],
    format: TensorFormat,
    dtype: TensorType,
  ) -> Result<(), EngineError> {
    let format = match format {
      TensorFormat::NCHW => rknpu::TensorFormat::NCHW,
      TensorFormat::NHWC | TensorFormat::Undefined => rknpu::TensorFormat::NHWC,
    };
    let dtype = match dtype {
      TensorType::UInt8 => rknpu::TensorType::UInt8,
      other => {
        return Err(EngineError::InputBind(format!(
          "不支持的输入数据类型: {:?}",
          other
        )));
      }
    };

    debug!("设置模型输入");
    self
      .context
      .set_input(0, data, format, dtype)
      .map_err(|e| EngineError::InputBind(e.to_string()))
  }

  fn run(&mut self) -> Result<(), EngineError> {
    debug!("执行模型推理");
    self
      .context
      .run()
      .map_err(|e| EngineError::Inference(e.to_string()))
  }

  fn get_outputs(&mut self) -> Result<RknnOutputs, EngineError> {
    let output = self
      .context
      .get_outputs()
      .map_err(|e| EngineError::Output(e.to_string()))?;
    debug!("模型推理结果：{:?}", output);

    Ok(RknnOutputs {
      output,
      count: self.attrs.outputs.len(),
    })
  }

  fn release_outputs(&mut self, outputs: RknnOutputs) -> Result<(), EngineError> {
    debug!("释放 {} 个模型输出", outputs.len());
    drop(outputs);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn attrs_follow_the_configured_input() {
    let attrs = synthesize_attrs(1, 3, DEFAULT_INPUT_SHAPE);
    assert_eq!(attrs.input_shape().unwrap(), DEFAULT_INPUT_SHAPE);
    assert_eq!(attrs.outputs.len(), 3);
    assert!(
      attrs
        .outputs
        .iter()
        .all(|attr| attr.dtype == TensorType::Float32)
    );
    assert_eq!(attrs.output_quant(), vec![QuantParams::default(); 3]);
  }
}
