// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 采集、缩放、推理、解码、绘制、显示主循环
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

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  engine::{EngineError, InferenceEngine, ModelInputShape, QuantParams},
  fps::{FpsMeter, format_fps},
  frame::{Frame, RGB_CHANNELS, ResizedBuffer},
  model::{BOX_THRESH, DecodeError, DecodeParams, NMS_THRESH, PostProcess},
  output::{FrameSink, Render},
  resize::{HardwareResizer, ResizeError},
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("推理引擎错误: {0}")]
  Engine(#[from] EngineError),
  #[error("图像缩放失败: {0}")]
  Resize(#[from] ResizeError),
  #[error("输出解码失败: {0}")]
  Decode(#[from] DecodeError),
  #[error("绘制失败: {0}")]
  Render(#[source] BoxError),
  #[error("显示失败: {0}")]
  Present(#[source] BoxError),
}

/// 单帧处理失败时的行为
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameErrorPolicy {
  /// 结束主循环并返回错误
  #[default]
  Abort,
  /// 记录错误后继续处理下一帧
  Skip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
  conf_threshold: f32,
  nms_threshold: f32,
  on_frame_error: FrameErrorPolicy,
  frame_limit: Option<usize>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      conf_threshold: BOX_THRESH,
      nms_threshold: NMS_THRESH,
      on_frame_error: FrameErrorPolicy::default(),
      frame_limit: None,
    }
  }
}

impl PipelineConfig {
  pub fn with_thresholds(mut self, conf_threshold: f32, nms_threshold: f32) -> Self {
    self.conf_threshold = conf_threshold;
    self.nms_threshold = nms_threshold;
    self
  }

  pub fn with_frame_error_policy(mut self, policy: FrameErrorPolicy) -> Self {
    self.on_frame_error = policy;
    self
  }

  /// 处理指定帧数后结束
  pub fn with_frame_limit(mut self, frame_limit: Option<usize>) -> Self {
    self.frame_limit = frame_limit;
    self
  }

  pub fn conf_threshold(&self) -> f32 {
    self.conf_threshold
  }

  pub fn nms_threshold(&self) -> f32 {
    self.nms_threshold
  }
}

/// 主循环结束时的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub frames: usize,
  pub detections: usize,
  pub skipped: usize,
  /// 用户请求退出，而不是输入流结束
  pub quit_requested: bool,
}

pub struct Pipeline<E, R, D, O> {
  engine: E,
  resizer: R,
  decoder: D,
  render: O,
  config: PipelineConfig,
  input_shape: ModelInputShape,
  output_quant: Vec<QuantParams>,
  buffer: ResizedBuffer,
}

impl<E, R, D, O> Pipeline<E, R, D, O>
where
  E: InferenceEngine,
  R: HardwareResizer,
  D: PostProcess,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  /// 查询模型输入输出属性，按模型输入尺寸分配缩放缓冲区
  pub fn new(
    engine: E,
    resizer: R,
    decoder: D,
    render: O,
    config: PipelineConfig,
  ) -> Result<Self, PipelineError> {
    let attrs = engine.io_attrs()?;
    info!(
      "模型输入数量: {}, 输出数量: {}",
      attrs.inputs.len(),
      attrs.outputs.len()
    );
    for attr in attrs.inputs.iter() {
      info!("输入张量: {:?}", attr);
    }
    for attr in attrs.outputs.iter() {
      debug!("输出张量: {:?}", attr);
    }

    if attrs.inputs.len() != 1 {
      return Err(PipelineError::Engine(EngineError::InvalidModel(format!(
        "模型应有 1 个输入, 实际为 {}",
        attrs.inputs.len()
      ))));
    }
    if let Some(expected) = decoder.expected_outputs()
      && attrs.outputs.len() != expected
    {
      return Err(PipelineError::Engine(EngineError::InvalidModel(format!(
        "模型应有 {} 个输出, 实际为 {}",
        expected,
        attrs.outputs.len()
      ))));
    }

    let input_shape = attrs.input_shape()?;
    if input_shape.channels != RGB_CHANNELS {
      return Err(PipelineError::Engine(EngineError::InvalidModel(format!(
        "模型输入应为 {} 通道, 实际为 {}",
        RGB_CHANNELS, input_shape.channels
      ))));
    }
    info!(
      "模型输入尺寸: 宽 {}, 高 {}, 通道 {}",
      input_shape.width, input_shape.height, input_shape.channels
    );
    info!(
      "post process config: box_conf_threshold = {:.2}, nms_threshold = {:.2}",
      config.conf_threshold, config.nms_threshold
    );

    Ok(Self {
      engine,
      resizer,
      decoder,
      render,
      config,
      input_shape,
      output_quant: attrs.output_quant(),
      buffer: ResizedBuffer::with_shape(input_shape.width, input_shape.height),
    })
  }

  pub fn input_shape(&self) -> ModelInputShape {
    self.input_shape
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// 最近一次处理后的帧
  pub fn buffer(&self) -> &ResizedBuffer {
    &self.buffer
  }

  /// 处理单帧，返回检测到的物体数量
  ///
  /// 只要拿到了输出张量，无论解码是否成功都会归还给引擎。
  pub fn process_frame(&mut self, frame: &Frame, fps: f64) -> Result<usize, PipelineError> {
    self
      .resizer
      .check_compatible(&frame.desc(), &self.buffer.desc())?;
    self.resizer.resize(frame, &mut self.buffer)?;

    self.engine.set_input(
      self.buffer.as_nhwc(),
      self.buffer.tensor_format(),
      self.buffer.tensor_type(),
    )?;
    let started = Instant::now();
    self.engine.run()?;
    let outputs = self.engine.get_outputs()?;
    debug!("推理完成，耗时: {:.2?}", started.elapsed());

    let params = DecodeParams {
      target_width: self.input_shape.width,
      target_height: self.input_shape.height,
      conf_threshold: self.config.conf_threshold,
      nms_threshold: self.config.nms_threshold,
      scale_w: 1.0,
      scale_h: 1.0,
    };
    let decoded = self.decoder.decode(&outputs, &self.output_quant, &params);
    self.engine.release_outputs(outputs)?;
    let result = decoded?;

    for item in result.iter() {
      debug!(
        "{} @ ({} {} {} {}) {:.3}",
        item.label, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3], item.score
      );
    }

    self
      .render
      .render_result(&mut self.buffer, &result, fps)
      .map_err(|e| PipelineError::Render(Box::new(e)))?;

    Ok(result.len())
  }

  fn step<S>(&mut self, frame: &Frame, fps: f64, sink: &mut S) -> Result<usize, PipelineError>
  where
    S: FrameSink,
    S::Error: std::error::Error + Send + Sync + 'static,
  {
    let detections = self.process_frame(frame, fps)?;
    sink
      .present(&self.buffer)
      .map_err(|e| PipelineError::Present(Box::new(e)))?;
    Ok(detections)
  }

  /// 主循环：直到输入结束、用户退出或出现不可跳过的错误
  pub fn run<I, S>(&mut self, source: I, sink: &mut S) -> Result<RunSummary, PipelineError>
  where
    I: IntoIterator<Item = Frame>,
    S: FrameSink,
    S::Error: std::error::Error + Send + Sync + 'static,
  {
    info!("开始处理视频流...");
    let mut summary = RunSummary::default();
    let mut fps_meter = FpsMeter::starting_at(Instant::now());

    for frame in source {
      summary.frames += 1;
      let fps = fps_meter.tick(frame.captured_at());
      debug!("处理第 {} 帧图像, FPS: {}", summary.frames, format_fps(fps));

      match self.step(&frame, fps, sink) {
        Ok(detections) => summary.detections += detections,
        Err(e) => match self.config.on_frame_error {
          FrameErrorPolicy::Abort => {
            error!("第 {} 帧处理失败: {}", summary.frames, e);
            return Err(e);
          }
          FrameErrorPolicy::Skip => {
            warn!("第 {} 帧处理失败，跳过: {}", summary.frames, e);
            summary.skipped += 1;
          }
        },
      }

      if sink.poll_quit() {
        info!("收到退出请求，退出主循环");
        summary.quit_requested = true;
        break;
      }
      if self
        .config
        .frame_limit
        .is_some_and(|limit| summary.frames >= limit)
      {
        info!("达到指定帧数 {}, 退出主循环", summary.frames);
        break;
      }
    }

    info!(
      "处理结束: 共 {} 帧, 检测到 {} 个物体, 跳过 {} 帧",
      summary.frames, summary.detections, summary.skipped
    );
    Ok(summary)
  }
}
