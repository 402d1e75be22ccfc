// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/loader.rs - 模型文件加载
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

use std::{
  collections::TryReserveError,
  fs::File,
  io::Read,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("无法读取模型文件 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("模型缓冲区分配失败 ({size} 字节): {source}")]
  Allocation {
    size: usize,
    source: TryReserveError,
  },
  #[error("模型文件读取不完整: 期望 {expected} 字节, 实际 {actual} 字节")]
  ShortRead { expected: usize, actual: usize },
}

/// 从磁盘读入的模型数据
#[derive(Debug, Clone)]
pub struct ModelBlob {
  data: Box<[u8]>,
}

impl ModelBlob {
  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

pub fn load_model(path: impl AsRef<Path>) -> Result<ModelBlob, ModelLoadError> {
  let path = path.as_ref();
  let io_error = |source| ModelLoadError::Io {
    path: path.to_path_buf(),
    source,
  };

  info!("加载模型文件: {}", path.display());
  let file = File::open(path).map_err(io_error)?;
  let size = file.metadata().map_err(io_error)?.len() as usize;

  let mut data = Vec::new();
  data
    .try_reserve_exact(size)
    .map_err(|source| ModelLoadError::Allocation { size, source })?;

  file
    .take(size as u64)
    .read_to_end(&mut data)
    .map_err(io_error)?;

  if data.len() != size {
    return Err(ModelLoadError::ShortRead {
      expected: size,
      actual: data.len(),
    });
  }

  debug!(
    "模型文件大小: {:.2} MB",
    data.len() as f64 / (1024.0 * 1024.0)
  );

  Ok(ModelBlob {
    data: data.into_boxed_slice(),
  })
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn blob_length_matches_file_size() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let content: Vec<u8> = (0..4099u32).map(|i| (i % 251) as u8).collect();
    file.write_all(&content).unwrap();
    file.flush().unwrap();

    let blob = load_model(file.path()).unwrap();
    let on_disk = std::fs::metadata(file.path()).unwrap().len() as usize;
    assert_eq!(blob.len(), on_disk);
    assert_eq!(blob.as_bytes(), content.as_slice());
  }

  #[test]
  fn empty_file_loads_as_empty_blob() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let blob = load_model(file.path()).unwrap();
    assert!(blob.is_empty());
  }

  #[test]
  fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_model(dir.path().join("missing.rknn")).unwrap_err();
    assert!(matches!(err, ModelLoadError::Io { .. }));
    assert!(err.to_string().contains("missing.rknn"));
  }
}
