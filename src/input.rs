// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 摄像头输入
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

//! 采集源即 `Iterator<Item = Frame>`：采集失败时记录错误并结束迭代。

use url::Url;

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

pub const DEFAULT_CAMERA: &str = "/dev/video0";

/// 构造摄像头输入地址，形如 `gst://camera/dev/video0?width=640&height=480`
pub fn camera_url(device: &str, width: u32, height: u32) -> Result<Url, url::ParseError> {
  let mut url = Url::parse("gst://camera")?;
  url.set_path(device);
  url
    .query_pairs_mut()
    .append_pair("width", &width.to_string())
    .append_pair("height", &height.to_string());
  Ok(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn camera_url_layout() {
    let url = camera_url(DEFAULT_CAMERA, 1280, 720).unwrap();
    assert_eq!(url.scheme(), "gst");
    assert_eq!(url.host_str(), Some("camera"));
    assert_eq!(url.path(), "/dev/video0");
    let query: Vec<(String, String)> = url
      .query_pairs()
      .map(|(k, v)| (k.into_owned(), v.into_owned()))
      .collect();
    assert_eq!(
      query,
      vec![
        ("width".to_string(), "1280".to_string()),
        ("height".to_string(), "720".to_string())
      ]
    );
  }
}
