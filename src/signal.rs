// 该文件是 Shanan （山南西风） 项目的一部分。
// src/signal.rs - 中断信号
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
  sync::mpsc::{self, Receiver},
  thread,
  time::Duration,
};

use tracing::{info, warn};

/// 收到信号后等待主循环退出的最长时间
const FORCE_EXIT_SECS: u64 = 30;

/// Ctrl-C 中断，主循环每帧轮询一次
pub struct Interrupt {
  rx: Receiver<()>,
}

impl Interrupt {
  /// 每个进程只能安装一次
  pub fn install() -> Result<Self, ctrlc::Error> {
    let (tx, rx) = mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(FORCE_EXIT_SECS));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    Ok(Self { rx })
  }

  pub fn triggered(&self) -> bool {
    self.rx.try_recv().is_ok()
  }
}
