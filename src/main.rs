// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::sync::mpsc;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use passport_cutter::{
  CutterConfig, DetectorState, FromUrl, Pipeline,
  detector::DetectorWrapper,
  input::InputWrapper,
  output::OutputWrapper,
  task::{BatchTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  info!("检测来源: {}", args.detector);
  info!("输出路径: {}", args.output);

  let mut config = match &args.config {
    Some(path) => CutterConfig::load(path)?,
    None => CutterConfig::default(),
  };
  args.apply(&mut config);
  config.validate()?;
  info!(
    "目标尺寸: {}x{}, 输出格式: {:?}, 边缘处理: {:?}",
    config.target_width, config.target_height, config.output_format, config.edge_mode
  );

  let mut state = DetectorState::default();
  let readiness = state.load(|| DetectorWrapper::from_url(&args.detector));
  if !state.is_ready() {
    bail!(
      "人脸检测器不可用 ({}): {}",
      readiness,
      state.failure().unwrap_or("未知错误")
    );
  }

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let pipeline = Pipeline::new(config);

  let (tx, rx) = mpsc::channel();
  ctrlc::set_handler(move || {
    warn!("收到中断信号");
    let _ = tx.send(());
  })?;

  let summary = BatchTask::default()
    .with_limit(args.max_images)
    .with_interrupt(rx)
    .run_task(input, &pipeline, &state, &output)?;

  if summary.cropped == 0 {
    warn!("没有生成任何证件照");
  }

  Ok(())
}
