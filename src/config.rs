// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/config.rs - 裁剪参数配置
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

use std::{path::Path, time::Duration};

use image::Rgb;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
  compose::DEFAULT_BACKGROUND,
  detector::FacePolicy,
  encode::{DEFAULT_QUALITY, OutputFormat},
  geometry::{
    DEFAULT_BOTTOM_FACTOR, DEFAULT_SIDE_FACTOR, DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH,
    DEFAULT_TOP_FACTOR, EdgeMode, PaddingPolicy, TargetSize,
  },
};

const DEFAULT_DETECTOR_TIMEOUT_MS: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读取配置文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件格式错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("配置项 {0} 无效: {1}")]
  Invalid(&'static str, String),
}

/// 全部可配置项，JSON 中缺省的字段取默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutterConfig {
  pub target_width: u32,
  pub target_height: u32,
  pub side_factor: f32,
  pub top_factor: f32,
  pub bottom_factor: f32,
  pub output_format: OutputFormat,
  pub output_quality: u8,
  pub edge_mode: EdgeMode,
  pub face_policy: FacePolicy,
  pub background: [u8; 3],
  /// 0 表示不限时
  pub detector_timeout_ms: u64,
}

impl Default for CutterConfig {
  fn default() -> Self {
    Self {
      target_width: DEFAULT_TARGET_WIDTH,
      target_height: DEFAULT_TARGET_HEIGHT,
      side_factor: DEFAULT_SIDE_FACTOR,
      top_factor: DEFAULT_TOP_FACTOR,
      bottom_factor: DEFAULT_BOTTOM_FACTOR,
      output_format: OutputFormat::default(),
      output_quality: DEFAULT_QUALITY,
      edge_mode: EdgeMode::default(),
      face_policy: FacePolicy::default(),
      background: DEFAULT_BACKGROUND,
      detector_timeout_ms: DEFAULT_DETECTOR_TIMEOUT_MS,
    }
  }
}

impl CutterConfig {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载配置文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let config: Self = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.target_width == 0 || self.target_height == 0 {
      return Err(ConfigError::Invalid(
        "target",
        format!("{}x{}", self.target_width, self.target_height),
      ));
    }

    for (name, value) in [
      ("side_factor", self.side_factor),
      ("top_factor", self.top_factor),
      ("bottom_factor", self.bottom_factor),
    ] {
      if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid(name, value.to_string()));
      }
    }

    if !(1..=100).contains(&self.output_quality) {
      return Err(ConfigError::Invalid(
        "output_quality",
        self.output_quality.to_string(),
      ));
    }

    Ok(())
  }

  pub fn target(&self) -> TargetSize {
    TargetSize::new(self.target_width, self.target_height)
  }

  pub fn padding(&self) -> PaddingPolicy {
    PaddingPolicy {
      side_factor: self.side_factor,
      top_factor: self.top_factor,
      bottom_factor: self.bottom_factor,
    }
  }

  pub fn background(&self) -> Rgb<u8> {
    Rgb(self.background)
  }

  pub fn detector_timeout(&self) -> Option<Duration> {
    (self.detector_timeout_ms > 0).then(|| Duration::from_millis(self.detector_timeout_ms))
  }
}
