// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use passport_cutter::{CutterConfig, EdgeMode, FacePolicy, OutputFormat};

/// 从照片中裁剪出标准证件照
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  /// - 图片: image:///path/to/photo.jpg
  /// - 目录: folder:///path/to/photos
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 人脸检测来源
  /// - 标注文件: boxes:///path/to/faces.json
  /// - 固定人脸框: static://?box=x,y,w,h
  #[arg(long, value_name = "DETECTOR")]
  pub detector: Url,

  /// 输出路径
  /// - 文件: image:///path/to/passport-photo.jpg[?annotate=/path/to/debug.png]
  /// - 目录: folder:///path/to/records[?record][&always]
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// JSON 配置文件，命令行参数优先
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  #[arg(long, value_name = "PIXELS")]
  pub target_width: Option<u32>,

  #[arg(long, value_name = "PIXELS")]
  pub target_height: Option<u32>,

  /// 左右留白（人脸宽度的倍数）
  #[arg(long, value_name = "FACTOR")]
  pub side_factor: Option<f32>,

  /// 头顶留白（人脸高度的倍数）
  #[arg(long, value_name = "FACTOR")]
  pub top_factor: Option<f32>,

  /// 下方留白（人脸高度的倍数）
  #[arg(long, value_name = "FACTOR")]
  pub bottom_factor: Option<f32>,

  #[arg(long, value_enum, value_name = "FORMAT")]
  pub format: Option<OutputFormat>,

  /// JPEG 质量 (1 - 100)
  #[arg(long, value_name = "QUALITY")]
  pub quality: Option<u8>,

  #[arg(long, value_enum, value_name = "MODE")]
  pub edge_mode: Option<EdgeMode>,

  /// 多张人脸时的选择方式
  #[arg(long, value_enum, value_name = "POLICY")]
  pub face_policy: Option<FacePolicy>,

  /// 检测超时（毫秒，0 表示不限时）
  #[arg(long, value_name = "MILLISECONDS")]
  pub detector_timeout_ms: Option<u64>,

  /// 最大处理图像数
  #[arg(long, value_name = "COUNT")]
  pub max_images: Option<usize>,
}

impl Args {
  /// 用命令行中给出的参数覆盖配置
  pub fn apply(&self, config: &mut CutterConfig) {
    if let Some(width) = self.target_width {
      config.target_width = width;
    }
    if let Some(height) = self.target_height {
      config.target_height = height;
    }
    if let Some(factor) = self.side_factor {
      config.side_factor = factor;
    }
    if let Some(factor) = self.top_factor {
      config.top_factor = factor;
    }
    if let Some(factor) = self.bottom_factor {
      config.bottom_factor = factor;
    }
    if let Some(format) = self.format {
      config.output_format = format;
    }
    if let Some(quality) = self.quality {
      config.output_quality = quality;
    }
    if let Some(mode) = self.edge_mode {
      config.edge_mode = mode;
    }
    if let Some(policy) = self.face_policy {
      config.face_policy = policy;
    }
    if let Some(timeout) = self.detector_timeout_ms {
      config.detector_timeout_ms = timeout;
    }
  }
}
