// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/encode.rs - 证件照编码
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

use image::{
  ExtendedColorType, ImageEncoder, RgbImage,
  codecs::{jpeg::JpegEncoder, png::PngEncoder},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 与浏览器 canvas 导出 JPEG 的默认质量一致
pub const DEFAULT_QUALITY: u8 = 92;

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
  #[default]
  Jpeg,
  Png,
}

impl OutputFormat {
  pub fn extension(&self) -> &'static str {
    match self {
      OutputFormat::Jpeg => "jpg",
      OutputFormat::Png => "png",
    }
  }

  pub fn mime_type(&self) -> &'static str {
    match self {
      OutputFormat::Jpeg => "image/jpeg",
      OutputFormat::Png => "image/png",
    }
  }

  /// 下载时使用的默认文件名
  pub fn default_file_name(&self) -> &'static str {
    match self {
      OutputFormat::Jpeg => "passport-photo.jpg",
      OutputFormat::Png => "passport-photo.png",
    }
  }
}

#[derive(Error, Debug)]
pub enum EncodeError {
  #[error("JPEG 质量必须在 1 到 100 之间, 实际为 {0}")]
  InvalidQuality(u8),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
}

pub fn encode(image: &RgbImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, EncodeError> {
  let mut buffer = Vec::new();
  let (width, height) = image.dimensions();

  match format {
    OutputFormat::Jpeg => {
      if !(1..=100).contains(&quality) {
        return Err(EncodeError::InvalidQuality(quality));
      }
      JpegEncoder::new_with_quality(&mut buffer, quality).write_image(
        image.as_raw(),
        width,
        height,
        ExtendedColorType::Rgb8,
      )?;
    }
    // PNG 为无损格式，忽略质量参数
    OutputFormat::Png => {
      PngEncoder::new(&mut buffer).write_image(
        image.as_raw(),
        width,
        height,
        ExtendedColorType::Rgb8,
      )?;
    }
  }

  Ok(buffer)
}
