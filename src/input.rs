// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/input.rs - 图像输入
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

use image::{DynamicImage, ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

use crate::FromUrl;

mod read_folder;
mod read_image_file;

pub use self::read_folder::FolderInput;
pub use self::read_image_file::ImageFileInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  DecodeError(#[from] image::ImageError),
  #[error("无法识别的图像格式")]
  UnsupportedFormat,
  #[error("图像尺寸为零")]
  ZeroDimensions,
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 待处理的原始图像：文件路径、上传的字节或已解码的图像
#[derive(Debug, Clone)]
pub enum RawImage {
  Path(PathBuf),
  Bytes(Vec<u8>),
  Decoded(DynamicImage),
}

impl RawImage {
  /// 解码为 RGB 图像，透明通道直接丢弃
  pub fn decode(self) -> Result<RgbImage, InputError> {
    let image = match self {
      RawImage::Path(path) => {
        debug!("读取图片文件: {}", path.display());
        ImageReader::open(&path)?.with_guessed_format()?.decode()?
      }
      RawImage::Bytes(bytes) => {
        // 只接受 image/* 类数据
        let format = image::guess_format(&bytes).map_err(|_| InputError::UnsupportedFormat)?;
        debug!("从内存解码图片: {:?}, {} 字节", format, bytes.len());
        image::load_from_memory_with_format(&bytes, format)?
      }
      RawImage::Decoded(image) => image,
    };

    if image.width() == 0 || image.height() == 0 {
      return Err(InputError::ZeroDimensions);
    }

    Ok(image.to_rgb8())
  }

  /// 用于日志与记录的简短描述
  pub fn describe(&self) -> String {
    match self {
      RawImage::Path(path) => path.display().to_string(),
      RawImage::Bytes(bytes) => format!("<{} 字节>", bytes.len()),
      RawImage::Decoded(image) => format!("<{}x{} 图像>", image.width(), image.height()),
    }
  }
}

impl From<Vec<u8>> for RawImage {
  fn from(bytes: Vec<u8>) -> Self {
    RawImage::Bytes(bytes)
  }
}

impl From<PathBuf> for RawImage {
  fn from(path: PathBuf) -> Self {
    RawImage::Path(path)
  }
}

impl From<DynamicImage> for RawImage {
  fn from(image: DynamicImage) -> Self {
    RawImage::Decoded(image)
  }
}

impl From<RgbImage> for RawImage {
  fn from(image: RgbImage) -> Self {
    RawImage::Decoded(DynamicImage::ImageRgb8(image))
  }
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ReadFolder(FolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      FolderInput::SCHEME => Ok(InputWrapper::ReadFolder(FolderInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = RawImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::ReadFolder(input) => input.next(),
    }
  }
}
