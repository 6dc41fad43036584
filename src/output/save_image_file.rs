// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/output/save_image_file.rs - 保存证件照文件
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

#[cfg(feature = "annotate")]
use crate::output::draw::Draw;
use crate::{
  FromUrl, FromUrlWithScheme,
  output::Render,
  task::{PassportPhoto, ProcessOutcome},
};

/// `image:///path/to/passport-photo.jpg[?annotate=/path/to/debug.png]`
///
/// 路径是已存在的目录或以 `/` 结尾时，使用默认文件名
pub struct SaveImageFileOutput {
  path: PathBuf,
  is_directory: bool,
  annotate: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = PathBuf::from(uri.path());
    let annotate = uri
      .query_pairs()
      .find(|(k, _)| k == "annotate")
      .map(|(_, v)| PathBuf::from(v.as_ref()));
    if annotate.is_some() && !cfg!(feature = "annotate") {
      warn!("未启用 annotate 功能，忽略标注图输出");
    }

    Ok(SaveImageFileOutput {
      is_directory: uri.path().ends_with('/') || path.is_dir(),
      path,
      annotate,
    })
  }
}

impl SaveImageFileOutput {
  pub fn photo_path(&self, photo: &PassportPhoto) -> PathBuf {
    if self.is_directory {
      self.path.join(photo.file_name())
    } else {
      self.path.clone()
    }
  }

  fn save_photo(&self, photo: &PassportPhoto) -> Result<(), SaveImageFileError> {
    let path = self.photo_path(photo);
    create_parent(&path)?;
    std::fs::write(&path, &photo.data)?;
    info!("保存证件照到文件: {}", path.display());
    Ok(())
  }

  #[cfg(feature = "annotate")]
  fn save_annotation(&self, frame: &RgbImage, result: &ProcessOutcome) -> Result<(), SaveImageFileError> {
    if let Some(path) = &self.annotate {
      create_parent(path)?;
      Draw::default().draw_outcome(frame, result).save(path)?;
      info!("保存标注图到文件: {}", path.display());
    }
    Ok(())
  }

  #[cfg(not(feature = "annotate"))]
  fn save_annotation(&self, _frame: &RgbImage, _result: &ProcessOutcome) -> Result<(), SaveImageFileError> {
    Ok(())
  }
}

pub(crate) fn create_parent(path: &Path) -> std::io::Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  Ok(())
}

impl Render<RgbImage, ProcessOutcome> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &ProcessOutcome) -> Result<(), Self::Error> {
    self.save_annotation(frame, result)?;
    match &result.photo {
      Some(photo) => self.save_photo(photo),
      None => {
        warn!("没有生成证件照，未写出 {}", self.path.display());
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    encode::OutputFormat,
    geometry::{BoundingBox, CropRect, Transform},
  };

  fn photo(format: OutputFormat) -> PassportPhoto {
    PassportPhoto {
      data: vec![0xFF, 0xD8, 0xFF],
      format,
      width: 144,
      height: 182,
      face: BoundingBox::new(1.0, 1.0, 2.0, 2.0),
      crop: CropRect {
        x: 0.0,
        y: 0.0,
        width: 4.0,
        height: 4.0,
      },
      transform: Transform {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
      },
    }
  }

  fn output_url(path: &Path, query: &str) -> Url {
    Url::parse(&format!("image://{}{}", path.display(), query)).unwrap()
  }

  #[test]
  fn writes_photo_bytes_to_path() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested/me.jpg");
    let output = SaveImageFileOutput::from_url(&output_url(&target, "")).unwrap();
    let outcome = ProcessOutcome {
      detections: Vec::new(),
      photo: Some(photo(OutputFormat::Jpeg)),
    };
    output.render_result(&RgbImage::new(4, 4), &outcome).unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), vec![0xFF, 0xD8, 0xFF]);
  }

  #[test]
  fn directory_gets_default_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let output = SaveImageFileOutput::from_url(&output_url(dir.path(), "")).unwrap();
    assert_eq!(
      output.photo_path(&photo(OutputFormat::Png)),
      dir.path().join("passport-photo.png")
    );
  }

  #[test]
  fn miss_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("me.jpg");
    let output = SaveImageFileOutput::from_url(&output_url(&target, "")).unwrap();
    output
      .render_result(&RgbImage::new(4, 4), &ProcessOutcome::default())
      .unwrap();
    assert!(!target.exists());
  }

  #[cfg(feature = "annotate")]
  #[test]
  fn writes_annotation_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("me.jpg");
    let debug = dir.path().join("debug.png");
    let query = format!("?annotate={}", debug.display());
    let output = SaveImageFileOutput::from_url(&output_url(&target, &query)).unwrap();
    output
      .render_result(&RgbImage::new(16, 16), &ProcessOutcome::default())
      .unwrap();
    assert_eq!(image::open(&debug).unwrap().width(), 16);
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("folder:///tmp").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
