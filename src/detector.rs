// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/detector.rs - 人脸检测接口与主人脸选择
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

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, geometry::BoundingBox};

mod annotation;
mod static_boxes;

pub use self::annotation::AnnotationDetector;
pub use self::static_boxes::StaticDetector;

/// 人脸检测器。实现方按检测顺序返回人脸，可以返回空列表
pub trait FaceDetector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn detect(&self, image: &RgbImage) -> Result<Vec<FaceDetection>, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
  pub bbox: BoundingBox,
  pub score: f32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub landmarks: Option<Vec<[f32; 2]>>,
}

impl FaceDetection {
  pub fn new(bbox: BoundingBox, score: f32) -> Self {
    Self {
      bbox,
      score,
      landmarks: None,
    }
  }
}

/// 检测到多张人脸时如何选择主人脸
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FacePolicy {
  /// 检测顺序中的第一张
  #[default]
  First,
  /// 面积最大的一张
  Largest,
  /// 置信度最高的一张
  MostConfident,
}

/// 选择主人脸。
///
/// `First` 原样取检测顺序中的第一张，即使人脸框无效也不会改用后面的人脸，
/// 由几何计算拒绝无效框。其余策略跳过无效的人脸框，并列时取检测顺序靠前者。
pub fn select_primary_face(faces: &[FaceDetection], policy: FacePolicy) -> Option<&FaceDetection> {
  let candidates = faces.iter().filter(|face| face.bbox.is_valid());
  match policy {
    FacePolicy::First => faces.first(),
    FacePolicy::Largest => candidates.fold(None, |best: Option<&FaceDetection>, face| match best {
      Some(b) if b.bbox.area() >= face.bbox.area() => Some(b),
      _ => Some(face),
    }),
    FacePolicy::MostConfident => candidates.fold(None, |best: Option<&FaceDetection>, face| match best {
      Some(b) if b.score >= face.score => Some(b),
      _ => Some(face),
    }),
  }
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标注文件解析错误: {0}")]
  AnnotationError(#[from] serde_json::Error),
  #[error("人脸框参数无效: {0}")]
  InvalidBox(String),
}

pub enum DetectorWrapper {
  Annotation(AnnotationDetector),
  Static(StaticDetector),
}

impl FromUrl for DetectorWrapper {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      AnnotationDetector::SCHEME => Ok(DetectorWrapper::Annotation(AnnotationDetector::from_url(url)?)),
      StaticDetector::SCHEME => Ok(DetectorWrapper::Static(StaticDetector::from_url(url)?)),
      other => Err(DetectorError::SchemeMismatch(other.to_string())),
    }
  }
}

impl FaceDetector for DetectorWrapper {
  type Error = DetectorError;

  fn detect(&self, image: &RgbImage) -> Result<Vec<FaceDetection>, Self::Error> {
    match self {
      DetectorWrapper::Annotation(detector) => detector.detect(image),
      DetectorWrapper::Static(detector) => detector.detect(image).map_err(|e| match e {}),
    }
  }
}
