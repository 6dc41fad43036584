// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/detector/annotation.rs - 从 JSON 标注文件读取人脸框
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
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::{DetectorError, FaceDetection, FaceDetector},
  geometry::BoundingBox,
};

// 外部检测器导出的单个人脸
#[derive(Debug, Deserialize)]
struct AnnotatedFace {
  x: f32,
  y: f32,
  width: f32,
  height: f32,
  #[serde(default = "default_score")]
  score: f32,
  #[serde(default)]
  landmarks: Option<Vec<[f32; 2]>>,
}

fn default_score() -> f32 {
  1.0
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnnotationFile {
  List(Vec<AnnotatedFace>),
  Wrapped { faces: Vec<AnnotatedFace> },
}

/// `boxes:///path/to/faces.json`
///
/// 构建时一次性读取标注文件，之后对任何图像都返回同一组人脸。
/// 文件内容为人脸数组，或 `{"faces": [...]}`。
#[derive(Debug, Clone)]
pub struct AnnotationDetector {
  faces: Vec<FaceDetection>,
}

impl FromUrlWithScheme for AnnotationDetector {
  const SCHEME: &'static str = "boxes";
}

impl FromUrl for AnnotationDetector {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::SchemeMismatch(format!(
        "期望检测方式 '{}', 实际检测方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    info!("加载人脸标注文件: {}", url.path());
    let content = std::fs::read_to_string(url.path())?;
    let detector = Self::from_json(&content)?;
    info!("标注文件中共 {} 张人脸", detector.faces.len());
    Ok(detector)
  }
}

impl AnnotationDetector {
  pub fn from_json(content: &str) -> Result<Self, DetectorError> {
    let faces = match serde_json::from_str::<AnnotationFile>(content)? {
      AnnotationFile::List(faces) | AnnotationFile::Wrapped { faces } => faces,
    };

    let faces = faces
      .into_iter()
      .map(|face| FaceDetection {
        bbox: BoundingBox::new(face.x, face.y, face.width, face.height),
        score: face.score,
        landmarks: face.landmarks,
      })
      .collect();

    Ok(Self { faces })
  }
}

impl FaceDetector for AnnotationDetector {
  type Error = DetectorError;

  fn detect(&self, image: &RgbImage) -> Result<Vec<FaceDetection>, Self::Error> {
    debug!(
      "返回 {} 张标注人脸, 图像尺寸 {}x{}",
      self.faces.len(),
      image.width(),
      image.height()
    );
    Ok(self.faces.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_plain_list() {
    let detector = AnnotationDetector::from_json(
      r#"[{"x": 100, "y": 80, "width": 200, "height": 240, "score": 0.97},
          {"x": 400, "y": 90, "width": 50.5, "height": 60}]"#,
    )
    .unwrap();
    let faces = detector.detect(&RgbImage::new(640, 480)).unwrap();
    assert_eq!(faces.len(), 2);
    assert_eq!(faces[0].bbox, BoundingBox::new(100.0, 80.0, 200.0, 240.0));
    assert_eq!(faces[0].score, 0.97);
    assert_eq!(faces[1].score, 1.0);
  }

  #[test]
  fn parses_wrapped_faces_with_landmarks() {
    let detector = AnnotationDetector::from_json(
      r#"{"faces": [{"x": 1, "y": 2, "width": 3, "height": 4, "landmarks": [[1.5, 2.5], [2.0, 3.0]]}]}"#,
    )
    .unwrap();
    let faces = detector.detect(&RgbImage::new(8, 8)).unwrap();
    assert_eq!(faces[0].landmarks.as_deref(), Some(&[[1.5, 2.5], [2.0, 3.0]][..]));
  }

  #[test]
  fn empty_list_is_a_miss_not_an_error() {
    let detector = AnnotationDetector::from_json("[]").unwrap();
    assert!(detector.detect(&RgbImage::new(8, 8)).unwrap().is_empty());
  }

  #[test]
  fn malformed_json_is_rejected() {
    assert!(matches!(
      AnnotationDetector::from_json(r#"{"boxes": 3}"#),
      Err(DetectorError::AnnotationError(_))
    ));
  }

  #[test]
  fn loads_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("faces.json");
    std::fs::write(&path, r#"[{"x": 5, "y": 6, "width": 7, "height": 8}]"#).unwrap();
    let url = Url::parse(&format!("boxes://{}", path.display())).unwrap();
    let detector = AnnotationDetector::from_url(&url).unwrap();
    assert_eq!(detector.detect(&RgbImage::new(1, 1)).unwrap().len(), 1);
  }

  #[test]
  fn missing_file_fails_to_load() {
    let url = Url::parse("boxes:///nonexistent/faces.json").unwrap();
    assert!(matches!(AnnotationDetector::from_url(&url), Err(DetectorError::IoError(_))));
  }
}
