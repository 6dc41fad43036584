// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/detector/static_boxes.rs - 固定人脸框
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

use std::convert::Infallible;

use image::RgbImage;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::{DetectorError, FaceDetection, FaceDetector},
  geometry::BoundingBox,
};

/// `static://?box=x,y,w,h[,score]&box=...`
///
/// 人脸框直接写在 URL 中，适合已知人脸位置的场景和测试
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
  faces: Vec<FaceDetection>,
}

impl StaticDetector {
  pub fn new(faces: Vec<FaceDetection>) -> Self {
    Self { faces }
  }

  pub fn from_boxes(boxes: impl IntoIterator<Item = BoundingBox>) -> Self {
    Self {
      faces: boxes.into_iter().map(|bbox| FaceDetection::new(bbox, 1.0)).collect(),
    }
  }
}

fn parse_box(value: &str) -> Result<FaceDetection, DetectorError> {
  let numbers = value
    .split(',')
    .map(|v| v.trim().parse::<f32>())
    .collect::<Result<Vec<_>, _>>()
    .map_err(|e| DetectorError::InvalidBox(format!("'{}': {}", value, e)))?;

  match numbers[..] {
    [x, y, width, height] => Ok(FaceDetection::new(BoundingBox::new(x, y, width, height), 1.0)),
    [x, y, width, height, score] => Ok(FaceDetection::new(
      BoundingBox::new(x, y, width, height),
      score,
    )),
    _ => Err(DetectorError::InvalidBox(format!(
      "'{}': 需要 4 或 5 个数值",
      value
    ))),
  }
}

impl FromUrlWithScheme for StaticDetector {
  const SCHEME: &'static str = "static";
}

impl FromUrl for StaticDetector {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::SchemeMismatch(format!(
        "期望检测方式 '{}', 实际检测方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let faces = url
      .query_pairs()
      .filter(|(k, _)| k == "box")
      .map(|(_, v)| parse_box(&v))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(StaticDetector { faces })
  }
}

impl FaceDetector for StaticDetector {
  type Error = Infallible;

  fn detect(&self, _image: &RgbImage) -> Result<Vec<FaceDetection>, Self::Error> {
    Ok(self.faces.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn boxes_keep_query_order() {
    let url = Url::parse("static://?box=100,80,200,240&box=400,90,50,60,0.4").unwrap();
    let faces = StaticDetector::from_url(&url).unwrap().detect(&RgbImage::new(1, 1)).unwrap();
    assert_eq!(faces.len(), 2);
    assert_eq!(faces[0].bbox, BoundingBox::new(100.0, 80.0, 200.0, 240.0));
    assert_eq!(faces[1].score, 0.4);
  }

  #[test]
  fn no_boxes_means_no_faces() {
    let url = Url::parse("static://").unwrap();
    let detector = StaticDetector::from_url(&url).unwrap();
    assert!(detector.detect(&RgbImage::new(1, 1)).unwrap().is_empty());
  }

  #[test]
  fn malformed_boxes_are_rejected() {
    for query in ["box=1,2,3", "box=a,b,c,d", "box=1,2,3,4,5,6"] {
      let url = Url::parse(&format!("static://?{}", query)).unwrap();
      assert!(matches!(StaticDetector::from_url(&url), Err(DetectorError::InvalidBox(_))));
    }
  }
}
