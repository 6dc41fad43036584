// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/output/record.rs - 处理结果的 JSON 记录
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

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use image::RgbImage;
use serde::Serialize;

use crate::{
  detector::FaceDetection,
  encode::OutputFormat,
  geometry::{BoundingBox, CropRect, Transform},
  task::ProcessOutcome,
};

#[derive(Debug, Serialize)]
pub struct Record<'a> {
  pub timestamp: String,
  pub source_width: u32,
  pub source_height: u32,
  pub detections: &'a [FaceDetection],
  pub photo: Option<PhotoRecord>,
}

#[derive(Debug, Serialize)]
pub struct PhotoRecord {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file: Option<String>,
  pub format: OutputFormat,
  pub mime_type: &'static str,
  pub width: u32,
  pub height: u32,
  pub face: BoundingBox,
  pub crop: CropRect,
  pub transform: Transform,
}

impl<'a> Record<'a> {
  pub fn new(frame: &RgbImage, outcome: &'a ProcessOutcome, photo_file: Option<&Path>) -> Self {
    Record {
      timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      source_width: frame.width(),
      source_height: frame.height(),
      detections: &outcome.detections,
      photo: outcome.photo.as_ref().map(|photo| PhotoRecord {
        file: photo_file.map(|p| p.display().to_string()),
        format: photo.format,
        mime_type: photo.format.mime_type(),
        width: photo.width,
        height: photo.height,
        face: photo.face,
        crop: photo.crop,
        transform: photo.transform,
      }),
    }
  }

  pub fn write(&self, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(self)?;
    std::fs::write(path, json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::task::PassportPhoto;

  #[test]
  fn record_lists_detections_and_geometry() {
    let face = BoundingBox::new(100.0, 80.0, 200.0, 240.0);
    let outcome = ProcessOutcome {
      detections: vec![FaceDetection::new(face, 0.9)],
      photo: Some(PassportPhoto {
        data: vec![1, 2, 3],
        format: OutputFormat::Jpeg,
        width: 144,
        height: 182,
        face,
        crop: CropRect {
          x: 0.0,
          y: 0.0,
          width: 400.0,
          height: 480.0,
        },
        transform: Transform {
          scale: 0.5,
          offset_x: 0.0,
          offset_y: 0.0,
        },
      }),
    };
    let frame = RgbImage::new(640, 480);
    let record = Record::new(&frame, &outcome, Some(Path::new("/out/passport-photo.jpg")));
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["source_width"], 640);
    assert_eq!(value["detections"][0]["bbox"]["width"], 200.0);
    assert_eq!(value["photo"]["format"], "jpeg");
    assert_eq!(value["photo"]["mime_type"], "image/jpeg");
    assert_eq!(value["photo"]["crop"]["height"], 480.0);
    assert_eq!(value["photo"]["file"], "/out/passport-photo.jpg");
  }

  #[test]
  fn miss_has_null_photo() {
    let outcome = ProcessOutcome::default();
    let frame = RgbImage::new(2, 2);
    let value = serde_json::to_value(Record::new(&frame, &outcome, None)).unwrap();
    assert!(value["photo"].is_null());
    assert_eq!(value["detections"].as_array().unwrap().len(), 0);
  }
}
