// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::Mutex;

use chrono::{Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, record::Record, save_image_file::create_parent},
  task::ProcessOutcome,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// `folder:///dir[?record][&always]`
///
/// 证件照按日期写入 `dir/YYYY/MM/DD/HH-MM-SS-NNNN.jpg`。
/// `record` 同时写出同名 JSON 记录；`always` 在未生成证件照时保存源图像。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: bool,
  always: bool,
  counter: Mutex<u16>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      record,
      always,
      counter: Mutex::new(0),
    })
  }
}

impl DirectoryRecordOutput {
  fn next_id(&self) -> u16 {
    // 计数器只做自增，锁中毒时沿用内部值
    let mut counter = self.counter.lock().unwrap_or_else(|e| e.into_inner());
    *counter = counter.wrapping_add(1);
    *counter
  }

  /// 不带扩展名的记录路径
  fn entry_stem(&self) -> PathBuf {
    let now = Utc::now();
    self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()))
      .join(format!("{}-{:04X}", now.format("%H-%M-%S"), self.next_id()))
  }
}

impl Render<RgbImage, ProcessOutcome> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &ProcessOutcome) -> Result<(), Self::Error> {
    let stem = self.entry_stem();
    create_parent(&stem)?;

    let photo_path = match &result.photo {
      Some(photo) => {
        let path = stem.with_extension(photo.format.extension());
        std::fs::write(&path, &photo.data)?;
        info!("保存证件照到目录: {}", path.display());
        Some(path)
      }
      None if self.always => {
        let path = stem.with_extension("png");
        frame.save(&path)?;
        info!("未生成证件照，保存源图像: {}", path.display());
        None
      }
      None => {
        debug!("未生成证件照，跳过记录");
        return Ok(());
      }
    };

    if self.record {
      let path = stem.with_extension("json");
      Record::new(frame, result, photo_path.as_deref()).write(&path)?;
      debug!("写出记录: {}", path.display());
    }

    Ok(())
  }
}
