// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/input/read_folder.rs - 目录批量输入
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

use std::{collections::VecDeque, path::PathBuf};

use image::ImageFormat;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{InputError, RawImage},
};

/// `folder:///path/to/dir`，按文件名顺序产生目录下所有可识别扩展名的图像
pub struct FolderInput {
  files: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch);
    }

    let directory = PathBuf::from(url.path());
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if path.is_file() && ImageFormat::from_path(&path).is_ok() {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中找到 {} 张图片", directory.display(), files.len());

    Ok(FolderInput {
      files: files.into(),
    })
  }
}

impl Iterator for FolderInput {
  type Item = RawImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.files.pop_front().map(RawImage::Path)
  }
}
