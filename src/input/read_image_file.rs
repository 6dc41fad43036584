// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/input/read_image_file.rs - 单个图像文件输入
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

use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{InputError, RawImage},
};

/// `image:///path/to/photo.jpg`，只产生一张图像，解码推迟到处理时
pub struct ImageFileInput {
  path: Option<PathBuf>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
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

    Ok(ImageFileInput {
      path: Some(PathBuf::from(url.path())),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = RawImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.path.take().map(RawImage::Path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yields_the_path_once() {
    let url = Url::parse("image:///tmp/face.jpg").unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    assert!(matches!(input.next(), Some(RawImage::Path(p)) if p == PathBuf::from("/tmp/face.jpg")));
    assert!(input.next().is_none());
  }

  #[test]
  fn other_schemes_are_rejected() {
    let url = Url::parse("folder:///tmp").unwrap();
    assert!(matches!(ImageFileInput::from_url(&url), Err(InputError::SchemeMismatch)));
  }
}
