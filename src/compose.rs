// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/compose.rs - 将裁剪区域重采样到固定尺寸画布
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
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use tracing::{debug, warn};

use crate::geometry::{CropRect, TargetSize, Transform};

pub const DEFAULT_BACKGROUND: [u8; 3] = [0, 0, 0];

/// 单个方向上源图像窗口与画布区间的对应关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
  /// 源图像中按整像素取出的窗口
  src_start: u32,
  src_len: u32,
  /// 窗口缩放后的长度
  resized_len: u32,
  /// 缩放后窗口中对应裁剪起点的位置
  skip: u32,
  /// 画布上被覆盖的区间
  dst_start: u32,
  dst_len: u32,
}

/// 裁剪区域同时截断到源图像和画布之内，再换算成整像素窗口
fn span(
  origin: f32,
  length: f32,
  scale: f32,
  offset: f32,
  source_len: u32,
  target_len: u32,
) -> Option<Span> {
  let src_lo = origin.max(0.0);
  let src_hi = (origin + length)
    .min(source_len as f32)
    .min(origin + (target_len as f32 - offset) / scale);
  if !(src_hi > src_lo) {
    return None;
  }

  let dst_start = (offset + (src_lo - origin) * scale).round() as u32;
  let dst_end = ((offset + (src_hi - origin) * scale).round() as u32).min(target_len);
  if dst_end <= dst_start {
    return None;
  }

  let src_start = (src_lo.floor() as u32).min(source_len - 1);
  let src_end = (src_hi.ceil() as u32).clamp(src_start + 1, source_len);
  let src_len = src_end - src_start;
  let skip = ((src_lo - src_start as f32) * scale).round() as u32;
  let dst_len = dst_end - dst_start;
  let resized_len = ((src_len as f32 * scale).round() as u32).max(skip + dst_len);

  Some(Span {
    src_start,
    src_len,
    resized_len,
    skip,
    dst_start,
    dst_len,
  })
}

/// 将 `source` 中的 `crop` 区域绘制到 `target` 大小的画布上。
///
/// 区域绘制在 `(offset_x, offset_y)`，大小为缩放后的裁剪尺寸，超出画布的部分被裁掉。
/// 裁剪区域越过源图像边缘的部分不绘制，与之对应的画布像素以及其它未被覆盖的像素
/// 保持 `background`。缩放使用三角滤波，缩小时滤波核随比例放宽，不会产生锯齿。
pub fn compose(
  source: &RgbImage,
  crop: &CropRect,
  transform: &Transform,
  target: TargetSize,
  background: Rgb<u8>,
) -> RgbImage {
  let mut canvas = RgbImage::from_pixel(target.width, target.height, background);
  if crop.is_degenerate() || source.width() == 0 || source.height() == 0 {
    warn!("裁剪区域或源图像为空，输出纯色画布");
    return canvas;
  }

  let (scaled_w, scaled_h) = transform.scaled_size(crop);
  let spans = (
    span(
      crop.x,
      crop.width,
      scaled_w / crop.width,
      transform.offset_x,
      source.width(),
      target.width,
    ),
    span(
      crop.y,
      crop.height,
      scaled_h / crop.height,
      transform.offset_y,
      source.height(),
      target.height,
    ),
  );
  let (Some(x), Some(y)) = spans else {
    warn!("裁剪区域完全落在源图像或画布之外");
    return canvas;
  };
  debug!("源窗口: {:?} {:?}", x, y);

  let window = imageops::crop_imm(source, x.src_start, y.src_start, x.src_len, y.src_len);
  let resized = imageops::resize(&*window, x.resized_len, y.resized_len, FilterType::Triangle);
  let visible = imageops::crop_imm(&resized, x.skip, y.skip, x.dst_len, y.dst_len);
  imageops::replace(&mut canvas, &*visible, x.dst_start as i64, y.dst_start as i64);

  canvas
}
