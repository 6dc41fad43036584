// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/geometry.rs - 人脸框到裁剪区域的几何计算
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// 默认留白系数
pub const DEFAULT_SIDE_FACTOR: f32 = 0.5;
pub const DEFAULT_TOP_FACTOR: f32 = 0.8;
pub const DEFAULT_BOTTOM_FACTOR: f32 = 1.5;

// 1.5 x 1.9 英寸 @ 96 DPI
pub const DEFAULT_TARGET_WIDTH: u32 = 144;
pub const DEFAULT_TARGET_HEIGHT: u32 = 182;

/// 人脸框，源图像像素坐标 (左上角 + 宽高)，允许亚像素
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBox {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 宽高为正且所有分量有限
  pub fn is_valid(&self) -> bool {
    self.x.is_finite()
      && self.y.is_finite()
      && self.width.is_finite()
      && self.height.is_finite()
      && self.width > 0.0
      && self.height > 0.0
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }
}

/// 源图像尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
  pub width: u32,
  pub height: u32,
}

impl ImageBounds {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

impl From<(u32, u32)> for ImageBounds {
  fn from((width, height): (u32, u32)) -> Self {
    Self { width, height }
  }
}

/// 输出画布尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
  pub width: u32,
  pub height: u32,
}

impl TargetSize {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

impl Default for TargetSize {
  fn default() -> Self {
    Self {
      width: DEFAULT_TARGET_WIDTH,
      height: DEFAULT_TARGET_HEIGHT,
    }
  }
}

/// 留白系数：左右按人脸宽度，上下按人脸高度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddingPolicy {
  pub side_factor: f32,
  pub top_factor: f32,
  pub bottom_factor: f32,
}

impl Default for PaddingPolicy {
  fn default() -> Self {
    Self {
      side_factor: DEFAULT_SIDE_FACTOR,
      top_factor: DEFAULT_TOP_FACTOR,
      bottom_factor: DEFAULT_BOTTOM_FACTOR,
    }
  }
}

/// 裁剪区域靠近图像右/下边缘时的处理方式
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
  /// 裁剪区域严格落在图像内
  #[default]
  Contain,
  /// 仅按整幅图像尺寸限制宽高，区域可能越过右/下边缘
  Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
  pub x: f32,
  pub top: f32,
  pub bottom: f32,
}

/// 源图像中的裁剪区域
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl CropRect {
  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn is_degenerate(&self) -> bool {
    !(self.x.is_finite()
      && self.y.is_finite()
      && self.width.is_finite()
      && self.height.is_finite()
      && self.width > 0.0
      && self.height > 0.0)
  }
}

/// 裁剪区域到输出画布的映射
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
  pub scale: f32,
  pub offset_x: f32,
  pub offset_y: f32,
}

impl Transform {
  /// 缩放后裁剪区域的 (宽, 高)
  pub fn scaled_size(&self, crop: &CropRect) -> (f32, f32) {
    (crop.width * self.scale, crop.height * self.scale)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropPlan {
  pub crop: CropRect,
  pub transform: Transform,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
  #[error("人脸框无效: {0:?}")]
  InvalidFace(BoundingBox),
  #[error("图像尺寸为零: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("输出尺寸为零: {0}x{1}")]
  EmptyTarget(u32, u32),
  #[error("裁剪区域退化: {0:?}")]
  DegenerateCrop(CropRect),
}

pub fn compute_padding(face: &BoundingBox, policy: &PaddingPolicy) -> Padding {
  Padding {
    x: face.width * policy.side_factor,
    top: face.height * policy.top_factor,
    bottom: face.height * policy.bottom_factor,
  }
}

/// 以人脸框为中心向外留白，得到源图像中的裁剪区域。
///
/// 左/上边缘总是截断到 0。`EdgeMode::Legacy` 只用整幅图像的宽高限制裁剪尺寸；
/// `EdgeMode::Contain` 还会按剩余宽高收缩，保证区域完全落在图像内。
pub fn compute_crop_rect(
  face: &BoundingBox,
  bounds: ImageBounds,
  policy: &PaddingPolicy,
  edge_mode: EdgeMode,
) -> CropRect {
  let padding = compute_padding(face, policy);
  let (bound_w, bound_h) = (bounds.width as f32, bounds.height as f32);

  let mut x = (face.x - padding.x).max(0.0);
  let mut y = (face.y - padding.top).max(0.0);
  let mut width = (face.width + 2.0 * padding.x).min(bound_w);
  let mut height = (face.height + padding.top + padding.bottom).min(bound_h);

  if edge_mode == EdgeMode::Contain {
    // 人脸框整体落在图像外时至少保留一个像素
    x = x.min((bound_w - 1.0).max(0.0));
    y = y.min((bound_h - 1.0).max(0.0));
    width = width.min(bound_w - x);
    height = height.min(bound_h - y);
  }

  CropRect {
    x,
    y,
    width,
    height,
  }
}

/// 覆盖式缩放：取两个方向所需比例的较大者，缩放后的区域在两个方向上都不小于画布
pub fn compute_transform(crop: &CropRect, target: TargetSize) -> Transform {
  let (target_w, target_h) = (target.width as f32, target.height as f32);
  let scale = (target_w / crop.width).max(target_h / crop.height);
  let scaled_w = crop.width * scale;
  let scaled_h = crop.height * scale;

  Transform {
    scale,
    offset_x: ((target_w - scaled_w) / 2.0).max(0.0),
    offset_y: ((target_h - scaled_h) / 2.0).max(0.0),
  }
}

/// 校验输入并依次计算裁剪区域与映射
pub fn plan(
  face: &BoundingBox,
  bounds: ImageBounds,
  target: TargetSize,
  policy: &PaddingPolicy,
  edge_mode: EdgeMode,
) -> Result<CropPlan, GeometryError> {
  if !face.is_valid() {
    return Err(GeometryError::InvalidFace(*face));
  }
  if bounds.is_empty() {
    return Err(GeometryError::EmptyImage(bounds.width, bounds.height));
  }
  if target.width == 0 || target.height == 0 {
    return Err(GeometryError::EmptyTarget(target.width, target.height));
  }

  let crop = compute_crop_rect(face, bounds, policy, edge_mode);
  if crop.is_degenerate() {
    return Err(GeometryError::DegenerateCrop(crop));
  }

  let transform = compute_transform(&crop, target);
  debug!(
    "裁剪区域: ({:.1}, {:.1}, {:.1}x{:.1}), 缩放: {:.4}, 偏移: ({:.1}, {:.1})",
    crop.x, crop.y, crop.width, crop.height, transform.scale, transform.offset_x, transform.offset_y
  );

  Ok(CropPlan { crop, transform })
}
