// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/output/draw.rs - 检测结果与裁剪区域可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::task::ProcessOutcome;

const FACE_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const PRIMARY_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const CROP_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const LINE_THICKNESS: u32 = 2;

pub struct Draw {
  face_color: [u8; 3],
  primary_color: [u8; 3],
  crop_color: [u8; 3],
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      face_color: FACE_COLOR,
      primary_color: PRIMARY_COLOR,
      crop_color: CROP_COLOR,
      thickness: LINE_THICKNESS,
    }
  }
}

impl Draw {
  /// 在源图像副本上绘制所有人脸框（主人脸另色）以及裁剪区域
  pub fn draw_outcome(&self, frame: &RgbImage, outcome: &ProcessOutcome) -> RgbImage {
    let mut image = frame.clone();
    let primary = outcome.photo.as_ref().map(|photo| photo.face);

    for detection in outcome.detections.iter() {
      if !detection.bbox.is_valid() {
        continue;
      }
      let bbox = detection.bbox;
      let color = if Some(bbox) == primary {
        self.primary_color
      } else {
        self.face_color
      };
      self.draw_rect(&mut image, bbox.x, bbox.y, bbox.width, bbox.height, color);
    }

    if let Some(photo) = &outcome.photo {
      let crop = photo.crop;
      self.draw_rect(&mut image, crop.x, crop.y, crop.width, crop.height, self.crop_color);
    }

    image
  }

  // 向内加粗，越界部分由 imageproc 裁掉
  fn draw_rect(&self, image: &mut RgbImage, x: f32, y: f32, width: f32, height: f32, color: [u8; 3]) {
    let x_min = x.floor() as i32;
    let y_min = y.floor() as i32;
    let width = (x + width).ceil() as i32 - x_min;
    let height = (y + height).ceil() as i32 - y_min;

    for t in 0..self.thickness as i32 {
      let (w, h) = (width - 2 * t, height - 2 * t);
      if w <= 0 || h <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(w as u32, h as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }
}
