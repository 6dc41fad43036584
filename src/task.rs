// 该文件是 Passport Cutter （证件照裁剪） 项目的一部分。
// src/task.rs - 证件照处理流程与任务
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

use std::{
  fmt,
  sync::{
    Arc,
    mpsc::{self, RecvTimeoutError},
  },
  thread,
  time::{Duration, Instant},
};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  compose::compose,
  config::CutterConfig,
  detector::{FaceDetection, FaceDetector, select_primary_face},
  encode::{EncodeError, OutputFormat, encode},
  geometry::{self, BoundingBox, CropRect, ImageBounds, Transform},
  input::{InputError, RawImage},
  output::Render,
};

/// 检测器就绪状态，由流程的调用方持有
pub enum DetectorState<D> {
  Uninitialized,
  Loading,
  Ready(Arc<D>),
  Failed(String),
}

/// 不携带检测器的状态标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
  Uninitialized,
  Loading,
  Ready,
  Failed,
}

impl fmt::Display for Readiness {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Readiness::Uninitialized => "未初始化",
      Readiness::Loading => "加载中",
      Readiness::Ready => "就绪",
      Readiness::Failed => "加载失败",
    };
    f.write_str(name)
  }
}

impl<D> Default for DetectorState<D> {
  fn default() -> Self {
    DetectorState::Uninitialized
  }
}

impl<D> DetectorState<D> {
  /// 执行加载，结束后处于 `Ready` 或 `Failed`
  pub fn load<E: fmt::Display>(&mut self, loader: impl FnOnce() -> Result<D, E>) -> Readiness {
    *self = DetectorState::Loading;
    info!("正在加载人脸检测器...");
    let now = Instant::now();
    *self = match loader() {
      Ok(detector) => {
        info!("人脸检测器加载完成，耗时: {:.2?}", now.elapsed());
        DetectorState::Ready(Arc::new(detector))
      }
      Err(e) => {
        error!("人脸检测器加载失败: {}", e);
        DetectorState::Failed(e.to_string())
      }
    };
    self.readiness()
  }

  pub fn readiness(&self) -> Readiness {
    match self {
      DetectorState::Uninitialized => Readiness::Uninitialized,
      DetectorState::Loading => Readiness::Loading,
      DetectorState::Ready(_) => Readiness::Ready,
      DetectorState::Failed(_) => Readiness::Failed,
    }
  }

  pub fn is_ready(&self) -> bool {
    matches!(self, DetectorState::Ready(_))
  }

  pub fn detector(&self) -> Option<&Arc<D>> {
    match self {
      DetectorState::Ready(detector) => Some(detector),
      _ => None,
    }
  }

  pub fn failure(&self) -> Option<&str> {
    match self {
      DetectorState::Failed(reason) => Some(reason),
      _ => None,
    }
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("人脸检测器不可用: {0}")]
  DetectorUnavailable(Readiness),
  #[error("图像无效: {0}")]
  InvalidImage(#[from] InputError),
  #[error("人脸检测失败: {0}")]
  Detector(String),
  #[error("人脸检测超时: {0:.2?}")]
  DetectorTimeout(Duration),
  #[error("编码失败: {0}")]
  Encode(#[from] EncodeError),
}

/// 编码后的证件照及其几何信息
#[derive(Debug, Clone)]
pub struct PassportPhoto {
  pub data: Vec<u8>,
  pub format: OutputFormat,
  pub width: u32,
  pub height: u32,
  pub face: BoundingBox,
  pub crop: CropRect,
  pub transform: Transform,
}

impl PassportPhoto {
  pub fn file_name(&self) -> &'static str {
    self.format.default_file_name()
  }
}

/// 一次处理的结果。未检测到人脸或几何退化时 `photo` 为 `None`
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
  pub detections: Vec<FaceDetection>,
  pub photo: Option<PassportPhoto>,
}

/// 解码 → 检测 → 选择主人脸 → 几何计算 → 重采样 → 编码
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
  config: CutterConfig,
}

impl Pipeline {
  pub fn new(config: CutterConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &CutterConfig {
    &self.config
  }

  pub fn process_image<D>(
    &self,
    state: &DetectorState<D>,
    raw: RawImage,
  ) -> Result<ProcessOutcome, PipelineError>
  where
    D: FaceDetector + Send + Sync + 'static,
  {
    // 检测器未就绪时不解码
    if !state.is_ready() {
      return Err(PipelineError::DetectorUnavailable(state.readiness()));
    }
    debug!("解码输入: {}", raw.describe());
    let image = raw.decode()?;
    self.process_decoded(state, &image)
  }

  pub fn process_decoded<D>(
    &self,
    state: &DetectorState<D>,
    image: &RgbImage,
  ) -> Result<ProcessOutcome, PipelineError>
  where
    D: FaceDetector + Send + Sync + 'static,
  {
    let detector = state
      .detector()
      .ok_or(PipelineError::DetectorUnavailable(state.readiness()))?;

    let now = Instant::now();
    let detections = detect_with_timeout(detector, image, self.config.detector_timeout())?;
    info!(
      "检测到 {} 张人脸，耗时: {:.2?}",
      detections.len(),
      now.elapsed()
    );

    let Some(primary) = select_primary_face(&detections, self.config.face_policy) else {
      warn!("未检测到可用人脸，不生成证件照");
      return Ok(ProcessOutcome {
        detections,
        photo: None,
      });
    };
    let face = primary.bbox;

    let bounds = ImageBounds::from(image.dimensions());
    let target = self.config.target();
    let plan = match geometry::plan(
      &face,
      bounds,
      target,
      &self.config.padding(),
      self.config.edge_mode,
    ) {
      Ok(plan) => plan,
      Err(e) => {
        warn!("跳过输出: {}", e);
        return Ok(ProcessOutcome {
          detections,
          photo: None,
        });
      }
    };

    let canvas = compose(
      image,
      &plan.crop,
      &plan.transform,
      target,
      self.config.background(),
    );
    let data = encode(&canvas, self.config.output_format, self.config.output_quality)?;
    info!(
      "证件照生成完成: {}x{}, {} 字节",
      target.width,
      target.height,
      data.len()
    );

    Ok(ProcessOutcome {
      detections,
      photo: Some(PassportPhoto {
        data,
        format: self.config.output_format,
        width: target.width,
        height: target.height,
        face,
        crop: plan.crop,
        transform: plan.transform,
      }),
    })
  }
}

fn detect_with_timeout<D>(
  detector: &Arc<D>,
  image: &RgbImage,
  timeout: Option<Duration>,
) -> Result<Vec<FaceDetection>, PipelineError>
where
  D: FaceDetector + Send + Sync + 'static,
{
  let Some(timeout) = timeout else {
    return detector
      .detect(image)
      .map_err(|e| PipelineError::Detector(e.to_string()));
  };

  let (tx, rx) = mpsc::channel();
  let worker = Arc::clone(detector);
  let image = image.clone();
  thread::spawn(move || {
    let result = worker.detect(&image).map_err(|e| e.to_string());
    // 超时后接收端已被丢弃
    let _ = tx.send(result);
  });

  match rx.recv_timeout(timeout) {
    Ok(result) => result.map_err(PipelineError::Detector),
    Err(RecvTimeoutError::Timeout) => {
      warn!("人脸检测超过 {:.2?} 未返回", timeout);
      Err(PipelineError::DetectorTimeout(timeout))
    }
    Err(RecvTimeoutError::Disconnected) => {
      Err(PipelineError::Detector("检测线程异常退出".to_string()))
    }
  }
}

/// 一次请求的凭据，只有最新的凭据可以更新会话
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
  Photo,
  Miss,
  Failed,
  Stale,
}

/// 交互会话：持有检测器状态和最近一次的结果
pub struct Session<D> {
  pipeline: Pipeline,
  state: DetectorState<D>,
  generation: u64,
  photo: Option<PassportPhoto>,
  detections: Vec<FaceDetection>,
  last_error: Option<String>,
}

impl<D> Session<D>
where
  D: FaceDetector + Send + Sync + 'static,
{
  pub fn new(pipeline: Pipeline, state: DetectorState<D>) -> Self {
    Self {
      pipeline,
      state,
      generation: 0,
      photo: None,
      detections: Vec::new(),
      last_error: None,
    }
  }

  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  pub fn state(&self) -> &DetectorState<D> {
    &self.state
  }

  pub fn state_mut(&mut self) -> &mut DetectorState<D> {
    &mut self.state
  }

  pub fn photo(&self) -> Option<&PassportPhoto> {
    self.photo.as_ref()
  }

  pub fn detections(&self) -> &[FaceDetection] {
    &self.detections
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  /// 开始一次新请求，之前发出的凭据全部作废
  pub fn begin(&mut self) -> Ticket {
    self.generation += 1;
    Ticket(self.generation)
  }

  pub fn complete(
    &mut self,
    ticket: Ticket,
    result: Result<ProcessOutcome, PipelineError>,
  ) -> Applied {
    if ticket.0 != self.generation {
      warn!("丢弃过期的处理结果 (#{} < #{})", ticket.0, self.generation);
      return Applied::Stale;
    }

    match result {
      Ok(ProcessOutcome {
        detections,
        photo: Some(photo),
      }) => {
        self.detections = detections;
        self.photo = Some(photo);
        self.last_error = None;
        Applied::Photo
      }
      // 未检测到人脸时保留上一张证件照
      Ok(ProcessOutcome {
        detections,
        photo: None,
      }) => {
        self.detections = detections;
        self.last_error = None;
        Applied::Miss
      }
      Err(e) => {
        error!("处理失败: {}", e);
        self.last_error = Some(e.to_string());
        Applied::Failed
      }
    }
  }

  pub fn submit(&mut self, raw: RawImage) -> Applied {
    let ticket = self.begin();
    let result = self.pipeline.process_image(&self.state, raw);
    self.complete(ticket, result)
  }
}

pub trait Task<I, D, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    pipeline: &Pipeline,
    state: &DetectorState<D>,
    output: &O,
  ) -> Result<TaskSummary, Self::Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
  pub processed: usize,
  pub cropped: usize,
  pub missed: usize,
  pub failed: usize,
}

pub struct OneShotTask;

impl<D, RE, I, O> Task<I, D, O> for OneShotTask
where
  D: FaceDetector + Send + Sync + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RawImage>,
  O: Render<RgbImage, ProcessOutcome, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    pipeline: &Pipeline,
    state: &DetectorState<D>,
    output: &O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let raw = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    if !state.is_ready() {
      return Err(PipelineError::DetectorUnavailable(state.readiness()).into());
    }

    let image = raw.decode().map_err(PipelineError::from)?;
    let now = Instant::now();
    let outcome = pipeline.process_decoded(state, &image)?;
    info!("处理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&image, &outcome)?;

    let cropped = outcome.photo.is_some();
    Ok(TaskSummary {
      processed: 1,
      cropped: cropped as usize,
      missed: (!cropped) as usize,
      failed: 0,
    })
  }
}

/// 逐张处理输入中的所有图像，单张的解码、处理或输出失败只记录计数，不中断
#[derive(Default, Debug)]
pub struct BatchTask {
  limit: Option<usize>,
  interrupt: Option<mpsc::Receiver<()>>,
}

impl BatchTask {
  pub fn with_limit(mut self, limit: Option<usize>) -> Self {
    self.limit = limit;
    self
  }

  pub fn with_interrupt(mut self, interrupt: mpsc::Receiver<()>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }
}

impl<D, RE, I, O> Task<I, D, O> for BatchTask
where
  D: FaceDetector + Send + Sync + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RawImage>,
  O: Render<RgbImage, ProcessOutcome, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    pipeline: &Pipeline,
    state: &DetectorState<D>,
    output: &O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始批量任务...");
    if !state.is_ready() {
      return Err(PipelineError::DetectorUnavailable(state.readiness()).into());
    }

    let mut summary = TaskSummary::default();
    for raw in input {
      if self.limit.map(|n| summary.processed >= n).unwrap_or(false) {
        info!("达到指定数量 {}, 退出任务循环", summary.processed);
        break;
      }
      if self
        .interrupt
        .as_ref()
        .map(|rx| rx.try_recv().is_ok())
        .unwrap_or(false)
      {
        warn!("中断信号接收，退出任务循环");
        break;
      }

      summary.processed += 1;
      let name = raw.describe();
      info!("处理第 {} 张图像: {}", summary.processed, name);

      let image = match raw.decode() {
        Ok(image) => image,
        Err(e) => {
          error!("无法解码 {}: {}", name, e);
          summary.failed += 1;
          continue;
        }
      };

      match pipeline.process_decoded(state, &image) {
        Ok(outcome) => match output.render_result(&image, &outcome) {
          Ok(()) if outcome.photo.is_some() => summary.cropped += 1,
          Ok(()) => summary.missed += 1,
          Err(e) => {
            error!("输出 {} 的结果失败: {}", name, e);
            summary.failed += 1;
          }
        },
        Err(e) => {
          error!("处理 {} 失败: {}", name, e);
          summary.failed += 1;
        }
      }
    }

    info!(
      "任务完成: 共 {} 张, 生成 {} 张, 未检测到人脸 {} 张, 失败 {} 张",
      summary.processed, summary.cropped, summary.missed, summary.failed
    );
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::StaticDetector;
  use image::Rgb;
  use std::{cell::RefCell, convert::Infallible};

  fn ready(boxes: &[BoundingBox]) -> DetectorState<StaticDetector> {
    let mut state = DetectorState::default();
    state.load(|| Ok::<_, Infallible>(StaticDetector::from_boxes(boxes.iter().copied())));
    state
  }

  fn webcam_frame() -> RgbImage {
    RgbImage::from_fn(640, 480, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<bool>>,
  }

  impl Render<RgbImage, ProcessOutcome> for Collect {
    type Error = Infallible;

    fn render_result(&self, _frame: &RgbImage, result: &ProcessOutcome) -> Result<(), Self::Error> {
      self.seen.borrow_mut().push(result.photo.is_some());
      Ok(())
    }
  }

  struct SlowDetector(Duration);

  impl FaceDetector for SlowDetector {
    type Error = Infallible;

    fn detect(&self, _image: &RgbImage) -> Result<Vec<FaceDetection>, Self::Error> {
      thread::sleep(self.0);
      Ok(Vec::new())
    }
  }

  #[test]
  fn readiness_transitions() {
    let mut state: DetectorState<StaticDetector> = DetectorState::default();
    assert_eq!(state.readiness(), Readiness::Uninitialized);
    assert_eq!(state.load(|| Err("模型文件缺失")), Readiness::Failed);
    assert_eq!(state.failure(), Some("模型文件缺失"));
    assert_eq!(
      state.load(|| Ok::<_, Infallible>(StaticDetector::default())),
      Readiness::Ready
    );
    assert!(state.detector().is_some());
  }

  #[test]
  fn refuses_to_run_before_ready() {
    let pipeline = Pipeline::default();
    for state in [
      DetectorState::<StaticDetector>::Uninitialized,
      DetectorState::Loading,
      DetectorState::Failed("boom".to_string()),
    ] {
      let result = pipeline.process_image(&state, RawImage::from(webcam_frame()));
      assert!(matches!(result, Err(PipelineError::DetectorUnavailable(_))));
    }
  }

  #[test]
  fn produces_photo_of_target_size() {
    let state = ready(&[BoundingBox::new(100.0, 80.0, 200.0, 240.0)]);
    let outcome = Pipeline::default()
      .process_image(&state, RawImage::from(webcam_frame()))
      .unwrap();
    let photo = outcome.photo.unwrap();
    assert_eq!((photo.width, photo.height), (144, 182));
    assert_eq!((photo.crop.width, photo.crop.height), (400.0, 480.0));
    assert_eq!(photo.file_name(), "passport-photo.jpg");

    let decoded = image::load_from_memory(&photo.data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (144, 182));
  }

  #[test]
  fn no_face_is_not_an_error() {
    let state = ready(&[]);
    let outcome = Pipeline::default()
      .process_image(&state, RawImage::from(webcam_frame()))
      .unwrap();
    assert!(outcome.detections.is_empty());
    assert!(outcome.photo.is_none());
  }

  #[test]
  fn degenerate_face_gives_no_photo() {
    let state = ready(&[BoundingBox::new(10.0, 10.0, 0.0, 0.0)]);
    let outcome = Pipeline::default()
      .process_image(&state, RawImage::from(webcam_frame()))
      .unwrap();
    assert_eq!(outcome.detections.len(), 1);
    assert!(outcome.photo.is_none());
  }

  #[test]
  fn undecodable_input_is_invalid_image() {
    let state = ready(&[BoundingBox::new(1.0, 1.0, 2.0, 2.0)]);
    let result = Pipeline::default().process_image(&state, RawImage::from(vec![0u8; 16]));
    assert!(matches!(result, Err(PipelineError::InvalidImage(_))));
  }

  #[test]
  fn slow_detector_times_out() {
    let mut state = DetectorState::default();
    state.load(|| Ok::<_, Infallible>(SlowDetector(Duration::from_millis(500))));
    let pipeline = Pipeline::new(CutterConfig {
      detector_timeout_ms: 20,
      ..Default::default()
    });
    let result = pipeline.process_decoded(&state, &RgbImage::new(4, 4));
    assert!(matches!(result, Err(PipelineError::DetectorTimeout(_))));
  }

  #[test]
  fn session_keeps_prior_photo_on_miss() {
    let state = ready(&[BoundingBox::new(100.0, 80.0, 200.0, 240.0)]);
    let mut session = Session::new(Pipeline::default(), state);
    assert_eq!(session.submit(RawImage::from(webcam_frame())), Applied::Photo);
    let before = session.photo().unwrap().data.clone();

    session.state_mut().load(|| Ok::<_, Infallible>(StaticDetector::default()));
    assert_eq!(session.submit(RawImage::from(webcam_frame())), Applied::Miss);
    assert_eq!(session.photo().unwrap().data, before);
    assert!(session.detections().is_empty());

    assert_eq!(session.submit(RawImage::from(b"not an image".to_vec())), Applied::Failed);
    assert!(session.last_error().is_some());
    assert_eq!(session.photo().unwrap().data, before);
  }

  #[test]
  fn stale_results_are_discarded() {
    let state = ready(&[BoundingBox::new(100.0, 80.0, 200.0, 240.0)]);
    let mut session = Session::new(Pipeline::default(), state);
    let older = session.begin();
    let newer = session.begin();

    let result = session
      .pipeline()
      .process_image(session.state(), RawImage::from(webcam_frame()));
    assert_eq!(session.complete(older, result), Applied::Stale);
    assert!(session.photo().is_none());

    assert_eq!(session.complete(newer, Ok(ProcessOutcome::default())), Applied::Miss);
  }

  #[test]
  fn batch_task_counts_each_outcome() {
    let state = ready(&[BoundingBox::new(100.0, 80.0, 200.0, 240.0)]);
    let inputs = vec![
      RawImage::from(webcam_frame()),
      RawImage::from(b"broken".to_vec()),
      RawImage::from(webcam_frame()),
    ];
    let output = Collect::default();
    let summary = BatchTask::default()
      .run_task(inputs.into_iter(), &Pipeline::default(), &state, &output)
      .unwrap();
    assert_eq!(
      summary,
      TaskSummary {
        processed: 3,
        cropped: 2,
        missed: 0,
        failed: 1
      }
    );
    assert_eq!(*output.seen.borrow(), [true, true]);
  }

  // 第二次起输出全部失败
  #[derive(Default)]
  struct FailAfterFirst {
    calls: RefCell<usize>,
  }

  impl Render<RgbImage, ProcessOutcome> for FailAfterFirst {
    type Error = std::io::Error;

    fn render_result(&self, _frame: &RgbImage, _result: &ProcessOutcome) -> Result<(), Self::Error> {
      let mut calls = self.calls.borrow_mut();
      *calls += 1;
      if *calls > 1 {
        return Err(std::io::Error::other("磁盘已满"));
      }
      Ok(())
    }
  }

  #[test]
  fn batch_task_counts_sink_failures_and_keeps_going() {
    let state = ready(&[BoundingBox::new(100.0, 80.0, 200.0, 240.0)]);
    let inputs = (0..3).map(|_| RawImage::from(webcam_frame()));
    let output = FailAfterFirst::default();
    let summary = BatchTask::default()
      .run_task(inputs, &Pipeline::default(), &state, &output)
      .unwrap();
    assert_eq!(*output.calls.borrow(), 3);
    assert_eq!(
      summary,
      TaskSummary {
        processed: 3,
        cropped: 1,
        missed: 0,
        failed: 2
      }
    );
  }

  #[test]
  fn batch_task_honours_limit_and_interrupt() {
    let state = ready(&[]);
    let inputs = || (0..5).map(|_| RawImage::from(RgbImage::new(8, 8)));

    let summary = BatchTask::default()
      .with_limit(Some(2))
      .run_task(inputs(), &Pipeline::default(), &state, &Collect::default())
      .unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.missed, 2);

    let (tx, rx) = mpsc::channel();
    tx.send(()).unwrap();
    let summary = BatchTask::default()
      .with_interrupt(rx)
      .run_task(inputs(), &Pipeline::default(), &state, &Collect::default())
      .unwrap();
    assert_eq!(summary.processed, 0);
  }

  #[test]
  fn one_shot_uses_first_input_only() {
    let state = ready(&[BoundingBox::new(100.0, 80.0, 200.0, 240.0)]);
    let output = Collect::default();
    let inputs = vec![RawImage::from(webcam_frame()), RawImage::from(b"ignored".to_vec())];
    let summary = OneShotTask
      .run_task(inputs.into_iter(), &Pipeline::default(), &state, &output)
      .unwrap();
    assert_eq!(summary.cropped, 1);
    assert_eq!(output.seen.borrow().len(), 1);
  }
}
