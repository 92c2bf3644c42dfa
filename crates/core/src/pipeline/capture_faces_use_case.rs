use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::domain::face_image_store::{face_image_path, FaceImageStore};
use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::effect_applier::apply_effects;
use crate::pipeline::session_logger::SessionLogger;
use crate::quality::domain::face_record::FaceRecord;
use crate::quality::domain::quality_gate::CaptureQualityGate;
use crate::session::domain::phase::Phase;
use crate::session::domain::state_machine::{Effect, SessionRole, SessionStateMachine};
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::store::domain::state_store::StateStore;

pub struct CaptureSettings {
    pub output_dir: PathBuf,
    pub face_padding: i32,
    pub poll_interval: Duration,
}

/// The detection process: camera → detect → crop → gate → store.
///
/// Frames are read continuously so the camera never buffers stale images;
/// they are only scanned while the session is capturing. The store is polled
/// on a ticker between frames, so one thread owns the session.
pub struct CaptureFacesUseCase {
    source: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    images: Arc<dyn FaceImageStore>,
    gate: CaptureQualityGate,
    store: Arc<dyn StateStore>,
    machine: SessionStateMachine,
    logger: Box<dyn SessionLogger>,
    settings: CaptureSettings,
}

impl CaptureFacesUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        images: Arc<dyn FaceImageStore>,
        gate: CaptureQualityGate,
        store: Arc<dyn StateStore>,
        logger: Box<dyn SessionLogger>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            source,
            detector,
            images,
            gate,
            store,
            machine: SessionStateMachine::new(SessionRole::Detector),
            logger,
            settings,
        }
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    /// Runs until `shutdown` is set. A camera that fails or whose stream
    /// ends is an error: the process cannot do anything useful without it.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), CaptureError> {
        let ticker = crossbeam_channel::tick(self.settings.poll_interval);
        log::info!(
            "Capturing to {} (polling every {:?})",
            self.settings.output_dir.display(),
            self.settings.poll_interval
        );
        self.poll();

        while !shutdown.load(Ordering::SeqCst) {
            if ticker.try_recv().is_ok() {
                self.poll();
            }

            let frame = self
                .source
                .next_frame()?
                .ok_or_else(|| CaptureError::Read("stream ended".to_string()))?;

            if self.machine.phase() == Phase::Capturing {
                self.process_frame(&frame);
            }
        }

        log::info!("Capture stopped");
        self.logger.summary();
        Ok(())
    }

    /// Reads the store once and applies the resulting transition.
    pub fn poll(&mut self) {
        let snapshot = self.store.snapshot();
        let effects = self.machine.on_snapshot(&snapshot);
        self.apply(effects);
    }

    /// Scans one frame. When it holds enough faces, saves a batch and runs
    /// it through the quality gate.
    pub fn process_frame(&mut self, frame: &Frame) {
        let Some(needed) = self
            .machine
            .session()
            .filter(|s| s.phase == Phase::Capturing)
            .map(|s| s.num_players as usize)
        else {
            return;
        };

        let t0 = Instant::now();
        let regions = match self.detector.detect(frame) {
            Ok(regions) => regions,
            Err(e) => {
                log::warn!("Detection failed on frame {}: {e}", frame.index());
                return;
            }
        };
        self.logger
            .timing("detect", t0.elapsed().as_secs_f64() * 1000.0);
        self.logger.attempt(regions.len(), needed);

        let Some(players) = Region::select_players(&regions, needed) else {
            return;
        };

        let faces = match self.save_batch(frame, &players) {
            Ok(faces) => faces,
            Err(saved) => {
                self.apply(vec![Effect::DeleteArtifacts(saved)]);
                return;
            }
        };
        log::info!("Captured {} faces on frame {}", faces.len(), frame.index());
        let effects = self.machine.on_faces_captured(faces);
        self.apply(effects);

        let t0 = Instant::now();
        let Some(verdict) = self
            .machine
            .pending_batch_mut()
            .map(|batch| self.gate.evaluate(batch))
        else {
            return;
        };
        self.logger
            .timing("gate", t0.elapsed().as_secs_f64() * 1000.0);
        self.logger.verdict(&verdict);

        // The last poll may be a full interval old. A reset since then ends
        // the session here and the verdict is ignored.
        self.poll();
        let effects = self.machine.on_verdict(&verdict);
        self.apply(effects);
    }

    /// Crops and saves each player's face. On failure returns the paths
    /// already written so they can be removed.
    fn save_batch(&self, frame: &Frame, players: &[Region]) -> Result<Vec<FaceRecord>, Vec<PathBuf>> {
        let mut faces = Vec::with_capacity(players.len());
        for (index, region) in players.iter().enumerate() {
            let path = face_image_path(&self.settings.output_dir, index);
            let padded = region.padded(self.settings.face_padding);
            if let Err(e) = self.images.crop_and_save(frame, &padded, &path) {
                log::warn!("Failed to save {}: {e}", path.display());
                return Err(faces.into_iter().map(|f: FaceRecord| f.image_path).collect());
            }
            faces.push(FaceRecord::new(index, path));
        }
        Ok(faces)
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        apply_effects(
            effects,
            self.store.as_ref(),
            Some(self.images.as_ref()),
            self.logger.as_mut(),
        );
    }
}
