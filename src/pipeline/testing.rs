//! Counting test doubles for the four pipeline adapters.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::capture::{CaptureError, CapturedFrame, FrameSource};
use crate::playback::{PlaybackError, Player};
use crate::tts::{SynthesisError, Synthesizer, VoiceModel, Waveform};
use crate::vision::{DescribeError, Describer};

use super::runner::{PipelineRunner, Stages};
use super::state::SharedState;

pub(crate) const DESCRIPTION: &str = "Ada kursi di depan.";

#[derive(Default)]
pub(crate) struct MockCamera {
    calls: AtomicUsize,
    fail: AtomicBool,
    panic: AtomicBool,
}

impl MockCamera {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
    pub fn set_fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }
    pub fn set_panic(&self, on: bool) {
        self.panic.store(on, Ordering::SeqCst);
    }
}

impl FrameSource for MockCamera {
    fn capture(&self) -> Result<CapturedFrame, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic.load(Ordering::SeqCst) {
            panic!("camera driver crashed");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceUnavailable("no /dev/video0".into()));
        }
        Ok(CapturedFrame {
            path: PathBuf::from("captures/capture_test.jpg"),
            captured_at: SystemTime::now(),
        })
    }
}

pub(crate) struct MockDescriber {
    calls: AtomicUsize,
    response: Mutex<Option<String>>,
    panic: AtomicBool,
}

impl Default for MockDescriber {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(Some(DESCRIPTION.to_string())),
            panic: AtomicBool::new(false),
        }
    }
}

impl MockDescriber {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
    /// `None` makes the next calls fail with a timeout.
    pub fn set_response(&self, text: Option<&str>) {
        *self.response.lock().unwrap() = text.map(str::to_string);
    }
    pub fn set_panic(&self, on: bool) {
        self.panic.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl Describer for MockDescriber {
    async fn describe(&self, _frame: &CapturedFrame, _prompt: &str) -> Result<String, DescribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic.load(Ordering::SeqCst) {
            panic!("describer crashed");
        }
        let response = self.response.lock().unwrap().clone();
        response.ok_or(DescribeError::Timeout)
    }
}

#[derive(Default)]
pub(crate) struct MockSynth {
    loads: AtomicUsize,
    synths: AtomicUsize,
    fail_load: AtomicBool,
    fail_synth: AtomicBool,
    last_text: Mutex<Option<String>>,
}

impl MockSynth {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
    pub fn synths(&self) -> usize {
        self.synths.load(Ordering::SeqCst)
    }
    pub fn set_fail_load(&self, on: bool) {
        self.fail_load.store(on, Ordering::SeqCst);
    }
    pub fn set_fail_synth(&self, on: bool) {
        self.fail_synth.store(on, Ordering::SeqCst);
    }
    pub fn last_text(&self) -> Option<String> {
        self.last_text.lock().unwrap().clone()
    }
    pub fn audio_path(&self) -> PathBuf {
        PathBuf::from("audios/output_test.wav")
    }
}

impl Synthesizer for MockSynth {
    fn load_model(&self, model_path: &Path) -> Result<VoiceModel, SynthesisError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(SynthesisError::ModelNotFound(model_path.to_path_buf()));
        }
        Ok(VoiceModel {
            model_path: model_path.to_path_buf(),
            config_path: model_path.with_extension("onnx.json"),
            sample_rate: 22_050,
            num_speakers: 1,
            language: Some("id".into()),
        })
    }

    fn synthesize(&self, voice: &VoiceModel, text: &str) -> Result<Waveform, SynthesisError> {
        self.synths.fetch_add(1, Ordering::SeqCst);
        *self.last_text.lock().unwrap() = Some(text.to_string());
        if self.fail_synth.load(Ordering::SeqCst) {
            return Err(SynthesisError::EmptyAudio);
        }
        Ok(Waveform {
            path: self.audio_path(),
            sample_rate: voice.sample_rate,
            samples: 22_050,
        })
    }
}

/// Player that optionally blocks inside `play` until the test releases it.
#[derive(Default)]
pub(crate) struct MockPlayer {
    calls: AtomicUsize,
    fail: AtomicBool,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl MockPlayer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
    pub fn set_fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }
    /// Make every `play` wait for one message on the returned sender.
    /// Dropping the sender lets all remaining calls through.
    pub fn hold(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }
}

impl Player for MockPlayer {
    fn play(&self, _waveform: &Waveform) -> Result<(), PlaybackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            let _ = gate.recv();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlaybackError::Device("hw:1,19 busy".into()));
        }
        Ok(())
    }
}

/// One of each mock, shared with the runner under test.
#[derive(Default)]
pub(crate) struct Rig {
    pub camera: Arc<MockCamera>,
    pub describer: Arc<MockDescriber>,
    pub synthesizer: Arc<MockSynth>,
    pub player: Arc<MockPlayer>,
}

impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runner(&self, state: SharedState) -> PipelineRunner {
        let stages = Stages {
            camera: self.camera.clone(),
            describer: self.describer.clone(),
            synthesizer: self.synthesizer.clone(),
            player: self.player.clone(),
        };
        PipelineRunner::new(
            stages,
            "Apa yang kamu lihat?",
            "models/id_ID-news_tts-medium.onnx",
            state,
        )
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub(crate) async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
