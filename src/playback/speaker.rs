use std::fs::File;
use std::io::BufReader;

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::{PlaybackError, Player};
use crate::tts::Waveform;

/// Plays WAV files through `rodio`.
///
/// The output stream is opened per call and dropped afterwards, so no audio
/// device stays claimed between presses.
#[derive(Debug, Clone)]
pub struct RodioPlayer {
    device: Option<String>,
    volume: f32,
}

impl RodioPlayer {
    pub fn new(device: Option<String>, volume: f32) -> Self {
        Self { device, volume }
    }

    fn open_stream(&self) -> Result<(OutputStream, OutputStreamHandle), PlaybackError> {
        if let Some(wanted) = self.device.as_deref() {
            let host = cpal::default_host();
            let device = host
                .output_devices()
                .map_err(|e| PlaybackError::Device(e.to_string()))?
                .find(|d| d.name().map(|n| n.contains(wanted)).unwrap_or(false));

            match device {
                Some(dev) => {
                    log::debug!("playback: using output device {:?}", dev.name());
                    return OutputStream::try_from_device(&dev)
                        .map_err(|e| PlaybackError::Device(format!("{wanted}: {e}")));
                }
                None => log::warn!("playback: device {wanted:?} not found, using default"),
            }
        }
        OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))
    }
}

impl Player for RodioPlayer {
    fn play(&self, waveform: &Waveform) -> Result<(), PlaybackError> {
        let file = File::open(&waveform.path)
            .map_err(|_| PlaybackError::MissingFile(waveform.path.clone()))?;
        let source =
            Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode(e.to_string()))?;

        let (_stream, handle) = self.open_stream()?;
        let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Device(e.to_string()))?;
        sink.set_volume(self.volume);

        log::info!("playback: playing {}", waveform.path.display());
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

/// Names of all output devices on the default host.
pub fn list_output_devices() -> Result<Vec<String>, PlaybackError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}
