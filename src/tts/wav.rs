//! Raw PCM → WAV helpers backed by `hound`.

use std::path::Path;

use super::{SynthesisError, Waveform};

/// Decode little-endian signed 16-bit PCM.  A trailing odd byte is dropped.
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Write mono 16-bit PCM at `sample_rate` to `path`.
pub fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<(), SynthesisError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| SynthesisError::Wav(e.to_string()))?;
    for &s in samples {
        writer
            .write_sample(s)
            .map_err(|e| SynthesisError::Wav(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| SynthesisError::Wav(e.to_string()))
}

/// Describe an existing WAV file without loading its samples.
pub fn read_waveform(path: &Path) -> Result<Waveform, SynthesisError> {
    let reader = hound::WavReader::open(path).map_err(|e| SynthesisError::Wav(e.to_string()))?;
    let spec = reader.spec();
    Ok(Waveform {
        path: path.to_path_buf(),
        sample_rate: spec.sample_rate,
        samples: reader.duration() as usize,
    })
}
