//! WAV encoding of finalized clips.

use crate::defaults;
use crate::error::{IntervoxError, Result};
use crate::session::clip::Clip;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The persisted byte encoding of a clip, shared by reference between the
/// transcription job and the generation call. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct EncodedClip {
    pub id: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    /// Duration of the audio content.
    pub duration: Duration,
}

/// Encodes a clip's samples as 16-bit PCM WAV, in memory.
pub fn encode_clip(clip: &Clip) -> Result<EncodedClip> {
    let spec = hound::WavSpec {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| IntervoxError::AudioEncode {
                message: format!("Failed to create WAV writer: {}", e),
            })?;
        for &sample in &clip.samples {
            writer
                .write_sample(sample)
                .map_err(|e| IntervoxError::AudioEncode {
                    message: format!("Failed to write WAV sample: {}", e),
                })?;
        }
        writer.finalize().map_err(|e| IntervoxError::AudioEncode {
            message: format!("Failed to finalize WAV data: {}", e),
        })?;
    }

    Ok(EncodedClip {
        id: clip.id.clone(),
        mime_type: defaults::WAV_MIME,
        bytes: cursor.into_inner(),
        duration: clip.duration(),
    })
}

/// Writes the encoded clip to `<dir>/<id>.wav`, creating the directory if
/// needed. Returns the written path.
pub fn persist_clip(encoded: &EncodedClip, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.wav", encoded.id));
    std::fs::write(&path, &encoded.bytes)?;
    Ok(path)
}
