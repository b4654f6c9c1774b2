//! 测试用的内存 WAV 数据源

use std::io::Cursor;

use symphonia::core::probe::Hint;

use crate::{AudioDecoder, OpenedSource};

/// 单声道 16 位 PCM WAV
fn wav_bytes(sample_rate: u32, frames: u32) -> Vec<u8> {
    let data_len = frames * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames {
        let sample = ((i % 100) as i16 - 50) * 200;
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

pub(crate) fn open_wav(sample_rate: u32, frames: u32) -> AudioDecoder {
    let mut hint = Hint::new();
    hint.with_extension("wav");
    AudioDecoder::open(OpenedSource {
        source: Box::new(Cursor::new(wav_bytes(sample_rate, frames))),
        hint,
    })
    .unwrap()
}
