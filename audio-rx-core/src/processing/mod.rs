pub mod frame_processor;
pub mod ring_buffer;
pub mod sample_convert;
pub mod volume;
pub mod wav_format;
