use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::shared::frame::Frame;

/// Back-off when a non-blocking device has no packet ready.
const RETRY_DELAY: Duration = Duration::from_millis(5);

/// Live camera (or any stream ffmpeg can open) decoded to RGB24 frames.
///
/// `device` is a device node, URL or file. When `input_format` is set
/// (e.g. `video4linux2`, `avfoundation`, `dshow`) it selects a libavdevice
/// demuxer instead of probing.
pub struct FfmpegCamera {
    device: String,
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    frame_index: usize,
    flushing: bool,
}

// Safety: FfmpegCamera is owned by the capture loop thread only.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn open(device: &str, input_format: Option<&str>) -> Result<Self, CaptureError> {
        let open_error = |message: String| CaptureError::Open {
            device: device.to_string(),
            message,
        };

        ffmpeg_next::init().map_err(|e| open_error(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let input_ctx = match input_format {
            Some(name) => {
                let format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == name)
                    .ok_or_else(|| open_error(format!("input format '{name}' is not available")))?;
                match ffmpeg_next::format::open(Path::new(device), &format)
                    .map_err(|e| open_error(e.to_string()))?
                {
                    ffmpeg_next::format::context::Context::Input(ctx) => ctx,
                    ffmpeg_next::format::context::Context::Output(_) => {
                        return Err(open_error("opened as an output".into()))
                    }
                }
            }
            None => ffmpeg_next::format::input(Path::new(device))
                .map_err(|e| open_error(e.to_string()))?,
        };

        let stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| open_error("no video stream found".into()))?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_error(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| open_error(e.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| open_error(e.to_string()))?;

        log::info!("Opened camera {device} ({width}x{height})");

        Ok(Self {
            device: device.to_string(),
            input_ctx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            frame_index: 0,
            flushing: false,
        })
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| CaptureError::Read(e.to_string()))?;

        let pixels = packed_rgb(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

impl FrameSource for FfmpegCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            return Ok(None);
        }

        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match classify_read(packet.read(&mut self.input_ctx)) {
                Ok(PacketRead::Ready) => {}
                Ok(PacketRead::Again) => {
                    thread::sleep(RETRY_DELAY);
                    continue;
                }
                Ok(PacketRead::End) => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                    return self.try_receive();
                }
                Err(e) => {
                    log::error!("Camera {} failed: {e}", self.device);
                    return Err(e);
                }
            }

            if packet.stream() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet from {}: {e}", self.device);
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }
}

enum PacketRead {
    Ready,
    Again,
    End,
}

/// A device that is unplugged keeps failing its reads, so anything other
/// than end of stream or "try again" is fatal.
fn classify_read(result: Result<(), ffmpeg_next::Error>) -> Result<PacketRead, CaptureError> {
    match result {
        Ok(()) => Ok(PacketRead::Ready),
        Err(ffmpeg_next::Error::Eof) => Ok(PacketRead::End),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
            Ok(PacketRead::Again)
        }
        Err(e) => Err(CaptureError::Read(e.to_string())),
    }
}

/// Copies an RGB24 ffmpeg frame into a buffer without row padding.
fn packed_rgb(rgb_frame: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
