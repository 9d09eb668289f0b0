//! FFmpeg 解码器 - ffprobe 读取元数据，ffmpeg 按时间点抽取单帧

use crate::core::error::{DecodeError, FrameDecodeError};
use crate::core::video::frame::{PixelLayout, RawFrame};
use crate::core::video::source::{VideoDecoder, VideoMetadata, VideoOpener, VideoSource};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const SPOOL_PREFIX: &str = "ai-video-detector-";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Where byte sources are spooled; the system temp dir when unset
    pub spool_dir: Option<PathBuf>,
    /// A single ffprobe / ffmpeg call is killed after this long
    pub frame_timeout_ms: u64,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            spool_dir: None,
            frame_timeout_ms: 30_000,
        }
    }
}

impl FfmpegConfig {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms.max(1))
    }
}

pub struct FfmpegOpener {
    config: FfmpegConfig,
}

impl FfmpegOpener {
    pub fn new() -> Self {
        Self::with_config(FfmpegConfig::default())
    }

    pub fn with_config(config: FfmpegConfig) -> Self {
        Self { config }
    }
}

impl Default for FfmpegOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoOpener for FfmpegOpener {
    type Decoder = FfmpegDecoder;

    fn open(&self, source: &VideoSource) -> Result<FfmpegDecoder, DecodeError> {
        let (path, spool) = match source {
            VideoSource::Path(path) => (path.clone(), None),
            VideoSource::Bytes(bytes) => {
                let mut builder = tempfile::Builder::new();
                builder.prefix(SPOOL_PREFIX).suffix(".video");
                let mut tmp = match &self.config.spool_dir {
                    Some(dir) => builder.tempfile_in(dir)?,
                    None => builder.tempfile()?,
                };
                tmp.write_all(bytes)?;
                tmp.flush()?;
                debug!("Spooled {} bytes to {:?}", bytes.len(), tmp.path());
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };

        if !path.exists() {
            return Err(DecodeError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("video not found: {}", path.display()),
            )));
        }

        let metadata = probe(&self.config.ffprobe_path, &path, self.config.timeout())?;
        info!(
            "📂 Opened {:?}: {}x{}, {:.3} fps, {} frames",
            path, metadata.width, metadata.height, metadata.frame_rate, metadata.frame_count
        );

        Ok(FfmpegDecoder {
            ffmpeg_path: self.config.ffmpeg_path.clone(),
            timeout: self.config.timeout(),
            path,
            metadata,
            _spool: spool,
        })
    }
}

/// 持有一个已探测的视频；字节源对应的临时文件随 Drop 一并删除
pub struct FfmpegDecoder {
    ffmpeg_path: PathBuf,
    timeout: Duration,
    path: PathBuf,
    metadata: VideoMetadata,
    _spool: Option<NamedTempFile>,
}

impl VideoDecoder for FfmpegDecoder {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_at(&mut self, timestamp_ms: u64) -> Result<RawFrame, FrameDecodeError> {
        let position = format!("{:.3}", timestamp_ms as f64 / 1000.0);
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-v", "error", "-nostdin", "-noautorotate", "-ss", &position, "-i"])
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);
        let output = output_within(&mut command, self.timeout)
            .map_err(|e| FrameDecodeError::new(timestamp_ms, format!("failed to run ffmpeg: {}", e)))?
            .ok_or_else(|| {
                warn!("⏱️ ffmpeg killed after {:?} at {}ms", self.timeout, timestamp_ms);
                FrameDecodeError::new(timestamp_ms, format!("ffmpeg timed out after {:?}", self.timeout))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameDecodeError::new(timestamp_ms, stderr.trim().to_string()));
        }
        if output.stdout.is_empty() {
            return Err(FrameDecodeError::new(timestamp_ms, "no frame at position"));
        }

        Ok(RawFrame::new(
            self.metadata.width,
            self.metadata.height,
            output.stdout,
            PixelLayout::Rgb24,
            timestamp_ms,
        ))
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        info!("🗑️ FfmpegDecoder: released {:?}", self.path);
    }
}

fn probe(ffprobe: &Path, path: &Path, timeout: Duration) -> Result<VideoMetadata, DecodeError> {
    let mut command = Command::new(ffprobe);
    command
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
            "--",
        ])
        .arg(path);
    let output = output_within(&mut command, timeout)
        .map_err(|source| DecodeError::ToolUnavailable {
            tool: ffprobe.display().to_string(),
            source,
        })?
        .ok_or_else(|| DecodeError::Probe(format!("ffprobe timed out after {:?}", timeout)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DecodeError::Probe(stderr.trim().to_string()));
    }

    parse_probe_output(&output.stdout)
}

/// Runs `command` to completion, killing it once `timeout` elapses.
/// `Ok(None)` means the child was killed.
fn output_within(command: &mut Command, timeout: Duration) -> std::io::Result<Option<Output>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    // pipes are drained on their own threads so a chatty child cannot fill them and stall
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(Output {
                status,
                stdout: collect(stdout),
                stderr: collect(stderr),
            }));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            // reader threads are left to finish on their own
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

pub(crate) fn parse_probe_output(json: &[u8]) -> Result<VideoMetadata, DecodeError> {
    let probe: ProbeOutput = serde_json::from_slice(json)?;
    let stream = probe.streams.first().ok_or(DecodeError::NoVideoStream)?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidFrameSize { width, height });
    }

    let frame_rate = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);

    // nb_frames is absent for some containers (e.g. webm); fall back to duration * fps
    let frame_count = match stream.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(count) => count,
        None => {
            let duration = stream
                .duration
                .as_deref()
                .or_else(|| probe.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0);
            (duration * frame_rate).round().max(0.0) as u64
        }
    };

    VideoMetadata::new(frame_rate, frame_count, width, height)
}

/// "30000/1001" → 29.97; "0/0" → None
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}
