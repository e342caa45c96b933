//! External transcoding toolchain (ffprobe + ffmpeg)

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use salingtau_core::constants::VARIANT_PLAYLIST_NAME;
use salingtau_core::Config;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::{PipelineError, PipelineResult};

/// Lines of ffmpeg stderr kept for the failure message
const STDERR_TAIL_LINES: usize = 20;

/// Probing and HLS segmenting of a local media file.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Height in pixels of the first video stream.
    async fn probe_height(&self, input: &Path) -> PipelineResult<u32>;

    /// Container duration in seconds.
    async fn probe_duration_seconds(&self, input: &Path) -> PipelineResult<f64>;

    /// Transcode `input` scaled to `resolution` lines into an HLS playlist
    /// (`index.m3u8`) and its segments inside `output_dir`.
    async fn segment(
        &self,
        input: &Path,
        output_dir: &Path,
        resolution: u32,
        segment_seconds: u32,
    ) -> PipelineResult<()>;
}

#[derive(Debug, Clone)]
pub struct FfmpegToolchain {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegToolchain {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ffmpeg_path(), config.ffprobe_path())
    }

    /// First line of `-version` for both binaries.
    pub async fn check(&self) -> PipelineResult<Vec<String>> {
        let mut versions = Vec::with_capacity(2);
        for binary in [&self.ffmpeg_path, &self.ffprobe_path] {
            let output = Command::new(binary)
                .arg("-version")
                .stdin(Stdio::null())
                .output()
                .await?;
            if !output.status.success() {
                return Err(PipelineError::Io(std::io::Error::other(format!(
                    "{} -version exited with {}",
                    binary, output.status
                ))));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            versions.push(stdout.lines().next().unwrap_or_default().to_string());
        }
        Ok(versions)
    }

    async fn run_probe(&self, input: &Path, args: &[&str]) -> PipelineResult<String> {
        let probe_failed = |reason: String| PipelineError::ProbeFailed {
            path: input.display().to_string(),
            reason,
        };

        let output = Command::new(&self.ffprobe_path)
            .args(args)
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| probe_failed(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(probe_failed(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MediaToolchain for FfmpegToolchain {
    #[tracing::instrument(skip(self))]
    async fn probe_height(&self, input: &Path) -> PipelineResult<u32> {
        let stdout = self
            .run_probe(
                input,
                &[
                    "-v",
                    "error",
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=height",
                    "-of",
                    "csv=s=x:p=0",
                ],
            )
            .await?;

        parse_height(&stdout).ok_or_else(|| PipelineError::ProbeFailed {
            path: input.display().to_string(),
            reason: format!("unexpected height output {:?}", stdout.trim()),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn probe_duration_seconds(&self, input: &Path) -> PipelineResult<f64> {
        let stdout = self
            .run_probe(
                input,
                &[
                    "-v",
                    "error",
                    "-show_entries",
                    "format=duration",
                    "-of",
                    "default=noprint_wrappers=1:nokey=1",
                ],
            )
            .await?;

        parse_duration(&stdout).ok_or_else(|| PipelineError::ProbeFailed {
            path: input.display().to_string(),
            reason: format!("unexpected duration output {:?}", stdout.trim()),
        })
    }

    #[tracing::instrument(skip(self, input, output_dir))]
    async fn segment(
        &self,
        input: &Path,
        output_dir: &Path,
        resolution: u32,
        segment_seconds: u32,
    ) -> PipelineResult<()> {
        let transcode_failed = |exit_code: Option<i32>, message: String| {
            PipelineError::TranscodeFailed {
                resolution,
                exit_code,
                message,
            }
        };

        let args = segment_args(input, output_dir, resolution, segment_seconds);
        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| transcode_failed(None, format!("failed to run ffmpeg: {}", e)))?;

        // Both pipes are drained while ffmpeg runs so it never blocks on a full pipe
        let stdout = child.stdout.take().map(|out| tokio::spawn(drain(out, 0)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(drain(err, STDERR_TAIL_LINES)));

        let status = child.wait().await?;

        if let Some(handle) = stdout {
            handle.await?;
        }
        let tail = match stderr {
            Some(handle) => handle.await?,
            None => Vec::new(),
        };

        if !status.success() {
            tracing::error!(
                resolution = resolution,
                exit_code = ?status.code(),
                "ffmpeg failed"
            );
            return Err(transcode_failed(status.code(), tail.join("\n")));
        }

        Ok(())
    }
}

/// Read a child pipe to the end, logging each line and returning the last
/// `keep` lines. Lines are split on raw bytes so output that is not UTF-8
/// (metadata echoed from the input) never stops the read.
async fn drain<R>(reader: R, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(keep);

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                tracing::debug!(target: "salingtau_processing::ffmpeg", "{}", line);
                if keep > 0 {
                    if tail.len() == keep {
                        tail.pop_front();
                    }
                    tail.push_back(line.to_string());
                }
            }
            Err(e) => {
                // The pipe itself failed; keep it drained so the child never blocks
                tracing::debug!(error = %e, "Failed to read ffmpeg output");
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    tracing::debug!(error = %e, "Stopped reading ffmpeg output");
                }
                break;
            }
        }
    }

    tail.into_iter().collect()
}

/// ffmpeg arguments for one HLS rendition.
pub fn segment_args(
    input: &Path,
    output_dir: &Path,
    resolution: u32,
    segment_seconds: u32,
) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("scale=-2:{}", resolution),
        "-c:a".to_string(),
        "aac".to_string(),
        "-ar".to_string(),
        "48000".to_string(),
        "-c:v".to_string(),
        "h264".to_string(),
        "-profile:v".to_string(),
        "main".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-g".to_string(),
        "48".to_string(),
        "-keyint_min".to_string(),
        "48".to_string(),
        "-hls_time".to_string(),
        segment_seconds.to_string(),
        "-hls_playlist_type".to_string(),
        "vod".to_string(),
        "-hls_segment_filename".to_string(),
        output_dir
            .join("segment-%03d.ts")
            .to_string_lossy()
            .to_string(),
        output_dir
            .join(VARIANT_PLAYLIST_NAME)
            .to_string_lossy()
            .to_string(),
    ]
}

/// `1080x` / `1080` style ffprobe csv output; zero is rejected.
pub fn parse_height(output: &str) -> Option<u32> {
    let line = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    let field = line.split('x').next()?.trim();
    match field.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(height) => Some(height),
    }
}

/// Positive, finite seconds.
pub fn parse_duration(output: &str) -> Option<f64> {
    let seconds = output.trim().parse::<f64>().ok()?;
    (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}
