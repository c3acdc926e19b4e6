use anyhow::{Context, Result};
use edit_engine::{OperationError, PrimitiveOperations, TextStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::filters::map_filter_description;
use crate::config::DaemonConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
    pub has_video: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ProbeOutput {
    format: Option<FormatInfo>,
    #[serde(default)]
    streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

impl ProbeOutput {
    fn into_info(self) -> MediaInfo {
        let duration_secs = self
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let video = self
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));

        MediaInfo {
            duration_secs,
            width: video.and_then(|v| v.width).unwrap_or(0),
            height: video.and_then(|v| v.height).unwrap_or(0),
            has_audio: self
                .streams
                .iter()
                .any(|s| s.codec_type.as_deref() == Some("audio")),
            has_video: video.is_some(),
        }
    }
}

/// Primitive edits backed by the ffmpeg and ffprobe binaries.
///
/// Calls block until ffmpeg exits; the daemon runs whole plans on a blocking
/// thread.
pub struct FfmpegOperations {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    output_dir: PathBuf,
}

impl FfmpegOperations {
    pub fn new(config: &DaemonConfig) -> Self {
        FfmpegOperations {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            ffprobe_bin: config.ffprobe_bin.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn probe(&self, media_path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_type,width,height",
                "-of",
                "json",
            ])
            .arg(media_path)
            .output()
            .context("Failed to execute ffprobe. Make sure FFmpeg is installed.")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed: {}", stderr.trim());
        }

        let probe_output: ProbeOutput =
            serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe JSON output")?;
        Ok(probe_output.into_info())
    }

    fn inspect(&self, media_path: &Path) -> Result<MediaInfo, OperationError> {
        self.probe(media_path).map_err(|e| {
            OperationError::rejected(format!("could not read {}: {:#}", file_name(media_path), e))
        })
    }

    fn output_path(&self, input: &Path, suffix: &str, ext: &str) -> PathBuf {
        self.output_dir.join(output_file_name(input, suffix, ext))
    }

    fn ffmpeg(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"]);
        cmd
    }

    /// Run a prepared ffmpeg command that writes `output`. A failed run
    /// leaves no file behind.
    fn execute(&self, mut cmd: Command, output: PathBuf) -> Result<PathBuf, OperationError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            OperationError::rejected(format!(
                "could not create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        cmd.arg(&output);
        debug!("[FFmpeg] {:?}", cmd);

        let result = cmd
            .output()
            .map_err(|e| OperationError::rejected(format!("could not start ffmpeg ({}): {}", self.ffmpeg_bin, e)))?;

        if !result.status.success() {
            let _ = std::fs::remove_file(&output);
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            warn!("[FFmpeg] Failed writing {}: {}", output.display(), reason);
            return Err(OperationError::rejected(format!("ffmpeg failed: {}", reason)));
        }

        info!("[FFmpeg] Wrote {}", output.display());
        Ok(output)
    }

    fn require_audio(&self, media_path: &Path) -> Result<MediaInfo, OperationError> {
        let info = self.inspect(media_path)?;
        if !info.has_audio {
            return Err(OperationError::rejected(format!(
                "{} has no audio track",
                file_name(media_path)
            )));
        }
        Ok(info)
    }
}

impl PrimitiveOperations for FfmpegOperations {
    fn trim(&self, video: &Path, start: f64, end: Option<f64>) -> Result<PathBuf, OperationError> {
        let info = self.inspect(video)?;
        if start >= info.duration_secs {
            return Err(OperationError::rejected(format!(
                "start time {}s is beyond the video's length of {:.2}s",
                start, info.duration_secs
            )));
        }
        let end = match end {
            Some(end) if end > info.duration_secs => {
                warn!(
                    "[FFmpeg] Trim end {}s past the end of {}, clamping to {:.2}s",
                    end,
                    file_name(video),
                    info.duration_secs
                );
                info.duration_secs
            }
            Some(end) => end,
            None => info.duration_secs,
        };

        let output = self.output_path(video, "trimmed", "mp4");
        let mut cmd = self.ffmpeg();
        cmd.arg("-ss")
            .arg(format!("{:.3}", start))
            .arg("-i")
            .arg(video)
            .arg("-t")
            .arg(format!("{:.3}", end - start))
            .args(["-c:v", "libx264", "-preset", "veryfast", "-c:a", "aac"]);
        self.execute(cmd, output)
    }

    fn add_text(
        &self,
        video: &Path,
        text: &str,
        start: f64,
        duration: f64,
        position: &str,
        style: &TextStyle,
    ) -> Result<PathBuf, OperationError> {
        let filter = drawtext_filter(text, start, duration, position, style)?;
        let info = self.inspect(video)?;
        if start >= info.duration_secs {
            return Err(OperationError::rejected(format!(
                "text start time {}s is beyond the video's length of {:.2}s",
                start, info.duration_secs
            )));
        }

        let output = self.output_path(video, "text", "mp4");
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(filter)
            .args(["-c:v", "libx264", "-preset", "veryfast", "-c:a", "copy"]);
        self.execute(cmd, output)
    }

    fn apply_filter(&self, video: &Path, filter_description: &str) -> Result<PathBuf, OperationError> {
        let spec = map_filter_description(filter_description)?;
        let info = self.inspect(video)?;

        let output = self.output_path(video, "filtered", "mp4");
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(spec.to_vf(info.duration_secs))
            .args(["-c:v", "libx264", "-preset", "veryfast", "-c:a", "copy"]);
        self.execute(cmd, output)
    }

    fn change_speed(&self, video: &Path, factor: f64) -> Result<PathBuf, OperationError> {
        let info = self.inspect(video)?;

        let output = self.output_path(video, "speed", "mp4");
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(video)
            .arg("-filter:v")
            .arg(format!("setpts=PTS/{}", factor));
        if info.has_audio {
            cmd.arg("-filter:a").arg(atempo_chain(factor));
        } else {
            cmd.arg("-an");
        }
        cmd.args(["-c:v", "libx264", "-preset", "veryfast"]);
        self.execute(cmd, output)
    }

    fn concatenate(&self, videos: &[&Path]) -> Result<PathBuf, OperationError> {
        let first = videos
            .first()
            .ok_or_else(|| OperationError::rejected("no videos to concatenate"))?;
        let infos = videos
            .iter()
            .map(|v| self.inspect(v))
            .collect::<Result<Vec<_>, _>>()?;

        // Every clip is scaled onto the first clip's frame
        let (width, height) = match (infos[0].width, infos[0].height) {
            (0, _) | (_, 0) => (1280, 720),
            (w, h) => (w, h),
        };
        let with_audio = infos.iter().all(|i| i.has_audio);
        if !with_audio {
            warn!("[FFmpeg] Not every clip has audio, concatenating video only");
        }

        let output = self.output_path(first, "concatenated", "mp4");
        let mut cmd = self.ffmpeg();
        for video in videos {
            cmd.arg("-i").arg(video);
        }
        cmd.arg("-filter_complex")
            .arg(concat_filter(videos.len(), width, height, with_audio))
            .args(["-map", "[outv]"]);
        if with_audio {
            cmd.args(["-map", "[outa]", "-c:a", "aac"]);
        }
        cmd.args(["-c:v", "libx264", "-preset", "veryfast"]);
        self.execute(cmd, output)
    }

    fn extract_audio(&self, video: &Path) -> Result<PathBuf, OperationError> {
        self.require_audio(video)?;

        let output = self.output_path(video, "audio", "mp3");
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(video)
            .args(["-vn", "-acodec", "libmp3lame", "-q:a", "2"]);
        self.execute(cmd, output)
    }

    fn attach_audio(&self, video: &Path, audio: &Path) -> Result<PathBuf, OperationError> {
        self.inspect(video)?;
        self.require_audio(audio)?;

        let output = self.output_path(video, "with_audio", "mp4");
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", "aac", "-shortest"]);
        self.execute(cmd, output)
    }

    fn transfer_audio(&self, source: &Path, destination: &Path) -> Result<PathBuf, OperationError> {
        self.require_audio(source)?;
        self.inspect(destination)?;

        let output = self.output_path(destination, "new_audio", "mp4");
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(destination)
            .arg("-i")
            .arg(source)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", "aac", "-shortest"]);
        self.execute(cmd, output)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// `<stem>_<suffix>_<8 hex>.<ext>`
fn output_file_name(input: &Path, suffix: &str, ext: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "media".to_string());
    let token = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}.{}", stem, suffix, &token[..8], ext)
}

/// atempo accepts 0.5..=2.0 per instance, so larger changes are chained.
fn atempo_chain(factor: f64) -> String {
    let mut remaining = factor;
    let mut stages = Vec::new();
    while remaining > 2.0 {
        stages.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    stages.push(format!("atempo={:.4}", remaining));
    stages.join(",")
}

fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\u{2019}"),
            '%' => escaped.push_str("\\%"),
            ',' => escaped.push_str("\\,"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn text_position(position: &str) -> (&'static str, &'static str) {
    let position = position.trim().to_lowercase().replace(|c: char| c == '-' || c == '_', " ");
    let x = if position.contains("left") {
        "w*0.05"
    } else if position.contains("right") {
        "w-text_w-w*0.05"
    } else {
        "(w-text_w)/2"
    };
    let y = if position.contains("top") {
        "h*0.08"
    } else if position.contains("bottom") {
        "h-text_h-h*0.08"
    } else {
        "(h-text_h)/2"
    };
    (x, y)
}

// Names like `white`, hex like `#ff0000` or `0xff0000`, optional `@alpha`.
fn font_color(color: &str) -> Result<&str, OperationError> {
    let color = color.trim();
    let valid = !color.is_empty()
        && color
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '.'));
    if valid {
        Ok(color)
    } else {
        Err(OperationError::rejected(format!("'{}' is not a text color", color)))
    }
}

fn drawtext_filter(
    text: &str,
    start: f64,
    duration: f64,
    position: &str,
    style: &TextStyle,
) -> Result<String, OperationError> {
    let (x, y) = text_position(position);
    Ok(format!(
        "drawtext=text='{}':fontsize={}:fontcolor={}:x={}:y={}:enable='between(t,{:.3},{:.3})'",
        escape_drawtext(text),
        style.font_size,
        font_color(&style.color)?,
        x,
        y,
        start,
        start + duration
    ))
}

fn concat_filter(count: usize, width: u32, height: u32, with_audio: bool) -> String {
    let mut graph = String::new();
    let mut labels = String::new();
    for i in 0..count {
        graph.push_str(&format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps=30[v{i}];",
            i = i,
            w = width,
            h = height
        ));
        labels.push_str(&format!("[v{}]", i));
        if with_audio {
            graph.push_str(&format!("[{i}:a]aresample=44100[a{i}];", i = i));
            labels.push_str(&format!("[a{}]", i));
        }
    }
    if with_audio {
        graph.push_str(&format!("{}concat=n={}:v=1:a=1[outv][outa]", labels, count));
    } else {
        graph.push_str(&format!("{}concat=n={}:v=1:a=0[outv]", labels, count));
    }
    graph
}
