//! Audio and video conversion through ffmpeg.

use nb_core::{Error, Result};

use crate::command::ToolCommand;
use crate::converter::ConversionRequest;
use crate::tools::ToolRegistry;

/// Palette-based GIF rendering at 10 fps, 480px wide.
const GIF_FILTER: &str =
    "fps=10,scale=480:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse";

/// Encoder arguments for an audio target.
pub fn audio_codec_args(target: &str) -> Result<&'static [&'static str]> {
    Ok(match target {
        "mp3" => &["-c:a", "libmp3lame", "-q:a", "2"],
        "wav" => &["-c:a", "pcm_s16le"],
        "ogg" => &["-c:a", "libvorbis", "-q:a", "5"],
        "flac" => &["-c:a", "flac"],
        "aac" => &["-c:a", "aac", "-b:a", "192k", "-f", "adts"],
        "m4a" => &["-c:a", "aac", "-b:a", "192k"],
        other => return Err(Error::unsupported("audio", other)),
    })
}

/// Encoder arguments for a video target.
pub fn video_codec_args(target: &str) -> Result<&'static [&'static str]> {
    Ok(match target {
        "mp4" | "mov" => &[
            "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p",
            "-c:a", "aac", "-b:a", "160k",
        ],
        "avi" => &["-c:v", "mpeg4", "-vtag", "xvid", "-q:v", "4", "-c:a", "libmp3lame"],
        "webm" => &[
            "-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "32", "-c:a", "libopus",
        ],
        "gif" => &["-filter_complex", GIF_FILTER, "-an", "-loop", "0"],
        other => return Err(Error::unsupported("video", other)),
    })
}

fn base_command(tools: &ToolRegistry, request: &ConversionRequest) -> Result<ToolCommand> {
    let ffmpeg = tools.require("ffmpeg")?;
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"])
        .arg(request.input.to_string_lossy());
    Ok(cmd)
}

pub async fn convert_audio(tools: &ToolRegistry, request: &ConversionRequest) -> Result<()> {
    let mut cmd = base_command(tools, request)?;
    cmd.arg("-vn")
        .args(audio_codec_args(&request.target_format)?.iter().copied())
        .arg(request.output.to_string_lossy());
    cmd.execute().await?;
    Ok(())
}

pub async fn convert_video(tools: &ToolRegistry, request: &ConversionRequest) -> Result<()> {
    let mut cmd = base_command(tools, request)?;
    cmd.args(video_codec_args(&request.target_format)?.iter().copied())
        .arg(request.output.to_string_lossy());
    cmd.execute().await?;
    Ok(())
}

/// Extract the first audio stream of a video.
pub async fn extract_audio(tools: &ToolRegistry, request: &ConversionRequest) -> Result<()> {
    let mut cmd = base_command(tools, request)?;
    cmd.args(["-vn", "-map", "0:a:0"])
        .args(audio_codec_args(&request.target_format)?.iter().copied())
        .arg(request.output.to_string_lossy());

    match cmd.execute().await {
        Ok(_) => Ok(()),
        Err(Error::Tool { message, .. }) if is_missing_audio(&message) => Err(Error::conversion(
            "audio_extract",
            "No audio track found in video",
        )),
        Err(e) => Err(e),
    }
}

fn is_missing_audio(stderr: &str) -> bool {
    stderr.contains("matches no streams") || stderr.contains("does not contain any stream")
}
