//! Recording to GIF conversion through ffmpeg and gifsicle.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

/// Quality parameters of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub fps: u32,
    pub width: u32,
    pub colors: u32,
    pub lossy: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            fps: 15,
            width: 800,
            colors: 256,
            lossy: 80,
        }
    }
}

fn ffmpeg_args(input: &Path, raw: &Path, options: &ConvertOptions) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        input.into(),
        "-vf".into(),
        format!("scale={}:-1:flags=lanczos", options.width).into(),
        "-r".into(),
        options.fps.to_string().into(),
        raw.into(),
    ]
}

fn gifsicle_args(raw: &Path, output: &Path, options: &ConvertOptions) -> Vec<OsString> {
    vec![
        "--optimize=3".into(),
        format!("--lossy={}", options.lossy).into(),
        "--colors".into(),
        options.colors.to_string().into(),
        raw.into(),
        "-o".into(),
        output.into(),
    ]
}

fn run_tool(program: &str, args: &[OsString]) -> Result<()> {
    debug!("Running {} {:?}", program, args);
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {} (is it installed?)", program))?;

    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Removes the scratch directory however the conversion ends.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn create() -> Result<Self> {
        let dir = std::env::temp_dir().join(format!("democast-gif-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create scratch directory {:?}", dir))?;
        Ok(Self(dir))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// Convert `input` to an optimized GIF at `output`; returns the size in bytes.
pub fn convert_to_gif(input: &Path, output: &Path, options: &ConvertOptions) -> Result<u64> {
    if !input.is_file() {
        bail!("Input file not found: {}", input.display());
    }

    let scratch = ScratchDir::create()?;
    let raw = scratch.0.join("raw.gif");

    info!("Rendering frames from {}", input.display());
    run_tool("ffmpeg", &ffmpeg_args(input, &raw, options))?;

    info!("Optimizing GIF into {}", output.display());
    run_tool("gifsicle", &gifsicle_args(&raw, output, options))?;

    let size = fs::metadata(output)
        .with_context(|| format!("Failed to stat {}", output.display()))?
        .len();
    info!("Created {} ({} KB)", output.display(), size / 1024);
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = ffmpeg_args(
            Path::new("in.webm"),
            Path::new("/tmp/x/raw.gif"),
            &ConvertOptions::default(),
        );
        assert_eq!(
            strings(args),
            vec![
                "-y",
                "-i",
                "in.webm",
                "-vf",
                "scale=800:-1:flags=lanczos",
                "-r",
                "15",
                "/tmp/x/raw.gif"
            ]
        );
    }

    #[test]
    fn test_gifsicle_args() {
        let options = ConvertOptions {
            colors: 128,
            lossy: 120,
            ..ConvertOptions::default()
        };
        let args = gifsicle_args(Path::new("raw.gif"), Path::new("out.gif"), &options);
        assert_eq!(
            strings(args),
            vec![
                "--optimize=3",
                "--lossy=120",
                "--colors",
                "128",
                "raw.gif",
                "-o",
                "out.gif"
            ]
        );
    }

    #[test]
    fn test_missing_input_fails_early() {
        let missing = std::env::temp_dir().join(format!("democast-{}.webm", uuid::Uuid::new_v4()));
        let err = convert_to_gif(&missing, Path::new("out.gif"), &ConvertOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("Input file not found"));
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let err = run_tool("democast-no-such-tool", &[]).unwrap_err();
        assert!(err.to_string().contains("democast-no-such-tool"));
    }
}
