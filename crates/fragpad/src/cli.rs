use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Live fragment shader pad: edit GLSL, watch it hot-swap.
#[derive(Debug, Parser)]
#[command(name = "fragpad", version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Sketch name to load from the sketchbook (created if missing).
    pub sketch: Option<String>,

    /// Render a shader file directly instead of a stored sketch; edits to
    /// the file hot-swap the running program.
    #[arg(long, value_name = "PATH", conflicts_with = "sketch")]
    pub file: Option<PathBuf>,

    /// Resolution scale applied to the drawable (0.1 to 1.0).
    #[arg(long)]
    pub scale: Option<f32>,

    /// Quiescence window before an edited source is recompiled.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Cap the redraw rate; uncapped when omitted.
    #[arg(long)]
    pub fps: Option<u32>,

    /// Initial window size as WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the sketches owned by this installation's namespace.
    List,
}

fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {raw:?}"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width {width:?}"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height {height:?}"))?;
    if width == 0 || height == 0 {
        return Err("window size must be non-zero".to_owned());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sketch_name() {
        let cli = Cli::parse_from(["fragpad", "plasma"]);
        assert_eq!(cli.sketch.as_deref(), Some("plasma"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_list_subcommand() {
        let cli = Cli::parse_from(["fragpad", "list"]);
        assert!(matches!(cli.command, Some(Command::List)));
    }

    #[test]
    fn parses_size_pairs() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("640X480"), Ok((640, 480)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
    }

    #[test]
    fn file_and_sketch_are_exclusive() {
        let result = Cli::try_parse_from(["fragpad", "plasma", "--file", "a.glsl"]);
        assert!(result.is_err());
    }
}
