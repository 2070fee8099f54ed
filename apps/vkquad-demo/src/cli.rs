//! Command line options.

use std::num::NonZeroU32;
use std::path::PathBuf;

use tracing::warn;
use vkquad_app::AppConfig;

/// Options accepted on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub validation: bool,
    pub shader_dir: PathBuf,
    pub target_fps: Option<u32>,
    pub help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            vsync: false,
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders")),
            target_fps: None,
            help: false,
        }
    }
}

impl CliArgs {
    /// Parse from the process arguments.
    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    /// Parse options, skipping anything unrecognized.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--width" => {
                    if let Some(v) = number(&arg, args.next()) {
                        parsed.width = v;
                    }
                }
                "--height" => {
                    if let Some(v) = number(&arg, args.next()) {
                        parsed.height = v;
                    }
                }
                "--target-fps" => {
                    if let Some(v) = number(&arg, args.next()) {
                        parsed.target_fps = Some(v);
                    }
                }
                "--shader-dir" => match args.next() {
                    Some(dir) => parsed.shader_dir = PathBuf::from(dir),
                    None => warn!("--shader-dir needs a path"),
                },
                "--vsync" => parsed.vsync = true,
                "--validation" => parsed.validation = true,
                "--no-validation" => parsed.validation = false,
                "-h" | "--help" => parsed.help = true,
                other => warn!("Ignoring unknown argument '{other}'"),
            }
        }

        parsed
    }

    /// Application configuration for these options.
    pub fn into_config(self) -> AppConfig {
        let mut config = AppConfig::new("vkquad")
            .with_size(self.width, self.height)
            .with_vsync(self.vsync)
            .with_validation(self.validation)
            .with_shader_dir(&self.shader_dir);
        if let Some(fps) = self.target_fps {
            config = config.with_target_fps(fps);
        }
        config
    }
}

fn number(flag: &str, value: Option<String>) -> Option<u32> {
    let parsed = value
        .as_deref()
        .and_then(|v| v.parse::<NonZeroU32>().ok())
        .map(NonZeroU32::get);
    if parsed.is_none() {
        warn!("{flag} needs a positive integer, got {value:?}");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_gives_defaults() {
        let args = CliArgs::parse(Vec::<String>::new());
        assert_eq!(args, CliArgs::default());
        assert_eq!((args.width, args.height), (800, 600));
    }

    #[test]
    fn parses_every_option() {
        let args = CliArgs::parse([
            "--width",
            "1024",
            "--height",
            "768",
            "--vsync",
            "--no-validation",
            "--shader-dir",
            "/tmp/spv",
            "--target-fps",
            "144",
        ]);

        assert_eq!((args.width, args.height), (1024, 768));
        assert!(args.vsync);
        assert!(!args.validation);
        assert_eq!(args.shader_dir, PathBuf::from("/tmp/spv"));
        assert_eq!(args.target_fps, Some(144));
        assert!(!args.help);
    }

    #[test]
    fn last_validation_flag_wins() {
        assert!(CliArgs::parse(["--no-validation", "--validation"]).validation);
        assert!(!CliArgs::parse(["--validation", "--no-validation"]).validation);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let args = CliArgs::parse(["--width", "wide", "--bogus", "--height"]);
        assert_eq!((args.width, args.height), (800, 600));
    }

    #[test]
    fn zero_values_are_rejected() {
        let args = CliArgs::parse(["--width", "0", "--height", "0", "--target-fps", "0"]);
        assert_eq!((args.width, args.height), (800, 600));
        assert_eq!(args.target_fps, None);
    }

    #[test]
    fn help_flag_is_detected() {
        assert!(CliArgs::parse(["-h"]).help);
        assert!(CliArgs::parse(["--vsync", "--help"]).help);
    }

    #[test]
    fn config_reflects_arguments() {
        let config = CliArgs::parse(["--width", "320", "--target-fps", "30", "--shader-dir", "spv"])
            .into_config();
        assert_eq!((config.width, config.height), (320, 600));
        assert_eq!(config.target_fps, Some(30));
        assert_eq!(config.vertex_shader, PathBuf::from("spv/quad.vert.spv"));
        assert_eq!(config.fragment_shader, PathBuf::from("spv/quad.frag.spv"));
    }
}
