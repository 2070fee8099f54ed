//! vkquad demo
//!
//! Opens a window and draws a red/green/blue/white quad spinning about the
//! Z axis at 90°/s, rebuilding the swapchain whenever the window is resized
//! or minimized and restored.
//!
//! ## Usage
//!
//! ```bash
//! glslc apps/vkquad-demo/shaders/quad.vert -o apps/vkquad-demo/shaders/quad.vert.spv
//! glslc apps/vkquad-demo/shaders/quad.frag -o apps/vkquad-demo/shaders/quad.frag.spv
//! cargo run -p vkquad-demo -- [OPTIONS]
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod cli;

use vkquad_app::{init_tracing, run};

use crate::cli::CliArgs;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::from_env();
    if args.help {
        print_help();
        return Ok(());
    }

    run(args.into_config())
}

fn print_help() {
    eprintln!(
        "vkquad demo: a spinning quad rendered with Vulkan

USAGE:
    cargo run -p vkquad-demo -- [OPTIONS]

OPTIONS:
    --width <N>             Initial window width (default: 800)
    --height <N>            Initial window height (default: 600)
    --vsync                 Force FIFO presentation
    --validation            Enable Vulkan validation layers
    --no-validation         Disable Vulkan validation layers
                            Default: enabled in debug builds only
    --shader-dir <DIR>      Directory holding quad.vert.spv and quad.frag.spv
                            Default: the crate's shaders/ directory
    --target-fps <N>        Cap the frame rate (default: unlimited)
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
