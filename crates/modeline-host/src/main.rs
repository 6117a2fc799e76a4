//! modeline-host command-line entry point.
//!
//! Opens the X display, builds a [`ResolutionManager`] from the configuration
//! file and runs one command against it.
//!
//! # Usage
//!
//! ```text
//! modeline-host [OPTIONS] <COMMAND>
//!
//! Commands:
//!   probe     Report whether RandR resizing is usable
//!   current   Print the current screen size
//!   sizes     List the static size table
//!   set       Switch to a listed size
//!   add       Synthesize and register modes
//!   resize    Switch to any size, synthesizing a mode if needed
//!   remove    Destroy modes synthesized earlier in the session
//!   release   Destroy every mode synthesized in the session
//!   refresh   Print refresh rates
//!   modeline  Print the synthesized modeline for sizes (no display needed)
//!   info      Print extension version, screen count and physical size
//!   shell     Read commands from stdin, one per line
//! ```
//!
//! Synthesized modes stay on the server after the process exits unless
//! `--release-on-exit` is given.  Inside `shell` the mode cache lives for the
//! whole session, so `remove`, `release` and cache eviction apply to modes
//! added earlier in it.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use modeline_core::{synthesize, ModeKey};
use modeline_host::application::display_server::DisplayServer;
use modeline_host::application::resolution_manager::ResolutionManager;
use modeline_host::infrastructure::reporting::TracingReporter;
use modeline_host::infrastructure::storage::config::HostConfig;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// On-demand screen resolutions for virtual X11 displays.
#[derive(Debug, Parser)]
#[command(
    name = "modeline-host",
    about = "On-demand screen resolutions for virtual X11 displays via RandR mode synthesis",
    version
)]
struct Cli {
    /// Configuration file, which must exist.  Defaults to
    /// `$XDG_CONFIG_HOME/modeline/config.toml`, which may be absent.
    #[arg(long, env = "MODELINE_CONFIG")]
    config: Option<PathBuf>,

    /// X display to connect to, e.g. `:1`.
    #[arg(long, env = "DISPLAY")]
    display: Option<String>,

    /// Destroy synthesized modes before exiting.
    #[arg(long)]
    release_on_exit: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Report whether RandR resizing is usable on this display.
    Probe,
    /// Print the current screen size.
    Current,
    /// List the static size table (`*` current, `+` synthesized).
    Sizes,
    /// Switch to a size from the static table.
    Set { size: ModeKey },
    /// Synthesize and register modes without switching to them.
    #[command(arg_required_else_help = true)]
    Add { sizes: Vec<ModeKey> },
    /// Switch to any size, synthesizing a mode when it is not listed.
    Resize { size: ModeKey },
    /// Detach and destroy modes synthesized earlier in the session.
    #[command(arg_required_else_help = true)]
    Remove { sizes: Vec<ModeKey> },
    /// Detach and destroy every mode synthesized in the session.
    Release,
    /// Print the effective and per-output refresh rates.
    Refresh,
    /// Print the synthesized modeline for each size.
    #[command(arg_required_else_help = true)]
    Modeline { sizes: Vec<ModeKey> },
    /// Print extension version, screen count and physical size.
    Info,
    /// Read commands from stdin, one per line, until EOF or `quit`.
    Shell,
}

/// One line of `shell` input.
#[derive(Debug, Parser)]
#[command(no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

// ── Command execution ─────────────────────────────────────────────────────────

/// Prints modelines; needs no display connection.
fn print_modelines(sizes: &[ModeKey], out: &mut impl Write) -> anyhow::Result<()> {
    let mut failed = 0;
    for key in sizes {
        match synthesize(key.width, key.height) {
            Ok(timing) => {
                let refresh = timing.refresh_hz().unwrap_or(0);
                writeln!(out, "Modeline {}  # {refresh} Hz", timing.modeline())?;
            }
            Err(e) => {
                failed += 1;
                writeln!(out, "# {key}: {e}")?;
            }
        }
    }
    if failed == sizes.len() {
        bail!("no modeline could be synthesized");
    }
    Ok(())
}

/// Runs one command against `manager`, writing results to `out`.
fn run_command(
    manager: &mut ResolutionManager,
    command: &Command,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Probe => {
            writeln!(out, "{}", manager.capability().describe())?;
            writeln!(out, "resizing: {}", if manager.can_resize() { "available" } else { "unavailable" })?;
        }
        Command::Current => {
            let (w, h) = manager.current_size().context("current screen size unavailable")?;
            writeln!(out, "{w}x{h}")?;
        }
        Command::Sizes => {
            let current = manager.current_size();
            let synthesized = manager.cached_sizes();
            for size in manager.list_sizes() {
                let mark = match (Some(size) == current, synthesized.contains(&size)) {
                    (true, _) => '*',
                    (false, true) => '+',
                    (false, false) => ' ',
                };
                writeln!(out, "{mark} {}", ModeKey::from(size))?;
            }
        }
        Command::Set { size } => {
            manager
                .set_size(size.width, size.height)
                .with_context(|| format!("cannot switch to {size}"))?;
            writeln!(out, "screen set to {size}")?;
        }
        Command::Add { sizes } => {
            for key in sizes {
                let added = manager
                    .try_add_size(key.width, key.height)
                    .with_context(|| format!("cannot add {key}"))?;
                writeln!(out, "added {}", ModeKey::from(added))?;
            }
        }
        Command::Resize { size } => {
            let now = manager
                .resize_to(size.width, size.height)
                .with_context(|| format!("cannot resize to {size}"))?;
            writeln!(out, "screen set to {}", ModeKey::from(now))?;
        }
        Command::Remove { sizes } => {
            for key in sizes {
                let removed = manager
                    .remove_size(key.width, key.height)
                    .with_context(|| format!("cannot remove {key}"))?;
                if removed {
                    writeln!(out, "removed {key}")?;
                } else {
                    writeln!(out, "{key} was not added in this session")?;
                }
            }
        }
        Command::Release => {
            let count = manager.cached_sizes().len();
            let failures = manager.release_all();
            writeln!(out, "released {} of {count} modes", count - failures)?;
        }
        Command::Refresh => {
            match manager.refresh_rate() {
                Some(hz) => writeln!(out, "refresh: {hz} Hz")?,
                None => writeln!(out, "refresh: unknown")?,
            }
            for (output, hz) in manager.per_output_refresh_rates() {
                writeln!(out, "  {output}: {hz} Hz")?;
            }
        }
        Command::Modeline { sizes } => print_modelines(sizes, out)?,
        Command::Info => {
            match manager.extension_version() {
                Some((major, minor)) => writeln!(out, "RandR: {major}.{minor}")?,
                None => writeln!(out, "RandR: not present")?,
            }
            if let Some(count) = manager.screen_count() {
                writeln!(out, "screens: {count}")?;
            }
            if let Some((w, h)) = manager.current_size() {
                writeln!(out, "size: {w}x{h}")?;
            }
            if let Some((w, h)) = manager.physical_size_mm() {
                writeln!(out, "physical: {w}mm x {h}mm")?;
            }
            writeln!(out, "synthesized modes: {}", manager.cached_sizes().len())?;
        }
        Command::Shell => bail!("already in a shell"),
    }
    Ok(())
}

/// Reads commands from `input` until EOF or `quit`.  Errors are printed and
/// the session continues.
fn run_shell(
    manager: &mut ResolutionManager,
    input: impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line.context("failed to read command")?;
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] => break,
            _ => {}
        }
        match ShellLine::try_parse_from(words.iter().copied()) {
            Ok(parsed) => {
                if let Err(e) = run_command(manager, &parsed.command, out) {
                    writeln!(out, "error: {e:#}")?;
                }
            }
            Err(e) => writeln!(out, "{}", e.render())?,
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_display(name: Option<&str>) -> anyhow::Result<Arc<dyn DisplayServer>> {
    use modeline_host::infrastructure::display_server::NativeDisplayServer;

    let display = NativeDisplayServer::open(name).context("cannot connect to the X server")?;
    Ok(Arc::new(display))
}

#[cfg(not(target_os = "linux"))]
fn open_display(_name: Option<&str>) -> anyhow::Result<Arc<dyn DisplayServer>> {
    bail!("no native display backend for this platform")
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = HostConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();
    debug!(?config, "configuration loaded");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Command::Modeline { sizes } = &cli.command {
        return print_modelines(sizes, &mut out);
    }

    let display = open_display(cli.display.as_deref())?;
    let mut manager = ResolutionManager::new(
        display,
        Arc::new(TracingReporter::new()),
        config.resize_settings(),
    )
    .context("invalid resize settings")?;

    let result = match &cli.command {
        Command::Shell => run_shell(&mut manager, io::stdin().lock(), &mut out),
        command => run_command(&mut manager, command, &mut out),
    };

    if cli.release_on_exit {
        let failures = manager.release_all();
        info!(failures, "released synthesized modes");
    }
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use modeline_host::application::resolution_manager::ResizeSettings;
    use modeline_host::infrastructure::display_server::mock::MockDisplayServer;

    fn manager(display: MockDisplayServer) -> ResolutionManager {
        ResolutionManager::new(
            Arc::new(display),
            Arc::new(TracingReporter::new()),
            ResizeSettings::default(),
        )
        .expect("manager")
    }

    fn output(manager: &mut ResolutionManager, command: Command) -> String {
        let mut out = Vec::new();
        run_command(manager, &command, &mut out).expect("command");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn test_cli_parses_size_arguments() {
        let cli = Cli::parse_from(["modeline-host", "--display", ":1", "resize", "1280x720"]);

        assert_eq!(cli.display.as_deref(), Some(":1"));
        assert_eq!(
            cli.command,
            Command::Resize {
                size: ModeKey::new(1280, 720)
            }
        );
    }

    #[test]
    fn test_cli_rejects_malformed_size() {
        let result = Cli::try_parse_from(["modeline-host", "set", "1280by720"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sizes_marks_current_size() {
        let mut manager = manager(MockDisplayServer::virtual_1080p());

        let text = output(&mut manager, Command::Sizes);

        assert!(text.contains("* 1920x1080"));
        assert!(text.contains("  1280x720"));
    }

    #[test]
    fn test_resize_then_sizes_marks_synthesized_mode_as_current() {
        let mut manager = manager(MockDisplayServer::virtual_1080p());

        let resized = output(
            &mut manager,
            Command::Resize {
                size: ModeKey::new(1000, 700),
            },
        );
        let sizes = output(&mut manager, Command::Sizes);

        assert_eq!(resized.trim(), "screen set to 1000x700");
        assert!(sizes.contains("* 1000x700"));
    }

    #[test]
    fn test_modeline_prints_xorg_line() {
        let mut out = Vec::new();

        print_modelines(&[ModeKey::new(1920, 1080)], &mut out).expect("modeline");

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("Modeline \"1920x1080\" 145.45 1920 2054 2246 2534"));
    }

    #[test]
    fn test_modeline_fails_when_every_size_is_impossible() {
        let mut out = Vec::new();
        assert!(print_modelines(&[ModeKey::new(8000, 8000)], &mut out).is_err());
    }

    #[test]
    fn test_shell_keeps_cache_between_lines() {
        // Arrange
        let mut manager = manager(MockDisplayServer::virtual_1080p());
        let script = "add 1000x700\nremove 1000x700\nremove 1000x700\nbogus\nquit\nadd 1100x700\n";
        let mut out = Vec::new();

        // Act
        run_shell(&mut manager, script.as_bytes(), &mut out).expect("shell");

        // Assert
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("added 1000x700"));
        assert!(text.contains("removed 1000x700"));
        assert!(text.contains("1000x700 was not added in this session"));
        assert!(!text.contains("1100x700"), "input after quit is ignored");
        assert!(manager.cached_sizes().is_empty());
    }

    #[test]
    fn test_current_without_randr_prints_root_size() {
        let mut manager = manager(MockDisplayServer::without_randr());

        assert_eq!(output(&mut manager, Command::Current).trim(), "1024x768");
    }
}
