// Command-line front end for fx2image.
//
// Works purely on files and standard streams: converting between the
// interchange formats, building and inspecting EEPROM configuration images,
// and diffing two images. Device access is left to other tools.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::chunk::{self, Chunk, DEFAULT_FILL};
use crate::diff;
use crate::eeprom::{ConfigFlags, Fx2Config, PID_FX2, VID_CYPRESS};
use crate::format::{EncodeOptions, Format};
use crate::io::{self as fio, IoError, ReadStats, WriteStats};

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

/// Parse an unsigned integer: decimal, `0x` hexadecimal, with an optional
/// K/M suffix.
fn parse_int(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty number".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        _ => (s, 1u64),
    };
    let num_part = num_part.trim();
    let num = match num_part
        .strip_prefix("0x")
        .or_else(|| num_part.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => num_part.parse(),
    }
    .map_err(|e| format!("invalid number '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("number overflow: '{s}'"))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let n = parse_int(s)?;
    u16::try_from(n).map_err(|_| format!("'{s}' does not fit in 16 bits"))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let n = parse_int(s)?;
    u32::try_from(n).map_err(|_| format!("'{s}' does not fit in 32 bits"))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let n = parse_int(s)?;
    u8::try_from(n).map_err(|_| format!("'{s}' does not fit in 8 bits"))
}

fn parse_format(s: &str) -> Result<Format, String> {
    s.parse().map_err(|e| format!("{e}"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Firmware format converter and FX2 boot EEPROM image tool.
#[derive(Parser, Debug)]
#[command(
    name = "fx2image",
    version,
    about = "Firmware format converter and FX2 EEPROM image tool",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Print summaries as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Convert data between bin, hex and ihex.
    Convert(ConvertArgs),
    /// Build an EEPROM configuration image.
    Build(BuildArgs),
    /// Decode and describe an EEPROM configuration image.
    Inspect(InspectArgs),
    /// Write the chunks that differ between two images.
    Diff(DiffArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Input format (auto, bin, hex, ihex).
    #[arg(long = "input-format", short = 'I', value_parser = parse_format, default_value = "auto")]
    input_format: Format,

    /// Output format (auto, bin, hex, ihex).
    #[arg(long = "output-format", short = 'O', value_parser = parse_format, default_value = "auto")]
    output_format: Format,

    /// Address of the first input byte for bin/hex input.
    #[arg(long, value_parser = parse_u32, default_value = "0")]
    offset: u32,

    /// Gap fill byte for bin/hex output.
    #[arg(long, value_parser = parse_u8, default_value_t = DEFAULT_FILL)]
    fill: u8,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Output image file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// USB vendor ID.
    #[arg(long = "vendor-id", value_parser = parse_u16, default_value_t = VID_CYPRESS)]
    vendor_id: u16,

    /// USB product ID.
    #[arg(long = "product-id", value_parser = parse_u16, default_value_t = PID_FX2)]
    product_id: u16,

    /// USB device ID (BCD).
    #[arg(long = "device-id", value_parser = parse_u16, default_value = "0")]
    device_id: u16,

    /// Do not enumerate on boot.
    #[arg(long)]
    disconnect: bool,

    /// Load firmware from the EEPROM with a 400 kHz I2C clock.
    #[arg(long = "i2c-400khz")]
    i2c_400khz: bool,

    /// Firmware to embed in the image.
    #[arg(long, short = 'F', value_hint = ValueHint::FilePath)]
    firmware: Option<PathBuf>,

    /// Format of the firmware file.
    #[arg(long = "firmware-format", value_parser = parse_format, default_value = "auto")]
    firmware_format: Format,

    /// Maximum image size (supports K/M suffix).
    #[arg(long = "max-size", value_parser = parse_int)]
    max_size: Option<u64>,

    /// Output format (auto, bin, hex, ihex).
    #[arg(long, short = 'O', value_parser = parse_format, default_value = "auto")]
    format: Format,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Image file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Image format (auto, bin, hex, ihex).
    #[arg(long, short = 'I', value_parser = parse_format, default_value = "auto")]
    format: Format,

    /// Accept an image without a terminator record.
    #[arg(long)]
    partial: bool,

    /// Write the embedded firmware to this file.
    #[arg(long = "firmware-out", value_hint = ValueHint::FilePath)]
    firmware_out: Option<PathBuf>,

    /// Format of the extracted firmware.
    #[arg(long = "firmware-format", value_parser = parse_format, default_value = "auto")]
    firmware_format: Format,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Original image.
    #[arg(value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// Updated image.
    #[arg(value_hint = ValueHint::FilePath)]
    new: PathBuf,

    /// Output file for the changed chunks (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Format of both images (auto, bin, hex, ihex).
    #[arg(long = "input-format", short = 'I', value_parser = parse_format, default_value = "auto")]
    input_format: Format,

    /// Output format (auto, bin, hex, ihex).
    #[arg(long = "output-format", short = 'O', value_parser = parse_format, default_value = "auto")]
    output_format: Format,
}

// ---------------------------------------------------------------------------
// Global options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Globals {
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
}

impl Globals {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
        }
    }

    fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "debug",
            _ => "trace",
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_overwrite(path: Option<&Path>, g: &Globals) -> Result<(), String> {
    match path {
        Some(path) if path.exists() && !g.force => Err(format!(
            "output file exists, use -f to overwrite: {}",
            path.display()
        )),
        _ => Ok(()),
    }
}

fn read_input(
    path: Option<&Path>,
    format: Format,
    offset: u32,
) -> Result<(Vec<Chunk>, ReadStats), IoError> {
    match path {
        Some(path) => fio::read_file(path, format, offset),
        None => fio::read_stdin(format, offset),
    }
}

fn write_output(
    path: Option<&Path>,
    chunks: &[Chunk],
    format: Format,
    opts: &EncodeOptions,
) -> Result<WriteStats, IoError> {
    match path {
        Some(path) => fio::write_file(path, chunks, format, opts),
        None => fio::write_stdout(chunks, format, opts),
    }
}

fn hex_digest(digest: Option<[u8; 32]>) -> Option<String> {
    digest.map(|d| d.iter().map(|b| format!("{b:02x}")).collect())
}

/// Read a configuration image. The image is flattened first, so any
/// format holding it at address 0 works.
fn read_image(path: Option<&Path>, format: Format) -> Result<Vec<u8>, IoError> {
    let (chunks, _) = read_input(path, format, 0)?;
    Ok(chunk::flatten(&chunks, 0xFF))
}

fn report_write(command: &str, stats: &WriteStats, g: &Globals) {
    if g.quiet {
        return;
    }
    if g.json_output {
        let json = serde_json::json!({
            "command": command,
            "format": stats.format.name(),
            "chunks": stats.chunks,
            "bytes": stats.size,
            "sha256": hex_digest(stats.sha256),
        });
        eprintln!("{json}");
    } else if g.verbose > 0 {
        eprintln!(
            "fx2image: {command}: wrote {} chunk(s), {} bytes as {}",
            stats.chunks, stats.size, stats.format
        );
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_convert(args: &ConvertArgs, g: &Globals) -> i32 {
    if let Err(e) = check_overwrite(args.output.as_deref(), g) {
        eprintln!("fx2image: {e}");
        return 1;
    }

    let (chunks, _) = match read_input(args.input.as_deref(), args.input_format, args.offset) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("fx2image: convert: input: {e}");
            return 1;
        }
    };

    let opts = EncodeOptions {
        fill: args.fill,
        ..Default::default()
    };
    match write_output(args.output.as_deref(), &chunks, args.output_format, &opts) {
        Ok(stats) => {
            report_write("convert", &stats, g);
            0
        }
        Err(e) => {
            eprintln!("fx2image: convert: output: {e}");
            1
        }
    }
}

fn cmd_build(args: &BuildArgs, g: &Globals) -> i32 {
    if let Err(e) = check_overwrite(args.output.as_deref(), g) {
        eprintln!("fx2image: {e}");
        return 1;
    }

    let mut flags = ConfigFlags::empty();
    flags.set(ConfigFlags::DISCONNECT, args.disconnect);
    flags.set(ConfigFlags::I2C_400KHZ, args.i2c_400khz);
    let mut config =
        Fx2Config::new(args.vendor_id, args.product_id, args.device_id).with_flags(flags);

    if let Some(ref path) = args.firmware {
        let firmware = match fio::read_file(path, args.firmware_format, 0) {
            Ok((chunks, _)) => chunks,
            Err(e) => {
                eprintln!("fx2image: firmware file: {}: {e}", path.display());
                return 1;
            }
        };
        if let Err(e) = config.append_chunks(&firmware) {
            eprintln!("fx2image: build: {e}");
            return 1;
        }
    }

    let image = match config.encode(args.max_size.map(|m| m as usize)) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("fx2image: build: {e}");
            return 1;
        }
    };

    match Fx2Config::decode(&image, false) {
        Ok(Some(ref decoded)) if *decoded == config => {}
        _ => {
            eprintln!("fx2image: build: image does not decode back to the configuration");
            return 1;
        }
    }

    let chunks = [Chunk::new(0, image)];
    match write_output(args.output.as_deref(), &chunks, args.format, &EncodeOptions::default()) {
        Ok(stats) => {
            report_write("build", &stats, g);
            0
        }
        Err(e) => {
            eprintln!("fx2image: build: output: {e}");
            1
        }
    }
}

fn cmd_inspect(args: &InspectArgs, g: &Globals) -> i32 {
    if let Err(e) = check_overwrite(args.firmware_out.as_deref(), g) {
        eprintln!("fx2image: {e}");
        return 1;
    }

    let image = match read_image(args.input.as_deref(), args.format) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("fx2image: inspect: {e}");
            return 1;
        }
    };

    let config = match Fx2Config::decode(&image, args.partial) {
        Ok(Some(config)) => config,
        Ok(None) => {
            if g.json_output {
                println!("{}", serde_json::json!({ "erased": true }));
            } else if !g.quiet {
                println!("EEPROM is erased");
            }
            return 0;
        }
        Err(e) => {
            eprintln!("fx2image: inspect: {e}");
            return 1;
        }
    };

    if g.json_output {
        let records: Vec<_> = config
            .firmware
            .iter()
            .map(|c| serde_json::json!({ "address": c.address, "length": c.len() }))
            .collect();
        let json = serde_json::json!({
            "erased": false,
            "vendor_id": config.vendor_id,
            "product_id": config.product_id,
            "device_id": config.device_id,
            "disconnect": config.disconnect(),
            "i2c_400khz": config.i2c_400khz(),
            "image_size": config.image_size(),
            "firmware": records,
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("fx2image: inspect: {e}");
                return 1;
            }
        }
    } else if !g.quiet {
        println!("{config}");
    }

    if let Some(ref path) = args.firmware_out {
        if config.firmware.is_empty() {
            eprintln!("fx2image: inspect: image has no firmware");
            return 1;
        }
        let opts = EncodeOptions::default();
        match fio::write_file(path, &config.firmware, args.firmware_format, &opts) {
            Ok(stats) => report_write("inspect", &stats, g),
            Err(e) => {
                eprintln!("fx2image: inspect: firmware output: {e}");
                return 1;
            }
        }
    }

    0
}

fn cmd_diff(args: &DiffArgs, g: &Globals) -> i32 {
    if let Err(e) = check_overwrite(args.output.as_deref(), g) {
        eprintln!("fx2image: {e}");
        return 1;
    }

    let mut images = Vec::with_capacity(2);
    for path in [&args.old, &args.new] {
        match fio::read_file(path, args.input_format, 0) {
            Ok((chunks, _)) => images.push(chunk::flatten(&chunks, 0xFF)),
            Err(e) => {
                eprintln!("fx2image: diff: {}: {e}", path.display());
                return 1;
            }
        }
    }

    let changes = diff::diff(&images[0], &images[1]);
    if g.verbose > 0 && !g.quiet {
        for c in &changes {
            eprintln!("fx2image: diff: {:#06x}: {} byte(s)", c.address, c.len());
        }
    }

    let opts = EncodeOptions::default();
    match write_output(args.output.as_deref(), &changes, args.output_format, &opts) {
        Ok(stats) => {
            report_write("diff", &stats, g);
            0
        }
        Err(e) => {
            eprintln!("fx2image: diff: output: {e}");
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let g = Globals::from_cli(&cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(g.log_filter()))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match &cli.command {
        Cmd::Convert(args) => cmd_convert(args, &g),
        Cmd::Build(args) => cmd_build(args, &g),
        Cmd::Inspect(args) => cmd_inspect(args, &g),
        Cmd::Diff(args) => cmd_diff(args, &g),
    };

    process::exit(exit_code);
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("fx2image".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = Globals::from_cli(&cli).log_filter();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv: Vec<String> = std::iter::once("fx2image".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        Cli::try_parse_from(argv).expect("cli parse failed")
    }

    #[test]
    fn parse_int_forms() {
        assert_eq!(parse_int("42").unwrap(), 42);
        assert_eq!(parse_int("0x04b4").unwrap(), 0x04B4);
        assert_eq!(parse_int("0XFF").unwrap(), 0xFF);
        assert_eq!(parse_int("16K").unwrap(), 16 * 1024);
        assert_eq!(parse_int("1m").unwrap(), 1024 * 1024);
        assert!(parse_int("").is_err());
        assert!(parse_int("0xZZ").is_err());
        assert!(parse_u16("0x10000").is_err());
        assert!(parse_u8("256").is_err());
    }

    #[test]
    fn build_defaults() {
        let cli = parse(&["build", "out.bin"]);
        let Cmd::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.vendor_id, VID_CYPRESS);
        assert_eq!(args.product_id, PID_FX2);
        assert_eq!(args.device_id, 0);
        assert!(!args.disconnect);
        assert_eq!(args.format, Format::Auto);
        assert_eq!(args.output, Some(PathBuf::from("out.bin")));
        assert!(args.max_size.is_none());
    }

    #[test]
    fn build_flags_parse() {
        let cli = parse(&[
            "build",
            "--vendor-id",
            "0x20b7",
            "--product-id",
            "0x9db1",
            "--disconnect",
            "--i2c-400khz",
            "--firmware",
            "fw.ihx",
            "--max-size",
            "16K",
            "--format",
            "ihex",
        ]);
        let Cmd::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.vendor_id, 0x20B7);
        assert_eq!(args.product_id, 0x9DB1);
        assert!(args.disconnect && args.i2c_400khz);
        assert_eq!(args.firmware, Some(PathBuf::from("fw.ihx")));
        assert_eq!(args.max_size, Some(16 * 1024));
        assert_eq!(args.format, Format::Ihex);
        assert!(args.output.is_none());
    }

    #[test]
    fn convert_formats_parse() {
        let cli = parse(&[
            "-f", "convert", "-I", "hex", "-O", "ihex", "--offset", "0x100", "in", "out",
        ]);
        assert!(cli.force);
        let Cmd::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.input_format, Format::Hex);
        assert_eq!(args.output_format, Format::Ihex);
        assert_eq!(args.offset, 0x100);
        assert_eq!(args.fill, 0);
    }

    #[test]
    fn bad_format_is_rejected() {
        let argv = ["fx2image", "convert", "-I", "elf", "in", "out"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn verbose_is_capped() {
        let cli = parse(&["-v", "-v", "-v", "inspect", "image.bin"]);
        let g = Globals::from_cli(&cli);
        assert_eq!(g.verbose, 2);
        assert_eq!(g.log_filter(), "trace");
    }

    #[test]
    fn diff_and_inspect_parse() {
        let cli = parse(&["diff", "old.bin", "new.bin", "patch.ihx"]);
        assert!(matches!(
            cli.command,
            Cmd::Diff(ref a) if a.output == Some(PathBuf::from("patch.ihx"))
        ));

        let cli = parse(&[
            "--json",
            "inspect",
            "--partial",
            "--firmware-out",
            "fw.ihx",
            "image.bin",
        ]);
        assert!(cli.json_output);
        let Cmd::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert!(args.partial);
        assert_eq!(args.firmware_out, Some(PathBuf::from("fw.ihx")));
    }

    #[test]
    fn overwrite_requires_force() {
        let dir = std::env::temp_dir();
        let g = Globals {
            force: false,
            quiet: true,
            verbose: 0,
            json_output: false,
        };
        assert!(check_overwrite(Some(dir.as_path()), &g).is_err());
        assert!(check_overwrite(Some(dir.as_path()), &Globals { force: true, ..g }).is_ok());
        assert!(check_overwrite(None, &g).is_ok());
    }
}
