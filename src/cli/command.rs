use crate::backend::config::{OutputConfig, OutputFormat};
use crate::hw::{Byte, Endian};
use crate::image::{hex, BinaryImage};
use ansi_term::Color::{Green, Yellow};
use ansi_term::Style;
use anyhow::{anyhow, bail, Context};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[cfg(windows)]
pub fn terminal_init() {
    if ansi_term::enable_ansi_support().is_err() {
        log::warn!("could not enable terminal ANSI support");
    }
}

#[cfg(not(windows))]
pub fn terminal_init() {}

fn parse_byte(s: &str) -> Result<Byte, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => Byte::from_str_radix(digits, 16),
        None => s.parse(),
    }
}

#[derive(StructOpt, Debug)]
#[structopt(name = "ratc")]
pub enum CommandRoot {
    Convert(SubcommandConvert),
    Info(SubcommandInfo),
}

#[derive(StructOpt, Debug)]
struct ImageOpts {
    #[structopt(short, long)]
    endian: Option<Endian>,

    #[structopt(long, parse(try_from_str = parse_byte))]
    fill: Option<Byte>,
}

/// Re-packs an Intel HEX image, as Intel HEX or as a raw binary.
#[derive(StructOpt, Debug)]
pub struct SubcommandConvert {
    #[structopt(flatten)]
    image_opts: ImageOpts,

    #[structopt(short, long, default_value = "hex")]
    format: OutputFormat,

    #[structopt(short, long)]
    width: Option<usize>,

    #[structopt(name = "in.hex", parse(from_os_str))]
    in_hex: PathBuf,

    #[structopt(name = "out", parse(from_os_str))]
    out: Option<PathBuf>,
}

/// Lists the pages of an Intel HEX image.
#[derive(StructOpt, Debug)]
pub struct SubcommandInfo {
    #[structopt(name = "in.hex", parse(from_os_str))]
    in_hex: PathBuf,
}

impl ImageOpts {
    fn config(&self, width: Option<usize>) -> OutputConfig {
        let default = OutputConfig::default();
        OutputConfig {
            endian: self.endian.unwrap_or(default.endian),
            fill: self.fill.unwrap_or(default.fill),
            record_width: width.unwrap_or(default.record_width),
        }
    }
}

pub fn load_image(path: &Path, config: &OutputConfig) -> anyhow::Result<BinaryImage> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read '{}'", path.display()))?;
    let records = hex::parse(&text).map_err(|err| anyhow!("{}{}", path.display(), err))?;
    log::debug!("read {} records from '{}'", records.len(), path.display());

    Ok(BinaryImage::from_records(&records, config.endian, config.fill)?)
}

pub fn root(cmd: CommandRoot) -> anyhow::Result<()> {
    match cmd {
        CommandRoot::Convert(scmd) => convert(scmd),
        CommandRoot::Info(scmd) => info(scmd),
    }
}

pub fn convert(cmd: SubcommandConvert) -> anyhow::Result<()> {
    let config = cmd.image_opts.config(cmd.width);
    let image = load_image(&cmd.in_hex, &config)?;

    let mut buf = Vec::new();
    match cmd.format {
        OutputFormat::Hex => image.to_intel_hex(&mut buf, config.record_width)?,
        OutputFormat::Bin => image.write_binary(&mut buf)?,
        other => bail!("an image cannot be converted to {} output", other),
    }

    let out_name = match cmd.out {
        Some(outfile) => outfile,
        None => cmd.in_hex.with_extension(cmd.format.default_ext()),
    };
    if out_name == cmd.in_hex {
        bail!(
            "refusing to overwrite '{}', name an output file",
            out_name.display()
        );
    }

    std::fs::write(&out_name, buf)
        .with_context(|| format!("could not write '{}'", out_name.display()))?;

    println!(
        "{} {} -> {}",
        Green.bold().paint("Converted"),
        cmd.in_hex.display(),
        out_name.display()
    );
    Ok(())
}

pub fn info(cmd: SubcommandInfo) -> anyhow::Result<()> {
    let image = load_image(&cmd.in_hex, &OutputConfig::default())?;

    println!("{}", Style::new().bold().paint(cmd.in_hex.display().to_string()));
    for page in image.pages() {
        println!(
            "  {:#06X}..{:#06X}  {} bytes",
            page.start(),
            page.end(),
            page.len()
        );
    }

    let total: usize = image.pages().iter().map(|page| page.len()).sum();
    println!(
        "{} {} pages, {} bytes",
        Yellow.paint("total:"),
        image.pages().len(),
        total
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_bytes_parse_as_decimal_or_hex() {
        assert_eq!(parse_byte("255"), Ok(0xFF));
        assert_eq!(parse_byte("0xEE"), Ok(0xEE));
        assert!(parse_byte("0x100").is_err());
    }

    #[test]
    fn options_fall_back_to_defaults() {
        let opts = ImageOpts {
            endian: None,
            fill: Some(0xFF),
        };
        assert_eq!(
            opts.config(None),
            OutputConfig {
                fill: 0xFF,
                ..OutputConfig::default()
            }
        );
    }

    #[test]
    fn convert_args() {
        let cmd = CommandRoot::from_iter_safe(&[
            "ratc", "convert", "--format", "bin", "--fill", "0xFF", "in.hex",
        ])
        .unwrap();
        match cmd {
            CommandRoot::Convert(scmd) => {
                assert_eq!(scmd.format, OutputFormat::Bin);
                assert_eq!(scmd.image_opts.fill, Some(0xFF));
                assert_eq!(scmd.out, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
