//! ogrender CLI
//!
//! Usage:
//!   ogrender svg --input tree.json --out card.svg
//!   ogrender png --input page.html --html --converter resvg --out card.png
//!   ogrender convert --svg card.svg --fit-width 650 --out card.png

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use ogrender::{ConverterKind, Element, EmojiStyle, Engine, EngineConfig, FitTo, FontDescriptor, RenderOptions};

#[derive(Parser)]
#[command(name = "ogrender")]
#[command(about = "Render element trees and SVG documents to PNG")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render an element tree to SVG
    Svg {
        #[command(flatten)]
        render: RenderArgs,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Render an element tree to PNG
    Png {
        #[command(flatten)]
        render: RenderArgs,
        #[arg(short, long, default_value = "resvg")]
        converter: ConverterKind,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Convert an SVG file to PNG
    Convert {
        #[arg(long)]
        svg: PathBuf,
        /// Scale the output to this width
        #[arg(long)]
        fit_width: Option<u32>,
        #[arg(short, long, default_value = "resvg")]
        converter: ConverterKind,
        #[arg(long)]
        show_log: bool,
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Element tree as JSON, or HTML with --html
    #[arg(short, long)]
    input: PathBuf,
    /// Treat the input as HTML (implied by a .html extension)
    #[arg(long)]
    html: bool,
    #[arg(long, default_value_t = 1200)]
    width: u32,
    #[arg(long, default_value_t = 630)]
    height: u32,
    /// Emoji image set
    #[arg(long, default_value = "twemoji")]
    emoji: String,
    /// Outline layout boxes
    #[arg(short, long)]
    debug: bool,
    /// Print render timings
    #[arg(long)]
    show_log: bool,
    /// Extra font as NAME=PATH; may be repeated
    #[arg(long = "font", value_parser = parse_font_arg)]
    fonts: Vec<(String, PathBuf)>,
}

impl RenderArgs {
    fn options(&self) -> Result<RenderOptions> {
        let mut fonts = Vec::new();
        for (name, path) in &self.fonts {
            let data = fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
            fonts.push(FontDescriptor::new(name.clone(), data));
        }
        Ok(RenderOptions {
            width: self.width,
            height: self.height,
            debug: self.debug,
            fonts: (!fonts.is_empty()).then_some(fonts),
            emoji: EmojiStyle::from_name_lossy(&self.emoji),
            show_log: self.show_log,
            ..Default::default()
        })
    }

    fn is_html(&self) -> bool {
        self.html || self.input.extension().is_some_and(|e| e == "html" || e == "htm")
    }
}

fn parse_font_arg(s: &str) -> std::result::Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got {:?}", s)),
    }
}

async fn render(engine: &Engine, args: &RenderArgs, options: &RenderOptions) -> Result<String> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    if args.is_html() {
        #[cfg(feature = "html")]
        return Ok(engine.html_to_svg(&source, options).await?);
        #[cfg(not(feature = "html"))]
        bail!("built without the html feature");
    }
    let tree: Element = serde_json::from_str(&source)
        .with_context(|| format!("parsing element tree {}", args.input.display()))?;
    Ok(engine.render_svg(&tree, options).await?)
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let engine = Engine::init(EngineConfig::default()).await?;

    match cli.command {
        Command::Svg { render: args, out } => {
            let options = args.options()?;
            let svg = render(&engine, &args, &options).await?;
            write_output(&out, svg.as_bytes())?;
        }
        Command::Png {
            render: args,
            converter,
            out,
        } => {
            let mut options = args.options()?;
            options.converter = converter;
            let svg = render(&engine, &args, &options).await?;
            let png = engine.svg_to_png(&svg, &options).await?;
            write_output(&out, &png)?;
        }
        Command::Convert {
            svg,
            fit_width,
            converter,
            show_log,
            out,
        } => {
            let source = fs::read_to_string(&svg).with_context(|| format!("reading {}", svg.display()))?;
            if source.trim().is_empty() {
                bail!("{} is empty", svg.display());
            }
            let options = RenderOptions {
                converter,
                show_log,
                fit_to: fit_width.map(FitTo::Width).unwrap_or_default(),
                ..Default::default()
            };
            let png = engine.svg_to_png(&source, &options).await?;
            write_output(&out, &png)?;
        }
    }

    engine.shutdown();
    Ok(())
}
