use std::path::{Path, PathBuf};

use anyhow::{Context as _, anyhow};
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Parser, Subcommand};
use gpkg_mosaic::compositor::image_format;
use gpkg_mosaic::logging::{LogFormat, env_filter};
use gpkg_mosaic::{
    CoverageReader as _, Envelope, GpkgCoverageReader, MosaicConfig, OverviewPolicy, ReadRequest,
    Rgb, RgbaImage,
};
use gpkg_tile_utils::Format;
use image::DynamicImage;
use tracing::{error, info};

/// Defines the styles used for the CLI help output.
const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, PartialEq, Debug)]
#[command(
    version,
    name = "gpkg-mosaic",
    about = "Render windows of GeoPackage raster tile pyramids",
    after_help = "Use RUST_LOG environment variable to control logging level, e.g. RUST_LOG=debug or RUST_LOG=gpkg_mosaic=debug. See https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html for more information.",
    styles = HELP_STYLES
)]
pub struct Args {
    /// Log output format: full, compact, bare, pretty or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, PartialEq, Debug)]
enum Commands {
    /// List the coverages of a GeoPackage file with tile statistics per zoom level
    #[command(name = "info", alias = "summary")]
    Info {
        /// GeoPackage file to read
        file: PathBuf,
    },
    /// Render a window of a coverage to an image file
    #[command(name = "read")]
    Read(ReadArgs),
    /// Decode a single stored tile to an image file
    #[command(name = "tile")]
    Tile {
        /// GeoPackage file to read
        file: PathBuf,
        zoom: u8,
        column: u32,
        row: u32,
        /// Coverage to read from, the first one of the file by default
        #[arg(short, long)]
        coverage: Option<String>,
        /// Image file to write, the format is taken from the extension
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(clap::Args, PartialEq, Debug)]
struct ReadArgs {
    /// GeoPackage file to read
    file: PathBuf,
    /// Window to render
    #[arg(long, value_name = "MINX,MINY,MAXX,MAXY", allow_hyphen_values = true)]
    bbox: Envelope,
    /// Output width in pixels
    #[arg(long)]
    width: u32,
    /// Output height in pixels
    #[arg(long)]
    height: u32,
    /// Coverage to read from, the first one of the file by default
    #[arg(short, long)]
    coverage: Option<String>,
    /// EPSG code of the bounding box if it differs from the coverage
    #[arg(long)]
    crs: Option<u32>,
    /// How to pick the zoom level, overrides the configuration
    #[arg(long, value_enum)]
    policy: Option<OverviewPolicy>,
    /// Color to make transparent
    #[arg(long, value_name = "RRGGBB", value_parser = parse_color)]
    transparent: Option<Rgb<u8>>,
    /// Image file to write, the format is taken from the extension
    #[arg(short, long)]
    output: PathBuf,
}

fn parse_color(value: &str) -> Result<Rgb<u8>, String> {
    let hex = value.trim_start_matches('#');
    let channel = |idx: usize| {
        hex.get(idx..idx + 2)
            .and_then(|v| u8::from_str_radix(v, 16).ok())
    };
    match (hex.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => Ok(Rgb([r, g, b])),
        _ => Err(format!("Invalid color '{value}', expected RRGGBB")),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = args.log_format.init(env_filter()) {
        eprintln!("Unable to initialize logging: {err}");
    }

    if let Err(err) = main_int(args).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn main_int(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => MosaicConfig::load(path)?,
        None => MosaicConfig::default(),
    };
    match args.command {
        Commands::Info { file } => print_info(&file, config).await?,
        Commands::Read(read) => render(read, config).await?,
        Commands::Tile {
            file,
            zoom,
            column,
            row,
            coverage,
            output,
        } => {
            let reader = GpkgCoverageReader::open(&file, config).await?;
            let coverage = pick_coverage(&reader, coverage)?;
            let image = reader.read_single_tile(&coverage, zoom, column, row).await?;
            write_image(&image, &output)?;
            info!(
                "Wrote tile {zoom}/{column}/{row} of {coverage} to {}",
                output.display()
            );
            reader.close().await;
        }
    }
    Ok(())
}

async fn print_info(file: &Path, config: MosaicConfig) -> anyhow::Result<()> {
    let reader = GpkgCoverageReader::open(file, config).await?;
    println!("GeoPackage file {}", file.display());
    println!("{}", serde_yaml::to_string(&reader.catalog().entries())?);
    println!("{}", reader.summary().await?);
    reader.close().await;
    Ok(())
}

async fn render(args: ReadArgs, config: MosaicConfig) -> anyhow::Result<()> {
    let reader = GpkgCoverageReader::open(&args.file, config).await?;
    let coverage = pick_coverage(&reader, args.coverage)?;
    let mut request = ReadRequest::new(coverage, args.bbox, args.width, args.height);
    request.crs = args.crs;
    request.policy = args.policy;
    request.transparent_color = args.transparent;

    let result = reader.read(&request).await?;
    write_image(&result.image, &args.output)?;
    info!(
        "Wrote {}x{} pixels of {} from zoom {} to {}",
        args.width,
        args.height,
        request.coverage,
        result.zoom,
        args.output.display()
    );
    reader.close().await;
    Ok(())
}

/// Encode with the format named by the file extension. Alpha is dropped for JPEG.
fn write_image(image: &RgbaImage, path: &Path) -> anyhow::Result<()> {
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(Format::parse)
        .ok_or_else(|| {
            anyhow!(
                "Unable to pick an image format for {}, use png, jpg, webp, gif or tiff",
                path.display()
            )
        })?;
    let result = if format.has_alpha() {
        image.save_with_format(path, image_format(format))
    } else {
        DynamicImage::ImageRgba8(image.clone())
            .to_rgb8()
            .save_with_format(path, image_format(format))
    };
    result.with_context(|| format!("Unable to write {format} image {}", path.display()))
}

fn pick_coverage(reader: &GpkgCoverageReader, coverage: Option<String>) -> anyhow::Result<String> {
    match coverage {
        Some(v) => Ok(v),
        None => reader
            .default_coverage()
            .map(str::to_string)
            .context("The file has no raster coverages"),
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn read_arguments() {
        let args = Args::parse_from([
            "gpkg-mosaic",
            "read",
            "world.gpkg",
            "--bbox",
            "-180,-90,180,90",
            "--width",
            "512",
            "--height",
            "256",
            "--policy",
            "favor-quality",
            "--transparent",
            "#FF00ff",
            "-o",
            "out.png",
        ]);
        assert_eq!(
            args,
            Args {
                log_format: LogFormat::Compact,
                config: None,
                command: Commands::Read(ReadArgs {
                    file: PathBuf::from("world.gpkg"),
                    bbox: Envelope::new(-180.0, -90.0, 180.0, 90.0),
                    width: 512,
                    height: 256,
                    coverage: None,
                    crs: None,
                    policy: Some(OverviewPolicy::FavorQuality),
                    transparent: Some(Rgb([255, 0, 255])),
                    output: PathBuf::from("out.png"),
                }),
            }
        );
    }

    #[test]
    fn tile_arguments() {
        let args = Args::parse_from([
            "gpkg-mosaic",
            "tile",
            "world.gpkg",
            "3",
            "4",
            "2",
            "--coverage",
            "world",
            "--output",
            "tile.png",
            "--log-format",
            "bare",
        ]);
        assert_eq!(args.log_format, LogFormat::Bare);
        assert_eq!(
            args.command,
            Commands::Tile {
                file: PathBuf::from("world.gpkg"),
                zoom: 3,
                column: 4,
                row: 2,
                coverage: Some("world".to_string()),
                output: PathBuf::from("tile.png"),
            }
        );
    }

    #[test]
    fn missing_output() {
        assert_eq!(
            Args::try_parse_from(["gpkg-mosaic", "tile", "world.gpkg", "1", "2", "3"])
                .unwrap_err()
                .kind(),
            ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn output_formats() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbaImage::from_pixel(3, 2, gpkg_mosaic::BACKGROUND);
        for name in ["out.png", "out.jpg", "out.tif"] {
            let path = dir.path().join(name);
            write_image(&image, &path).unwrap();
            assert_eq!(image::open(&path).unwrap().width(), 3, "{name}");
        }

        let err = write_image(&image, &dir.path().join("out.bmp")).unwrap_err();
        assert!(err.to_string().starts_with("Unable to pick an image format"), "{err}");
    }

    #[test]
    fn colors() {
        assert_eq!(parse_color("00ff7F"), Ok(Rgb([0, 255, 127])));
        assert!(parse_color("00ff7").is_err());
        assert!(parse_color("zzzzzz").is_err());
    }
}
