//! Argument parsing and command execution

use crate::config::CliConfig;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfsuite_core::inspect::page_infos;
use pdfsuite_core::{
    run_command, validate_pdf, Anchor, CropMargins, FontSource, HayroRasterizer,
    ImageExportOptions, ImageWatermark, NoFontSource, OutputBundle, PageTarget, PdfCommand,
    RotateSpec, SelectionMode, TextWatermark,
};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "pdfsuite")]
#[command(version, about = "Split, merge, rotate, crop, watermark and render PDF pages")]
pub struct Cli {
    /// Directory for output files [env: PDFSUITE_OUTPUT_DIR]
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// TrueType font for non-ASCII watermark text [env: PDFSUITE_FONT]
    #[arg(long, global = true)]
    pub font: Option<PathBuf>,

    /// Write multi-file results as one zip archive
    #[arg(long, global = true)]
    pub zip: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print document and page information as JSON
    Info { input: PathBuf },

    /// One file per page, or one per range with --ranges
    Split {
        input: PathBuf,
        /// Page ranges such as "1-3, 5"
        #[arg(long)]
        ranges: Option<String>,
    },

    /// Copy the listed pages, in the order given, into one file
    Extract {
        input: PathBuf,
        /// 1-based page numbers
        #[arg(long, value_delimiter = ',', required = true)]
        pages: Vec<usize>,
    },

    /// Remove the listed pages
    Delete {
        input: PathBuf,
        /// 1-based page numbers
        #[arg(long, value_delimiter = ',', required = true)]
        pages: Vec<usize>,
    },

    /// Concatenate documents in the order given
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
    },

    /// Rotate pages clockwise by a multiple of 90 degrees
    Rotate {
        input: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        degrees: i64,
        /// 1-based page numbers; all pages when omitted
        #[arg(long, value_delimiter = ',')]
        pages: Vec<usize>,
    },

    /// Trim page margins, in points
    Crop {
        input: PathBuf,
        /// Margin applied to every side not given explicitly
        #[arg(long, default_value_t = 0.0)]
        margin: f64,
        #[arg(long)]
        top: Option<f64>,
        #[arg(long)]
        right: Option<f64>,
        #[arg(long)]
        bottom: Option<f64>,
        #[arg(long)]
        left: Option<f64>,
        #[arg(long, value_delimiter = ',')]
        pages: Vec<usize>,
    },

    /// Stamp text or a PNG image on pages
    Watermark {
        input: PathBuf,
        /// Text, with {page}, {total} and {page:NN} placeholders
        #[arg(long, conflicts_with = "image", required_unless_present = "image")]
        text: Option<String>,
        /// PNG image to stamp instead of text
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        font_size: Option<f64>,
        /// Hex colour such as "#ff0000"
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        opacity: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<f64>,
        /// Image width in points
        #[arg(long)]
        width: Option<f64>,
        /// Horizontal anchor, 0 = left edge, 1 = right edge
        #[arg(long, default_value_t = 0.5)]
        x: f64,
        /// Vertical anchor, 0 = top edge, 1 = bottom edge
        #[arg(long, default_value_t = 0.5)]
        y: f64,
        #[arg(long, value_delimiter = ',')]
        pages: Vec<usize>,
    },

    /// Render pages to PNG
    Images {
        input: PathBuf,
        /// Resolution, 72 to 300 [env: PDFSUITE_DPI]
        #[arg(long)]
        dpi: Option<u32>,
        #[arg(long, value_delimiter = ',')]
        pages: Vec<usize>,
    },
}

impl Cli {
    /// DPI given on the command line, if the subcommand takes one.
    pub fn dpi(&self) -> Option<u32> {
        match &self.command {
            Command::Images { dpi, .. } => *dpi,
            _ => None,
        }
    }
}

/// Convert 1-based page numbers from the command line to 0-based indices.
fn zero_based(pages: &[usize]) -> Result<Vec<usize>> {
    pages
        .iter()
        .map(|&p| {
            if p == 0 {
                bail!("page numbers start at 1");
            }
            Ok(p - 1)
        })
        .collect()
}

fn page_target(pages: &[usize]) -> Result<PageTarget> {
    if pages.is_empty() {
        Ok(PageTarget::All)
    } else {
        Ok(PageTarget::Only(zero_based(pages)?))
    }
}

fn read_input(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf")
        .to_string();
    Ok((bytes, name))
}

/// Translate a subcommand into a core command. `None` for commands that
/// produce no files.
fn build_command(command: &Command, config: &CliConfig) -> Result<Option<PdfCommand>> {
    let built = match command {
        Command::Info { .. } => return Ok(None),
        Command::Split { input, ranges } => {
            let (file, file_name) = read_input(input)?;
            let selection = match ranges {
                Some(ranges) => SelectionMode::Ranges(ranges.clone()),
                None => SelectionMode::All,
            };
            PdfCommand::Split {
                file,
                file_name,
                view: None,
                selection,
            }
        }
        Command::Extract { input, pages } | Command::Delete { input, pages } => {
            let (file, file_name) = read_input(input)?;
            let positions = zero_based(pages)?;
            let selection = if matches!(command, Command::Extract { .. }) {
                SelectionMode::Extract(positions)
            } else {
                SelectionMode::Delete(positions)
            };
            PdfCommand::Split {
                file,
                file_name,
                view: None,
                selection,
            }
        }
        Command::Merge { inputs } => {
            let files = inputs
                .iter()
                .map(|path| read_input(path).map(|(bytes, _)| bytes))
                .collect::<Result<Vec<_>>>()?;
            PdfCommand::Merge { files }
        }
        Command::Rotate {
            input,
            degrees,
            pages,
        } => {
            let (file, file_name) = read_input(input)?;
            PdfCommand::Rotate {
                file,
                file_name,
                spec: RotateSpec {
                    degrees: *degrees,
                    pages: page_target(pages)?,
                },
            }
        }
        Command::Crop {
            input,
            margin,
            top,
            right,
            bottom,
            left,
            pages,
        } => {
            let (file, file_name) = read_input(input)?;
            PdfCommand::Crop {
                file,
                file_name,
                margins: CropMargins {
                    top: top.unwrap_or(*margin),
                    right: right.unwrap_or(*margin),
                    bottom: bottom.unwrap_or(*margin),
                    left: left.unwrap_or(*margin),
                },
                pages: page_target(pages)?,
            }
        }
        Command::Watermark {
            input,
            text,
            image,
            font_size,
            color,
            opacity,
            rotation,
            width,
            x,
            y,
            pages,
        } => {
            let (file, file_name) = read_input(input)?;
            let anchor = Anchor { x: *x, y: *y };
            let pages = page_target(pages)?;
            match (text, image) {
                (_, Some(image_path)) => {
                    let image = std::fs::read(image_path)
                        .with_context(|| format!("reading {}", image_path.display()))?;
                    let defaults = ImageWatermark::default();
                    PdfCommand::ImageWatermark {
                        file,
                        file_name,
                        image,
                        watermark: ImageWatermark {
                            width: width.unwrap_or(defaults.width),
                            opacity: opacity.unwrap_or(defaults.opacity),
                            rotation: rotation.unwrap_or(defaults.rotation),
                            anchor,
                            pages,
                        },
                    }
                }
                (Some(text), None) => {
                    let defaults = TextWatermark::default();
                    PdfCommand::Watermark {
                        file,
                        file_name,
                        watermark: TextWatermark {
                            text: text.clone(),
                            font_size: font_size.unwrap_or(defaults.font_size),
                            color: color.clone().unwrap_or(defaults.color),
                            opacity: opacity.unwrap_or(defaults.opacity),
                            rotation: rotation.unwrap_or(defaults.rotation),
                            anchor,
                            pages,
                        },
                    }
                }
                (None, None) => bail!("give either --text or --image"),
            }
        }
        Command::Images { input, pages, .. } => {
            let (file, file_name) = read_input(input)?;
            PdfCommand::ExportImages {
                file,
                file_name,
                options: ImageExportOptions {
                    dpi: config.dpi,
                    pages: page_target(pages)?,
                },
            }
        }
    };
    Ok(Some(built))
}

fn print_info(input: &Path, out: &mut dyn Write) -> Result<()> {
    let (bytes, _) = read_input(input)?;
    let info = validate_pdf(&bytes).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let pages = page_infos(&bytes).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let report = json!({ "document": info, "pages": pages });
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

/// Write a bundle into `dir`, unpacked unless `zip` is set.
pub fn write_bundle(bundle: OutputBundle, dir: &Path, zip: bool) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let files: Vec<(String, Vec<u8>)> = if zip {
        let download = bundle
            .into_download()
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        vec![(download.file_name, download.bytes)]
    } else {
        bundle
            .into_files()
            .into_iter()
            .map(|f| (f.file_name, f.bytes))
            .collect()
    };

    let mut written = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let path = dir.join(&name);
        std::fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(file = %path.display(), size = bytes.len(), "wrote output");
        written.push(path);
    }
    Ok(written)
}

/// Execute the parsed command line. Returns the paths written.
pub fn run(cli: &Cli, config: &CliConfig, out: &mut dyn Write) -> Result<Vec<PathBuf>> {
    if let Command::Info { input } = &cli.command {
        print_info(input, out)?;
        return Ok(Vec::new());
    }

    let Some(command) = build_command(&cli.command, config)? else {
        return Ok(Vec::new());
    };

    let file_fonts = config.font_source();
    let fonts: &dyn FontSource = match &file_fonts {
        Some(source) => source,
        None => &NoFontSource,
    };

    tracing::debug!(command = command.name(), "running");
    let bundle = run_command(&command, fonts, &HayroRasterizer).map_err(|e| {
        tracing::error!(command = command.name(), error = %e, "command failed");
        anyhow::anyhow!(e.user_message())
    })?;

    write_bundle(bundle, &config.output_dir, cli.zip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};
    use pretty_assertions::assert_eq;

    fn create_test_pdf(num_pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..num_pages)
            .map(|i| {
                let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", i + 1);
                let content_id =
                    doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
                Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => Object::Reference(pages_id),
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => Object::Reference(content_id),
                }))
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => num_pages as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// Fresh scratch directory holding `report.pdf` with `pages` pages.
    fn workspace(test: &str, pages: usize) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("pdfsuite-cli-{}-{}", test, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("report.pdf");
        std::fs::write(&input, create_test_pdf(pages)).unwrap();
        (dir, input)
    }

    fn run_args(args: &[&str], dir: &Path) -> Result<Vec<PathBuf>> {
        let cli = Cli::try_parse_from(args).unwrap();
        let config = CliConfig {
            output_dir: dir.join("out"),
            ..Default::default()
        };
        run(&cli, &config, &mut Vec::new())
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_parse_page_lists() {
        let cli = Cli::try_parse_from(["pdfsuite", "extract", "a.pdf", "--pages", "3,1"]).unwrap();
        match cli.command {
            Command::Extract { pages, .. } => assert_eq!(pages, vec![3, 1]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_watermark_needs_text_or_image() {
        assert!(Cli::try_parse_from(["pdfsuite", "watermark", "a.pdf"]).is_err());
        assert!(Cli::try_parse_from([
            "pdfsuite", "watermark", "a.pdf", "--text", "A", "--image", "b.png"
        ])
        .is_err());
    }

    #[test]
    fn test_negative_rotation_parses() {
        let cli =
            Cli::try_parse_from(["pdfsuite", "rotate", "a.pdf", "--degrees", "-90"]).unwrap();
        assert!(matches!(cli.command, Command::Rotate { degrees: -90, .. }));
    }

    #[test]
    fn test_dpi_only_on_images() {
        let cli = Cli::try_parse_from(["pdfsuite", "images", "a.pdf", "--dpi", "96"]).unwrap();
        assert_eq!(cli.dpi(), Some(96));
        let cli = Cli::try_parse_from(["pdfsuite", "split", "a.pdf"]).unwrap();
        assert_eq!(cli.dpi(), None);
    }

    #[test]
    fn test_zero_page_number_rejected() {
        assert!(zero_based(&[1, 0]).is_err());
        assert_eq!(zero_based(&[1, 4]).unwrap(), vec![0, 3]);
    }

    #[test]
    fn test_split_writes_one_file_per_page() {
        let (dir, input) = workspace("split", 3);
        let written = run_args(&["pdfsuite", "split", input.to_str().unwrap()], &dir).unwrap();
        assert_eq!(
            names(&written),
            vec!["report-page-1.pdf", "report-page-2.pdf", "report-page-3.pdf"]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_split_ranges_as_zip() {
        let (dir, input) = workspace("split-zip", 5);
        let written = run_args(
            &[
                "pdfsuite",
                "--zip",
                "split",
                input.to_str().unwrap(),
                "--ranges",
                "1-2, 4",
            ],
            &dir,
        )
        .unwrap();
        assert_eq!(names(&written), vec!["report-split.zip"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_delete_keeps_other_pages() {
        let (dir, input) = workspace("delete", 4);
        let written = run_args(
            &["pdfsuite", "delete", input.to_str().unwrap(), "--pages", "2,3"],
            &dir,
        )
        .unwrap();
        assert_eq!(names(&written), vec!["report-edited.pdf"]);
        let doc = Document::load(&written[0]).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_merge_two_files() {
        let (dir, input) = workspace("merge", 2);
        let second = dir.join("second.pdf");
        std::fs::write(&second, create_test_pdf(3)).unwrap();
        let written = run_args(
            &[
                "pdfsuite",
                "merge",
                input.to_str().unwrap(),
                second.to_str().unwrap(),
            ],
            &dir,
        )
        .unwrap();
        assert_eq!(names(&written), vec!["merged.pdf"]);
        assert_eq!(Document::load(&written[0]).unwrap().get_pages().len(), 5);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_watermark_text() {
        let (dir, input) = workspace("watermark", 1);
        let written = run_args(
            &[
                "pdfsuite",
                "watermark",
                input.to_str().unwrap(),
                "--text",
                "DRAFT {page}/{total}",
            ],
            &dir,
        )
        .unwrap();
        assert_eq!(names(&written), vec!["report-watermarked.pdf"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_input_reports_user_message() {
        let (dir, input) = workspace("bad-rotate", 1);
        let err = run_args(
            &["pdfsuite", "rotate", input.to_str().unwrap(), "--degrees", "45"],
            &dir,
        )
        .unwrap_err();
        assert!(err.to_string().contains("90"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_info_prints_json() {
        let (dir, input) = workspace("info", 2);
        let cli = Cli::try_parse_from(["pdfsuite", "info", input.to_str().unwrap()]).unwrap();
        let mut out = Vec::new();
        let written = run(&cli, &CliConfig::default(), &mut out).unwrap();
        assert!(written.is_empty());

        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["document"]["page_count"], 2);
        assert_eq!(report["pages"].as_array().unwrap().len(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_input_has_context() {
        let dir = std::env::temp_dir();
        let err = run_args(&["pdfsuite", "split", "/nonexistent/x.pdf"], &dir).unwrap_err();
        assert!(err.to_string().contains("reading /nonexistent/x.pdf"));
    }
}
