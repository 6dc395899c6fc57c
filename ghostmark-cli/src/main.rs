use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use ghostmark::{
    bits, BorderEngine, BorderNumber, FontStegoEngine, GhostmarkConfig, Method, MethodParams, PdfDocument, PdftoppmRenderer,
    Pipeline, TesseractCommandProvider,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "ghostmark",
    about = "Hide and recover watermarks, QR identities, font-size messages and stepped borders in PDF files",
    version,
    author
)]
struct Cli {
    /// JSON configuration file (defaults apply to missing keys)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed one or more marks into a PDF
    Embed {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Text for the near-invisible watermark
        #[arg(short, long)]
        watermark: Option<String>,

        /// Identity (email) for the QR payload
        #[arg(short, long)]
        identity: Option<String>,

        /// Secret message for font-size steganography
        #[arg(short, long)]
        secret: Option<String>,

        /// Cover text that carries the secret
        #[arg(long, conflicts_with = "cover_file")]
        cover: Option<String>,

        /// Read the cover text from a file
        #[arg(long)]
        cover_file: Option<PathBuf>,

        /// Comma-separated methods (watermark, qr_code, font_stego). Without it every method
        /// whose parameters are given runs.
        #[arg(short, long)]
        methods: Option<String>,
    },

    /// Recover a watermark from a PDF, PNG or JPG file
    ExtractWatermark {
        /// Input file
        input: PathBuf,

        /// tesseract binary
        #[arg(long, default_value = "tesseract")]
        tesseract: PathBuf,

        /// pdftoppm binary
        #[arg(long, default_value = "pdftoppm")]
        pdftoppm: PathBuf,

        /// Print the full reading as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read the QR identity payload from a PDF or image
    DecodeQr {
        /// Input file
        input: PathBuf,

        /// pdftoppm binary
        #[arg(long, default_value = "pdftoppm")]
        pdftoppm: PathBuf,
    },

    /// Decode a font-size steganography message
    DecodeStego {
        /// Input PDF file
        input: PathBuf,

        /// Also print the raw bitstreams per page region
        #[arg(short, long)]
        bits: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Draw a page border whose stepped right edge encodes an identity
    Border {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Identity (email) folded into the border digits
        #[arg(short, long, conflicts_with = "number", required_unless_present = "number")]
        identity: Option<String>,

        /// Draw these ten digits instead of folding an identity
        #[arg(short, long)]
        number: Option<String>,
    },

    /// Read the digits of a stepped border
    DecodeBorder {
        /// Input PDF file
        input: PathBuf,

        /// Check whether this identity folds to the border digits
        #[arg(short, long)]
        identity: Option<String>,
    },

    /// Show how many bits a cover text can carry
    Capacity {
        /// Cover text
        #[arg(long, conflicts_with = "cover_file")]
        cover: Option<String>,

        /// Read the cover text from a file
        #[arg(long)]
        cover_file: Option<PathBuf>,

        /// Check whether this message fits
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Write a blank multi-page PDF to experiment with
    Demo {
        /// Output file path
        #[arg(short, long, default_value = "demo.pdf")]
        output: PathBuf,

        /// Number of pages
        #[arg(short, long, default_value = "3")]
        pages: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghostmark=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Embed {
            input,
            output,
            watermark,
            identity,
            secret,
            cover,
            cover_file,
            methods,
        } => {
            let params = MethodParams {
                watermark_text: watermark,
                identity,
                secret_message: secret,
                cover_text: read_cover(cover, cover_file.as_deref())?,
            };
            let bytes = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let pipeline = Pipeline::new(config);
            let outcome = match methods {
                Some(list) => {
                    let selected = Method::parse_list(&list)?;
                    params.validate_for(&selected)?;
                    pipeline.apply(&bytes, &selected, &params)?
                }
                None => {
                    if params.available_methods().is_empty() {
                        bail!("Nothing to embed: pass --watermark, --identity or --secret with --cover");
                    }
                    pipeline.apply_all(&bytes, &params)?
                }
            };

            fs::write(&output, &outcome.bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Applied methods: {}", outcome.methods_header());
            println!("Wrote {}", output.display());
        }

        Commands::ExtractWatermark {
            input,
            tesseract,
            pdftoppm,
            json,
        } => {
            let pipeline = Pipeline::new(config);
            let renderer = PdftoppmRenderer::with_binary(pdftoppm);
            let ocr = TesseractCommandProvider::with_binary(tesseract);
            ocr.check_availability()?;

            let reading = pipeline
                .watermark()
                .extract_path(&input, &renderer, &ocr)
                .with_context(|| format!("Failed to extract watermark from {}", input.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reading)?);
            } else {
                debug!(candidates = ?reading.candidates(), "OCR candidates");
                println!("{reading}");
            }
        }

        Commands::DecodeQr { input, pdftoppm } => {
            let pipeline = Pipeline::new(config);
            let renderer = PdftoppmRenderer::with_binary(pdftoppm);
            let bytes = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let payload = pipeline
                .barcode()
                .read_document(&bytes, &renderer)?
                .ok_or_else(|| anyhow!("No QR code found in {}", input.display()))?;
            let identity = pipeline.barcode().decode_payload(&payload)?;
            println!("Payload: {payload}");
            println!("Identity: {identity}");
        }

        Commands::DecodeStego { input, bits, json } => {
            let engine = FontStegoEngine::new(&config);
            let bytes = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let report = engine
                .decode_bytes(&bytes)?
                .ok_or_else(|| anyhow!("No hidden message found in {}", input.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("Message: {}", report.message());
            if let Some(at) = report.decoded.truncated_at {
                println!("Truncated at byte {at}");
            }
            if report.unrecognized_spans > 0 {
                println!("Skipped {} footer spans with unknown sizes", report.unrecognized_spans);
            }
            if bits {
                println!("Header bits: {}", report.header_bits);
                println!("Body bits:   {}", report.body_bits);
                println!("Footer bits: {}", report.footer_bits);
            }
        }

        Commands::Border {
            input,
            output,
            identity,
            number,
        } => {
            let engine = BorderEngine::new(&config);
            let bytes = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let mut document = PdfDocument::load(&bytes)?;

            let number = match (identity, number) {
                (Some(identity), _) => engine.embed_identity(&mut document, &identity)?,
                (None, Some(digits)) => {
                    let number: BorderNumber = digits.parse()?;
                    engine.embed(&mut document, &number)?;
                    number
                }
                (None, None) => bail!("Pass --identity or --number"),
            };

            fs::write(&output, document.to_bytes()?)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Border number: {number}");
            println!("Wrote {}", output.display());
        }

        Commands::DecodeBorder { input, identity } => {
            let engine = BorderEngine::new(&config);
            let bytes = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let number = engine
                .read_bytes(&bytes)?
                .ok_or_else(|| anyhow!("No border found in {}", input.display()))?;
            println!("Border number: {number}");
            if let Some(identity) = identity {
                let verdict = if BorderEngine::matches(&identity, &number) {
                    "yes"
                } else {
                    "no"
                };
                println!("Matches {identity}: {verdict}");
            }
        }

        Commands::Capacity {
            cover,
            cover_file,
            secret,
        } => {
            let cover = read_cover(cover, cover_file.as_deref())?
                .ok_or_else(|| anyhow!("Pass --cover or --cover-file"))?;
            let available = FontStegoEngine::capacity(&cover);
            println!("Cover capacity: {available} bits");

            if let Some(secret) = secret {
                let needed = bits::encode(secret.as_bytes()).len();
                println!("Message needs: {needed} bits");
                if needed > available {
                    bail!(
                        "Message does not fit: {} more non-space characters needed",
                        needed - available
                    );
                }
                println!("Message fits");
            }
        }

        Commands::Demo { output, pages } => {
            if pages == 0 {
                bail!("--pages must be at least 1");
            }
            let bytes = PdfDocument::blank(pages, 612.0, 792.0)?;
            fs::write(&output, bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Demo PDF created successfully!");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<GhostmarkConfig> {
    match path {
        Some(path) => GhostmarkConfig::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(GhostmarkConfig::default()),
    }
}

fn read_cover(cover: Option<String>, cover_file: Option<&Path>) -> Result<Option<String>> {
    match (cover, cover_file) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(path)) => fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read cover text from {}", path.display())),
        (None, None) => Ok(None),
    }
}
