//! # ghostmark
//!
//! Hide machine-recoverable marks inside PDF documents and read them back.
//!
//! ## Features
//!
//! - **Invisible Watermarks**: Near-white text at fixed anchors, recovered by color masking and OCR
//! - **QR Identity Payloads**: A cipher-framed identity rendered as a QR code in a page corner
//! - **Font-Size Steganography**: Secret bits carried by the point sizes of footer cover text
//! - **Stepped Borders**: A page border whose right edge encodes ten digits folded from an identity
//! - **Pipeline**: Any subset of the three applied in a fixed order over one byte stream
//! - **Pluggable Collaborators**: Page rendering, OCR and barcode backends behind traits
//!
//! ## Quick Start
//!
//! ```rust
//! use ghostmark::{GhostmarkConfig, Method, MethodParams, Pipeline, PdfDocument, Result};
//!
//! # fn main() -> Result<()> {
//! let input = PdfDocument::blank(2, 612.0, 792.0)?;
//! let pipeline = Pipeline::new(GhostmarkConfig::default());
//!
//! let params = MethodParams {
//!     watermark_text: Some("owner@example.com".to_string()),
//!     secret_message: Some("HI".to_string()),
//!     cover_text: Some("Please keep this document in a safe place".to_string()),
//!     ..MethodParams::default()
//! };
//! let outcome = pipeline.apply(&input, &[Method::FontStego, Method::Watermark], &params)?;
//! assert_eq!(outcome.methods_header(), "watermark,font_stego");
//!
//! let report = pipeline.font_stego().decode_bytes(&outcome.bytes)?.unwrap();
//! assert_eq!(report.message(), "HI");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! ### Codecs
//! - [`bits`] - Byte messages to bitstreams and back, with truncation reporting
//! - [`cipher`] - Substitution cipher with prefix/suffix framing
//! - [`barcode`] - QR rendering, placement and detection
//! - [`watermark`] - Watermark embedding and extraction
//! - [`font_stego`] - Font-size steganography
//! - [`border`] - Stepped border fingerprint
//! - [`pipeline`] - Method selection and ordering
//!
//! ### Collaborators
//! - [`pdf`] - Page writer, text span and line readers over `lopdf`
//! - [`render`] - Page rasterization (`pdftoppm`)
//! - [`ocr`] - OCR trait, mock and Tesseract providers (in-process bindings require the
//!   `ocr-tesseract` feature)

pub mod barcode;
pub mod bits;
pub mod border;
pub mod cipher;
pub mod config;
pub mod error;
pub mod font_stego;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod render;
pub mod watermark;

pub use barcode::{BarcodeEngine, BarcodeGenerator, BarcodeReader, QrGenerator, QuircReader};
pub use bits::{Bitstream, DecodedBytes};
pub use border::{BorderEngine, BorderNumber};
pub use cipher::{CipherPayload, SubstitutionCipher};
pub use config::GhostmarkConfig;
pub use error::{GhostmarkError, Result};
pub use font_stego::{FontSizeClass, FontStegoEngine, FontStegoReport, PageRegion};
pub use ocr::{MockOcrProvider, OcrProvider, TesseractCommandProvider};
pub use pdf::PdfDocument;
pub use pipeline::{methods_header, Method, MethodParams, Pipeline, PipelineOutcome};
pub use render::{PageRenderer, PdftoppmRenderer};
pub use watermark::{WatermarkEngine, WatermarkReading};

/// Current version of ghostmark
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
