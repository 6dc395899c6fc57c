//! Method composition over one document
//!
//! The pipeline runs the selected codecs in a fixed order (watermark, QR code, font
//! steganography) whatever order the caller lists them in. Each step loads the bytes the
//! previous step produced and serializes its own result; the first error aborts the run and
//! nothing produced so far is returned.

use crate::barcode::{BarcodeEngine, MAX_IDENTITY_LEN};
use crate::border::BorderEngine;
use crate::config::GhostmarkConfig;
use crate::error::{GhostmarkError, Result};
use crate::font_stego::FontStegoEngine;
use crate::pdf::PdfDocument;
use crate::watermark::WatermarkEngine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Longest accepted watermark text
pub const MAX_WATERMARK_LEN: usize = 255;
/// Longest accepted secret message
pub const MAX_SECRET_LEN: usize = 200;

/// A hiding technique the pipeline can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Watermark,
    QrCode,
    FontStego,
}

impl Method {
    /// Execution order
    pub const CANONICAL: [Method; 3] = [Method::Watermark, Method::QrCode, Method::FontStego];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Watermark => "watermark",
            Method::QrCode => "qr_code",
            Method::FontStego => "font_stego",
        }
    }

    /// Parse a comma separated list, ignoring blanks
    pub fn parse_list(list: &str) -> Result<Vec<Method>> {
        list.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = GhostmarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "watermark" => Ok(Method::Watermark),
            "qr_code" | "qr-code" | "qrcode" | "barcode" => Ok(Method::QrCode),
            "font_stego" | "font-stego" | "font_steganography" | "font-steganography" => {
                Ok(Method::FontStego)
            }
            other => Err(GhostmarkError::InvalidParameters(format!(
                "unknown method '{other}' (expected watermark, qr_code or font_stego)"
            ))),
        }
    }
}

/// Value of the `X-Methods-Applied` header
pub fn methods_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Per-method inputs. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodParams {
    pub watermark_text: Option<String>,
    #[serde(alias = "email")]
    pub identity: Option<String>,
    pub secret_message: Option<String>,
    pub cover_text: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl MethodParams {
    pub fn watermark_text(&self) -> Option<&str> {
        present(&self.watermark_text)
    }

    pub fn identity(&self) -> Option<&str> {
        present(&self.identity)
    }

    /// Secret and cover text, only when both are given
    pub fn font_stego(&self) -> Option<(&str, &str)> {
        Some((present(&self.secret_message)?, present(&self.cover_text)?))
    }

    /// Whether everything `method` needs is present
    pub fn supports(&self, method: Method) -> bool {
        match method {
            Method::Watermark => self.watermark_text().is_some(),
            Method::QrCode => self.identity().is_some(),
            Method::FontStego => self.font_stego().is_some(),
        }
    }

    /// Methods these parameters can drive, in canonical order
    pub fn available_methods(&self) -> Vec<Method> {
        Method::CANONICAL
            .into_iter()
            .filter(|m| self.supports(*m))
            .collect()
    }

    /// Strict checks for a request that names its methods: at least one method, every
    /// selected method fully parameterized, length limits respected, a plausible identity
    /// and a cover text long enough for the secret.
    pub fn validate_for(&self, methods: &[Method]) -> Result<()> {
        if methods.is_empty() {
            return Err(GhostmarkError::InvalidParameters(
                "At least one steganography method must be selected".to_string(),
            ));
        }

        if let Some(text) = self.watermark_text() {
            if text.chars().count() > MAX_WATERMARK_LEN {
                return Err(GhostmarkError::InvalidParameters(format!(
                    "watermark_text must be at most {MAX_WATERMARK_LEN} characters"
                )));
            }
        }
        if let Some(secret) = present(&self.secret_message) {
            if secret.chars().count() > MAX_SECRET_LEN {
                return Err(GhostmarkError::InvalidParameters(format!(
                    "secret_message must be at most {MAX_SECRET_LEN} characters"
                )));
            }
        }

        for method in methods {
            match method {
                Method::Watermark if self.watermark_text().is_none() => {
                    return Err(GhostmarkError::InvalidParameters(
                        "watermark_text is required when watermark is selected".to_string(),
                    ));
                }
                Method::QrCode => {
                    let identity = self.identity().ok_or_else(|| {
                        GhostmarkError::InvalidParameters(
                            "email is required when qr_code is selected".to_string(),
                        )
                    })?;
                    validate_identity(identity)?;
                }
                Method::FontStego => {
                    let (secret, cover) = self.font_stego().ok_or_else(|| {
                        GhostmarkError::InvalidParameters(
                            "secret_message and cover_text are required when font_stego is selected"
                                .to_string(),
                        )
                    })?;
                    let needed = secret.len() * 8;
                    let available = FontStegoEngine::capacity(cover);
                    if needed > available {
                        return Err(GhostmarkError::Capacity { needed, available });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Exactly one `@` with something on both sides, at most [`MAX_IDENTITY_LEN`] characters
fn validate_identity(identity: &str) -> Result<()> {
    if identity.trim().chars().count() > MAX_IDENTITY_LEN {
        return Err(GhostmarkError::InvalidParameters(format!(
            "email must be at most {MAX_IDENTITY_LEN} characters"
        )));
    }
    match identity.trim().split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(GhostmarkError::InvalidParameters(format!(
            "'{identity}' is not a valid email address"
        ))),
    }
}

/// Final bytes and the methods that actually ran
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub bytes: Vec<u8>,
    pub methods_applied: Vec<Method>,
}

impl PipelineOutcome {
    pub fn methods_header(&self) -> String {
        methods_header(&self.methods_applied)
    }
}

/// Runs codecs in canonical order over a PDF byte stream.
/// Also owns the border engine, which is applied on its own rather than as a method.
pub struct Pipeline {
    config: GhostmarkConfig,
    watermark: WatermarkEngine,
    barcode: BarcodeEngine,
    font_stego: FontStegoEngine,
    border: BorderEngine,
}

impl Pipeline {
    pub fn new(config: GhostmarkConfig) -> Self {
        Self {
            watermark: WatermarkEngine::new(&config),
            barcode: BarcodeEngine::new(&config),
            font_stego: FontStegoEngine::new(&config),
            border: BorderEngine::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &GhostmarkConfig {
        &self.config
    }

    pub fn watermark(&self) -> &WatermarkEngine {
        &self.watermark
    }

    pub fn barcode(&self) -> &BarcodeEngine {
        &self.barcode
    }

    pub fn font_stego(&self) -> &FontStegoEngine {
        &self.font_stego
    }

    pub fn border(&self) -> &BorderEngine {
        &self.border
    }

    /// Apply every method in `selected` whose parameters are present
    pub fn apply(&self, bytes: &[u8], selected: &[Method], params: &MethodParams) -> Result<PipelineOutcome> {
        let mut current = bytes.to_vec();
        let mut methods_applied = Vec::new();

        for method in Method::CANONICAL {
            if !selected.contains(&method) {
                continue;
            }
            if !params.supports(method) {
                debug!(%method, "skipping method without parameters");
                continue;
            }

            let mut document = PdfDocument::load(&current)?;
            match method {
                Method::Watermark => {
                    if let Some(text) = params.watermark_text() {
                        self.watermark.embed(
                            &mut document,
                            text,
                            self.config.watermark.skip_first_page,
                        )?;
                    }
                }
                Method::QrCode => {
                    if let Some(identity) = params.identity() {
                        self.barcode.embed_identity(&mut document, identity.trim())?;
                    }
                }
                Method::FontStego => {
                    if let Some((secret, cover)) = params.font_stego() {
                        self.font_stego.encode(&mut document, secret, cover)?;
                    }
                }
            }
            current = document.to_bytes()?;
            debug!(%method, bytes = current.len(), "pipeline step finished");
            methods_applied.push(method);
        }

        info!(methods = %methods_header(&methods_applied), "pipeline finished");
        Ok(PipelineOutcome {
            bytes: current,
            methods_applied,
        })
    }

    /// Apply every method the parameters support
    pub fn apply_all(&self, bytes: &[u8], params: &MethodParams) -> Result<PipelineOutcome> {
        self.apply(bytes, &Method::CANONICAL, params)
    }
}
