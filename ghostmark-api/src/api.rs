use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use ghostmark::{
    BorderEngine, GhostmarkConfig, GhostmarkError, Method, MethodParams, OcrProvider,
    PageRenderer, PdfDocument, PdftoppmRenderer, Pipeline, PipelineOutcome,
    TesseractCommandProvider,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Largest accepted multipart upload
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Standard error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message describing what went wrong
    pub error: String,
}

/// Response for watermark extraction
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractWatermarkResponse {
    /// Recovered text, or "No watermark found"
    pub watermark: String,
    pub found: bool,
    /// Normalized OCR readings, one per frame that produced text
    pub candidates: Vec<String>,
}

/// Response for QR identity recovery
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractQrResponse {
    /// Raw QR payload
    pub payload: String,
    /// Decoded identity, absent when the payload is not cipher-framed
    pub identity: Option<String>,
}

/// Response for font steganography decoding
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractStegoResponse {
    pub message: String,
    /// Footer bitstream as a string of 0 and 1
    pub bits: String,
    pub truncated_at: Option<usize>,
}

/// Response for stepped border recovery
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractBorderResponse {
    /// Ten digits read from the first bordered page
    pub number: String,
    /// Whether the `email` field folds to `number`, when one was sent
    pub matches: Option<bool>,
}

/// Application-specific error types for the API
#[derive(Debug, Error)]
pub enum AppError {
    /// Library errors, mapped to a status by kind
    #[error(transparent)]
    Ghostmark(#[from] GhostmarkError),
    /// Malformed request or missing form fields
    #[error("{0}")]
    BadRequest(String),
    /// Nothing to recover from the upload
    #[error("{0}")]
    NotFound(String),
    /// Worker or runtime failures
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ghostmark(GhostmarkError::UnsupportedFormat(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            AppError::Ghostmark(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::Ghostmark(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        }

        let error_response = ErrorResponse {
            error: self.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Shared handler state: the pipeline plus the rendering and OCR collaborators
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    renderer: Arc<dyn PageRenderer>,
    ocr: Arc<dyn OcrProvider>,
}

impl AppState {
    /// `pdftoppm` and `tesseract` from `PATH`
    pub fn new(config: GhostmarkConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(PdftoppmRenderer::new()),
            Arc::new(TesseractCommandProvider::new()),
        )
    }

    pub fn with_collaborators(
        config: GhostmarkConfig,
        renderer: Arc<dyn PageRenderer>,
        ocr: Arc<dyn OcrProvider>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::new(config)),
            renderer,
            ocr,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(GhostmarkConfig::default())
    }
}

/// Build the application router with default configuration
pub fn app() -> Router {
    app_with_state(AppState::default())
}

/// Build the application router with all routes configured
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api", get(api_info))
        .route("/api/health", get(health_check))
        // Embedding
        .route("/api/watermark", post(add_watermark))
        .route("/api/qr-code", post(add_qr_code))
        .route("/api/font-steganography", post(add_font_stego))
        .route("/api/all", post(add_all))
        .route("/api/selected", post(add_selected))
        .route("/api/border", post(add_border))
        // Recovery
        .route("/api/extract/watermark", post(extract_watermark))
        .route("/api/extract/qr-code", post(extract_qr_code))
        .route("/api/extract/font-steganography", post(extract_font_stego))
        .route("/api/extract/border", post(extract_border))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Service description and the available endpoints
pub async fn api_info() -> impl IntoResponse {
    let methods: Vec<&str> = Method::CANONICAL.iter().map(|m| m.as_str()).collect();
    Json(serde_json::json!({
        "service": "ghostmark API",
        "api_version": ghostmark::VERSION,
        "message": "PDF Steganography REST API",
        "methods": methods,
        "available_endpoints": {
            "info": { "url": "/api", "method": "GET" },
            "health": { "url": "/api/health", "method": "GET" },
            "watermark": {
                "url": "/api/watermark",
                "method": "POST",
                "description": "Add invisible watermark to PDF",
                "required_fields": ["file", "watermark_text"],
            },
            "qr_code": {
                "url": "/api/qr-code",
                "method": "POST",
                "description": "Add QR code with encoded email to PDF",
                "required_fields": ["file", "email"],
            },
            "font_steganography": {
                "url": "/api/font-steganography",
                "method": "POST",
                "description": "Hide message using font size variations",
                "required_fields": ["file", "secret_message", "cover_text"],
            },
            "all_methods": {
                "url": "/api/all",
                "method": "POST",
                "description": "Apply every method whose parameters are present",
                "required_fields": ["file"],
                "optional_fields": {
                    "enable_watermark": { "type": "boolean", "default": true },
                    "enable_qr_code": { "type": "boolean", "default": true },
                    "enable_font_stego": { "type": "boolean", "default": true },
                },
                "note": "Every method runs when its parameters are present unless its enable_* flag is false",
            },
            "selected_methods": {
                "url": "/api/selected",
                "method": "POST",
                "description": "Apply selected steganography methods",
                "required_fields": ["file", "methods"],
                "note": "Provide additional fields based on selected methods",
            },
            "border": {
                "url": "/api/border",
                "method": "POST",
                "description": "Draw a page border whose stepped right edge encodes the email",
                "required_fields": ["file", "email"],
            },
            "extract_watermark": { "url": "/api/extract/watermark", "method": "POST" },
            "extract_qr_code": { "url": "/api/extract/qr-code", "method": "POST" },
            "extract_font_steganography": {
                "url": "/api/extract/font-steganography",
                "method": "POST",
            },
            "extract_border": {
                "url": "/api/extract/border",
                "method": "POST",
                "note": "Send email as well to check it against the border",
            },
        },
    }))
}

/// Health check endpoint for monitoring and load balancing
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ghostmark API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Multipart form: one file plus text fields
#[derive(Debug, Default)]
struct Upload {
    filename: Option<String>,
    file: Option<Vec<u8>>,
    fields: HashMap<String, String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut upload = Upload::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" | "pdf_file" => {
                    upload.filename = field.file_name().map(str::to_string);
                    let data = field.bytes().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read file data: {e}"))
                    })?;
                    upload.file = Some(data.to_vec());
                }
                _ => {
                    let value = field.text().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read field {name}: {e}"))
                    })?;
                    // repeated `methods` fields accumulate
                    if name == "methods" {
                        if let Some(existing) = upload.fields.get_mut("methods") {
                            existing.push(',');
                            existing.push_str(&value);
                            continue;
                        }
                    }
                    upload.fields.insert(name, value);
                }
            }
        }

        Ok(upload)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// `enable_*` style switch, on unless explicitly turned off
    fn flag(&self, name: &str) -> Result<bool, AppError> {
        match self.field(name).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(true),
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(false),
            Some(v) => Err(AppError::BadRequest(format!(
                "{name} must be true or false, got '{v}'"
            ))),
        }
    }

    fn params(&self) -> MethodParams {
        let owned = |name: &str| self.field(name).map(str::to_string);
        MethodParams {
            watermark_text: owned("watermark_text"),
            identity: owned("email").or_else(|| owned("identity")),
            secret_message: owned("secret_message"),
            cover_text: owned("cover_text"),
        }
    }

    fn take_file(&mut self) -> Result<Vec<u8>, AppError> {
        self.file
            .take()
            .filter(|data| !data.is_empty())
            .ok_or_else(|| AppError::BadRequest("No file provided in upload".to_string()))
    }

    /// The uploaded file, which must be a PDF by name and by content
    fn take_pdf(&mut self) -> Result<Vec<u8>, AppError> {
        if let Some(name) = &self.filename {
            if !name.to_ascii_lowercase().ends_with(".pdf") {
                return Err(GhostmarkError::UnsupportedFormat(format!(
                    "{name}: file must be a PDF"
                ))
                .into());
            }
        }
        let data = self.take_file()?;
        if !data.starts_with(b"%PDF-") {
            return Err(
                GhostmarkError::UnsupportedFormat("file is not a PDF document".to_string()).into(),
            );
        }
        Ok(data)
    }

    fn download_name(&self, prefix: &str) -> String {
        let base = self
            .filename
            .as_deref()
            .and_then(|name| name.rsplit(['/', '\\']).next())
            .filter(|name| !name.is_empty())
            .unwrap_or("document.pdf");
        let clean: String = base.chars().filter(|c| *c != '"' && !c.is_control()).collect();
        format!("{prefix}_{clean}")
    }
}

/// Run `methods` on the uploaded PDF off the async executor
async fn run_pipeline(
    state: &AppState,
    bytes: Vec<u8>,
    methods: Vec<Method>,
    params: MethodParams,
) -> Result<PipelineOutcome, AppError> {
    let pipeline = Arc::clone(&state.pipeline);
    let outcome = tokio::task::spawn_blocking(move || pipeline.apply(&bytes, &methods, &params))
        .await
        .map_err(|e| AppError::Internal(format!("Pipeline task failed: {e}")))??;
    info!(methods = %outcome.methods_header(), "embedding finished");
    Ok(outcome)
}

fn pdf_response(outcome: PipelineOutcome, filename: String) -> Response {
    (
        StatusCode::OK,
        [
            ("Content-Type", "application/pdf".to_string()),
            (
                "Content-Disposition",
                format!("attachment; filename=\"{filename}\""),
            ),
            ("X-Methods-Applied", outcome.methods_header()),
        ],
        outcome.bytes,
    )
        .into_response()
}

/// Shared body of the single-method endpoints
async fn embed_single(
    state: AppState,
    multipart: Multipart,
    method: Method,
    prefix: &str,
) -> Result<Response, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let bytes = upload.take_pdf()?;
    let params = upload.params();
    params.validate_for(&[method])?;

    let outcome = run_pipeline(&state, bytes, vec![method], params).await?;
    Ok(pdf_response(outcome, upload.download_name(prefix)))
}

/// Add the near-invisible watermark to every page but the first
async fn add_watermark(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    embed_single(state, multipart, Method::Watermark, "watermarked").await
}

/// Stamp the cipher-framed email as a QR code on every page
async fn add_qr_code(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    embed_single(state, multipart, Method::QrCode, "qr_code").await
}

/// Hide `secret_message` in the font sizes of `cover_text`
async fn add_font_stego(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    embed_single(state, multipart, Method::FontStego, "font_stego").await
}

/// Apply every enabled method whose parameters are present
async fn add_all(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let bytes = upload.take_pdf()?;
    let params = upload.params();

    let enabled = [
        (Method::Watermark, upload.flag("enable_watermark")?),
        (Method::QrCode, upload.flag("enable_qr_code")?),
        (Method::FontStego, upload.flag("enable_font_stego")?),
    ];
    let methods: Vec<Method> = enabled
        .into_iter()
        .filter(|(method, on)| *on && params.supports(*method))
        .map(|(method, _)| method)
        .collect();
    if methods.is_empty() {
        return Err(AppError::BadRequest(
            "Provide parameters for at least one enabled method".to_string(),
        ));
    }
    params.validate_for(&methods)?;

    let outcome = run_pipeline(&state, bytes, methods, params).await?;
    Ok(pdf_response(outcome, upload.download_name("all_stego")))
}

/// Apply the methods named in `methods`, each of which must be fully parameterized
async fn add_selected(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let bytes = upload.take_pdf()?;
    let methods = upload
        .field("methods")
        .ok_or_else(|| AppError::BadRequest("methods is required".to_string()))
        .and_then(|list| Method::parse_list(list).map_err(AppError::from))?;
    let params = upload.params();
    params.validate_for(&methods)?;

    let outcome = run_pipeline(&state, bytes, methods, params).await?;
    Ok(pdf_response(outcome, upload.download_name("selected_stego")))
}

/// Draw the stepped border for `email` on every page
async fn add_border(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let bytes = upload.take_pdf()?;
    let identity = upload
        .field("email")
        .or_else(|| upload.field("identity"))
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("email is required".to_string()))?;

    let worker = state.clone();
    let (bytes, number) = tokio::task::spawn_blocking(move || {
        let mut document = PdfDocument::load(&bytes)?;
        let number = worker.pipeline.border().embed_identity(&mut document, &identity)?;
        Ok::<_, GhostmarkError>((document.to_bytes()?, number))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Border task failed: {e}")))??;
    info!(%number, "border drawn");

    let filename = upload.download_name("bordered");
    Ok((
        StatusCode::OK,
        [
            ("Content-Type", "application/pdf".to_string()),
            (
                "Content-Disposition",
                format!("attachment; filename=\"{filename}\""),
            ),
            ("X-Border-Number", number.to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// Recover the watermark from an uploaded PDF, PNG or JPEG
pub async fn extract_watermark(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractWatermarkResponse>, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let bytes = upload.take_file()?;

    let worker = state.clone();
    let reading = tokio::task::spawn_blocking(move || {
        worker
            .pipeline
            .watermark()
            .extract(&bytes, worker.renderer.as_ref(), worker.ocr.as_ref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Extraction task failed: {e}")))??;

    Ok(Json(ExtractWatermarkResponse {
        watermark: reading.text().to_string(),
        found: reading.is_found(),
        candidates: reading.candidates().to_vec(),
    }))
}

/// Read the QR identity payload from an uploaded PDF or image
pub async fn extract_qr_code(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractQrResponse>, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let bytes = upload.take_file()?;

    let worker = state.clone();
    let payload = tokio::task::spawn_blocking(move || {
        worker
            .pipeline
            .barcode()
            .read_document(&bytes, worker.renderer.as_ref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Extraction task failed: {e}")))??
    .ok_or_else(|| AppError::NotFound("No QR code found".to_string()))?;

    let identity = match state.pipeline.barcode().decode_payload(&payload) {
        Ok(identity) => Some(identity),
        Err(e) => {
            warn!("QR code found but not decodable: {e}");
            None
        }
    };
    Ok(Json(ExtractQrResponse { payload, identity }))
}

/// Decode the font-size message from an uploaded PDF
pub async fn extract_font_stego(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractStegoResponse>, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let bytes = upload.take_pdf()?;

    let worker = state.clone();
    let report = tokio::task::spawn_blocking(move || worker.pipeline.font_stego().decode_bytes(&bytes))
        .await
        .map_err(|e| AppError::Internal(format!("Extraction task failed: {e}")))??
        .ok_or_else(|| AppError::NotFound("No hidden message found".to_string()))?;

    Ok(Json(ExtractStegoResponse {
        message: report.message(),
        bits: report.footer_bits.to_string(),
        truncated_at: report.decoded.truncated_at,
    }))
}

/// Read the stepped border from an uploaded PDF
pub async fn extract_border(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractBorderResponse>, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let bytes = upload.take_pdf()?;

    let worker = state.clone();
    let number = tokio::task::spawn_blocking(move || worker.pipeline.border().read_bytes(&bytes))
        .await
        .map_err(|e| AppError::Internal(format!("Extraction task failed: {e}")))??
        .ok_or_else(|| AppError::NotFound("No border found".to_string()))?;

    let matches = upload
        .field("email")
        .map(|email| BorderEngine::matches(email, &number));
    Ok(Json(ExtractBorderResponse {
        number: number.to_string(),
        matches,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: Option<&str>, fields: &[(&str, &str)]) -> Upload {
        Upload {
            filename: filename.map(str::to_string),
            file: Some(b"%PDF-1.5\n".to_vec()),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                AppError::from(GhostmarkError::Capacity {
                    needed: 16,
                    available: 3,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(GhostmarkError::UnsupportedFormat("gif".to_string())),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                AppError::from(GhostmarkError::RenderingFailure("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::NotFound("none".to_string()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("bad".to_string()), StatusCode::BAD_REQUEST),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }

    #[test]
    fn test_ghostmark_error_message_passes_through() {
        let error = AppError::from(GhostmarkError::Capacity {
            needed: 16,
            available: 3,
        });
        assert!(error.to_string().starts_with("Cover text too short!"));
    }

    #[test]
    fn test_params_accept_email_or_identity() {
        let params = upload(None, &[("email", "a@b.c"), ("watermark_text", "  ")]).params();
        assert_eq!(params.identity.as_deref(), Some("a@b.c"));
        assert_eq!(params.watermark_text, None);

        let params = upload(None, &[("identity", "x@y.z")]).params();
        assert_eq!(params.identity.as_deref(), Some("x@y.z"));
    }

    #[test]
    fn test_flags_default_on() {
        let form = upload(None, &[("enable_watermark", "false"), ("enable_qr_code", "1")]);
        assert!(!form.flag("enable_watermark").unwrap());
        assert!(form.flag("enable_qr_code").unwrap());
        assert!(form.flag("enable_font_stego").unwrap());
        assert!(upload(None, &[("enable_watermark", "maybe")])
            .flag("enable_watermark")
            .is_err());
    }

    #[test]
    fn test_take_pdf_checks_name_and_content() {
        assert!(upload(Some("report.PDF"), &[]).take_pdf().is_ok());
        assert!(upload(None, &[]).take_pdf().is_ok());

        let err = upload(Some("report.docx"), &[]).take_pdf().unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let mut not_pdf = upload(Some("fake.pdf"), &[]);
        not_pdf.file = Some(b"hello".to_vec());
        assert_eq!(
            not_pdf.take_pdf().unwrap_err().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );

        let mut empty = upload(Some("a.pdf"), &[]);
        empty.file = None;
        assert_eq!(empty.take_pdf().unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_download_name() {
        assert_eq!(
            upload(Some("dir/report.pdf"), &[]).download_name("watermarked"),
            "watermarked_report.pdf"
        );
        assert_eq!(
            upload(Some("we\"ird.pdf"), &[]).download_name("qr_code"),
            "qr_code_weird.pdf"
        );
        assert_eq!(upload(None, &[]).download_name("all_stego"), "all_stego_document.pdf");
    }
}
