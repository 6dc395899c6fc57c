//! Integration tests for ghostmark-api

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use ghostmark::{BarcodeEngine, GhostmarkConfig, MockOcrProvider, PageRenderer, PdfDocument};
use ghostmark_api::{app, app_with_state, AppState, ErrorResponse, ExtractStegoResponse};
use http_body_util::BodyExt;
use image::{imageops, DynamicImage, GrayImage, Luma};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use tower::util::ServiceExt;

const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

/// Returns the same frames for every document
struct CannedRenderer(Vec<DynamicImage>);

impl PageRenderer for CannedRenderer {
    fn render(&self, _pdf: &[u8], _dpi: u32) -> ghostmark::Result<Vec<DynamicImage>> {
        Ok(self.0.clone())
    }
}

fn white_frame() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(400, 400, Luma([255])))
}

fn app_with(frames: Vec<DynamicImage>, ocr_answer: &str) -> Router {
    let state = AppState::with_collaborators(
        GhostmarkConfig::default(),
        Arc::new(CannedRenderer(frames)),
        Arc::new(MockOcrProvider::with_responses(vec![ocr_answer.to_string()])),
    );
    app_with_state(state)
}

fn sample_pdf(pages: usize) -> Vec<u8> {
    PdfDocument::blank(pages, 612.0, 792.0).unwrap()
}

fn multipart_request(uri: &str, file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();

    if let Some((filename, data)) = file {
        write!(body, "--{BOUNDARY}\r\n").unwrap();
        write!(
            body,
            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
        )
        .unwrap();
        write!(body, "Content-Type: application/octet-stream\r\n\r\n").unwrap();
        body.extend_from_slice(data);
        write!(body, "\r\n").unwrap();
    }

    for (name, value) in fields {
        write!(body, "--{BOUNDARY}\r\n").unwrap();
        write!(body, "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").unwrap();
        write!(body, "{value}\r\n").unwrap();
    }
    write!(body, "--{BOUNDARY}--\r\n").unwrap();

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn error_message(response: Response) -> String {
    let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    error.error
}

fn header_value(response: &Response, name: &str) -> String {
    response.headers()[name].to_str().unwrap().to_string()
}

#[cfg(test)]
mod info_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_health_check_endpoint() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .method("GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "ghostmark API");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_info_lists_methods_and_endpoints() {
        let response = app()
            .oneshot(Request::builder().uri("/api").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["methods"],
            serde_json::json!(["watermark", "qr_code", "font_stego"])
        );
        assert_eq!(json["available_endpoints"]["selected_methods"]["url"], "/api/selected");
        assert_eq!(json["message"], "PDF Steganography REST API");
    }

    #[tokio::test]
    async fn test_info_documents_enable_flag_defaults() {
        let response = app()
            .oneshot(Request::builder().uri("/api").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        let optional = &json["available_endpoints"]["all_methods"]["optional_fields"];
        for flag in ["enable_watermark", "enable_qr_code", "enable_font_stego"] {
            assert_eq!(optional[flag]["type"], "boolean", "{flag}");
            assert_eq!(optional[flag]["default"], true, "{flag}");
        }
    }
}

#[cfg(test)]
mod embed_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_watermark_endpoint() {
        let pdf = sample_pdf(2);
        let request = multipart_request(
            "/api/watermark",
            Some(("report.pdf", pdf.as_slice())),
            &[("watermark_text", "owner@example.com")],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_value(&response, "content-type"), "application/pdf");
        assert_eq!(
            header_value(&response, "content-disposition"),
            "attachment; filename=\"watermarked_report.pdf\""
        );
        assert_eq!(header_value(&response, "x-methods-applied"), "watermark");

        let bytes = body_bytes(response).await;
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(PdfDocument::load(&bytes).unwrap().page_count(), 2);
    }

    #[tokio::test]
    async fn test_watermark_requires_text() {
        let pdf = sample_pdf(1);
        let request = multipart_request("/api/watermark", Some(("report.pdf", pdf.as_slice())), &[]);
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_message(response).await.contains("watermark_text is required"));
    }

    #[tokio::test]
    async fn test_qr_code_rejects_invalid_email() {
        let pdf = sample_pdf(1);
        let request = multipart_request(
            "/api/qr-code",
            Some(("report.pdf", pdf.as_slice())),
            &[("email", "not-an-email")],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_message(response).await.contains("not a valid email"));
    }

    #[tokio::test]
    async fn test_qr_code_endpoint() {
        let pdf = sample_pdf(2);
        let request = multipart_request(
            "/api/qr-code",
            Some(("report.pdf", pdf.as_slice())),
            &[("email", "reader@example.org")],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_value(&response, "content-disposition"),
            "attachment; filename=\"qr_code_report.pdf\""
        );
        assert_eq!(header_value(&response, "x-methods-applied"), "qr_code");
    }

    #[tokio::test]
    async fn test_font_steganography_capacity_error() {
        let pdf = sample_pdf(1);
        let request = multipart_request(
            "/api/font-steganography",
            Some(("report.pdf", pdf.as_slice())),
            &[("secret_message", "HI"), ("cover_text", "abc")],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_message(response).await,
            "Cover text too short! Your message needs 16 characters but your cover text only has 3 non-space characters"
        );
    }

    #[tokio::test]
    async fn test_font_steganography_round_trip() {
        let pdf = sample_pdf(2);
        let request = multipart_request(
            "/api/font-steganography",
            Some(("memo.pdf", pdf.as_slice())),
            &[
                ("secret_message", "HI"),
                ("cover_text", "Prepared for the quarterly review"),
            ],
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stego_pdf = body_bytes(response).await;

        let request = multipart_request(
            "/api/extract/font-steganography",
            Some(("font_stego_memo.pdf", stego_pdf.as_slice())),
            &[],
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let report: ExtractStegoResponse =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(report.message, "HI");
        assert_eq!(report.bits, "0100100001001001");
        assert_eq!(report.truncated_at, None);
    }

    #[tokio::test]
    async fn test_all_respects_enable_flags() {
        let pdf = sample_pdf(2);
        let request = multipart_request(
            "/api/all",
            Some(("report.pdf", pdf.as_slice())),
            &[
                ("watermark_text", "owner@example.com"),
                ("email", "reader@example.org"),
                ("secret_message", "ok"),
                ("cover_text", "Prepared for the quarterly review"),
                ("enable_qr_code", "false"),
            ],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_value(&response, "x-methods-applied"), "watermark,font_stego");
        assert_eq!(
            header_value(&response, "content-disposition"),
            "attachment; filename=\"all_stego_report.pdf\""
        );
    }

    #[tokio::test]
    async fn test_all_without_params_is_rejected() {
        let pdf = sample_pdf(1);
        let request = multipart_request("/api/all", Some(("report.pdf", pdf.as_slice())), &[]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_selected_runs_in_canonical_order() {
        let pdf = sample_pdf(2);
        let request = multipart_request(
            "/api/selected",
            Some(("report.pdf", pdf.as_slice())),
            &[
                ("methods", "font_stego,watermark"),
                ("watermark_text", "owner@example.com"),
                ("secret_message", "ok"),
                ("cover_text", "Prepared for the quarterly review"),
            ],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_value(&response, "x-methods-applied"), "watermark,font_stego");
    }

    #[tokio::test]
    async fn test_selected_accepts_repeated_method_fields() {
        let pdf = sample_pdf(1);
        let request = multipart_request(
            "/api/selected",
            Some(("report.pdf", pdf.as_slice())),
            &[
                ("methods", "qr_code"),
                ("methods", "watermark"),
                ("watermark_text", "owner@example.com"),
                ("email", "reader@example.org"),
            ],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_value(&response, "x-methods-applied"), "watermark,qr_code");
    }

    #[tokio::test]
    async fn test_selected_requires_params_for_each_method() {
        let pdf = sample_pdf(1);
        let request = multipart_request(
            "/api/selected",
            Some(("report.pdf", pdf.as_slice())),
            &[("methods", "watermark,font_stego"), ("watermark_text", "x")],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_message(response).await.contains("cover_text are required"));
    }

    #[tokio::test]
    async fn test_selected_requires_methods() {
        let pdf = sample_pdf(1);
        let request = multipart_request("/api/selected", Some(("report.pdf", pdf.as_slice())), &[]);
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "methods is required");
    }

    #[tokio::test]
    async fn test_non_pdf_upload_is_unsupported() {
        let request = multipart_request(
            "/api/watermark",
            Some(("notes.txt", &b"plain text"[..])),
            &[("watermark_text", "owner@example.com")],
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let request = multipart_request("/api/watermark", None, &[("watermark_text", "x")]);
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "No file provided in upload");
    }
}

#[cfg(test)]
mod extract_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_extract_watermark() {
        let app = app_with(vec![white_frame(), white_frame()], "userATexampleDOTcom");
        let pdf = sample_pdf(2);
        let request = multipart_request("/api/extract/watermark", Some(("marked.pdf", pdf.as_slice())), &[]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["watermark"], "user@example.com");
        assert_eq!(json["found"], true);
        assert_eq!(json["candidates"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_extract_watermark_not_found() {
        let app = app_with(vec![white_frame()], "   ");
        let pdf = sample_pdf(1);
        let request = multipart_request("/api/extract/watermark", Some(("clean.pdf", pdf.as_slice())), &[]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["watermark"], "No watermark found");
        assert_eq!(json["found"], false);
    }

    #[tokio::test]
    async fn test_extract_qr_code() {
        let config = GhostmarkConfig::default();
        let engine = BarcodeEngine::new(&config);
        let payload = ghostmark::SubstitutionCipher::new(&config.cipher).encode("reader@example.org");
        let code = engine.render(payload.as_str()).unwrap();

        let mut page = GrayImage::from_pixel(900, 1100, Luma([255]));
        imageops::overlay(&mut page, &code, 500, 700);
        let app = app_with(vec![DynamicImage::ImageLuma8(page)], "");

        let pdf = sample_pdf(1);
        let request = multipart_request("/api/extract/qr-code", Some(("qr.pdf", pdf.as_slice())), &[]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["payload"], payload.as_str());
        assert_eq!(json["identity"], "reader@example.org");
    }

    #[tokio::test]
    async fn test_extract_qr_code_not_found() {
        let app = app_with(vec![white_frame()], "");
        let pdf = sample_pdf(1);
        let request = multipart_request("/api/extract/qr-code", Some(("clean.pdf", pdf.as_slice())), &[]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_message(response).await, "No QR code found");
    }

    #[tokio::test]
    async fn test_extract_rejects_unknown_format() {
        let app = app_with(Vec::new(), "");
        let request = multipart_request(
            "/api/extract/qr-code",
            Some(("image.gif", &b"GIF89a........"[..])),
            &[],
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_extract_font_stego_not_found() {
        let pdf = sample_pdf(1);
        let request = multipart_request(
            "/api/extract/font-steganography",
            Some(("clean.pdf", pdf.as_slice())),
            &[],
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_border_round_trip() {
        let pdf = sample_pdf(2);
        let request = multipart_request(
            "/api/border",
            Some(("report.pdf", pdf.as_slice())),
            &[("email", "bob@x.io")],
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_value(&response, "X-Border-Number"), "5076045300");
        assert!(header_value(&response, "Content-Disposition").contains("bordered_report.pdf"));
        let bordered = body_bytes(response).await;

        let request = multipart_request(
            "/api/extract/border",
            Some(("bordered.pdf", bordered.as_slice())),
            &[("email", "bob@x.io")],
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["number"], "5076045300");
        assert_eq!(json["matches"], true);
    }

    #[tokio::test]
    async fn test_border_requires_email() {
        let pdf = sample_pdf(1);
        let request = multipart_request("/api/border", Some(("report.pdf", pdf.as_slice())), &[]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "email is required");
    }

    #[tokio::test]
    async fn test_extract_border_not_found() {
        let pdf = sample_pdf(1);
        let request = multipart_request("/api/extract/border", Some(("clean.pdf", pdf.as_slice())), &[]);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_message(response).await, "No border found");
    }
}
