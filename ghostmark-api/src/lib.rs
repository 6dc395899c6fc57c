//! # ghostmark-api
//!
//! REST API server for the ghostmark library
//!

mod api;
pub use api::{
    api_info, app, app_with_state, extract_border, extract_font_stego, extract_qr_code,
    extract_watermark, health_check, AppError, AppState, ErrorResponse, ExtractBorderResponse,
    ExtractQrResponse, ExtractStegoResponse, ExtractWatermarkResponse, MAX_UPLOAD_BYTES,
};
