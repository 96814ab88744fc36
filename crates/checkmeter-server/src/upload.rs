//! Inbound photo upload parsing and validation
//!
//! Everything here runs before any quota is consumed or any external call
//! is made.

use axum::extract::Multipart;
use bytes::{Bytes, BytesMut};
use checkmeter_core::{ClassificationRequest, ImagePayload, Tier};
use checkmeter_vision::sniff_mime_type;

use crate::config::UploadConfig;
use crate::error::AppError;

/// Raw multipart fields of a classify request
#[derive(Debug, Default)]
pub struct UploadForm {
    pub image: Option<Bytes>,
    pub declared_type: Option<String>,
    pub tier: Option<String>,
    pub detailed_analysis: Option<String>,
    pub enhanced: Option<String>,
}

impl UploadForm {
    /// Read the form, rejecting an oversized image as soon as it crosses the limit
    pub async fn read(multipart: &mut Multipart, limits: &UploadConfig) -> Result<Self, AppError> {
        let mut form = Self::default();
        let cut_off = |err| AppError::from_multipart(err, limits.max_bytes);

        while let Some(mut field) = multipart.next_field().await.map_err(cut_off)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    form.declared_type = field.content_type().map(str::to_string);
                    let mut buf = BytesMut::new();
                    while let Some(chunk) = field.chunk().await.map_err(cut_off)? {
                        if buf.len() + chunk.len() > limits.max_bytes {
                            return Err(AppError::PayloadTooLarge {
                                limit: limits.max_bytes,
                            });
                        }
                        buf.extend_from_slice(&chunk);
                    }
                    form.image = Some(buf.freeze());
                }
                "tier" => form.tier = Some(field.text().await.map_err(cut_off)?),
                "detailedAnalysis" => form.detailed_analysis = Some(field.text().await.map_err(cut_off)?),
                "enhanced" | "wasImageUpscaled" => form.enhanced = Some(field.text().await.map_err(cut_off)?),
                _ => {}
            }
        }

        Ok(form)
    }

    /// Validate the fields into a classification request
    pub fn into_request(self, limits: &UploadConfig) -> Result<ClassificationRequest, AppError> {
        let image = self
            .image
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| AppError::InvalidRequest("No image provided".to_string()))?;

        if image.len() > limits.max_bytes {
            return Err(AppError::PayloadTooLarge {
                limit: limits.max_bytes,
            });
        }

        let mime_type = resolve_mime_type(self.declared_type.as_deref(), &image);
        if !limits.allows(&mime_type) {
            return Err(AppError::UnsupportedMediaType(mime_type));
        }

        let tier = match self.tier.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(tier) => tier.parse::<Tier>().map_err(AppError::InvalidRequest)?,
            None if is_true(self.detailed_analysis.as_deref()) => Tier::Detailed,
            None => Tier::Standard,
        };

        Ok(ClassificationRequest {
            image: ImagePayload::new(image, mime_type),
            tier,
            already_enhanced: is_true(self.enhanced.as_deref()),
        })
    }
}

/// Declared type unless missing or generic, otherwise sniffed from the bytes
fn resolve_mime_type(declared: Option<&str>, bytes: &[u8]) -> String {
    let declared = declared
        .map(|d| d.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty() && d != "application/octet-stream");

    match declared {
        Some(declared) => declared,
        None => sniff_mime_type(bytes)
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

fn is_true(value: Option<&str>) -> bool {
    value
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        })
        .unwrap_or(false)
}
