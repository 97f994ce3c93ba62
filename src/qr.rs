use crate::error::DashboardError;
use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder, Luma};
use qrcode::{Color, QrCode};

/// Prefilled feedback-form link; the product name is appended as the value
pub const DEFAULT_FORM_URL: &str =
    "https://docs.google.com/forms/d/e/XXXXX/viewform?usp=pp_url&entry.111=";

/// Pixels per QR module
const MODULE_PX: u32 = 8;

/// Light modules around the symbol required by scanners
const QUIET_ZONE: u32 = 4;

/// Issues QR codes pointing at the feedback form for one product
#[derive(Debug, Clone)]
pub struct QrIssuer {
    base_url: String,
}

impl Default for QrIssuer {
    fn default() -> Self {
        QrIssuer::new(DEFAULT_FORM_URL)
    }
}

impl QrIssuer {
    pub fn new(base_url: impl Into<String>) -> Self {
        QrIssuer {
            base_url: base_url.into(),
        }
    }

    /// Form link for a product, with the name percent-encoded
    ///
    /// # Examples
    /// ```
    /// use cosme_insight::qr::QrIssuer;
    ///
    /// let issuer = QrIssuer::new("https://example.com/form?entry.1=");
    /// assert_eq!(issuer.form_url("A&B"), "https://example.com/form?entry.1=A%26B");
    /// ```
    pub fn form_url(&self, product: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(product))
    }

    /// Encode the product's form link as a PNG QR code
    pub fn build_qr(&self, product: &str) -> Result<Vec<u8>, DashboardError> {
        let url = self.form_url(product);
        let code = QrCode::new(url.as_bytes()).map_err(|e| DashboardError::Qr(e.to_string()))?;
        let image = rasterize(&code);

        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(image.as_raw(), image.width(), image.height(), ColorType::L8)
            .map_err(|e| DashboardError::Qr(e.to_string()))?;

        log::debug!("issued {} byte QR for {}", png.len(), url);
        Ok(png)
    }
}

fn rasterize(code: &QrCode) -> GrayImage {
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET_ZONE) * MODULE_PX;

    GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / MODULE_PX).checked_sub(QUIET_ZONE);
        let my = (y / MODULE_PX).checked_sub(QUIET_ZONE);
        let dark = match (mx, my) {
            (Some(mx), Some(my)) if mx < modules && my < modules => {
                colors[(my * modules + mx) as usize] == Color::Dark
            }
            _ => false,
        };
        Luma([if dark { 0 } else { 255 }])
    })
}
