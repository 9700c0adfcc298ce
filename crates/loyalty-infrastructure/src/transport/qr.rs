//! QR image links from a hosted renderer (`api.qrserver.com` style)

use url::Url;

use loyalty_core::ports::QrRenderer;

#[derive(Debug, Clone)]
pub struct QrServerRenderer {
    base: Url,
    size: u32,
}

impl QrServerRenderer {
    pub fn new(base_url: &str, size: u32) -> Result<Self, url::ParseError> {
        Ok(Self { base: Url::parse(base_url)?, size: size.max(1) })
    }
}

impl QrRenderer for QrServerRenderer {
    fn image_url(&self, text: &str) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("size", &format!("{0}x{0}", self.size))
            .append_pair("data", text);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url_encodes_payload() {
        let renderer = QrServerRenderer::new("https://api.qrserver.com/v1/create-qr-code/", 250).unwrap();
        let url = renderer.image_url("https://shop.example/scan?customer=abc 1&x=y");
        assert!(url.starts_with("https://api.qrserver.com/v1/create-qr-code/?size=250x250&data="));

        let parsed = Url::parse(&url).unwrap();
        let data = parsed.query_pairs().find(|(k, _)| k == "data").map(|(_, v)| v.into_owned());
        assert_eq!(data.as_deref(), Some("https://shop.example/scan?customer=abc 1&x=y"));
    }

    #[test]
    fn test_rejects_relative_base() {
        assert!(QrServerRenderer::new("/qr", 300).is_err());
    }
}
