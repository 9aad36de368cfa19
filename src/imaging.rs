use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;

const MASKED: Rgb<u8> = Rgb([0, 0, 0]);
const UNMASKED: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("payload is not valid base64: {0}")]
    Transport(String),
    #[error("unsupported or corrupt image: {0}")]
    Decode(String),
    #[error("image is {width}x{height}; sides must not exceed {max_side}px")]
    TooLarge {
        width: u32,
        height: u32,
        max_side: u32,
    },
    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// A decoded client image plus what the usage log needs to know about it.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
    pub encoded_bytes: usize,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Strips an optional `data:<mime>;base64,` prefix and decodes the rest.
pub fn decode_transport(payload: &str) -> Result<Vec<u8>, ImagingError> {
    let trimmed = payload.trim();
    let data = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| ImagingError::Transport("data URI has no payload".into()))?;
            if !header.ends_with(";base64") {
                return Err(ImagingError::Transport(
                    "data URI is not base64 encoded".into(),
                ));
            }
            data
        }
        None => trimmed,
    };

    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(ImagingError::Transport("payload is empty".into()));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ImagingError::Transport(e.to_string()))
}

/// Decodes a client image. The header is checked against `max_side` before
/// any pixel buffer is allocated.
pub fn decode_image(payload: &str, max_side: u32) -> Result<DecodedImage, ImagingError> {
    let bytes = decode_transport(payload)?;
    let format = image::guess_format(&bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;

    let (width, height) = ImageReader::with_format(Cursor::new(&bytes), format)
        .into_dimensions()
        .map_err(|e| ImagingError::Decode(e.to_string()))?;
    if width.max(height) > max_side {
        return Err(ImagingError::TooLarge {
            width,
            height,
            max_side,
        });
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(max_side);
    limits.max_image_height = Some(max_side);
    let mut reader = ImageReader::with_format(Cursor::new(&bytes), format);
    reader.limits(limits);
    let image = reader
        .decode()
        .map_err(|e| ImagingError::Decode(e.to_string()))?;

    Ok(DecodedImage {
        image,
        format,
        encoded_bytes: bytes.len(),
    })
}

/// Re-encodes as an RGB PNG and returns it base64 encoded (no data URI prefix).
pub fn to_png_base64(image: &DynamicImage) -> Result<String, ImagingError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buffer = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| ImagingError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(buffer))
}

pub fn has_transparency(image: &DynamicImage) -> bool {
    image.color().has_alpha() && image.to_rgba8().pixels().any(|p| p.0[3] < u8::MAX)
}

/// Builds an outpainting mask from the alpha channel: opaque pixels are kept
/// (black), transparent pixels are the region to extend (white).
///
/// Returns `None` when the image has no transparent pixels.
pub fn mask_from_alpha(image: &DynamicImage) -> Option<DynamicImage> {
    if !has_transparency(image) {
        return None;
    }

    let rgba = image.to_rgba8();
    let mask = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        if rgba.get_pixel(x, y).0[3] == u8::MAX {
            MASKED
        } else {
            UNMASKED
        }
    });
    Some(DynamicImage::ImageRgb8(mask))
}

/// Decoded byte length of a base64 payload, without allocating it.
pub fn base64_decoded_len(encoded: &str) -> usize {
    let padding = encoded.bytes().rev().take_while(|b| *b == b'=').count();
    (encoded.len() / 4 * 3).saturating_sub(padding)
}


#[cfg(test)]
mod tests {
    use super::test_images::*;
    use super::*;

    const ANY_SIZE: u32 = u32::MAX;

    #[test]
    fn decodes_data_uri_and_bare_base64() {
        let image = solid(16, 8);
        let from_uri = decode_image(&data_uri(&image), ANY_SIZE).unwrap();
        assert_eq!(from_uri.dimensions(), (16, 8));
        assert_eq!(from_uri.format, ImageFormat::Png);

        let bare = STANDARD.encode(png_bytes(&image));
        let from_bare = decode_image(&bare, ANY_SIZE).unwrap();
        assert_eq!(from_bare.dimensions(), (16, 8));
        assert_eq!(from_bare.encoded_bytes, png_bytes(&image).len());
    }

    #[test]
    fn rejects_non_image_payloads() {
        assert!(matches!(
            decode_image("data:image/png;base64,!!!", ANY_SIZE),
            Err(ImagingError::Transport(_))
        ));
        assert!(matches!(
            decode_image("data:text/plain,hello", ANY_SIZE),
            Err(ImagingError::Transport(_))
        ));
        let text = STANDARD.encode(b"definitely not a png");
        assert!(matches!(decode_image(&text, ANY_SIZE), Err(ImagingError::Decode(_))));
        assert!(matches!(decode_image("   ", ANY_SIZE), Err(ImagingError::Transport(_))));
    }

    #[test]
    fn png_preparation_preserves_pixels() {
        let original = solid(32, 24);
        let prepared = to_png_base64(&original).unwrap();
        let decoded = decode_image(&prepared, ANY_SIZE).unwrap();

        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!(decoded.dimensions(), (32, 24));
        assert_eq!(decoded.image.to_rgb8(), original.to_rgb8());
        assert_eq!(base64_decoded_len(&prepared), decoded.encoded_bytes);
    }

    #[test]
    fn alpha_mask_marks_transparent_region() {
        let image = half_transparent(8, 4);
        let mask = mask_from_alpha(&image).unwrap().to_rgb8();
        assert_eq!(mask.dimensions(), (8, 4));
        assert_eq!(*mask.get_pixel(0, 0), MASKED);
        assert_eq!(*mask.get_pixel(7, 3), UNMASKED);
    }

    #[test]
    fn opaque_image_has_no_alpha_mask() {
        assert!(mask_from_alpha(&solid(8, 8)).is_none());
        assert!(!has_transparency(&solid(8, 8)));
    }

    #[test]
    fn oversized_header_is_rejected_before_decoding() {
        let wide = data_uri(&solid(2000, 16));
        match decode_image(&wide, 1408) {
            Err(ImagingError::TooLarge {
                width,
                height,
                max_side,
            }) => assert_eq!((width, height, max_side), (2000, 16, 1408)),
            other => panic!("expected TooLarge, got {:?}", other.map(|d| d.dimensions())),
        }

        let fits = decode_image(&data_uri(&solid(1408, 16)), 1408).unwrap();
        assert_eq!(fits.dimensions(), (1408, 16));
    }
}
