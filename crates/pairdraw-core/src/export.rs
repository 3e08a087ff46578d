//! Image export of the flattened canvas.

use crate::layers::LayerStack;
use crate::raster::Raster;
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Encode a raster as RGBA8 PNG bytes.
pub fn encode_png(raster: &Raster) -> ExportResult<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, raster.width(), raster.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(raster.as_bytes())?;
    }
    Ok(png_data)
}

/// File name for an export taken at `at`: `prefix_YYYYMMDD_HHMM.png`.
pub fn export_file_name(prefix: &str, at: NaiveDateTime) -> String {
    format!("{}_{}.png", prefix, at.format("%Y%m%d_%H%M"))
}

/// Write a raster as PNG to `path`.
pub fn save_png(raster: &Raster, path: &Path) -> ExportResult<()> {
    let bytes = encode_png(raster)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Flatten the stack and save it in `dir`, named after the current local time.
pub fn save_composite(dir: &Path, prefix: &str, layers: &LayerStack) -> ExportResult<PathBuf> {
    let path = dir.join(export_file_name(prefix, Local::now().naive_local()));
    save_png(&layers.composite(), &path)?;
    log::info!("Saved {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pen::Rgb;
    use chrono::NaiveDate;
    use kurbo::Point;

    fn decode(bytes: &[u8]) -> (png::OutputInfo, Vec<u8>) {
        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        (info, buf)
    }

    #[test]
    fn test_file_name_format() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 59)
            .unwrap();
        assert_eq!(export_file_name("pairdraw", at), "pairdraw_20240309_0705.png");
    }

    #[test]
    fn test_png_preserves_pixels() {
        let mut raster = Raster::new(16, 8);
        raster.stroke_segment(
            Point::new(0.0, 4.0),
            Point::new(16.0, 4.0),
            4.0,
            Rgb::new(0, 128, 255),
            1.0,
        );
        let (info, pixels) = decode(&encode_png(&raster).unwrap());
        assert_eq!((info.width, info.height), (16, 8));
        assert_eq!(info.color_type, png::ColorType::Rgba);
        assert_eq!(pixels, raster.as_bytes());
    }

    #[test]
    fn test_save_composite_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let stack = LayerStack::new(4, 4);
        let path = save_composite(dir.path(), "sketch", &stack).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("sketch_"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "sketch_YYYYMMDD_HHMM.png".len());

        let (info, _) = decode(&std::fs::read(&path).unwrap());
        assert_eq!((info.width, info.height), (4, 4));
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let raster = Raster::new(2, 2);
        let err = save_png(&raster, &dir.path().join("missing/out.png")).unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));
    }
}
