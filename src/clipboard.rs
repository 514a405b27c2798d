//! Clipboard snapshot and staging
//!
//! `capture` classifies what the user copied; `stage` writes the
//! deliverable back before the paste.

use crate::error::{ReplyError, ReplyResult};
use crate::resolver::ResolvedArtifact;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Uncompressed RGBA8 image
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bitmap({}x{}, {} bytes)", self.width, self.height, self.rgba.len())
    }
}

impl Bitmap {
    /// Decode an image file into an RGBA bitmap ready for the clipboard
    pub fn load(path: &Path) -> ReplyResult<Self> {
        let img = image::open(path)
            .map_err(|e| ReplyError::Clipboard(format!("cannot decode {}: {e}", path.display())))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            width: width as usize,
            height: height as usize,
            rgba: img.into_raw(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What the clipboard held when the session started
#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardContent {
    Text(String),
    Image(Bitmap),
    Empty,
}

/// Clipboard collaborator
pub trait Clipboard: Send + Sync {
    fn read_text(&self) -> ReplyResult<Option<String>>;
    fn read_image(&self) -> ReplyResult<Option<Bitmap>>;
    fn write_text(&self, text: &str) -> ReplyResult<()>;
    fn write_image(&self, image: &Bitmap) -> ReplyResult<()>;
}

/// Read the live clipboard and classify it.
///
/// Blank text falls through to the image check; no image either means `Empty`.
pub fn capture(clipboard: &dyn Clipboard) -> ReplyResult<ClipboardContent> {
    if let Some(text) = clipboard.read_text()? {
        if !text.trim().is_empty() {
            debug!("Clipboard text: {} chars", text.chars().count());
            return Ok(ClipboardContent::Text(text));
        }
    }

    match clipboard.read_image()? {
        Some(image) if !image.is_empty() => {
            debug!("Clipboard image: {:?}", image);
            Ok(ClipboardContent::Image(image))
        }
        _ => Ok(ClipboardContent::Empty),
    }
}

/// Put the deliverable on the clipboard, ready for the paste
pub fn stage(clipboard: &dyn Clipboard, artifact: &ResolvedArtifact) -> ReplyResult<()> {
    match artifact {
        ResolvedArtifact::Text(text) => clipboard.write_text(text),
        ResolvedArtifact::Image(path) => {
            let bitmap = Bitmap::load(path)?;
            debug!("Staging {:?} from {}", bitmap, path.display());
            clipboard.write_image(&bitmap)
        }
    }
}

/// Optical text extraction collaborator for image selections
pub trait TextExtractor: Send + Sync {
    fn extract(&self, image: &Bitmap) -> ReplyResult<String>;
}

/// Used when no OCR engine is wired in
#[derive(Debug, Default)]
pub struct NoTextExtractor;

impl TextExtractor for NoTextExtractor {
    fn extract(&self, image: &Bitmap) -> ReplyResult<String> {
        Err(ReplyError::UnsupportedInput(format!(
            "{image:?} copied, but no text extractor is configured"
        )))
    }
}

/// Native clipboard backed by arboard
pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> ReplyResult<Self> {
        let inner = arboard::Clipboard::new().map_err(|e| ReplyError::Clipboard(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

fn not_available(err: &arboard::Error) -> bool {
    matches!(
        err,
        arboard::Error::ContentNotAvailable | arboard::Error::ConversionFailure
    )
}

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> ReplyResult<Option<String>> {
        match self.inner.lock()?.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(e) if not_available(&e) => Ok(None),
            Err(e) => Err(ReplyError::Clipboard(e.to_string())),
        }
    }

    fn read_image(&self) -> ReplyResult<Option<Bitmap>> {
        match self.inner.lock()?.get_image() {
            Ok(img) => Ok(Some(Bitmap {
                width: img.width,
                height: img.height,
                rgba: img.bytes.into_owned(),
            })),
            Err(e) if not_available(&e) => Ok(None),
            Err(e) => Err(ReplyError::Clipboard(e.to_string())),
        }
    }

    fn write_text(&self, text: &str) -> ReplyResult<()> {
        self.inner
            .lock()?
            .set_text(text.to_string())
            .map_err(|e| ReplyError::Clipboard(e.to_string()))
    }

    // arboard converts RGBA to the platform's device-independent format (DIB,
    // PNG, TIFF) on handoff.
    fn write_image(&self, image: &Bitmap) -> ReplyResult<()> {
        let data = arboard::ImageData {
            width: image.width,
            height: image.height,
            bytes: Cow::Borrowed(&image.rgba),
        };
        self.inner
            .lock()?
            .set_image(data)
            .map_err(|e| ReplyError::Clipboard(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeClipboard {
        text: Option<String>,
        image: Option<Bitmap>,
    }

    impl Clipboard for FakeClipboard {
        fn read_text(&self) -> ReplyResult<Option<String>> {
            Ok(self.text.clone())
        }
        fn read_image(&self) -> ReplyResult<Option<Bitmap>> {
            Ok(self.image.clone())
        }
        fn write_text(&self, _text: &str) -> ReplyResult<()> {
            Ok(())
        }
        fn write_image(&self, _image: &Bitmap) -> ReplyResult<()> {
            Ok(())
        }
    }

    fn pixel() -> Bitmap {
        Bitmap {
            width: 1,
            height: 1,
            rgba: vec![255, 0, 0, 255],
        }
    }

    #[test]
    fn test_text_is_captured_verbatim() {
        let clip = FakeClipboard {
            text: Some("  Hello  ".to_string()),
            image: None,
        };
        assert_eq!(
            capture(&clip).unwrap(),
            ClipboardContent::Text("  Hello  ".to_string())
        );
    }

    #[test]
    fn test_blank_text_without_image_is_empty() {
        let clip = FakeClipboard {
            text: Some(" \n\t ".to_string()),
            image: None,
        };
        assert_eq!(capture(&clip).unwrap(), ClipboardContent::Empty);
        assert_eq!(capture(&FakeClipboard::default()).unwrap(), ClipboardContent::Empty);
    }

    #[test]
    fn test_image_used_when_text_blank() {
        let clip = FakeClipboard {
            text: Some("".to_string()),
            image: Some(pixel()),
        };
        assert_eq!(capture(&clip).unwrap(), ClipboardContent::Image(pixel()));
    }

    #[test]
    fn test_zero_sized_image_is_empty() {
        let clip = FakeClipboard {
            text: None,
            image: Some(Bitmap {
                width: 0,
                height: 0,
                rgba: vec![],
            }),
        };
        assert_eq!(capture(&clip).unwrap(), ClipboardContent::Empty);
    }

    #[test]
    fn test_bitmap_load_from_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        image::RgbaImage::from_pixel(2, 3, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let bitmap = Bitmap::load(&path).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (2, 3));
        assert_eq!(bitmap.rgba.len(), 2 * 3 * 4);
        assert_eq!(&bitmap.rgba[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn test_bitmap_load_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(Bitmap::load(&path), Err(ReplyError::Clipboard(_))));
    }
}
