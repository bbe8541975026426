use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::ImageError;
use crate::memory::MEMORY_MAX;

/// Object image: a block of words to be placed at `origin`.
///
/// On disk an image is a big-endian origin address followed by big-endian words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    origin: u16,
    words: Vec<u16>,
}

impl Image {
    /// Build an image from words already in host order.
    pub fn new(origin: u16, words: Vec<u16>) -> Result<Image, ImageError> {
        if origin as usize + words.len() > MEMORY_MAX {
            return Err(ImageError::TooLarge {
                origin,
                words: words.len(),
            });
        }
        Ok(Image { origin, words })
    }

    /// Parse the on-disk format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Image, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() % 2 != 0 {
            return Err(ImageError::Unaligned { len: bytes.len() });
        }

        let mut words = bytes
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]));
        // Non-empty and aligned, so there is at least one word
        let origin = words.next().ok_or(ImageError::Empty)?;
        Image::new(origin, words.collect())
    }

    /// Read and parse an image file.
    ///
    /// The whole file is validated before anything is returned, so a bad file
    /// can never be partially loaded.
    pub fn read(path: &Path) -> Result<Image, ImageError> {
        let open_err = |source: io::Error| ImageError::Open {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(open_err)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).map_err(open_err)?;
        Image::from_bytes(&buffer)
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_big_endian_words() {
        let image = Image::from_bytes(&[0x30, 0x00, 0x12, 0x34, 0xf0, 0x25]).unwrap();
        assert_eq!(image.origin(), 0x3000);
        assert_eq!(image.words(), &[0x1234, 0xf025]);
    }

    #[test]
    fn origin_only_is_an_empty_image() {
        let image = Image::from_bytes(&[0x40, 0x00]).unwrap();
        assert_eq!(image.origin(), 0x4000);
        assert!(image.is_empty());
    }

    #[test]
    fn rejects_missing_origin() {
        assert!(matches!(Image::from_bytes(&[]), Err(ImageError::Empty)));
    }

    #[test]
    fn rejects_odd_length() {
        assert!(matches!(
            Image::from_bytes(&[0x30, 0x00, 0x12]),
            Err(ImageError::Unaligned { len: 3 })
        ));
    }

    #[test]
    fn rejects_images_past_end_of_memory() {
        assert!(Image::new(0xffff, vec![1]).is_ok());
        assert!(matches!(
            Image::new(0xffff, vec![1, 2]),
            Err(ImageError::TooLarge {
                origin: 0xffff,
                words: 2
            })
        ));
    }

    #[test]
    fn missing_file_names_path() {
        let path = Path::new("tests/files/does_not_exist.obj");
        let err = Image::read(path).unwrap_err();
        assert!(matches!(err, ImageError::Open { .. }));
        assert!(err.to_string().contains("does_not_exist.obj"));
    }
}
