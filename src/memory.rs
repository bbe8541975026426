use crate::image::Image;

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Flat 16-bit address space.
///
/// Every `u16` is a valid address, so no access can fail.
#[derive(Clone)]
pub struct Memory {
    cells: Box<[u16; MEMORY_MAX]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            cells: Box::new([0; MEMORY_MAX]),
        }
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.cells[addr as usize] = value;
    }

    /// Copy an image into memory at its origin.
    ///
    /// Cells outside the image are left untouched, so several images can be
    /// layered in order.
    pub fn load(&mut self, image: &Image) {
        let start = image.origin() as usize;
        let words = image.words();
        self.cells[start..start + words.len()].copy_from_slice(words);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let mem = Memory::new();
        assert_eq!(mem.read(0x0000), 0);
        assert_eq!(mem.read(0x3000), 0);
        assert_eq!(mem.read(0xffff), 0);
    }

    #[test]
    fn last_address_is_writable() {
        let mut mem = Memory::new();
        mem.write(0xffff, 0xbeef);
        assert_eq!(mem.read(0xffff), 0xbeef);
        assert_eq!(mem.read(0x0000), 0);
    }

    #[test]
    fn load_layers_images() {
        let mut mem = Memory::new();
        let first = Image::from_bytes(&[0x30, 0x00, 0x11, 0x11, 0x22, 0x22, 0x33, 0x33]).unwrap();
        let second = Image::from_bytes(&[0x30, 0x01, 0xaa, 0xaa]).unwrap();
        mem.load(&first);
        mem.load(&second);
        assert_eq!(mem.read(0x2fff), 0);
        assert_eq!(mem.read(0x3000), 0x1111);
        assert_eq!(mem.read(0x3001), 0xaaaa);
        assert_eq!(mem.read(0x3002), 0x3333);
        assert_eq!(mem.read(0x3003), 0);
    }
}
