use crate::checksum::crc32;
use crate::{RandomiserError, Result};

pub const GB_BANK_SIZE: usize = 0x4000;
pub const GBA_POINTER_BASE: u32 = 0x0800_0000;

pub const GB_MIN_ROM_SIZE: usize = 0x80000;
pub const GB_MAX_ROM_SIZE: usize = 0x200000;

pub const GB_SIGNATURE_OFFSET: usize = 0x134;
pub const GBC_ROM_CODE_OFFSET: usize = 0x13F;
pub const GB_CGB_FLAG_OFFSET: usize = 0x143;
pub const GB_JP_FLAG_OFFSET: usize = 0x14A;
pub const GB_VERSION_OFFSET: usize = 0x14C;

pub const GBA_ROM_CODE_OFFSET: usize = 0xAC;
pub const GBA_VERSION_OFFSET: usize = 0xBC;

/// Converts a global offset into the 16-bit pointer the GB CPU sees.
/// Bank 0 is fixed at 0x0000-0x3FFF, every other bank is mapped at 0x4000.
pub fn make_gb_pointer(offset: usize) -> u16 {
    if offset < GB_BANK_SIZE {
        offset as u16
    } else {
        (offset % GB_BANK_SIZE + GB_BANK_SIZE) as u16
    }
}

pub fn bank_of(offset: usize) -> usize {
    offset / GB_BANK_SIZE
}

pub fn calculate_offset(bank: usize, pointer: u16) -> usize {
    pointer as usize % GB_BANK_SIZE + bank * GB_BANK_SIZE
}

/// A cartridge image plus the untouched bytes it was loaded from.
#[derive(Debug, Clone)]
pub struct Rom {
    data: Vec<u8>,
    pristine: Vec<u8>,
}

impl Rom {
    pub fn new(data: Vec<u8>) -> Self {
        let pristine = data.clone();
        Rom { data, pristine }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn original(&self) -> &[u8] {
        &self.pristine
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn crc32(&self) -> u32 {
        crc32(&self.pristine)
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(RandomiserError::Format(format!(
                "access of {} bytes at 0x{:X} is outside the {}-byte image",
                len,
                offset,
                self.data.len()
            ))),
        }
    }

    pub fn read_byte(&self, offset: usize) -> Result<u8> {
        self.check(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn write_byte(&mut self, offset: usize, value: u8) -> Result<()> {
        self.check(offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check(offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<()> {
        self.check(offset, len)?;
        self.data[offset..offset + len].fill(value);
        Ok(())
    }

    pub fn read_word(&self, offset: usize) -> Result<u16> {
        self.check(offset, 2)?;
        Ok(u16::from_le_bytes([self.data[offset], self.data[offset + 1]]))
    }

    pub fn write_word(&mut self, offset: usize, value: u16) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        Ok(u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]))
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_u32_be(&mut self, offset: usize, value: u32) -> Result<()> {
        self.write_bytes(offset, &value.to_be_bytes())
    }

    /// Reads a GB pointer stored at `offset` and resolves it inside the
    /// bank that holds the pointer itself.
    pub fn read_pointer(&self, offset: usize) -> Result<usize> {
        self.read_pointer_in_bank(offset, bank_of(offset))
    }

    pub fn read_pointer_in_bank(&self, offset: usize, bank: usize) -> Result<usize> {
        Ok(calculate_offset(bank, self.read_word(offset)?))
    }

    pub fn write_pointer(&mut self, offset: usize, target: usize) -> Result<()> {
        self.write_word(offset, make_gb_pointer(target))
    }

    pub fn read_gba_pointer(&self, offset: usize) -> Result<usize> {
        let raw = self.read_u32(offset)?;
        if raw < GBA_POINTER_BASE {
            return Err(RandomiserError::Format(format!(
                "value 0x{raw:08X} at 0x{offset:X} is not a cartridge pointer"
            )));
        }
        let target = (raw - GBA_POINTER_BASE) as usize;
        self.check(target, 0)?;
        Ok(target)
    }

    pub fn write_gba_pointer(&mut self, offset: usize, target: usize) -> Result<()> {
        self.write_u32(offset, target as u32 + GBA_POINTER_BASE)
    }
}

/// Free space that GB evolution/moveset writers pack entries into.
pub struct DataBlock {
    start: usize,
    capacity: usize,
    data: Vec<u8>,
}

impl DataBlock {
    pub fn new(start: usize, capacity: usize) -> Self {
        DataBlock {
            start,
            capacity,
            data: Vec::with_capacity(capacity),
        }
    }

    /// Places `entry` and returns where it starts. An entry with no
    /// evolutions begins with 0 and can share the previous terminator.
    pub fn place(&mut self, entry: &[u8]) -> Option<usize> {
        if entry.first() == Some(&0)
            && !self.data.is_empty()
            && self.data.len() + entry.len() - 1 <= self.capacity
        {
            let at = self.start + self.data.len() - 1;
            self.data.extend_from_slice(&entry[1..]);
            return Some(at);
        }
        if self.data.len() + entry.len() <= self.capacity {
            let at = self.start + self.data.len();
            self.data.extend_from_slice(entry);
            return Some(at);
        }
        None
    }

    pub fn used(&self) -> usize {
        self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn commit(&self, rom: &mut Rom) -> Result<()> {
        rom.write_bytes(self.start, &self.data)?;
        rom.fill(
            self.start + self.data.len(),
            self.capacity - self.data.len(),
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{bank_of, calculate_offset, make_gb_pointer, DataBlock, Rom};

    #[test]
    fn gb_pointer_maps_into_switchable_window() {
        assert_eq!(make_gb_pointer(0x1234), 0x1234);
        assert_eq!(make_gb_pointer(0x4000), 0x4000);
        assert_eq!(make_gb_pointer(0x2_C123), 0x4123);
        assert_eq!(bank_of(0x2_C123), 0x0B);
        assert_eq!(calculate_offset(0x0B, 0x4123), 0x2_C123);
    }

    #[test]
    fn banked_pointer_round_trip() {
        let mut rom = Rom::new(vec![0; 0x10000]);
        rom.write_pointer(0x8000, 0x9ABC).unwrap();
        assert_eq!(rom.read_word(0x8000).unwrap(), 0x5ABC);
        assert_eq!(rom.read_pointer(0x8000).unwrap(), 0x9ABC);
    }

    #[test]
    fn gba_pointer_is_biased() {
        let mut rom = Rom::new(vec![0; 0x100]);
        rom.write_gba_pointer(0x10, 0x40).unwrap();
        assert_eq!(rom.read_bytes(0x10, 4).unwrap(), &[0x40, 0, 0, 0x08]);
        assert_eq!(rom.read_gba_pointer(0x10).unwrap(), 0x40);
        rom.write_u32(0x20, 0x1234).unwrap();
        assert!(rom.read_gba_pointer(0x20).is_err());
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let mut rom = Rom::new(vec![0; 16]);
        assert!(rom.read_byte(16).is_err());
        assert!(rom.read_word(15).is_err());
        assert!(rom.write_bytes(14, &[1, 2, 3]).is_err());
        assert_eq!(rom.as_bytes(), &[0; 16]);
    }

    #[test]
    fn pristine_copy_survives_edits() {
        let mut rom = Rom::new(vec![1, 2, 3]);
        rom.write_byte(0, 9).unwrap();
        assert_eq!(rom.as_bytes(), &[9, 2, 3]);
        assert_eq!(rom.original(), &[1, 2, 3]);
    }

    #[test]
    fn data_block_shares_terminators() {
        let mut block = DataBlock::new(0x10, 8);
        assert_eq!(block.place(&[1, 5, 2, 0, 0]), Some(0x10));
        // no evolutions: starts on the previous move terminator
        assert_eq!(block.place(&[0, 7, 9, 0]), Some(0x14));
        assert_eq!(block.used(), 8);
        assert_eq!(block.place(&[3, 0]), None);

        let mut rom = Rom::new(vec![0xAA; 0x20]);
        block.commit(&mut rom).unwrap();
        assert_eq!(rom.read_bytes(0x10, 8).unwrap(), &[1, 5, 2, 0, 0, 7, 9, 0]);
        assert_eq!(rom.read_byte(0x18).unwrap(), 0xAA);
    }
}
