// SPDX-License-Identifier: AGPL-3.0-only

//! Memory-mapped physical windows
//!
//! Maps a physical address range (the peripheral's AXI-Lite registers or the
//! BRAM controller) into the process through a device node such as
//! `/dev/mem` or `/dev/uioN`, and exposes bounds-checked volatile 32-bit
//! access to it.
//!
//! The device node is opened with `O_SYNC` so the kernel maps the range
//! uncached. `mmap` offsets must be page aligned; the region maps from the
//! enclosing page and hides the intra-page offset from callers.

use crate::bus::{BusType, RegisterBus};
use crate::error::{HvaddError, Result};
use crate::memory::WordMemory;
use rustix::fs::OFlags;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::Path;
use std::ptr::NonNull;

/// Mapped physical window
///
/// Unsafe operations are confined to this type; the public API is safe and
/// checks every access for bounds and 4-byte alignment.
#[derive(Debug)]
pub struct MmioRegion {
    /// Start of the mapping (page aligned)
    base: NonNull<u8>,
    /// Length of the mapping
    map_len: usize,
    /// Offset of the window inside the first mapped page
    page_offset: usize,
    /// Usable window size in bytes
    size: usize,
    phys_addr: u64,
    label: String,
    _file: File,
}

impl MmioRegion {
    /// Map `size` bytes of physical memory at `phys_addr`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The device node doesn't exist
    /// - The device node cannot be opened (usually needs root)
    /// - mmap fails
    ///
    /// # Panics
    ///
    /// Panics if `rustix::mm::mmap` returns a null pointer on success
    /// (never happens per the rustix API contract).
    pub fn map(device_path: &Path, phys_addr: u64, size: usize, label: &str) -> Result<Self> {
        if !device_path.exists() {
            return Err(HvaddError::device_not_found(device_path));
        }
        if size == 0 {
            return Err(HvaddError::map_failed(label, "window size is 0"));
        }

        let page = rustix::param::page_size() as u64;
        let aligned = phys_addr & !(page - 1);
        #[allow(clippy::cast_possible_truncation)]
        let page_offset = (phys_addr - aligned) as usize;
        let map_len = page_offset + size;

        tracing::debug!(
            "Mapping {label}: {phys_addr:#x}+{size:#x} via {}",
            device_path.display()
        );

        // OFlags::SYNC.bits() is a small positive flag value
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(device_path)
            .map_err(|e| {
                HvaddError::map_failed(label, format!("cannot open {}: {e}", device_path.display()))
            })?;

        // SAFETY: mmap preconditions:
        // - fd is valid (just opened, kept alive in `_file` for the mapping's lifetime)
        // - map_len is non-zero (size checked above)
        // - offset is page aligned (rounded down above)
        // - MAP_SHARED + PROT_READ|PROT_WRITE is what device memory needs
        // The mapping is released in Drop.
        let base = unsafe {
            let addr = mmap(
                std::ptr::null_mut(),
                map_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                aligned,
            )
            .map_err(|e| HvaddError::map_failed(label, format!("mmap failed: {e}")))?;

            NonNull::new(addr.cast::<u8>())
                .ok_or_else(|| HvaddError::map_failed(label, "mmap returned null"))?
        };

        tracing::info!("Mapped {label} at {phys_addr:#x} ({size} bytes at {base:p})");

        Ok(Self {
            base,
            map_len,
            page_offset,
            size,
            phys_addr,
            label: label.to_string(),
            _file: file,
        })
    }

    fn check(&self, offset: usize) -> Result<()> {
        if offset % 4 != 0 {
            return Err(HvaddError::Misaligned { offset });
        }
        if offset + 4 > self.size {
            return Err(HvaddError::out_of_range(offset as u64, 4u64, self.size as u64));
        }
        Ok(())
    }

    /// Read a 32-bit word at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the offset is misaligned or out of bounds.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset)?;

        // SAFETY: volatile load from device memory.
        // - offset is 4-byte aligned and offset + 4 <= size (checked above)
        // - base + page_offset + size lies inside the mapping created in map()
        // - volatile so the compiler neither elides nor reorders the bus access
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe {
            let ptr = self.base.as_ptr().add(self.page_offset + offset).cast::<u32>();
            ptr.read_volatile()
        };

        tracing::trace!("{} read {offset:#x} = {value:#x}", self.label);
        Ok(value)
    }

    /// Write a 32-bit word at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the offset is misaligned or out of bounds.
    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset)?;

        tracing::trace!("{} write {offset:#x} = {value:#x}", self.label);

        // SAFETY: volatile store to device memory, same bounds argument as
        // read_u32. The store has side effects on the peripheral and must
        // happen exactly once, in program order.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            let ptr = self.base.as_ptr().add(self.page_offset + offset).cast::<u32>();
            ptr.write_volatile(value);
        }

        Ok(())
    }

    /// Window size in bytes
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Physical base address
    #[must_use]
    pub const fn phys_addr(&self) -> u64 {
        self.phys_addr
    }

    /// Label given at map time
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl RegisterBus for MmioRegion {
    fn read32(&mut self, offset: usize) -> Result<u32> {
        self.read_u32(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.write_u32(offset, value)
    }

    fn bus_type(&self) -> BusType {
        BusType::Mmio
    }
}

impl WordMemory for MmioRegion {
    fn read_u32(&self, offset: usize) -> Result<u32> {
        MmioRegion::read_u32(self, offset)
    }

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        MmioRegion::write_u32(self, offset, value)
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for MmioRegion {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {} at {:#x}", self.label, self.phys_addr);

        // SAFETY: base/map_len are exactly what mmap returned/was given in
        // map(); Drop runs once and no references into the mapping outlive self.
        unsafe {
            if let Err(e) = munmap(self.base.as_ptr().cast(), self.map_len) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: MmioRegion owns its mapping exclusively. Moving it to another thread
// does not invalidate the mapping, which is process-wide.
unsafe impl Send for MmioRegion {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_node_is_reported() {
        let err = MmioRegion::map(Path::new("/nonexistent/mem"), 0x4000_0000, 36, "test")
            .unwrap_err();
        assert!(matches!(err, HvaddError::DeviceNotFound { .. }));
    }

    #[test]
    #[ignore] // Requires hardware and root
    fn maps_adder_registers() {
        let mut regs = MmioRegion::map(
            Path::new("/dev/mem"),
            hvadd_chip::board::ADDER_BASE_ADDR,
            hvadd_chip::regs::WINDOW_SIZE,
            "hvadd registers",
        )
        .expect("map registers");
        regs.write_u32(hvadd_chip::regs::ADDRESS, 0xcafe).unwrap();
        assert_eq!(regs.read_u32(hvadd_chip::regs::ADDRESS).unwrap(), 0xcafe);
        assert!(regs.read_u32(2).is_err());
        assert!(regs.read_u32(36).is_err());
    }
}
