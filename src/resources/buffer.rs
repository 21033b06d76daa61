//! GPU buffers with a scoped write mapping.
//!
//! A [`GraphicsBuffer`] owns one device buffer of fixed capacity. Per-frame
//! parameter blocks are streamed into it by mapping the whole buffer and
//! appending aligned records through a [`BufferWriter`]; the write head after
//! the last record is remembered until the next mapping.
//!
//! # Example
//!
//! ```ignore
//! let mut uniforms = GraphicsBuffer::new(&mut device, BufferKind::Uniform, 64 * 1024, BufferUsage::Stream)?;
//!
//! uniforms.bind(&mut device);
//! let offset = uniforms.map_for_write(&mut device, |writer| {
//!     writer.write_aligned(bytemuck::bytes_of(&params), 256)
//! });
//! uniforms.bind_range(&mut device, 1, offset, std::mem::size_of_val(&params) as u32);
//! ```

use crate::backend::{BufferHandle, BufferKind, BufferUsage, DeviceResult, GraphicsDevice};

/// Round `value` up to the next multiple of `alignment`.
///
/// # Panics
///
/// Panics if `alignment` is not a power of two.
#[inline]
pub fn align(value: u32, alignment: u32) -> u32 {
    assert!(
        alignment.is_power_of_two(),
        "alignment must be a power of 2, got {alignment}"
    );
    (value + alignment - 1) & !(alignment - 1)
}

/// Sequential writer over a mapped buffer.
///
/// Every write starts at an aligned offset and advances the head past the
/// written bytes. Writing past the end of the mapping is a programming error
/// and panics; callers packing a variable number of records check
/// [`BufferWriter::fits`] first.
pub struct BufferWriter<'a> {
    bytes: &'a mut [u8],
    head: u32,
}

impl<'a> BufferWriter<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes, head: 0 }
    }

    /// Current write head in bytes
    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn capacity(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Whether `len` bytes fit once the head is aligned to `alignment`
    pub fn fits(&self, len: u32, alignment: u32) -> bool {
        u64::from(align(self.head, alignment)) + u64::from(len) <= self.bytes.len() as u64
    }

    /// Move the head up to the next multiple of `alignment`.
    pub fn align_head(&mut self, alignment: u32) -> u32 {
        self.head = align(self.head, alignment);
        assert!(
            self.head as usize <= self.bytes.len(),
            "aligned head {} exceeds buffer capacity {}",
            self.head,
            self.bytes.len()
        );
        self.head
    }

    /// Align the head, copy `data` there and return the aligned offset.
    pub fn write_aligned(&mut self, data: &[u8], alignment: u32) -> u32 {
        let offset = align(self.head, alignment);
        let end = offset as usize + data.len();
        assert!(
            end <= self.bytes.len(),
            "write of {} bytes at offset {} exceeds buffer capacity {}",
            data.len(),
            offset,
            self.bytes.len()
        );
        self.bytes[offset as usize..end].copy_from_slice(data);
        self.head = end as u32;
        offset
    }

    // std140 scalar and vector writes

    pub fn push_u32(&mut self, value: u32) -> u32 {
        self.write_aligned(&value.to_ne_bytes(), 4)
    }

    pub fn push_f32(&mut self, value: f32) -> u32 {
        self.write_aligned(&value.to_ne_bytes(), 4)
    }

    /// A `vec3` is 16-byte aligned but only occupies 12 bytes, so a following
    /// scalar packs into its fourth lane.
    pub fn push_vec3(&mut self, value: glam::Vec3) -> u32 {
        self.write_aligned(bytemuck::cast_slice(&value.to_array()), 16)
    }

    pub fn push_vec4(&mut self, value: glam::Vec4) -> u32 {
        self.write_aligned(bytemuck::cast_slice(&value.to_array()), 16)
    }

    /// Column-major 4x4 matrix
    pub fn push_mat4(&mut self, value: &glam::Mat4) -> u32 {
        self.write_aligned(bytemuck::cast_slice(&value.to_cols_array()), 16)
    }
}

/// A device buffer with fixed capacity and a write head.
#[derive(Debug)]
pub struct GraphicsBuffer {
    handle: BufferHandle,
    kind: BufferKind,
    usage: BufferUsage,
    capacity: u32,
    head: u32,
}

impl GraphicsBuffer {
    /// Create a buffer of `capacity` bytes. Contents start undefined.
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        kind: BufferKind,
        capacity: u32,
        usage: BufferUsage,
    ) -> DeviceResult<Self> {
        let handle = device.create_buffer(kind, capacity, usage)?;
        log::debug!("Created {kind:?} buffer {handle:?} ({capacity} bytes, {usage:?})");
        Ok(Self {
            handle,
            kind,
            usage,
            capacity,
            head: 0,
        })
    }

    /// Create a static buffer and fill it with `data`.
    pub fn with_data<D: GraphicsDevice>(
        device: &mut D,
        kind: BufferKind,
        data: &[u8],
    ) -> DeviceResult<Self> {
        let mut buffer = Self::new(device, kind, data.len() as u32, BufferUsage::Static)?;
        device.buffer_sub_data(buffer.handle, 0, data)?;
        buffer.head = data.len() as u32;
        Ok(buffer)
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes written by the last mapping
    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn bind<D: GraphicsDevice>(&self, device: &mut D) {
        device.bind_buffer(self.kind, Some(self.handle));
    }

    pub fn unbind<D: GraphicsDevice>(&self, device: &mut D) {
        device.bind_buffer(self.kind, None);
    }

    /// Map the buffer, run `write` against it, then unmap and unbind.
    ///
    /// The head restarts at zero for every mapping.
    ///
    /// # Panics
    ///
    /// Panics when the device refuses the mapping, which includes mapping a
    /// buffer that is not currently bound.
    pub fn map_for_write<D: GraphicsDevice, R>(
        &mut self,
        device: &mut D,
        write: impl FnOnce(&mut BufferWriter<'_>) -> R,
    ) -> R {
        let result = {
            let bytes = match device.map_buffer(self.handle) {
                Ok(bytes) => bytes,
                Err(err) => panic!("failed to map {:?} buffer {:?}: {err}", self.kind, self.handle),
            };
            let mut writer = BufferWriter::new(bytes);
            let result = write(&mut writer);
            self.head = writer.head();
            result
        };
        device.unmap_buffer(self.handle);
        self.unbind(device);
        result
    }

    /// Bind `[offset, offset + size)` to the indexed binding point and return
    /// the end of the range.
    pub fn bind_range<D: GraphicsDevice>(
        &self,
        device: &mut D,
        binding: u32,
        offset: u32,
        size: u32,
    ) -> u32 {
        debug_assert!(
            offset + size <= self.capacity,
            "range {offset}+{size} outside buffer of {} bytes",
            self.capacity
        );
        device.bind_buffer_range(self.kind, binding, self.handle, offset, size);
        offset + size
    }

    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        device.delete_buffer(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessDevice;
    use rstest::rstest;

    #[rstest]
    #[case(0, 256, 0)]
    #[case(1, 256, 256)]
    #[case(256, 256, 256)]
    #[case(257, 256, 512)]
    #[case(13, 4, 16)]
    #[case(12, 16, 16)]
    fn test_align(#[case] value: u32, #[case] alignment: u32, #[case] expected: u32) {
        let aligned = align(value, alignment);
        assert_eq!(aligned, expected);
        assert_eq!(aligned % alignment, 0);
        assert!(aligned >= value && aligned - value < alignment);
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn test_align_rejects_non_power_of_two() {
        align(10, 12);
    }

    #[test]
    fn test_write_aligned_offsets() {
        let mut bytes = vec![0u8; 1024];
        let mut writer = BufferWriter::new(&mut bytes);

        assert_eq!(writer.write_aligned(&[1; 100], 64), 0);
        assert_eq!(writer.head(), 100);
        assert_eq!(writer.write_aligned(&[2; 8], 256), 256);
        assert_eq!(writer.head(), 264);
        assert_eq!(writer.write_aligned(&[3; 4], 4), 264);
        drop(writer);

        assert_eq!(bytes[99], 1);
        assert_eq!(bytes[100], 0);
        assert_eq!(&bytes[256..264], &[2; 8]);
    }

    #[test]
    fn test_vec3_packs_following_scalar() {
        let mut bytes = vec![0u8; 64];
        let mut writer = BufferWriter::new(&mut bytes);

        writer.push_u32(7);
        assert_eq!(writer.push_vec3(glam::Vec3::ONE), 16);
        assert_eq!(writer.push_f32(0.5), 28);
        assert_eq!(writer.head(), 32);
    }

    #[test]
    #[should_panic(expected = "exceeds buffer capacity")]
    fn test_write_past_capacity_panics() {
        let mut bytes = vec![0u8; 64];
        let mut writer = BufferWriter::new(&mut bytes);
        writer.write_aligned(&[0; 32], 4);
        writer.write_aligned(&[0; 32], 64);
    }

    #[test]
    fn test_fits_accounts_for_alignment() {
        let mut bytes = vec![0u8; 64];
        let mut writer = BufferWriter::new(&mut bytes);
        writer.push_u32(1);

        assert!(writer.fits(60, 4));
        assert!(!writer.fits(60, 16));
        assert!(writer.fits(48, 16));
        assert!(!writer.fits(1, 128));
    }

    #[test]
    fn test_map_for_write_round_trip() {
        let mut device = HeadlessDevice::new();
        let mut buffer =
            GraphicsBuffer::new(&mut device, BufferKind::Uniform, 512, BufferUsage::Stream)
                .unwrap();

        buffer.bind(&mut device);
        let offset = buffer.map_for_write(&mut device, |writer| {
            writer.write_aligned(&[9; 16], 4);
            writer.write_aligned(&[42; 16], 256)
        });

        assert_eq!(offset, 256);
        assert_eq!(buffer.head(), 272);
        let contents = device.read_buffer(buffer.handle()).unwrap();
        assert_eq!(&contents[..16], &[9; 16]);
        assert_eq!(&contents[256..272], &[42; 16]);
    }

    #[test]
    #[should_panic(expected = "failed to map")]
    fn test_map_unbound_buffer_panics() {
        let mut device = HeadlessDevice::new();
        let mut buffer =
            GraphicsBuffer::new(&mut device, BufferKind::Uniform, 64, BufferUsage::Stream)
                .unwrap();
        buffer.map_for_write(&mut device, |writer| writer.push_u32(1));
    }

    #[test]
    fn test_bind_range_returns_end() {
        let mut device = HeadlessDevice::new();
        let buffer =
            GraphicsBuffer::new(&mut device, BufferKind::Uniform, 1024, BufferUsage::Stream)
                .unwrap();

        assert_eq!(buffer.bind_range(&mut device, 1, 256, 128), 384);
        let range = device.uniform_binding(1).unwrap();
        assert_eq!((range.offset, range.size), (256, 128));
        assert_eq!(range.buffer, buffer.handle());
    }
}
