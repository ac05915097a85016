use crate::StreamResult;

/// Byte stream the command encoders write through.
///
/// Encoders reserve space with [`IoStream::alloc_buffer`], fill it, and hand
/// it over with [`IoStream::commit_buffer`]. Status values are the raw
/// integers reported by the far side.
pub trait IoStream {
    fn alloc_buffer(&mut self, min_size: usize) -> StreamResult<&mut [u8]>;

    fn commit_buffer(&mut self, size: usize) -> i32;

    fn write_fully(&mut self, buf: &[u8]) -> i32;

    fn read_fully(&mut self, buf: &mut [u8]) -> i32;

    /// Reads at most `buf.len()` bytes, returning the filled prefix or `None`
    /// when nothing was delivered.
    fn read<'a>(&mut self, buf: &'a mut [u8]) -> Option<&'a mut [u8]>;
}
