/// Buffer trait and buffer descriptor

use crate::error::Result;

/// GPU buffer resource trait
///
/// Buffers created through the GraphicsDevice are host-visible and
/// persistently mapped; `update` writes through the mapping.
pub trait Buffer: Send + Sync {
    /// Update buffer data
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset in bytes
    /// * `data` - Data to write
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Size of the buffer in bytes
    fn size(&self) -> u64;
}

/// Buffer descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Uniform buffer
    Uniform,
}
