/// Accumulates notification payloads until a fixed number of bytes has arrived.
///
/// Bytes pushed after the target length is reached are discarded.
#[derive(Debug, Clone)]
pub(crate) struct AssemblyBuffer {
    bytes: Vec<u8>,
    target_len: usize,
}

impl AssemblyBuffer {
    pub fn new(target_len: usize) -> Self {
        Self {
            // Grows with what actually arrives; `target_len` may come from the peer.
            bytes: Vec::new(),
            target_len,
        }
    }

    /// Appends as much of `chunk` as fits below the target length.
    /// Returns the number of bytes taken.
    pub fn push(&mut self, chunk: &[u8]) -> usize {
        let taken = chunk.len().min(self.remaining());
        self.bytes.extend_from_slice(&chunk[..taken]);
        taken
    }

    pub fn is_complete(&self) -> bool {
        self.bytes.len() == self.target_len
    }

    pub fn remaining(&self) -> usize {
        self.target_len - self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}
