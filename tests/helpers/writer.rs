use std::io;

/// An output sink that fails after a number of writes.
pub struct Writer {
    buf: Vec<u8>,
    writes: usize,
    max: usize,
}

impl Writer {
    pub fn new() -> Self {
        Self::with_max(usize::MAX)
    }

    /// A writer that fails with a broken pipe once `max` writes succeeded.
    pub fn with_max(max: usize) -> Self {
        Self {
            buf: Vec::new(),
            writes: 0,
            max,
        }
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    #[track_caller]
    pub fn into_string(self) -> String {
        String::from_utf8(self.buf).unwrap()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes >= self.max {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.writes += 1;
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
