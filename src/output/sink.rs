/// Shared output for rendered records
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes whole lines to an underlying writer. Concurrent callers never
/// interleave within a line.
pub struct LineSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl LineSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        LineSink {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write one newline-terminated record in a single call
    pub fn emit(&self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(buf.as_bytes())?;
        writer.flush()
    }
}

/// In-memory writer whose contents stay readable after being handed to a sink
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
