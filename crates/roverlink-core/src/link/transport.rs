//! Transport abstraction over the physical serial endpoint
//!
//! The codec and the polling loop only ever see this trait, which keeps the
//! physical port swappable for scripted stand-ins in tests.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Byte channel to the device
pub trait Transport: Read + Write + Send {
    /// Block for the next byte, up to the transport's read deadline.
    ///
    /// Returns `ErrorKind::TimedOut` once the deadline passes with nothing
    /// received. The legacy behavior of spinning forever on empty reads is
    /// deliberately not reproduced.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Discard anything already buffered on the receive side
    fn flush_input(&mut self) -> io::Result<()>;
}

/// Serial port wrapper implementing [`Transport`]
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Wrap an opened serial port with a per-byte read deadline
    pub fn new(port: Box<dyn SerialPort>, read_timeout: Duration) -> Self {
        Self { port, read_timeout }
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn read_byte(&mut self) -> io::Result<u8> {
        // The port itself is opened with a short timeout so each read call
        // returns promptly; the overall deadline is enforced here.
        let deadline = Instant::now() + self.read_timeout;
        let mut buf = [0u8; 1];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "serial port closed",
                    ))
                }
                Ok(_) => return Ok(buf[0]),
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    if Instant::now() >= deadline {
                        return Err(e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn flush_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for exercising the codec and the polling loop
    //! without hardware.

    use super::Transport;
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Script {
        replies: VecDeque<u8>,
        written: Vec<u8>,
        /// Writes allowed before write calls start failing; `None` = never
        writes_before_failure: Option<usize>,
        writes: usize,
    }

    /// Transport double serving a scripted byte stream.
    ///
    /// Reads pop scripted reply bytes and report `TimedOut` once the script
    /// runs dry. Cloning shares the script, so a test can keep a handle for
    /// inspection while the link owns the other.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedTransport(Arc<Mutex<Script>>);

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn push_reply(&mut self, bytes: &[u8]) {
            self.0.lock().unwrap().replies.extend(bytes.iter().copied());
        }

        pub(crate) fn fail_writes_after(&mut self, writes: usize) {
            self.0.lock().unwrap().writes_before_failure = Some(writes);
        }

        pub(crate) fn written(&self) -> Vec<u8> {
            self.0.lock().unwrap().written.clone()
        }
    }

    impl Read for ScriptedTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut script = self.0.lock().unwrap();
            match script.replies.pop_front() {
                Some(byte) if !buf.is_empty() => {
                    buf[0] = byte;
                    Ok(1)
                }
                _ => Err(io::Error::new(io::ErrorKind::TimedOut, "script exhausted")),
            }
        }
    }

    impl Write for ScriptedTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut script = self.0.lock().unwrap();
            if let Some(limit) = script.writes_before_failure {
                if script.writes >= limit {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "device unplugged",
                    ));
                }
            }
            script.writes += 1;
            script.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for ScriptedTransport {
        fn read_byte(&mut self) -> io::Result<u8> {
            let mut buf = [0u8; 1];
            self.read(&mut buf)?;
            Ok(buf[0])
        }

        fn flush_input(&mut self) -> io::Result<()> {
            self.0.lock().unwrap().replies.clear();
            Ok(())
        }
    }
}
