use crate::client::error::{ClientError, Result};
use crate::protocol::{decode_word, encode_word, SHUTDOWN, WORD_SIZE};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, warn};

/// Trait for exchanging protocol words with the server
pub trait ProbeSocket: Send {
    /// Send one word, retrying transient conditions
    fn send_word(&mut self, word: u32) -> Result<()>;

    /// Block until one full word has been received
    fn recv_word(&mut self) -> Result<u32>;
}

/// TCP implementation of ProbeSocket with Nagle's algorithm disabled
#[derive(Debug)]
pub struct TcpProbeSocket {
    stream: TcpStream,
}

impl TcpProbeSocket {
    /// Connect to the server. `read_timeout` of `None` blocks indefinitely.
    pub fn connect(address: SocketAddr, read_timeout: Option<Duration>) -> Result<Self> {
        debug!(%address, "Connecting TCP socket");
        let stream = TcpStream::connect(address).map_err(|source| {
            warn!(%address, error = %source, "Failed to connect to server");
            ClientError::Connect { address, source }
        })?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(read_timeout)?;
        debug!("Socket connected successfully");
        Ok(Self { stream })
    }

    pub fn close(self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!(error = %e, "Socket shutdown failed");
        }
    }
}

/// Write one full word, retrying `WouldBlock` and `Interrupted`
fn write_word<W: Write>(writer: &mut W, word: u32) -> Result<()> {
    let buf = encode_word(word);
    let mut written = 0;
    while written < WORD_SIZE {
        match writer.write(&buf[written..]) {
            Ok(0) => return Err(ClientError::Send(ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                continue
            }
            Err(e) => return Err(ClientError::Send(e)),
        }
    }
    Ok(())
}

impl ProbeSocket for TcpProbeSocket {
    fn send_word(&mut self, word: u32) -> Result<()> {
        write_word(&mut self.stream, word)
    }

    fn recv_word(&mut self) -> Result<u32> {
        let mut buf = [0u8; WORD_SIZE];
        let mut read = 0;
        while read < WORD_SIZE {
            match self.stream.read(&mut buf[read..]) {
                Ok(0) => return Err(ClientError::PeerClosed),
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(ClientError::Timeout)
                }
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    return Err(ClientError::PeerReset)
                }
                Err(e) => return Err(ClientError::Receive(e)),
            }
        }
        Ok(decode_word(&buf)?)
    }
}

/// Tell the server to stop, on a throwaway connection. Fire-and-forget.
pub fn send_shutdown(address: SocketAddr) -> Result<()> {
    let mut socket = TcpProbeSocket::connect(address, None)?;
    socket.send_word(SHUTDOWN)?;
    debug!(%address, "Shutdown signal sent");
    socket.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use std::net::TcpListener;
    use std::thread;

    mock! {
        pub ProbeSocket {}

        impl ProbeSocket for ProbeSocket {
            fn send_word(&mut self, word: u32) -> Result<()>;
            fn recv_word(&mut self) -> Result<u32>;
        }
    }

    /// Writer that fails with the scripted errors before accepting
    /// at most `chunk` bytes per call
    struct FlakyWriter {
        failures: Vec<ErrorKind>,
        chunk: usize,
        written: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.failures.is_empty() {
                return Err(self.failures.remove(0).into());
            }
            let n = buf.len().min(self.chunk);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_word_retries_transient_errors() -> Result<()> {
        let mut writer = FlakyWriter {
            failures: vec![ErrorKind::WouldBlock, ErrorKind::Interrupted],
            chunk: 4,
            written: Vec::new(),
        };

        write_word(&mut writer, 0x0102_0304)?;

        assert!(writer.failures.is_empty());
        assert_eq!(writer.written, [1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_write_word_finishes_partial_writes() -> Result<()> {
        let mut writer = FlakyWriter {
            failures: vec![ErrorKind::Interrupted],
            chunk: 1,
            written: Vec::new(),
        };

        write_word(&mut writer, 0xDEAD_BEEF)?;

        assert_eq!(writer.written, [0xDE, 0xAD, 0xBE, 0xEF]);
        Ok(())
    }

    #[test]
    fn test_write_word_reports_hard_errors() {
        let mut writer = FlakyWriter {
            failures: vec![ErrorKind::BrokenPipe],
            chunk: 4,
            written: Vec::new(),
        };

        assert!(matches!(
            write_word(&mut writer, 7),
            Err(ClientError::Send(e)) if e.kind() == ErrorKind::BrokenPipe
        ));
        assert!(writer.written.is_empty());
    }

    #[test]
    fn test_write_word_zero_length_write() {
        let mut writer = FlakyWriter {
            failures: Vec::new(),
            chunk: 0,
            written: Vec::new(),
        };

        assert!(matches!(
            write_word(&mut writer, 7),
            Err(ClientError::Send(e)) if e.kind() == ErrorKind::WriteZero
        ));
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let result = TcpProbeSocket::connect(address, None);
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }

    #[test]
    fn test_words_cross_the_wire_big_endian() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let address = listener.local_addr()?;
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&[0, 0, 0, 2]).unwrap();
            buf
        });

        let mut socket = TcpProbeSocket::connect(address, None)?;
        socket.send_word(1)?;
        assert_eq!(socket.recv_word()?, 2);
        assert_eq!(server.join().unwrap(), [0, 0, 0, 1]);
        Ok(())
    }

    #[test]
    fn test_recv_split_word() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let address = listener.local_addr()?;
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.set_nodelay(true).unwrap();
            stream.write_all(&[0xDE, 0xAD]).unwrap();
            thread::sleep(Duration::from_millis(20));
            stream.write_all(&[0xBE, 0xEF]).unwrap();
        });

        let mut socket = TcpProbeSocket::connect(address, None)?;
        assert_eq!(socket.recv_word()?, 0xDEAD_BEEF);
        server.join().unwrap();
        Ok(())
    }

    #[test]
    fn test_recv_peer_closed() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let address = listener.local_addr()?;
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&[0, 0]).unwrap();
        });

        let mut socket = TcpProbeSocket::connect(address, None)?;
        server.join().unwrap();
        assert!(matches!(socket.recv_word(), Err(ClientError::PeerClosed)));
        Ok(())
    }

    #[test]
    fn test_recv_timeout() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let address = listener.local_addr()?;

        let mut socket = TcpProbeSocket::connect(address, Some(Duration::from_millis(20)))?;
        assert!(matches!(socket.recv_word(), Err(ClientError::Timeout)));
        drop(listener);
        Ok(())
    }
}

#[cfg(test)]
pub use tests::MockProbeSocket;
