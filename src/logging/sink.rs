//! Log destinations.
//!
//! A sink receives fully formatted records as bytes. Sinks are independent:
//! each guards its own handle, so a slow or broken sink never corrupts the
//! bytes another sink receives.

use crate::error::SinkError;
use crate::logging::config::{ConsoleStream, Rotation, SinkSpec};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::path::Path;
use std::time::Duration;
use tracing_appender::rolling::{self, RollingFileAppender};

/// A named destination for formatted records.
pub trait Sink: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &'static str;

    /// Write one complete record.
    fn write(&self, record: &[u8]) -> Result<(), SinkError>;

    /// Flush buffered output.
    fn flush(&self) -> Result<(), SinkError>;

    /// Release the underlying handle. Later writes fail with `Closed`.
    fn close(&self) -> Result<(), SinkError>;
}

/// Build the sink described by `spec`.
///
/// # Errors
///
/// Fails if a file cannot be opened or a network endpoint cannot be reached.
pub fn build_sink(spec: &SinkSpec) -> Result<Box<dyn Sink>, SinkError> {
    match spec {
        SinkSpec::Console { stream } => Ok(Box::new(ConsoleSink::new(*stream))),
        SinkSpec::File { path, rotation } => Ok(Box::new(FileSink::open(path, *rotation)?)),
        SinkSpec::Tcp { address, timeout_ms } => Ok(Box::new(TcpSink::connect(
            address,
            Duration::from_millis(*timeout_ms),
        )?)),
        SinkSpec::Udp { address } => Ok(Box::new(UdpSink::connect(address)?)),
    }
}

/// Standard output or standard error.
pub struct ConsoleSink {
    stream: ConsoleStream,
    closed: Mutex<bool>,
}

impl ConsoleSink {
    /// Sink on `stream`.
    pub fn new(stream: ConsoleStream) -> Self {
        Self {
            stream,
            closed: Mutex::new(false),
        }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn write(&self, record: &[u8]) -> Result<(), SinkError> {
        let closed = self.closed.lock();
        if *closed {
            return Err(SinkError::Closed(self.name()));
        }
        match self.stream {
            ConsoleStream::Stdout => io::stdout().lock().write_all(record)?,
            ConsoleStream::Stderr => io::stderr().lock().write_all(record)?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().flush()?,
            ConsoleStream::Stderr => io::stderr().flush()?,
        }
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        let mut closed = self.closed.lock();
        if !*closed {
            *closed = true;
            drop(closed);
            self.flush()?;
        }
        Ok(())
    }
}

/// File sink backed by a rolling appender.
pub struct FileSink {
    appender: Mutex<Option<RollingFileAppender>>,
}

impl FileSink {
    /// Open (or create) the file at `path`.
    ///
    /// With rotation, the date is appended to the file name.
    pub fn open(path: impl AsRef<Path>, rotation: Rotation) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| SinkError::Init {
                sink: "file",
                message: format!("{} has no file name", path.display()),
            })?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(directory)?;

        let rotation = match rotation {
            Rotation::Never => rolling::Rotation::NEVER,
            Rotation::Minutely => rolling::Rotation::MINUTELY,
            Rotation::Hourly => rolling::Rotation::HOURLY,
            Rotation::Daily => rolling::Rotation::DAILY,
        };
        let appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(file_name)
            .build(directory)
            .map_err(|e| SinkError::Init {
                sink: "file",
                message: e.to_string(),
            })?;

        Ok(Self {
            appender: Mutex::new(Some(appender)),
        })
    }
}

impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn write(&self, record: &[u8]) -> Result<(), SinkError> {
        let mut guard = self.appender.lock();
        let appender = guard.as_mut().ok_or(SinkError::Closed("file"))?;
        appender.write_all(record)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        if let Some(appender) = self.appender.lock().as_mut() {
            appender.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        if let Some(mut appender) = self.appender.lock().take() {
            appender.flush()?;
        }
        Ok(())
    }
}

/// Line-oriented TCP push.
///
/// A failed write drops the connection; the next write reconnects.
pub struct TcpSink {
    address: SocketAddr,
    timeout: Duration,
    state: Mutex<TcpState>,
}

enum TcpState {
    Connected(TcpStream),
    Disconnected,
    Closed,
}

impl TcpSink {
    /// Connect to `address` within `timeout`.
    pub fn connect(address: &str, timeout: Duration) -> Result<Self, SinkError> {
        let resolved = resolve(address, "tcp")?;
        let stream = open_tcp(resolved, timeout).map_err(|source| SinkError::Connect {
            sink: "tcp",
            address: address.to_string(),
            source,
        })?;
        Ok(Self {
            address: resolved,
            timeout,
            state: Mutex::new(TcpState::Connected(stream)),
        })
    }
}

fn open_tcp(address: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&address, timeout)?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl Sink for TcpSink {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn write(&self, record: &[u8]) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if matches!(*state, TcpState::Closed) {
            return Err(SinkError::Closed("tcp"));
        }
        if matches!(*state, TcpState::Disconnected) {
            let stream = open_tcp(self.address, self.timeout).map_err(|source| SinkError::Connect {
                sink: "tcp",
                address: self.address.to_string(),
                source,
            })?;
            *state = TcpState::Connected(stream);
        }
        let written = match &mut *state {
            TcpState::Connected(stream) => stream.write_all(record),
            _ => Ok(()),
        };
        if let Err(e) = written {
            *state = TcpState::Disconnected;
            return Err(e.into());
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        if let TcpState::Connected(stream) = &mut *self.state.lock() {
            stream.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        let previous = std::mem::replace(&mut *self.state.lock(), TcpState::Closed);
        if let TcpState::Connected(stream) = previous {
            stream.shutdown(std::net::Shutdown::Both).or_else(|e| match e.kind() {
                io::ErrorKind::NotConnected => Ok(()),
                _ => Err(e),
            })?;
        }
        Ok(())
    }
}

/// One datagram per record.
pub struct UdpSink {
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpSink {
    /// Bind an ephemeral local port and target `address`.
    pub fn connect(address: &str) -> Result<Self, SinkError> {
        let target = resolve(address, "udp")?;
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let connect_error = |source: io::Error| SinkError::Connect {
            sink: "udp",
            address: address.to_string(),
            source,
        };
        let socket = UdpSocket::bind(local).map_err(connect_error)?;
        socket.connect(target).map_err(connect_error)?;
        Ok(Self {
            socket: Mutex::new(Some(socket)),
        })
    }
}

impl Sink for UdpSink {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn write(&self, record: &[u8]) -> Result<(), SinkError> {
        let guard = self.socket.lock();
        let socket = guard.as_ref().ok_or(SinkError::Closed("udp"))?;
        socket.send(record)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.socket.lock().take();
        Ok(())
    }
}

fn resolve(address: &str, sink: &'static str) -> Result<SocketAddr, SinkError> {
    address
        .to_socket_addrs()
        .map_err(|e| SinkError::Init {
            sink,
            message: format!("cannot resolve '{}': {}", address, e),
        })?
        .next()
        .ok_or_else(|| SinkError::Init {
            sink,
            message: format!("'{}' resolved to no addresses", address),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use tempfile::TempDir;

    #[test]
    fn test_file_sink_writes_and_closes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/app.log");

        let sink = FileSink::open(&path, Rotation::Never).unwrap();
        sink.write(b"first\n").unwrap();
        sink.write(b"second\n").unwrap();
        sink.close().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        assert!(matches!(sink.write(b"late\n"), Err(SinkError::Closed("file"))));
    }

    #[test]
    fn test_tcp_sink_delivers_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let sink = TcpSink::connect(&address, Duration::from_secs(1)).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        sink.write(b"hello\n").unwrap();
        let mut line = String::new();
        BufReader::new(accepted).read_line(&mut line).unwrap();
        assert_eq!(line, "hello\n");

        sink.close().unwrap();
        assert!(matches!(sink.write(b"x\n"), Err(SinkError::Closed("tcp"))));
    }

    #[test]
    fn test_tcp_sink_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpSink::connect(&address, Duration::from_millis(200));
        assert!(matches!(result, Err(SinkError::Connect { sink: "tcp", .. })));
    }

    #[test]
    fn test_udp_sink_sends_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        let address = receiver.local_addr().unwrap().to_string();

        let sink = UdpSink::connect(&address).unwrap();
        sink.write(b"<14>record").unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"<14>record");
    }

    #[test]
    fn test_build_sink_from_spec() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("built.log");
        let sink = build_sink(&SinkSpec::file(path.to_string_lossy())).unwrap();
        assert_eq!(sink.name(), "file");

        let console = build_sink(&SinkSpec::stdout()).unwrap();
        assert_eq!(console.name(), "console");
        console.close().unwrap();
        assert!(console.write(b"x").is_err());
    }

    #[test]
    fn test_unresolvable_address() {
        let result = build_sink(&SinkSpec::Udp {
            address: "not an address".into(),
        });
        assert!(matches!(result, Err(SinkError::Init { sink: "udp", .. })));
    }
}
