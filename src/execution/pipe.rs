//! Non-blocking draining of a child's stdout and stderr.
//!
//! On Unix both pipes are switched to `O_NONBLOCK` and multiplexed with
//! `poll(2)`. Elsewhere each stream gets a reader thread that forwards
//! chunks over a channel.

use std::time::Duration;

/// Longest single wait before the caller re-checks the child.
///
/// A background grandchild can keep the pipes open after the child has
/// exited, so readiness alone never proves the child is still running.
const MAX_WAIT: Duration = Duration::from_millis(50);

fn bounded_wait(timeout: Option<Duration>) -> Duration {
    timeout.map_or(MAX_WAIT, |t| t.min(MAX_WAIT))
}

pub(crate) use imp::OutputPipes;

#[cfg(unix)]
mod imp {
    use std::io::{self, Read};
    use std::os::fd::{AsFd, BorrowedFd};
    use std::process::{ChildStderr, ChildStdout};
    use std::time::Duration;

    use nix::errno::Errno;
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use tracing::{trace, warn};

    use super::bounded_wait;

    fn set_nonblocking(fd: BorrowedFd<'_>) -> io::Result<()> {
        let flags = fcntl(fd, FcntlArg::F_GETFL)?;
        let new_flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        fcntl(fd, FcntlArg::F_SETFL(new_flags))?;
        Ok(())
    }

    /// Round up so a sub-millisecond budget still waits instead of spinning.
    fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
        let millis = bounded_wait(timeout).as_micros().div_ceil(1000);
        PollTimeout::from(u16::try_from(millis).unwrap_or(u16::MAX))
    }

    struct Stream<R> {
        name: &'static str,
        reader: Option<R>,
    }

    impl<R: Read + AsFd> Stream<R> {
        fn new(name: &'static str, reader: R) -> io::Result<Self> {
            set_nonblocking(reader.as_fd())?;
            Ok(Self {
                name,
                reader: Some(reader),
            })
        }

        fn fd(&self) -> Option<BorrowedFd<'_>> {
            self.reader.as_ref().map(AsFd::as_fd)
        }

        /// Read everything currently buffered in the pipe.
        fn drain(&mut self, buf: &mut [u8], out: &mut Vec<u8>) {
            let Some(reader) = self.reader.as_mut() else {
                return;
            };
            loop {
                match reader.read(buf) {
                    Ok(0) => {
                        trace!(stream = self.name, "EOF");
                        self.reader = None;
                        return;
                    }
                    Ok(n) => out.extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!(stream = self.name, error = %e, "closing output stream after read error");
                        self.reader = None;
                        return;
                    }
                }
            }
        }
    }

    /// The read ends of a child's stdout and stderr.
    pub(crate) struct OutputPipes {
        stdout: Stream<ChildStdout>,
        stderr: Stream<ChildStderr>,
        buf: Vec<u8>,
    }

    impl OutputPipes {
        pub(crate) fn new(
            stdout: ChildStdout,
            stderr: ChildStderr,
            buffer_size: usize,
        ) -> io::Result<Self> {
            Ok(Self {
                stdout: Stream::new("stdout", stdout)?,
                stderr: Stream::new("stderr", stderr)?,
                buf: vec![0u8; buffer_size.max(1)],
            })
        }

        /// Block until either open stream is readable or the bounded wait
        /// elapses.
        ///
        /// Never blocks longer than [`super::MAX_WAIT`], even when `timeout`
        /// is `None`, so the caller keeps re-checking the child.
        pub(crate) fn wait_readable(&mut self, timeout: Option<Duration>) {
            let mut fds: Vec<PollFd<'_>> = [self.stdout.fd(), self.stderr.fd()]
                .into_iter()
                .flatten()
                .map(|fd| PollFd::new(fd, PollFlags::POLLIN))
                .collect();

            if fds.is_empty() {
                std::thread::sleep(bounded_wait(timeout));
                return;
            }

            match poll(&mut fds, poll_timeout(timeout)) {
                Ok(_) | Err(Errno::EINTR) => {}
                Err(errno) => {
                    warn!(error = %errno, "poll failed");
                    std::thread::sleep(bounded_wait(timeout));
                }
            }
        }

        /// Append whatever is currently available on each stream.
        pub(crate) fn drain(&mut self, stdout: &mut Vec<u8>, stderr: &mut Vec<u8>) {
            self.stdout.drain(&mut self.buf, stdout);
            self.stderr.drain(&mut self.buf, stderr);
        }

        /// Whether both streams have reached EOF.
        pub(crate) fn is_closed(&self) -> bool {
            self.stdout.reader.is_none() && self.stderr.reader.is_none()
        }
    }

}

#[cfg(not(unix))]
mod imp {
    use std::io::{self, Read};
    use std::process::{ChildStderr, ChildStdout};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
    use std::time::Duration;

    use tracing::{trace, warn};

    use super::bounded_wait;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Source {
        Stdout,
        Stderr,
    }

    enum Event {
        Data(Source, Vec<u8>),
        Closed(Source),
    }

    fn spawn_reader<R: Read + Send + 'static>(
        source: Source,
        mut reader: R,
        buffer_size: usize,
        tx: Sender<Event>,
    ) -> io::Result<()> {
        std::thread::Builder::new()
            .name(format!("hiatus-{:?}", source).to_lowercase())
            .spawn(move || {
                let mut buf = vec![0u8; buffer_size];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(Event::Data(source, buf[..n].to_vec())).is_err() {
                                return;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!(stream = ?source, error = %e, "closing output stream after read error");
                            break;
                        }
                    }
                }
                let _ = tx.send(Event::Closed(source));
            })?;
        Ok(())
    }

    /// The read ends of a child's stdout and stderr.
    pub(crate) struct OutputPipes {
        rx: Receiver<Event>,
        pending: Vec<Event>,
        open: usize,
    }

    impl OutputPipes {
        pub(crate) fn new(
            stdout: ChildStdout,
            stderr: ChildStderr,
            buffer_size: usize,
        ) -> io::Result<Self> {
            let (tx, rx) = mpsc::channel();
            let buffer_size = buffer_size.max(1);
            spawn_reader(Source::Stdout, stdout, buffer_size, tx.clone())?;
            spawn_reader(Source::Stderr, stderr, buffer_size, tx)?;
            Ok(Self {
                rx,
                pending: Vec::new(),
                open: 2,
            })
        }

        /// Block until a chunk arrives or the bounded wait elapses.
        pub(crate) fn wait_readable(&mut self, timeout: Option<Duration>) {
            if !self.pending.is_empty() {
                return;
            }
            if self.open == 0 {
                std::thread::sleep(bounded_wait(timeout));
                return;
            }
            let event = match self.rx.recv_timeout(bounded_wait(timeout)) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.open = 0;
                    None
                }
            };
            self.pending.extend(event);
        }

        /// Append every chunk received so far.
        pub(crate) fn drain(&mut self, stdout: &mut Vec<u8>, stderr: &mut Vec<u8>) {
            loop {
                match self.rx.try_recv() {
                    Ok(event) => self.pending.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.open = 0;
                        break;
                    }
                }
            }
            for event in self.pending.drain(..) {
                match event {
                    Event::Data(Source::Stdout, bytes) => stdout.extend_from_slice(&bytes),
                    Event::Data(Source::Stderr, bytes) => stderr.extend_from_slice(&bytes),
                    Event::Closed(source) => {
                        trace!(stream = ?source, "EOF");
                        self.open = self.open.saturating_sub(1);
                    }
                }
            }
        }

        /// Whether both streams have reached EOF.
        pub(crate) fn is_closed(&self) -> bool {
            self.open == 0 && self.pending.is_empty()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn spawn(script: &str) -> std::process::Child {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[test]
    fn test_bounded_wait_is_capped() {
        assert_eq!(bounded_wait(None), MAX_WAIT);
        assert_eq!(bounded_wait(Some(Duration::from_secs(5))), MAX_WAIT);
        assert_eq!(
            bounded_wait(Some(Duration::from_millis(1))),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_drain_separates_streams() {
        let mut child = spawn("printf out; printf err >&2");
        let mut pipes =
            OutputPipes::new(child.stdout.take().unwrap(), child.stderr.take().unwrap(), 4)
                .unwrap();
        child.wait().unwrap();

        let (mut out, mut err) = (Vec::new(), Vec::new());
        while !pipes.is_closed() {
            pipes.wait_readable(Some(Duration::from_millis(100)));
            pipes.drain(&mut out, &mut err);
        }

        assert_eq!(out, b"out");
        assert_eq!(err, b"err");
    }

    #[test]
    fn test_drain_does_not_block_on_silent_child() {
        let mut child = spawn("sleep 5");
        let mut pipes =
            OutputPipes::new(child.stdout.take().unwrap(), child.stderr.take().unwrap(), 64)
                .unwrap();

        let start = std::time::Instant::now();
        pipes.wait_readable(Some(Duration::from_millis(50)));
        let (mut out, mut err) = (Vec::new(), Vec::new());
        pipes.drain(&mut out, &mut err);

        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(out.is_empty());
        assert!(err.is_empty());
        assert!(!pipes.is_closed());

        child.kill().unwrap();
        child.wait().unwrap();
    }
}
