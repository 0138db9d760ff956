//! ASCII token framing over a byte transport.
//!
//! Requests are whitespace/newline-delimited tokens; responses are single
//! lines. Reads are blocking: a source that returns `WouldBlock` (a serial
//! port in non-blocking mode) is polled with short sleeps through the
//! `Clock`, and the wait carries no timeout: an absent host payload
//! stalls the loop until bytes arrive. Sources whose `read`
//! blocks natively (stdio, channels) provide the same contract for free.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use rig_traits::Clock;

use crate::pipette::PipetteStatus;
use crate::protocol::ResponseCode;

const READ_CHUNK: usize = 256;

pub struct TokenReader<R> {
    inner: R,
    buf: VecDeque<u8>,
    poll: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
    eof: bool,
}

impl<R: Read> TokenReader<R> {
    pub fn new(inner: R, poll: Duration, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            inner,
            buf: VecDeque::with_capacity(READ_CHUNK),
            poll,
            clock,
            eof: false,
        }
    }

    /// Next whitespace-delimited token. Blocks until a full token is
    /// available; `None` means the transport reached end of input.
    pub fn next_token(&mut self) -> io::Result<Option<String>> {
        loop {
            while matches!(self.buf.front(), Some(b) if b.is_ascii_whitespace()) {
                self.buf.pop_front();
            }
            if let Some(end) = self.buf.iter().position(|b| b.is_ascii_whitespace()) {
                let token: String = self.buf.drain(..end).map(char::from).collect();
                return Ok(Some(token));
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let token: String = self.buf.drain(..).map(char::from).collect();
                return Ok(Some(token));
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.inner.read(&mut chunk) {
            Ok(0) => self.eof = true,
            Ok(n) => self.buf.extend(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => self.clock.sleep(self.poll),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Drop buffered bytes up to and including the next line boundary, so a
    /// malformed or oversized payload cannot desynchronize later parses.
    /// Bytes of any already-buffered following line are kept.
    pub fn discard_to_boundary(&mut self) {
        if let Some(nl) = self.buf.iter().position(|&b| b == b'\n') {
            self.buf.drain(..=nl);
        } else {
            self.buf.clear();
        }
    }
}

/// Writes protocol responses; every line is flushed immediately because the
/// host blocks on it.
pub struct ResponseWriter<W> {
    out: W,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn ok(&mut self, code: ResponseCode) -> io::Result<()> {
        writeln!(self.out, "OK:{}", code.code())?;
        self.out.flush()
    }

    pub fn err(&mut self, code: ResponseCode) -> io::Result<()> {
        writeln!(self.out, "ERR:{}", code.code())?;
        self.out.flush()
    }

    /// `OK:`/`ERR:` depending on a verification outcome.
    pub fn verified(&mut self, code: ResponseCode, ok: bool) -> io::Result<()> {
        if ok { self.ok(code) } else { self.err(code) }
    }

    /// Bare numeric line (sensor reads, connectivity check, sentinel).
    pub fn bare(&mut self, code: i32) -> io::Result<()> {
        writeln!(self.out, "{code}")?;
        self.out.flush()
    }

    /// Free-text diagnostic line, not intended for machine parsing.
    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    pub fn status(&mut self, s: &PipetteStatus) -> io::Result<()> {
        writeln!(
            self.out,
            "STATUS:{},{:.2},{:.2}",
            u8::from(s.homed),
            s.position_mm,
            s.volume_ul
        )?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_traits::MonotonicClock;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> TokenReader<Cursor<Vec<u8>>> {
        TokenReader::new(
            Cursor::new(bytes.to_vec()),
            Duration::from_millis(1),
            Arc::new(MonotonicClock::new()),
        )
    }

    #[test]
    fn splits_on_any_whitespace() {
        let mut r = reader(b"9\n10 5.0\t13\n");
        let mut toks = Vec::new();
        while let Some(t) = r.next_token().unwrap() {
            toks.push(t);
        }
        assert_eq!(toks, ["9", "10", "5.0", "13"]);
    }

    #[test]
    fn final_token_without_trailing_newline_is_returned() {
        let mut r = reader(b"99");
        assert_eq!(r.next_token().unwrap().as_deref(), Some("99"));
        assert_eq!(r.next_token().unwrap(), None);
    }

    #[test]
    fn discard_drops_rest_of_line_but_keeps_next() {
        let mut r = reader(b"10 5.0 garbage\n13\n");
        assert_eq!(r.next_token().unwrap().as_deref(), Some("10"));
        assert_eq!(r.next_token().unwrap().as_deref(), Some("5.0"));
        r.discard_to_boundary();
        assert_eq!(r.next_token().unwrap().as_deref(), Some("13"));
    }

    #[test]
    fn status_line_uses_two_decimal_places() {
        let mut buf = Vec::new();
        {
            let mut w = ResponseWriter::new(&mut buf);
            w.status(&PipetteStatus {
                homed: true,
                position_mm: 0.5,
                volume_ul: 0.0,
            })
            .unwrap();
            w.ok(ResponseCode::PipetteStatus).unwrap();
        }
        assert_eq!(String::from_utf8(buf).unwrap(), "STATUS:1,0.50,0.00\nOK:113\n");
    }
}
