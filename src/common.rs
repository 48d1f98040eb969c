// Licensed under the Apache-2.0 license

//! Shared helpers used by every engine in this crate.
//!
//! Logging is pluggable: engines take a `L: Logger` type parameter that defaults
//! to [`NoOpLogger`], so a build without a console pays nothing for it.

use core::fmt;
use embedded_io::Write;

/// Minimal logging sink used by the I2C engines.
pub trait Logger {
    fn debug(&mut self, args: fmt::Arguments<'_>);
    fn error(&mut self, args: fmt::Arguments<'_>);
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _args: fmt::Arguments<'_>) {}
    fn error(&mut self, _args: fmt::Arguments<'_>) {}
}

/// Logger that writes one line per message to a UART (or any `embedded_io` sink).
///
/// Write failures are swallowed; a broken console must never turn into a bus error.
pub struct UartLogger<W: Write> {
    out: W,
}

impl<W: Write> UartLogger<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, level: &str, args: fmt::Arguments<'_>) {
        let _ = write!(self.out, "[{level}] ");
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_all(b"\r\n");
    }
}

impl<W: Write> Logger for UartLogger<W> {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.line("DEBUG", args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.line("ERROR", args);
    }
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        (**self).debug(args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        (**self).error(args);
    }
}
