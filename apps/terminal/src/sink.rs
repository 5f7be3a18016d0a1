//! Receipt output.
//!
//! The shell renders receipts with `caixa_core::receipt` and hands the text
//! to a [`ReceiptSink`]. Printers plug in here.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::debug;

/// What kind of document a receipt is; used to name stored files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptKind {
    Order,
    Quote,
    Closing,
}

impl ReceiptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptKind::Order => "pedido",
            ReceiptKind::Quote => "orcamento",
            ReceiptKind::Closing => "fechamento",
        }
    }
}

pub trait ReceiptSink: Send {
    /// `number` is the order/quote number, or a session id for closings.
    fn emit(&mut self, kind: ReceiptKind, number: &str, text: &str) -> io::Result<()>;
}

impl<S: ReceiptSink + ?Sized> ReceiptSink for Box<S> {
    fn emit(&mut self, kind: ReceiptKind, number: &str, text: &str) -> io::Result<()> {
        (**self).emit(kind, number, text)
    }
}

/// Prints receipts to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ReceiptSink for StdoutSink {
    fn emit(&mut self, _kind: ReceiptKind, _number: &str, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out)?;
        writeln!(out, "{}", text)?;
        out.flush()
    }
}

/// Writes each receipt to `<dir>/<kind>-<number>.txt`, then forwards it.
pub struct DirectorySink<S> {
    dir: PathBuf,
    inner: S,
}

impl<S: ReceiptSink> DirectorySink<S> {
    pub fn new(dir: impl Into<PathBuf>, inner: S) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(DirectorySink { dir, inner })
    }
}

impl<S: ReceiptSink> ReceiptSink for DirectorySink<S> {
    fn emit(&mut self, kind: ReceiptKind, number: &str, text: &str) -> io::Result<()> {
        let path = self.dir.join(format!("{}-{}.txt", kind.as_str(), number));
        fs::write(&path, text)?;
        debug!(path = %path.display(), "Receipt stored");
        self.inner.emit(kind, number, text)
    }
}

/// Keeps receipts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub receipts: Vec<(ReceiptKind, String)>,
}

impl ReceiptSink for MemorySink {
    fn emit(&mut self, kind: ReceiptKind, _number: &str, text: &str) -> io::Result<()> {
        self.receipts.push((kind, text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_sink_writes_and_forwards() {
        let dir = std::env::temp_dir().join(format!("caixa-receipts-{}", std::process::id()));
        let mut sink = DirectorySink::new(&dir, MemorySink::default()).unwrap();

        sink.emit(ReceiptKind::Order, "7", "PEDIDO #7").unwrap();

        let stored = fs::read_to_string(dir.join("pedido-7.txt")).unwrap();
        assert_eq!(stored, "PEDIDO #7");
        assert_eq!(sink.inner.receipts.len(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }
}
