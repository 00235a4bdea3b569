use serde::{Deserialize, Serialize};
use tracing::warn;

/// ESC (Escape) command prefix
pub const ESC: u8 = 0x1B;
/// GS (Group Separator) command prefix
pub const GS: u8 = 0x1D;
/// LF (Line Feed)
pub const LF: u8 = 0x0A;

/// Initialize printer (ESC @), identical in both dialects
pub const INITIALIZE: [u8; 2] = [ESC, b'@'];

/// Byte written in place of characters that do not fit in one byte
pub const REPLACEMENT: u8 = b'?';

/// Horizontal alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Left aligned
    Left = 0,
    /// Centered
    Center = 1,
    /// Right aligned
    Right = 2,
}

/// Control-code family spoken by the printer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterDialect {
    /// Epson ESC/POS and its many clones
    #[default]
    EscPos,
    /// Star Micronics StarPRNT / line mode
    StarPrnt,
}

impl PrinterDialect {
    /// Command set implementing this dialect
    #[must_use]
    pub fn commands(self) -> &'static dyn CommandSet {
        match self {
            Self::EscPos => &EscPos,
            Self::StarPrnt => &StarPrnt,
        }
    }
}

/// Byte sequences for the formatting operations a receipt needs
pub trait CommandSet: Sync {
    /// Reset printer state
    fn initialize(&self) -> Vec<u8> {
        INITIALIZE.to_vec()
    }
    /// Set alignment for following lines
    fn align(&self, alignment: Alignment) -> Vec<u8>;
    /// Enable or disable emphasis
    fn bold(&self, enabled: bool) -> Vec<u8>;
    /// Switch between double width+height and normal size
    fn double_size(&self, enabled: bool) -> Vec<u8>;
    /// Full paper cut
    fn cut(&self) -> Vec<u8>;
}

/// Epson ESC/POS commands
#[derive(Debug, Clone, Copy, Default)]
pub struct EscPos;

impl CommandSet for EscPos {
    fn align(&self, alignment: Alignment) -> Vec<u8> {
        // ESC a n
        vec![ESC, b'a', alignment as u8]
    }

    fn bold(&self, enabled: bool) -> Vec<u8> {
        // ESC E n
        vec![ESC, b'E', u8::from(enabled)]
    }

    fn double_size(&self, enabled: bool) -> Vec<u8> {
        // GS ! n
        vec![GS, b'!', if enabled { 0x11 } else { 0x00 }]
    }

    fn cut(&self) -> Vec<u8> {
        // GS V 0
        vec![GS, b'V', 0x00]
    }
}

/// Star Micronics StarPRNT commands
#[derive(Debug, Clone, Copy, Default)]
pub struct StarPrnt;

impl CommandSet for StarPrnt {
    fn align(&self, alignment: Alignment) -> Vec<u8> {
        // ESC GS a n
        vec![ESC, GS, b'a', alignment as u8]
    }

    fn bold(&self, enabled: bool) -> Vec<u8> {
        // ESC E / ESC F
        vec![ESC, if enabled { b'E' } else { b'F' }]
    }

    fn double_size(&self, enabled: bool) -> Vec<u8> {
        // ESC i height width
        let n = u8::from(enabled);
        vec![ESC, b'i', n, n]
    }

    fn cut(&self) -> Vec<u8> {
        // ESC d 0
        vec![ESC, b'd', 0x00]
    }
}

/// Encode text one byte per character
///
/// Characters up to U+00FF map to their Latin-1 byte; anything wider becomes
/// [`REPLACEMENT`]. Control characters become a space so caller text can
/// never break a row or start a printer command.
#[must_use]
pub fn encode_text(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| {
            if c.is_control() {
                b' '
            } else {
                u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT)
            }
        })
        .collect()
}

/// First character of `s` that [`encode_text`] cannot represent
#[must_use]
pub fn first_unencodable(s: &str) -> Option<char> {
    s.chars().find(|c| u32::from(*c) > 0xFF)
}

/// Fluent builder for a printer byte stream
pub struct CommandBuffer {
    buf: Vec<u8>,
    commands: &'static dyn CommandSet,
    lossy: bool,
}

impl CommandBuffer {
    /// Create an empty buffer for the given dialect
    #[must_use]
    pub fn new(dialect: PrinterDialect) -> Self {
        Self {
            buf: Vec::with_capacity(1024),
            commands: dialect.commands(),
            lossy: false,
        }
    }

    /// Reset printer state (ESC @)
    pub fn initialize(&mut self) -> &mut Self {
        let bytes = self.commands.initialize();
        self.raw(&bytes)
    }

    /// Write text without a line feed
    pub fn text(&mut self, s: &str) -> &mut Self {
        if first_unencodable(s).is_some() {
            self.lossy = true;
        }
        self.buf.extend(encode_text(s));
        self
    }

    /// Write text followed by a line feed
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(LF);
        self
    }

    /// Write `count` empty lines
    pub fn feed(&mut self, count: usize) -> &mut Self {
        self.buf.extend(std::iter::repeat_n(LF, count));
        self
    }

    /// Set alignment
    pub fn align(&mut self, alignment: Alignment) -> &mut Self {
        let bytes = self.commands.align(alignment);
        self.raw(&bytes)
    }

    /// Center following lines
    pub fn center(&mut self) -> &mut Self {
        self.align(Alignment::Center)
    }

    /// Left-align following lines
    pub fn left(&mut self) -> &mut Self {
        self.align(Alignment::Left)
    }

    /// Enable or disable emphasis
    pub fn bold(&mut self, enabled: bool) -> &mut Self {
        let bytes = self.commands.bold(enabled);
        self.raw(&bytes)
    }

    /// Enable or disable double size
    pub fn double_size(&mut self, enabled: bool) -> &mut Self {
        let bytes = self.commands.double_size(enabled);
        self.raw(&bytes)
    }

    /// Full paper cut
    pub fn cut(&mut self) -> &mut Self {
        let bytes = self.commands.cut();
        self.raw(&bytes)
    }

    /// Write raw bytes
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Finish and return the byte stream
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        if self.lossy {
            warn!("Receipt text contained characters outside the single-byte range; replaced with '?'");
        }
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escpos_commands() {
        let commands = PrinterDialect::EscPos.commands();
        assert_eq!(commands.initialize(), vec![0x1B, 0x40]);
        assert_eq!(commands.align(Alignment::Center), vec![0x1B, 0x61, 0x01]);
        assert_eq!(commands.bold(true), vec![0x1B, 0x45, 0x01]);
        assert_eq!(commands.bold(false), vec![0x1B, 0x45, 0x00]);
        assert_eq!(commands.double_size(true), vec![0x1D, 0x21, 0x11]);
        assert_eq!(commands.cut(), vec![0x1D, 0x56, 0x00]);
    }

    #[test]
    fn test_star_commands() {
        let commands = PrinterDialect::StarPrnt.commands();
        assert_eq!(commands.initialize(), vec![0x1B, 0x40]);
        assert_eq!(commands.align(Alignment::Center), vec![0x1B, 0x1D, 0x61, 0x01]);
        assert_eq!(commands.bold(true), vec![0x1B, 0x45]);
        assert_eq!(commands.bold(false), vec![0x1B, 0x46]);
        assert_eq!(commands.double_size(true), vec![0x1B, 0x69, 0x01, 0x01]);
        assert_eq!(commands.cut(), vec![0x1B, 0x64, 0x00]);
    }

    #[test]
    fn test_single_byte_text() {
        assert_eq!(encode_text("Tea"), b"Tea".to_vec());
        assert_eq!(encode_text("Café"), vec![b'C', b'a', b'f', 0xE9]);
        assert_eq!(encode_text("茶x"), vec![REPLACEMENT, b'x']);
    }

    #[test]
    fn test_control_characters_become_spaces() {
        assert_eq!(encode_text("Tea\nExtra\x1b@"), b"Tea Extra @".to_vec());
        assert_eq!(encode_text("a\tb\r\u{7f}\u{85}"), b"a b   ".to_vec());

        let mut buffer = CommandBuffer::new(PrinterDialect::EscPos);
        buffer.line("Tea\nExtra");
        assert_eq!(buffer.build(), b"Tea Extra\n".to_vec());
        assert_eq!(first_unencodable("Café"), None);
        assert_eq!(first_unencodable("a€b"), Some('€'));
    }

    #[test]
    fn test_buffer_sequence() {
        let mut buffer = CommandBuffer::new(PrinterDialect::EscPos);
        buffer.initialize().center().bold(true).line("HI").bold(false).feed(2).cut();

        let data = buffer.build();
        assert_eq!(
            data,
            vec![
                0x1B, 0x40, 0x1B, 0x61, 0x01, 0x1B, 0x45, 0x01, b'H', b'I', 0x0A, 0x1B, 0x45,
                0x00, 0x0A, 0x0A, 0x1D, 0x56, 0x00
            ]
        );
    }

    #[test]
    fn test_dialect_from_config() {
        let dialect: PrinterDialect = serde_json::from_str("\"star_prnt\"").unwrap();
        assert_eq!(dialect, PrinterDialect::StarPrnt);
        assert_eq!(PrinterDialect::default(), PrinterDialect::EscPos);
    }
}
