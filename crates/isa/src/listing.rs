//! Hex listing of plaintext memory.

use std::fmt;

/// Words shown on one line of a [`MemoryListing`].
pub const WORDS_PER_LINE: usize = 8;

/// Displays memory as lines of hex words, each prefixed with the address of
/// its first word.
///
/// ```text
/// 0000: 0305 0f0a 0000 0000 0000 0000 0000 0000
/// 0008: 0000 0000 0005 0000 0000 0000 0000 0000
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MemoryListing<'a>(pub &'a [u16]);

impl fmt::Display for MemoryListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (line, words) in self.0.chunks(WORDS_PER_LINE).enumerate() {
            write!(f, "{:04x}:", line * WORDS_PER_LINE)?;
            for word in words {
                write!(f, " {word:04x}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing() {
        let mut memory = vec![0u16; 10];
        memory[0] = 0x0305;
        memory[9] = 0xBEEF;

        assert_eq!(
            MemoryListing(&memory).to_string(),
            "0000: 0305 0000 0000 0000 0000 0000 0000 0000\n0008: 0000 beef\n"
        );
        assert_eq!(MemoryListing(&[]).to_string(), "");
    }
}
