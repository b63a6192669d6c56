//! Plaintext program images and their text format.
//!
//! An image file holds one item per line:
//!
//! ```text
//! # comment
//! .pc 0        # initial program counter
//! .ac 0x10     # initial accumulator
//! .org 8       # place following words from address 8
//! 0x0305       # a word, decimal or 0x-prefixed hex
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::{Geometry, MAX_ADDRESS_BITS};

/// Initial machine state in plaintext.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// Initial program counter.
    pub pc: u16,
    /// Initial accumulator.
    pub ac: u16,
    /// Memory words from address 0. Missing words are zero.
    pub words: Vec<u16>,
}

/// Malformed image text.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Reading the image file failed.
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    /// A token that is not a number.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber {
        /// 1-based line number.
        line: usize,
        /// Offending token.
        token: String,
    },

    /// A number that does not fit in a word.
    #[error("line {line}: {value} does not fit in 16 bits")]
    OutOfRange {
        /// 1-based line number.
        line: usize,
        /// Parsed value.
        value: u64,
    },

    /// A word placed past the last addressable cell.
    #[error("line {line}: address {address:#x} is outside the {}-bit address space", MAX_ADDRESS_BITS)]
    AddressOutOfRange {
        /// 1-based line number.
        line: usize,
        /// Address the word would land at.
        address: usize,
    },

    /// A directive other than `.pc`, `.ac` or `.org`.
    #[error("line {line}: unknown directive '{directive}'")]
    UnknownDirective {
        /// 1-based line number.
        line: usize,
        /// Offending directive, including the dot.
        directive: String,
    },

    /// A directive without its value.
    #[error("line {line}: '{directive}' needs a value")]
    MissingValue {
        /// 1-based line number.
        line: usize,
        /// Directive missing its value.
        directive: String,
    },

    /// More than one item on a line.
    #[error("line {line}: unexpected '{token}'")]
    TrailingInput {
        /// 1-based line number.
        line: usize,
        /// First unexpected token.
        token: String,
    },
}

/// Image that does not fit a geometry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FitError {
    /// A word placed past the last memory cell.
    #[error("image places a word at address {address:#x} but memory holds {capacity} words")]
    AddressOutOfRange {
        /// Highest address the image writes.
        address: usize,
        /// Memory capacity.
        capacity: usize,
    },

    /// The initial program counter is not an address.
    #[error("initial pc {pc} does not fit in {address_bits} address bits")]
    PcOutOfRange {
        /// Initial program counter.
        pc: u16,
        /// Address width of the geometry.
        address_bits: u32,
    },
}

impl ProgramImage {
    /// Image holding `words` from address 0 with zeroed registers.
    pub fn from_words(words: impl Into<Vec<u16>>) -> Self {
        Self {
            words: words.into(),
            ..Self::default()
        }
    }

    /// Sets the initial program counter.
    pub fn with_pc(mut self, pc: u16) -> Self {
        self.pc = pc;
        self
    }

    /// Sets the initial accumulator.
    pub fn with_ac(mut self, ac: u16) -> Self {
        self.ac = ac;
        self
    }

    /// Reads and parses an image file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let text = fs::read_to_string(path)?;
        text.parse()
    }

    /// Checks that the image can be loaded into `geometry`.
    pub fn check_fits(&self, geometry: Geometry) -> Result<(), FitError> {
        if self.words.len() > geometry.capacity() {
            return Err(FitError::AddressOutOfRange {
                address: self.words.len() - 1,
                capacity: geometry.capacity(),
            });
        }

        if self.pc & !geometry.address_mask() != 0 {
            return Err(FitError::PcOutOfRange {
                pc: self.pc,
                address_bits: geometry.address_bits(),
            });
        }

        Ok(())
    }

    /// Memory contents padded with zeros to the capacity of `geometry`.
    pub fn memory(&self, geometry: Geometry) -> Result<Vec<u16>, FitError> {
        self.check_fits(geometry)?;
        let mut memory = self.words.clone();
        memory.resize(geometry.capacity(), 0);
        Ok(memory)
    }
}

impl FromStr for ProgramImage {
    type Err = ImageError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut image = ProgramImage::default();
        let mut cursor = 0usize;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw.split('#').next().unwrap_or_default();
            let mut tokens = content.split_whitespace();

            let Some(first) = tokens.next() else {
                continue;
            };

            if let Some(directive) = first.strip_prefix('.') {
                let value = match tokens.next() {
                    Some(token) => parse_word(line, token)?,
                    None => {
                        return Err(ImageError::MissingValue {
                            line,
                            directive: first.to_string(),
                        });
                    }
                };

                match directive {
                    "pc" => image.pc = value,
                    "ac" => image.ac = value,
                    "org" => cursor = usize::from(value),
                    _ => {
                        return Err(ImageError::UnknownDirective {
                            line,
                            directive: first.to_string(),
                        });
                    }
                }
            } else {
                let word = parse_word(line, first)?;
                if cursor >= 1 << MAX_ADDRESS_BITS {
                    return Err(ImageError::AddressOutOfRange {
                        line,
                        address: cursor,
                    });
                }
                if image.words.len() <= cursor {
                    image.words.resize(cursor + 1, 0);
                }
                image.words[cursor] = word;
                cursor += 1;
            }

            if let Some(extra) = tokens.next() {
                return Err(ImageError::TrailingInput {
                    line,
                    token: extra.to_string(),
                });
            }
        }

        Ok(image)
    }
}

fn parse_word(line: usize, token: &str) -> Result<u16, ImageError> {
    let parsed = match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => token.parse::<u64>(),
    };

    let value = parsed.map_err(|_| ImageError::InvalidNumber {
        line,
        token: token.to_string(),
    })?;

    u16::try_from(value).map_err(|_| ImageError::OutOfRange { line, value })
}
