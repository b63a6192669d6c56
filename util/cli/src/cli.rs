use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use encvm_gates::IntegerParams;
use encvm_isa::{Geometry, GeometryError};

/// Encrypted stored-program computer
#[derive(Parser, Debug)]
#[command(name = "encvm")]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Encrypt an image, run it for a fixed number of cycles and print the
    /// decrypted result
    Run(RunCommand),
    /// Run an image on the plaintext reference interpreter
    Reference(ReferenceCommand),
    /// List an image with disassembly
    Disasm(DisasmCommand),
}

/// Homomorphic backend evaluating the gates.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Backend {
    /// Plain booleans, no encryption
    Cleartext,
    /// Somewhat-homomorphic encryption over the integers
    Integer,
}

#[derive(Args, Debug)]
pub(crate) struct GeometryArgs {
    /// Address bits selecting the memory row
    #[arg(long = "row-bits", default_value_t = 4, value_name = "BITS")]
    pub(crate) row_bits: u32,

    /// Address bits selecting the memory column
    #[arg(long = "col-bits", default_value_t = 4, value_name = "BITS")]
    pub(crate) col_bits: u32,
}

impl GeometryArgs {
    pub(crate) fn geometry(&self) -> Result<Geometry, GeometryError> {
        Geometry::new(self.row_bits, self.col_bits)
    }
}

#[derive(Args, Debug)]
pub(crate) struct RunCommand {
    /// Program image file
    #[arg(value_name = "IMAGE")]
    pub(crate) image: PathBuf,

    /// Number of cycles to run
    #[arg(short = 'n', long, value_name = "N")]
    pub(crate) cycles: u64,

    #[command(flatten)]
    pub(crate) geometry: GeometryArgs,

    /// Backend evaluating the gates
    #[arg(short, long, value_enum, default_value_t = Backend::Cleartext)]
    pub(crate) backend: Backend,

    /// Passphrase the integer backend derives its keys from
    #[arg(long, default_value = "encvm", value_name = "PHRASE")]
    pub(crate) seed: String,

    /// Integer backend: bits of encryption noise
    #[arg(long = "noise-bits", value_name = "BITS")]
    pub(crate) noise_bits: Option<u32>,

    /// Integer backend: bits of the secret key
    #[arg(long = "secret-bits", value_name = "BITS")]
    pub(crate) secret_bits: Option<u32>,

    /// Integer backend: bits of the public modulus
    #[arg(long = "modulus-bits", value_name = "BITS")]
    pub(crate) modulus_bits: Option<u32>,

    /// Stop after the first cycle that ends past this many seconds
    #[arg(long = "time-limit", value_name = "SECS")]
    pub(crate) time_limit: Option<u64>,

    /// Scan memory on all cores
    #[arg(long)]
    pub(crate) parallel: bool,

    /// Log decrypted registers after every cycle
    #[arg(long)]
    pub(crate) trace: bool,

    /// Compare the result with the reference interpreter
    #[arg(long)]
    pub(crate) check: bool,
}

impl RunCommand {
    pub(crate) fn integer_params(&self) -> IntegerParams {
        let defaults = IntegerParams::default();
        IntegerParams {
            noise_bits: self.noise_bits.unwrap_or(defaults.noise_bits),
            secret_bits: self.secret_bits.unwrap_or(defaults.secret_bits),
            modulus_bits: self.modulus_bits.unwrap_or(defaults.modulus_bits),
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ReferenceCommand {
    /// Program image file
    #[arg(value_name = "IMAGE")]
    pub(crate) image: PathBuf,

    /// Number of cycles to run
    #[arg(short = 'n', long, value_name = "N")]
    pub(crate) cycles: u64,

    #[command(flatten)]
    pub(crate) geometry: GeometryArgs,
}

#[derive(Args, Debug)]
pub(crate) struct DisasmCommand {
    /// Program image file
    #[arg(value_name = "IMAGE")]
    pub(crate) image: PathBuf,
}
