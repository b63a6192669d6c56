//! `encvm`: run programs on the encrypted machine.

mod cli;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;
use encvm_gates::{CleartextContext, CryptoContext, IntegerContext};
use encvm_isa::{Instruction, MemoryListing, ProgramImage, ReferenceMachine};
use encvm_machine::{DecryptedDump, EncryptedImage, Machine, MachineConfig};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Backend, Cli, Command, DisasmCommand, ReferenceCommand, RunCommand};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let trace = matches!(&cli.command, Command::Run(args) if args.trace);
    init_tracing(if trace { "warn,encvm_machine=debug" } else { "warn" });

    match cli.command {
        Command::Run(args) => run(args),
        Command::Reference(args) => reference(args),
        Command::Disasm(args) => disasm(args),
    }
}

fn init_tracing(default_directives: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_image(path: &Path) -> anyhow::Result<ProgramImage> {
    ProgramImage::read(path).with_context(|| format!("failed to load image {}", path.display()))
}

fn run(args: RunCommand) -> anyhow::Result<()> {
    let geometry = args.geometry.geometry()?;
    let image = load_image(&args.image)?;
    let config = MachineConfig {
        geometry,
        parallel: args.parallel,
        trace_registers: args.trace,
    };

    let limit = args.time_limit.map(Duration::from_secs);
    let dump = match args.backend {
        Backend::Cleartext => {
            execute(&CleartextContext::new(), config, &image, args.cycles, limit)?
        }
        Backend::Integer => {
            let start = Instant::now();
            let ctx = IntegerContext::from_passphrase(args.integer_params(), &args.seed)
                .context("invalid integer backend parameters")?;
            info!(elapsed = ?start.elapsed(), "generated keys");
            execute(&ctx, config, &image, args.cycles, limit)?
        }
    };

    print!("{dump}");

    if args.check {
        let mut reference = ReferenceMachine::new(geometry, &image)?;
        reference.run(dump.cycles);

        if dump.registers != *reference.registers() {
            bail!(
                "registers differ from the reference\n  encrypted: {}\n  reference: {}",
                dump.registers,
                reference.registers()
            );
        }
        let mismatch = dump
            .memory
            .iter()
            .zip(reference.memory())
            .position(|(encrypted, plain)| encrypted != plain);
        if let Some(address) = mismatch {
            bail!(
                "memory differs from the reference at {address:#04x}: {:#06x} != {:#06x}",
                dump.memory[address],
                reference.memory()[address]
            );
        }
        println!("check: ok");
    }

    Ok(())
}

fn execute<C: CryptoContext>(
    ctx: &C,
    config: MachineConfig,
    image: &ProgramImage,
    cycles: u64,
    limit: Option<Duration>,
) -> anyhow::Result<DecryptedDump> {
    let encrypted = EncryptedImage::encrypt(ctx, image, config.geometry)?;
    let mut machine = Machine::new(ctx, config, encrypted)?;

    let pb = ProgressBar::new(cycles);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("🔒 [{bar:50.cyan/blue}] {percent:>3}% | {msg} | {elapsed_precise}")?
            .progress_chars("█░"),
    );

    let stop = AtomicBool::new(false);
    let start = Instant::now();
    let completed = machine.run_observed(cycles, &stop, |machine| {
        pb.inc(1);

        let elapsed = start.elapsed();
        if elapsed.as_secs_f64() > 0.0 {
            let gates = machine.stats().total_gates() as f64;
            pb.set_message(format!(
                "cycle {}/{cycles} @ {:.2} M gates/s",
                machine.cycles_completed(),
                gates / elapsed.as_secs_f64() / 1_000_000.0
            ));
        }

        if limit.is_some_and(|limit| elapsed >= limit) {
            stop.store(true, Ordering::Relaxed);
        }
    });
    pb.finish_and_clear();

    if completed < cycles {
        warn!(completed, cycles, "time limit reached, stopped early");
    }

    Ok(machine.into_dump().decrypt(ctx))
}

fn reference(args: ReferenceCommand) -> anyhow::Result<()> {
    let geometry = args.geometry.geometry()?;
    let image = load_image(&args.image)?;
    let mut machine = ReferenceMachine::new(geometry, &image)?;
    machine.run(args.cycles);

    println!("cycles: {}", machine.cycles());
    println!("{}", machine.registers());
    print!("{}", MemoryListing(machine.memory()));
    Ok(())
}

fn disasm(args: DisasmCommand) -> anyhow::Result<()> {
    let image = load_image(&args.image)?;

    println!(".pc {:#04x}", image.pc);
    println!(".ac {:#06x}", image.ac);
    for (address, word) in image.words.iter().enumerate() {
        println!("{address:04x}: {word:04x}  {}", Instruction::decode(*word));
    }
    Ok(())
}
