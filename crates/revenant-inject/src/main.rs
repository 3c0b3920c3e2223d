//! Revenant injector CLI
//!
//! Injects a DLL or raw shellcode into a target process selected by PID or
//! by executable name, optionally waiting for the payload thread to finish.

#[cfg(windows)]
mod cli {
    use clap::{Parser, Subcommand};
    use revenant_common::{init_logging, LogConfig, ProcessAccess};
    use revenant_core::{Injection, Process};
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Parser, Debug)]
    #[command(name = "revenant-inject")]
    #[command(about = "Inject a DLL or shellcode into a target process")]
    #[command(version)]
    struct Args {
        /// Target process ID
        #[arg(short, long, conflicts_with = "name")]
        pid: Option<u32>,

        /// Target process executable name (e.g. "target.exe")
        #[arg(short, long)]
        name: Option<String>,

        /// Wait for the payload thread to finish before exiting
        #[arg(short, long)]
        wait: bool,

        /// Wait timeout in seconds (0 = wait forever)
        #[arg(long, default_value = "60", requires = "wait")]
        timeout: u64,

        /// Log level
        #[arg(long, default_value = "info")]
        log_level: String,

        #[command(subcommand)]
        payload: Payload,
    }

    #[derive(Subcommand, Debug)]
    enum Payload {
        /// Load a DLL into the target via the system loader
        Dll {
            /// Path to the DLL
            path: PathBuf,
        },

        /// Run raw shellcode in the target
        Shellcode {
            /// File containing the raw shellcode bytes
            path: PathBuf,
        },
    }

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let args = Args::parse();
        init_logging(&LogConfig::default().with_level(&args.log_level));

        let process = match (args.pid, &args.name) {
            (Some(pid), _) => Process::open(pid, ProcessAccess::ALL_ACCESS, false)?,
            (None, Some(name)) => Process::first_by_name(name, ProcessAccess::ALL_ACCESS)?,
            (None, None) => {
                eprintln!("Error: no target specified. Use --pid or --name.");
                eprintln!();
                eprintln!("Examples:");
                eprintln!("  revenant-inject --pid 1234 dll C:\\payload\\hook.dll");
                eprintln!("  revenant-inject --name target.exe shellcode payload.bin");
                std::process::exit(1);
            }
        };

        println!("Target: PID {} ({})", process.pid(), process.image_path()?);

        let shellcode;
        let dll_path;
        let injection = match &args.payload {
            Payload::Dll { path } => {
                dll_path = path.canonicalize()?.to_string_lossy().to_string();
                println!("DLL: {dll_path}");
                Injection::LoadLibrary {
                    dll_path: &dll_path,
                }
            }
            Payload::Shellcode { path } => {
                shellcode = std::fs::read(path)?;
                println!("Shellcode: {} bytes from {}", shellcode.len(), path.display());
                Injection::Shellcode { code: &shellcode }
            }
        };

        let result = process.inject(&injection)?;
        println!(
            "Injected: payload at {:#x} ({} bytes), thread {}",
            result.area.base(),
            result.area.size(),
            result.thread.tid()
        );

        if args.wait {
            let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
            let outcome = result.thread.wait(timeout, false)?;
            match result.thread.exit_code()? {
                Some(code) => println!("Payload thread finished: {outcome:?} (exit code {code:#x})"),
                None => println!("Payload thread still running after wait: {outcome:?}"),
            }
        }

        Ok(())
    }
}

#[cfg(windows)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("revenant-inject only runs on Windows targets.");
    std::process::exit(1);
}
