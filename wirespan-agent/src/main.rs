use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use wirespan_agent::kernel::KernelCapabilities;

#[derive(Debug, Parser)]
#[command(name = "wirespan")]
#[command(about = "Report what the running kernel lets wirespan instrument")]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (json, text)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Treat the kernel as lockdown=integrity regardless of what it reports
    #[arg(long)]
    integrity_override: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let memlock_ok = bump_memlock_rlimit();
    let caps = KernelCapabilities::detect(cli.integrity_override);

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&caps)?);
        return Ok(());
    }

    info!("Kernel version: {}.{}", caps.major, caps.minor);
    info!("Lockdown mode: {:?}", caps.lockdown);
    info!(
        "Memlock rlimit: {}",
        if memlock_ok { "unlimited" } else { "restricted" }
    );
    info!(
        "eBPF bounded loops (>= 5.17): {}",
        if caps.loops { "supported" } else { "unsupported" }
    );
    info!(
        "Trace context propagation: {}",
        if caps.context_propagation {
            "supported"
        } else {
            "unsupported (lockdown restricts bpf_probe_write_user)"
        }
    );

    Ok(())
}

/// Older kernels account eBPF maps against RLIMIT_MEMLOCK; raising it is
/// part of checking what this host allows.
fn bump_memlock_rlimit() -> bool {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        warn!("Failed to increase memlock rlimit");
    }
    ret == 0
}
