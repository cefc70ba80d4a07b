use std::process;

use log::LevelFilter;
use rrkernel::config::{KernelConfig, SimConfig};
use rrkernel::console;
use rrkernel::hardware::{Machine, Workload};

fn main() {
    console::init(LevelFilter::Info);
    println!("Welcome to rrkernel!");

    let booted = Machine::boot(KernelConfig::default(), SimConfig::default(), Workload::demo());
    let mut machine = match booted {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("boot failed: {}", e);
            process::exit(1);
        }
    };

    match machine.run() {
        Ok(report) => {
            println!("Halted at time {}", report.clock);
            for exit in &report.exits {
                println!(
                    "  PID {}: exited at {}, CPU time {}",
                    exit.pid, exit.clock, exit.cpu_time_used
                );
            }
            println!(
                "  {} dispatches, {} idle, {} preemptions, {} device requests",
                report.stats.dispatches,
                report.stats.idle_dispatches,
                report.stats.preemptions,
                report.requests.len()
            );
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
