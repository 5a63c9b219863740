use std::env;
use std::process;

use flashbench::discard_once;

struct Args {
    path: String,
    start: u64,
    length: u64,
}

fn usage() -> ! {
    eprintln!("usage: blkdiscard-raw <device> <start-bytes> <length-bytes>");
    process::exit(1);
}

fn parse_args() -> Args {
    let raw: Vec<String> = env::args().collect();
    if raw.len() != 4 {
        usage();
    }
    let start = raw[2].parse().unwrap_or_else(|_| usage());
    let length = raw[3].parse().unwrap_or_else(|_| usage());
    Args { path: raw[1].clone(), start, length }
}

/// Standalone erase-only auxiliary utility: issues a single `BLKDISCARD` and
/// exits, without going through the interpreter (spec §1).
fn main() {
    let args = parse_args();
    if let Err(e) = discard_once(&args.path, args.start, args.length) {
        eprintln!("discard failed: {e}");
        process::exit(1);
    }
}
