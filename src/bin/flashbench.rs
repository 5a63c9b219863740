use std::env;
use std::process;

use flashbench::op::{Aggregate, OpNode};
use flashbench::{CoreError, Device, ExecContext, execute};

struct Args {
    path: Option<String>,
    out: Option<String>,
    scatter: bool,
    scatter_order: u32,
    scatter_span: u32,
    align: bool,
    interval: bool,
    interval_order: u32,
    find_fat: bool,
    fat_nr: u32,
    open_au: bool,
    open_au_nr: u32,
    offset: u64,
    random: bool,
    verbose: bool,
    count: u32,
    blocksize: u64,
    erasesize: u64,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            path: None,
            out: None,
            scatter: false,
            scatter_order: 9,
            scatter_span: 1,
            align: false,
            interval: false,
            interval_order: 16,
            find_fat: false,
            fat_nr: 6,
            open_au: false,
            open_au_nr: 2,
            offset: 0,
            random: false,
            verbose: false,
            count: 8,
            blocksize: 16 * 1024,
            erasesize: 4 * 1024 * 1024,
        }
    }
}

fn usage() -> ! {
    eprintln!(
        "usage: flashbench [options] <device-or-image>\n\
         \x20 --out|-o FILE          write report to FILE instead of stdout\n\
         \x20 --scatter|-s           run the scatter latency sweep\n\
         \x20 --scatter-order=N      2^N blocks swept (default 9)\n\
         \x20 --scatter-span=N       blocks between sweep samples (default 1)\n\
         \x20 --align|-a             run the alignment probe\n\
         \x20 --interval|-i          run the interval probe\n\
         \x20 --interval-order=N     number of doubling steps (default 16)\n\
         \x20 --find-fat|-f          run the FAT-region probe\n\
         \x20 --fat-nr=N             candidate blocks to probe (default 6)\n\
         \x20 --open-au|-O           run the open-AU probe\n\
         \x20 --open-au-nr=N         candidate AUs to probe (default 2)\n\
         \x20 --offset=N             base offset in bytes\n\
         \x20 --random|-r            use randomized rather than linear offsets\n\
         \x20 --verbose|-v           print progress to stderr\n\
         \x20 --count=N              samples per probe (default 8)\n\
         \x20 --blocksize=N          bytes per probe read/write (default 16384)\n\
         \x20 --erasesize=N          bytes per erase unit (default 4194304)"
    );
    process::exit(1);
}

fn parse_args() -> Args {
    let raw: Vec<String> = env::args().collect();
    let mut args = Args::default();
    let mut i = 1;
    while i < raw.len() {
        let arg = raw[i].as_str();
        match arg {
            "--out" | "-o" => {
                i += 1;
                args.out = raw.get(i).cloned();
            }
            "--scatter" | "-s" => args.scatter = true,
            "--align" | "-a" => args.align = true,
            "--interval" | "-i" => args.interval = true,
            "--find-fat" | "-f" => args.find_fat = true,
            "--open-au" | "-O" => args.open_au = true,
            "--random" | "-r" => args.random = true,
            "--verbose" | "-v" => args.verbose = true,
            _ if arg.starts_with("--scatter-order=") => {
                args.scatter_order = parse_suffix(arg).unwrap_or(args.scatter_order);
            }
            _ if arg.starts_with("--scatter-span=") => {
                args.scatter_span = parse_suffix(arg).unwrap_or(args.scatter_span);
            }
            _ if arg.starts_with("--interval-order=") => {
                args.interval_order = parse_suffix(arg).unwrap_or(args.interval_order);
            }
            _ if arg.starts_with("--fat-nr=") => {
                args.fat_nr = parse_suffix(arg).unwrap_or(args.fat_nr);
            }
            _ if arg.starts_with("--open-au-nr=") => {
                args.open_au_nr = parse_suffix(arg).unwrap_or(args.open_au_nr);
            }
            _ if arg.starts_with("--offset=") => {
                args.offset = parse_suffix(arg).unwrap_or(args.offset);
            }
            _ if arg.starts_with("--count=") => {
                args.count = parse_suffix(arg).unwrap_or(args.count);
            }
            _ if arg.starts_with("--blocksize=") => {
                args.blocksize = parse_suffix(arg).unwrap_or(args.blocksize);
            }
            _ if arg.starts_with("--erasesize=") => {
                args.erasesize = parse_suffix(arg).unwrap_or(args.erasesize);
            }
            _ if !arg.starts_with('-') && args.path.is_none() => {
                args.path = Some(arg.to_string());
            }
            _ => {
                eprintln!("unknown argument: {arg}");
                usage();
            }
        }
        i += 1;
    }
    if args.path.is_none() {
        usage();
    }
    args
}

fn parse_suffix<T: std::str::FromStr>(arg: &str) -> Option<T> {
    arg.split_once('=')?.1.parse().ok()
}

/// Walk the error back to its originating opcode, if any, for the frame
/// trace the driver prints on failure (spec §7).
fn report_error(err: &CoreError) {
    match err {
        CoreError::BadArity(op) => eprintln!("error: {err} (at {op:?})"),
        other => eprintln!("error: {other}"),
    }
}

fn run_scatter(dev: &mut Device, args: &Args) -> Result<(), CoreError> {
    let samples = flashbench::fixed_shape::scatter(dev, args.scatter_order, args.scatter_span, args.blocksize)?;
    for s in &samples {
        let block_mib = s.offset as f64 / (1024.0 * 1024.0);
        let ms = s.ns as f64 / 1e6;
        println!("{block_mib}\t{ms}");
    }
    Ok(())
}

fn run_align(dev: &mut Device, args: &Args) -> Result<(), CoreError> {
    for s in flashbench::fixed_shape::alignment(dev, args.blocksize)? {
        println!("{}\t{}", s.offset, s.ns);
    }
    Ok(())
}

fn run_interval(dev: &mut Device, args: &Args) -> Result<(), CoreError> {
    for s in flashbench::fixed_shape::intervals(dev, args.interval_order, args.blocksize)? {
        println!("{}\t{}", s.offset, s.ns);
    }
    Ok(())
}

fn run_find_fat(dev: &mut Device, args: &Args) -> Result<(), CoreError> {
    for s in flashbench::fixed_shape::find_fat(dev, args.fat_nr, args.blocksize)? {
        println!("{}\t{}", s.offset, s.ns);
    }
    Ok(())
}

fn run_open_au(dev: &mut Device, args: &Args) -> Result<(), CoreError> {
    for s in flashbench::fixed_shape::open_au(dev, args.open_au_nr, args.erasesize)? {
        println!("{}\t{}", s.offset, s.ns);
    }
    Ok(())
}

/// The default interpreter-driven run when no fixed-shape probe is
/// selected: `count` linear reads reduced to Min/Avg/Max, printed humanized.
fn run_default(dev: &mut Device, args: &Args) -> Result<(), CoreError> {
    let mut program = vec![
        OpNode::reduce(Aggregate::Avg),
        OpNode::off_lin(args.count, args.blocksize as i64),
        OpNode::read(),
    ];
    let ctx = ExecContext {
        offset: args.offset,
        max: args.blocksize * args.count as u64,
        length: args.blocksize,
    };
    execute(&mut program, dev, ctx)?;
    let avg_ns = match program[0].consume() {
        flashbench::Value::Ns(n) => n,
        _ => 0,
    };
    println!(
        "{} reads of {}: avg {}",
        args.count,
        flashbench::fixed_shape::humanize_bytes(args.blocksize),
        flashbench::fixed_shape::humanize_rate(1e9 * args.blocksize as f64 / avg_ns.max(1) as f64)
    );
    Ok(())
}

fn main() {
    let args = parse_args();
    let path = args.path.clone().unwrap();

    if args.verbose {
        eprintln!("opening {path}");
    }

    let mut dev = Device::open(&path).unwrap_or_else(|e| {
        eprintln!("failed to open {path}: {e}");
        process::exit(1);
    });

    let result = if args.scatter {
        run_scatter(&mut dev, &args)
    } else if args.align {
        run_align(&mut dev, &args)
    } else if args.interval {
        run_interval(&mut dev, &args)
    } else if args.find_fat {
        run_find_fat(&mut dev, &args)
    } else if args.open_au {
        run_open_au(&mut dev, &args)
    } else {
        run_default(&mut dev, &args)
    };

    if let Err(e) = result {
        report_error(&e);
        process::exit(1);
    }
}
