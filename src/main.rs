use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};

use bramble::{
    BTree, DistTree, ProcessGroup, ReduceFns, SkeletonError, ThreadGroup, WindowStream,
};

#[derive(Parser, Debug)]
#[command(name = "bramble", about = "Parallel tree skeletons under a BSP execution model")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the skeletons over a generated tree across an SPMD thread group.
    Demo {
        /// Number of group members.
        #[arg(long, default_value_t = 4)]
        processes: usize,
        /// Nodes in the generated tree.
        #[arg(long, default_value_t = 31)]
        size: usize,
        /// Partition granularity handed to the linearizer.
        #[arg(long, default_value_t = 4)]
        granularity: usize,
    },
    /// Replay a line-oriented integer file through windowed micro-batches.
    Stream {
        /// Input file, one integer per line.
        input: PathBuf,
        /// Window size.
        #[arg(long, default_value_t = 10)]
        window: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo {
            processes,
            size,
            granularity,
        } => run_demo(processes, size, granularity),
        Commands::Stream { input, window } => run_stream(input, window),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DemoReport {
    segments: usize,
    total: i64,
    root_subtree_sum: i64,
    deepest_prefix: i64,
}

fn run_demo(processes: usize, size: usize, granularity: usize) -> Result<()> {
    ensure!(processes >= 1, "the group needs at least one member");

    let reports = ThreadGroup::run(processes, |group| -> Result<DemoReport, SkeletonError> {
        // The root builds the input once and shares it with the group.
        let tree = group.broadcast(0, || {
            let mut next = 0_i64;
            BTree::balanced(size, &mut || {
                next += 1;
                next
            })
        });
        let dist = DistTree::from_tree(&group, &tree, granularity);

        let sum = ReduceFns::new(|v: &i64| *v, |l: i64, v: &i64, r: i64| l + v + r);
        let total = dist.reduce(&sum)?;
        let upward = dist.upward_accumulate(&sum)?.to_tree()?;

        let downward = bramble::tree::derived::dist_ancestor_sums(&dist)?.to_tree()?;
        let deepest_prefix = downward.reduce(&|l: &i64, _: &i64, r: &i64| *l.max(r));

        // hold the group together until everyone has finished computing
        group.barrier();

        Ok(DemoReport {
            segments: dist.segment_count(),
            total,
            root_subtree_sum: *upward.value(),
            deepest_prefix,
        })
    });

    let reports = reports.into_iter().collect::<Result<Vec<_>, _>>()?;
    let report = reports.first().context("empty group")?;
    ensure!(
        reports.iter().all(|r| r == report),
        "group members disagree on the results"
    );

    println!("group members:     {processes}");
    println!("tree nodes:        {}", if size % 2 == 0 { size + 1 } else { size });
    println!("segments:          {}", report.segments);
    println!("reduce(+):         {}", report.total);
    println!("upward sum @root:  {}", report.root_subtree_sum);
    println!("max path prefix:   {}", report.deepest_prefix);
    Ok(())
}

fn run_stream(input: PathBuf, window: usize) -> Result<()> {
    let reader = BufReader::new(
        File::open(&input).with_context(|| format!("failed to open {}", input.display()))?,
    );
    let mut values = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: i64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not an integer", idx + 1))?;
        values.push(value);
    }

    let mut stream = WindowStream::new(window);
    let mut source = values.into_iter();
    let mut round = 0_usize;
    loop {
        stream.fill_from(&mut source);
        if stream.window().is_empty() {
            break;
        }
        round += 1;
        stream.filter(|v| v % 2 == 0);
        stream.map(|v| v + 1);
        let running = stream.reduce(|a, b| a + b, Some(0));
        println!(
            "window {round}: kept {:?}, running total {:?}",
            stream.window(),
            running
        );
        stream.rotate();
    }
    println!(
        "processed {} values in {round} windows",
        stream.processed().len()
    );
    Ok(())
}
