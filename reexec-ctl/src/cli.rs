use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "reexec-ctl")]
#[command(version, about = "Run work in re-executed copies of this binary", long_about = None)]
#[command(after_help = "EXAMPLES:
    # One-way greeting plus a two-way call answering 13
    reexec-ctl demo

    # Ten workers printing their pids, then reap them all
    reexec-ctl fanout --count 10

    # A worker that fails; its description crosses back
    reexec-ctl fail --message \"disk on fire\"

    # A worker that connects back over TCP to deliver its result
    reexec-ctl socket --port 0 --verbose
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// One-way greeting and a two-way call
    Demo,

    /// Spawn several one-way workers and wait for all of them
    Fanout {
        /// Number of workers
        #[arg(short = 'n', long, default_value_t = 4)]
        count: usize,
    },

    /// Run a worker that fails and print the failure it reports
    Fail {
        /// Failure description the worker returns
        #[arg(short, long, default_value = "something went wrong")]
        message: String,
    },

    /// Deliver a worker's result over a TCP connection instead of a pipe
    Socket {
        /// Port to listen on (0 picks a free one)
        #[arg(short, long, default_value_t = 0)]
        port: u16,
    },

    /// List the work kinds this binary can run
    Catalog,
}
