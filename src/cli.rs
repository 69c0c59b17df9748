use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "nsd2byob",
    about = "Convert Nassi-Shneiderman diagrams (Structorizer .nsd files) into BYOB block scripts."
)]
pub struct Args {
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "OUTPUT",
        help = "Write the project JSON to this path instead of stdout."
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long = "global",
        value_name = "NAME",
        help = "Declare a stage variable even if no diagram assigns it. May be repeated."
    )]
    pub globals: Vec<String>,

    #[arg(long, help = "Emit compact JSON instead of pretty-printed output.")]
    pub compact: bool,
}
