use std::{fs, path::PathBuf, process::exit};

use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use mktemp::Temp;

use calcc::{
    backend::Target,
    compile::{CompileOptions, compile},
    diagnostics,
    frontend::{SourceFile, SourceFileOrigin},
};

const SOURCE_EXTENSION: &str = "calc";

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Source file to compile
    source_file: PathBuf,

    /// Code generation target
    #[arg(long, default_value_t = Target::default())]
    target: Target,

    /// Emit the generated assembly or C text and stop
    #[arg(short = 'S', long)]
    emit_only: bool,

    /// Output path (defaults next to the source file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable constant folding
    #[arg(long)]
    no_fold: bool,
}

fn main() {
    let args = Args::parse();

    if args.source_file.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Source files should have the '.{SOURCE_EXTENSION}' extension!"),
            )
            .exit();
    }

    if !args.source_file.is_file() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Source file '{}' does not exist!", args.source_file.display()),
            )
            .exit();
    }

    let contents = fs::read_to_string(&args.source_file)
        .expect("Failed to read input file (or invalid UTF-8)");
    let source = SourceFile {
        contents,
        origin: SourceFileOrigin::File(args.source_file.clone()),
    };

    let options = CompileOptions {
        target: args.target,
        fold: !args.no_fold,
    };

    let text = match compile(&source, &options) {
        Ok(text) => text,
        Err(errors) => {
            eprint!("{}", diagnostics::render(&errors, &source));
            exit(1);
        }
    };

    if args.emit_only {
        let output = args
            .output
            .unwrap_or_else(|| args.source_file.with_extension(args.target.extension()));
        fs::write(output, text).expect("Failed to write output file");
        return;
    }

    // Stage the generated text and object file in a temporary directory so
    // nothing is left behind next to the sources
    let staging = Temp::new_dir().expect("Failed to create temporary directory");
    let stage = staging.join(format!("stage.{}", args.target.extension()));
    let object = staging.join("stage.o");

    fs::write(&stage, text).expect("Failed to write intermediate file");

    let assembled = args
        .target
        .create_assembler_command(&stage, &object)
        .output()
        .expect("Failed to run the assembler");
    if !assembled.status.success() {
        eprint!("{}", String::from_utf8_lossy(&assembled.stderr));
        exit(1);
    }

    let output = args
        .output
        .unwrap_or_else(|| args.source_file.with_extension(""));
    let linked = args
        .target
        .create_linker_command(&object, &output)
        .output()
        .expect("Failed to run the linker");
    if !linked.status.success() {
        eprint!("{}", String::from_utf8_lossy(&linked.stderr));
        exit(1);
    }
}
