fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = novelgen::cli::Args::parse();
    novelgen::cli::init_tracing(args.verbose);
    if let Err(e) = novelgen::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
