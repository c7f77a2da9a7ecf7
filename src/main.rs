use clap::Parser;
use registry_fake_pusher::cli::{Args, Runner};
use registry_fake_pusher::logging::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args.from_env(),
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let runner = Runner::new(args);
    init_tracing(runner.config().debug);
    let code = runner.run().await;
    std::process::exit(code);
}
