use clap::Parser;
use deployer::{
    cmd::Command,
    error::{DeployError, StepError},
};
use deployer_tracing::{
    init_tracing_subscriber, println_error, println_error_kind, println_warning,
    TracingSubscriberOptions, TracingWriterMode,
};

#[tokio::main]
async fn main() {
    let command = Command::parse();
    init_tracing_subscriber(TracingSubscriberOptions {
        verbosity: Some(command.verbose),
        silent: Some(command.silent),
        writer_mode: command.json.then_some(TracingWriterMode::Json),
        ..Default::default()
    });
    if let Err(err) = deployer::op::execute(command).await {
        let source = err
            .downcast_ref::<StepError>()
            .map(|step| &step.source)
            .or_else(|| err.downcast_ref::<DeployError>());
        match source {
            Some(source) => {
                // Both messages already embed their source.
                println_error_kind(&source.kind().to_string(), &err.to_string());
                if !source.is_local() {
                    println_warning(
                        "the network may have seen a transaction, check its state before running the step again",
                    );
                }
            }
            None => println_error(&format!("{err:#}")),
        }
        std::process::exit(1);
    }
}
