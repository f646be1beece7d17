use hello_pubsub::{init_tracing, LogFormat, PubsubMessage};
use pubsub_emulator::config::{parse_args, print_help, Command, Config};
use pubsub_emulator::{DeliveryOutcome, Dispatcher, PushSubscriber};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing("pubsub_emulator=info", LogFormat::Compact);

    let publication = match parse_args(std::env::args().skip(1))? {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Publish(v) => v,
    };

    let config = Config::from_env()?;
    info!(
        "Publishing to {}\n- subscription:  {}\n- push endpoint: {}\n",
        config.topic, config.subscription, config.endpoint
    );

    let subscriber = PushSubscriber::new(config.endpoint);
    let dispatcher = Dispatcher::new(config.topic, config.subscription, subscriber, config.policy);

    let message = PubsubMessage::publish(publication.data.as_deref(), publication.attributes);

    match dispatcher.publish(message).await {
        DeliveryOutcome::Acked { attempts } => {
            info!("Delivered in {attempts} attempt(s)");
            Ok(())
        }
        DeliveryOutcome::DeadLettered { attempts, last_error } => {
            Err(format!("Message dead-lettered after {attempts} attempts: {last_error}").into())
        }
    }
}
