use std::sync::Arc;

use clap::Parser;
use log::{info, warn};

use nayouchi::{
    config::{AppConfig, Args},
    mail::{MailTransport, PickupDirMailer, SmtpMailer},
    server, Dispatcher, GroupStore, Notifier,
};
use storage::{Backend, DirectoryBackend, RedisBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    let hasher = config.identity_hasher()?;

    let backend: Backend = match &args.redis_url {
        Some(url) => RedisBackend::connect(url).await?.into(),
        None => DirectoryBackend::open(&config.database.folder).await?.into(),
    };
    info!("Using {} backend", backend.kind());

    let store = GroupStore::restore(backend).await?;
    let store = kameo::spawn(store);

    let mail = &config.mail;
    let mailer = match (&mail.hostname, &mail.pickup_dir) {
        (Some(host), _) => MailTransport::Smtp(SmtpMailer::starttls(
            host,
            mail.smtp_port(),
            mail.credentials(),
        )?),
        (None, Some(dir)) => MailTransport::PickupDir(PickupDirMailer::open(dir).await?),
        (None, None) => {
            warn!("No mail transport configured, invitations will fail");
            MailTransport::Unconfigured
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        store,
        Arc::new(Notifier::new()),
        mailer,
        hasher,
        config.invitation_settings(),
    ));

    let app = server::router(dispatcher, &args.webroot, config.general.caching);
    server::serve(app, config.port(&args)).await
}
