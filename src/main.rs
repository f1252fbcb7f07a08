use alertdesk::api::server::rest::AlertClient;
use alertdesk::api::server::ws::ConnectionManager;
use alertdesk::config::{self, Settings};
use alertdesk::ui::core::alerts::Reconciler;
use alertdesk::ui::core::notify::{LogNotifier, NotificationDispatcher, ToastBoard};
use alertdesk::ui::dashboard::Dashboard;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;

fn init_logger(settings: &Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .filter_module("alertdesk", LevelFilter::Debug)
        .parse_default_env()
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        });

    // The dashboard owns the terminal, so a log file keeps the screen clean
    match &settings.log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .target(env_logger::Target::Pipe(Box::new(file)))
                .write_style(env_logger::WriteStyle::Never);
        }
        None => {
            builder.target(env_logger::Target::Stderr);
        }
    }

    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let settings = config::load();
    init_logger(&settings)?;

    info!("Starting AlertDesk...");
    info!("Alert feed: {} | Alert API: {}", settings.ws_url, settings.server_url);

    let toasts = ToastBoard::new(settings.toast_ttl);
    let mut dispatcher = NotificationDispatcher::new();
    dispatcher.register(Box::new(toasts.clone()));
    dispatcher.register(Box::new(LogNotifier));

    let dashboard = Dashboard::new(
        Reconciler::new(dispatcher),
        toasts,
        AlertClient::new(settings.server_url.clone()),
    );

    let connection = Arc::new(ConnectionManager::new(settings.ws_url.clone()));

    if let Err(e) = dashboard.run(connection).await {
        error!("Dashboard error: {}", e);
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
